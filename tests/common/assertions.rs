// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Custom assertions for core testing

use psxcore::core::system::System;

/// Assert RAM contains expected value at address
#[allow(dead_code)]
pub fn assert_memory_word(system: &mut System, addr: u32, expected: u32) {
    let actual = system.read32(addr).expect("Failed to read memory");
    assert_eq!(
        actual, expected,
        "Memory at 0x{:08X} mismatch: expected 0x{:08X}, got 0x{:08X}",
        addr, expected, actual
    );
}

/// Assert a register in the DMA window has expected value
#[allow(dead_code)]
pub fn assert_register(system: &mut System, addr: u32, expected: u32) {
    let actual = system.read32(addr).expect("Failed to read register");
    assert_eq!(
        actual, expected,
        "Register 0x{:08X} mismatch: expected 0x{:08X}, got 0x{:08X}",
        addr, expected, actual
    );
}

/// Assert the ordering table at `head` links downwards to the end marker
#[allow(dead_code)]
pub fn assert_ordering_table(system: &mut System, head: u32, len: u32) {
    for i in 0..len {
        let entry = head - 4 * i;
        let expected = if i + 1 == len { 0x00FF_FFFF } else { entry - 4 };
        assert_memory_word(system, entry, expected);
    }
}
