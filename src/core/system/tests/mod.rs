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

//! System module tests
//!
//! Organized by functionality: register routing, event timing, DMA driven
//! through the register window, and the interrupt line.


use super::*;
use std::cell::RefCell;

/// GP0/GPUREAD port that records every word written to GP0
struct Gp0Recorder {
    words: Rc<RefCell<Vec<u32>>>,
}

impl IODevice for Gp0Recorder {
    fn address_range(&self) -> (u32, u32) {
        (0x1F80_1810, 0x1F80_1817)
    }

    fn read_register(&mut self, _offset: u32) -> Result<u32> {
        Ok(0)
    }

    fn write_register(&mut self, offset: u32, value: u32) -> Result<()> {
        if offset == 0 {
            self.words.borrow_mut().push(value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "GP0 recorder"
    }
}

/// System with a GP0 recorder attached
fn system_with_gpu() -> (System, Rc<RefCell<Vec<u32>>>) {
    let words = Rc::new(RefCell::new(Vec::new()));
    let mut system = System::new();
    system.attach_device(Box::new(Gp0Recorder {
        words: words.clone(),
    }));
    (system, words)
}

const DPCR: u32 = 0x1F80_10F0;
const DICR: u32 = 0x1F80_10F4;
const DPCR_ALL_ENABLED: u32 = 0x0FED_CBA9;

const GPU_MADR: u32 = 0x1F80_10A0;
const GPU_BCR: u32 = 0x1F80_10A4;
const GPU_CHCR: u32 = 0x1F80_10A8;

const OTC_MADR: u32 = 0x1F80_10E0;
const OTC_BCR: u32 = 0x1F80_10E4;
const OTC_CHCR: u32 = 0x1F80_10E8;
