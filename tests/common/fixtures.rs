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

//! Test fixtures for common test scenarios

use psxcore::core::error::Result;
use psxcore::core::memory::IODevice;
use psxcore::core::system::System;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const DPCR: u32 = 0x1F80_10F0;
pub const DICR: u32 = 0x1F80_10F4;

/// DPCR with every channel enabled and the reset priorities
pub const DPCR_ALL_ENABLED: u32 = 0x0FED_CBA9;

/// MADR address of a channel; BCR and CHCR follow at +4 and +8
pub const fn channel_base(channel: u32) -> u32 {
    0x1F80_1080 + 0x10 * channel
}

/// What a [`RecordingPort`] has seen
#[derive(Debug, Default)]
pub struct PortLog {
    /// Words written at offset 0
    pub written: Vec<u32>,
    /// Words served to reads at offset 0
    pub fifo: VecDeque<u32>,
}

pub type SharedLog = Rc<RefCell<PortLog>>;

/// Memory-mapped data port recording writes and serving reads from a FIFO
pub struct RecordingPort {
    range: (u32, u32),
    log: SharedLog,
}

impl IODevice for RecordingPort {
    fn address_range(&self) -> (u32, u32) {
        self.range
    }

    fn read_register(&mut self, offset: u32) -> Result<u32> {
        if offset != 0 {
            return Ok(0);
        }
        Ok(self.log.borrow_mut().fifo.pop_front().unwrap_or(0))
    }

    fn write_register(&mut self, offset: u32, value: u32) -> Result<()> {
        if offset == 0 {
            self.log.borrow_mut().written.push(value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording port"
    }
}

/// Attach a recording port covering `start..=end`
#[allow(dead_code)]
pub fn attach_port(system: &mut System, start: u32, end: u32) -> SharedLog {
    let log = SharedLog::default();
    system.attach_device(Box::new(RecordingPort {
        range: (start, end),
        log: log.clone(),
    }));
    log
}

/// System with GP0 recorded and every DMA channel enabled
#[allow(dead_code)]
pub fn create_gpu_system() -> (System, SharedLog) {
    let mut system = System::new();
    let gp0 = attach_port(&mut system, 0x1F80_1810, 0x1F80_1817);
    system
        .write32(DPCR, DPCR_ALL_ENABLED)
        .expect("Failed to write DPCR");
    (system, gp0)
}

/// Write consecutive words into RAM
#[allow(dead_code)]
pub fn write_words(system: &mut System, start_addr: u32, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        system
            .write32(start_addr + 4 * i as u32, word)
            .expect("Failed to write to memory");
    }
}

/// Program MADR, BCR and CHCR of a channel, CHCR last
#[allow(dead_code)]
pub fn program_channel(system: &mut System, channel: u32, madr: u32, bcr: u32, chcr: u32) -> Result<()> {
    let base = channel_base(channel);
    system.write32(base, madr)?;
    system.write32(base + 4, bcr)?;
    system.write32(base + 8, chcr)
}
