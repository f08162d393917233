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

//! DMA controller registers
//!
//! # DPCR (0x1F8010F0)
//!
//! ```text
//! Bits  | Field
//! ------|-------------------------------------------
//! 4n+0..4n+2 | Channel n priority (0 = highest)
//! 4n+3       | Channel n master enable
//! 28-30      | CPU memory access priority
//! ```
//!
//! # DICR (0x1F8010F4)
//!
//! ```text
//! Bits  | Field
//! ------|-------------------------------------------
//! 0-6   | Per-channel IRQ after every block (slice / linked list)
//! 15    | Bus error
//! 16-22 | Per-channel IRQ enable
//! 23    | Master IRQ enable
//! 24-30 | Per-channel IRQ flags (write 1 to clear)
//! 31    | Master IRQ flag (read-only)
//! ```
//!
//! The interrupt line is a pure function of this state:
//! `master_enable && (bus_error || any(enable[n] && flag[n]))`.

use super::NUM_CHANNELS;

/// DMA interrupt aggregation and channel arbitration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaController {
    /// Channel priorities (0-7, lower wins)
    priority: [u8; NUM_CHANNELS],

    /// Channel enables (DPCR bit 4n+3)
    enabled: [bool; NUM_CHANNELS],

    /// CPU access priority (DPCR bits 28-30)
    cpu_priority: u8,

    /// IRQ after every block (DICR bits 0-6)
    block_irq_enable: u8,

    /// Bus error (DICR bit 15)
    bus_error: bool,

    /// IRQ enable mask (DICR bits 16-22)
    irq_enable: u8,

    /// Master IRQ enable (DICR bit 23)
    master_enable: bool,

    /// IRQ flags (DICR bits 24-30)
    irq_flags: u8,

    /// Interrupt line as last computed
    irq_line: bool,

    /// Latched rising edge of the interrupt line
    irq_edge: bool,
}

impl DmaController {
    /// DPCR power-on value
    pub const DPCR_RESET: u32 = 0x0765_4321;

    const CHANNEL_MASK: u8 = 0x7F;

    pub fn new() -> Self {
        let mut controller = Self {
            priority: [0; NUM_CHANNELS],
            enabled: [false; NUM_CHANNELS],
            cpu_priority: 0,
            block_irq_enable: 0,
            bus_error: false,
            irq_enable: 0,
            master_enable: false,
            irq_flags: 0,
            irq_line: false,
            irq_edge: false,
        };
        controller.write_control(Self::DPCR_RESET);
        controller
    }

    /// Read DMA Control Register (DPCR)
    pub fn read_control(&self) -> u32 {
        let channels = (0..NUM_CHANNELS).fold(0u32, |acc, ch| {
            acc | ((self.priority[ch] as u32) << (4 * ch))
                | ((self.enabled[ch] as u32) << (4 * ch + 3))
        });
        channels | ((self.cpu_priority as u32) << 28)
    }

    /// Write DMA Control Register (DPCR)
    pub fn write_control(&mut self, value: u32) {
        for ch in 0..NUM_CHANNELS {
            self.priority[ch] = ((value >> (4 * ch)) & 7) as u8;
            self.enabled[ch] = (value >> (4 * ch + 3)) & 1 != 0;
        }
        self.cpu_priority = ((value >> 28) & 7) as u8;
        log::trace!("DPCR = 0x{:08X}", self.read_control());
    }

    /// Read DMA Interrupt Register (DICR)
    pub fn read_interrupt(&self) -> u32 {
        (self.block_irq_enable as u32)
            | ((self.bus_error as u32) << 15)
            | ((self.irq_enable as u32) << 16)
            | ((self.master_enable as u32) << 23)
            | ((self.irq_flags as u32) << 24)
            | ((self.irq_line as u32) << 31)
    }

    /// Write DMA Interrupt Register (DICR)
    ///
    /// Bits 0-6 and 15-23 are replaced; bits 24-30 are write-1-to-clear.
    pub fn write_interrupt(&mut self, value: u32) {
        self.block_irq_enable = (value as u8) & Self::CHANNEL_MASK;
        self.bus_error = value & (1 << 15) != 0;
        self.irq_enable = ((value >> 16) as u8) & Self::CHANNEL_MASK;
        self.master_enable = value & (1 << 23) != 0;

        let acknowledge = ((value >> 24) as u8) & Self::CHANNEL_MASK;
        self.irq_flags &= !acknowledge;

        self.update_irq_line();
        log::trace!("DICR = 0x{:08X}", self.read_interrupt());
    }

    /// Record a bus error raised by a transfer
    pub fn signal_exception(&mut self) {
        log::debug!("DMA: bus error during transfer");
        self.bus_error = true;
        self.update_irq_line();
    }

    /// Flag a completed transfer (or block) on `channel`
    ///
    /// The flag is only latched when the channel's enable bit is set.
    pub fn request_interrupt(&mut self, channel: usize) {
        let bit = 1u8 << channel;
        if self.irq_enable & bit != 0 {
            self.irq_flags |= bit;
            log::trace!("DMA{}: IRQ flag set", channel);
        }
        self.update_irq_line();
    }

    /// Whether a channel wants an interrupt after every block
    pub fn block_irq_enabled(&self, channel: usize) -> bool {
        self.block_irq_enable & (1 << channel) != 0
    }

    /// Whether a channel is enabled in DPCR
    pub fn channel_enabled(&self, channel: usize) -> bool {
        self.enabled[channel]
    }

    /// Channel priority from DPCR
    pub fn channel_priority(&self, channel: usize) -> u8 {
        self.priority[channel]
    }

    /// Enabled channels, highest priority first
    ///
    /// Ties go to the higher-numbered channel, as on hardware.
    pub fn channels_by_priority(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..NUM_CHANNELS).filter(|&ch| self.enabled[ch]).collect();
        order.sort_by(|&a, &b| self.priority[a].cmp(&self.priority[b]).then(b.cmp(&a)));
        order
    }

    /// Current interrupt line level
    #[inline]
    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Consume a latched rising edge of the interrupt line
    pub fn take_irq_edge(&mut self) -> bool {
        std::mem::take(&mut self.irq_edge)
    }

    fn update_irq_line(&mut self) {
        let requested = self.irq_enable & self.irq_flags != 0;
        let line = self.master_enable && (self.bus_error || requested);

        if line && !self.irq_line {
            log::debug!("DMA: IRQ line raised (DICR=0x{:08X})", self.read_interrupt() | (1 << 31));
            self.irq_edge = true;
        }
        self.irq_line = line;
    }

    /// Restore register state (save-state loading)
    pub(crate) fn restore(&mut self, dpcr: u32, dicr: u32) {
        self.write_control(dpcr);
        self.write_interrupt(dicr & 0x00FF_807F);
        self.irq_flags = ((dicr >> 24) as u8) & Self::CHANNEL_MASK;
        self.irq_edge = false;
        self.irq_line = false;
        self.update_irq_line();
        self.irq_edge = false;
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}
