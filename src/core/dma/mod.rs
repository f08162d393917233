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

//! DMA (Direct Memory Access) Controller
//!
//! Seven channels move data between main RAM and peripherals through the
//! [`Bus`], each one charging a bus cycle per unit so the CPU driver can
//! account for stolen time.
//!
//! # Register Map
//!
//! | Address               | Register                         |
//! |-----------------------|----------------------------------|
//! | 0x1F801080 + 0x10 * n | MADR (channel n base address)    |
//! | 0x1F801084 + 0x10 * n | BCR (channel n block control)    |
//! | 0x1F801088 + 0x10 * n | CHCR (channel n control)         |
//! | 0x1F8010F0            | DPCR (priorities and enables)    |
//! | 0x1F8010F4            | DICR (interrupts)                |
//! | 0x1F8010F8/FC         | Unknown, fixed read values       |
//!
//! # Transfer Modes
//!
//! - **Burst** (mode 0): whole BCR word count at once, optionally chopped
//! - **Slice** (mode 1): BCR block count blocks, one per DREQ edge
//! - **Linked list** (mode 2): GPU command lists in RAM
//!
//! The ordering table channel (6) ignores the sync mode and always builds a
//! backward-linked table.
//!
//! # Example
//!
//! ```
//! use psxcore::core::dma::{ChannelKind, Dma, TransferStatus};
//! use psxcore::core::memory::Bus;
//!
//! let mut bus = Bus::new();
//! let mut dma = Dma::new();
//!
//! // Enable OTC (DPCR bit 27) and clear a four-entry table ending at 0x100
//! dma.write(0x70, 0x0800_0000, 0xFFFF_FFFF).unwrap();
//! dma.write(0x60, 0x100, 0xFFFF_FFFF).unwrap();
//! dma.write(0x64, 4, 0xFFFF_FFFF).unwrap();
//! assert!(dma.write(0x68, 0x1100_0002, 0xFFFF_FFFF).unwrap());
//!
//! let done = dma.service(&mut bus).unwrap();
//! assert_eq!(done, vec![(ChannelKind::Otc, TransferStatus::Completed)]);
//! assert_eq!(bus.read32(0x100).unwrap(), 0xFC);
//! assert_eq!(bus.read32(0xF4).unwrap(), 0x00FF_FFFF);
//! assert_eq!(bus.take_pending_cycles(), 4);
//! ```

mod channel;
mod controller;
mod kind;
mod registers;

pub use channel::{DmaChannel, TransferStatus, LINKED_MAX_NODE_COUNT};
pub use controller::DmaController;
pub use kind::{ChannelKind, DataPort};
pub use registers::{BlockControl, ChannelControl, ChcrFlags, Direction, SyncMode, ADDRESS_MASK};

use crate::core::error::{DmaError, Result};
use crate::core::memory::Bus;
use channel::merge;

/// Number of DMA channels
pub const NUM_CHANNELS: usize = 7;

/// DMA register window (physical addresses)
pub const DMA_START: u32 = 0x1F80_1080;
pub const DMA_END: u32 = 0x1F80_10FF;

const DPCR_OFFSET: u32 = 0x70;
const DICR_OFFSET: u32 = 0x74;

/// DICR bits that are write-1-to-clear or read-only
const DICR_FLAG_BITS: u32 = 0xFF00_0000;

/// DMA engine: seven channels plus the shared controller
pub struct Dma {
    channels: [DmaChannel; NUM_CHANNELS],
    controller: DmaController,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            channels: ChannelKind::ALL.map(DmaChannel::new),
            controller: DmaController::new(),
        }
    }

    /// Return every channel and the controller to power-on state
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.controller = DmaController::new();
    }

    /// Whether a physical address falls in the DMA register window
    #[inline]
    pub fn contains(paddr: u32) -> bool {
        (DMA_START..=DMA_END).contains(&paddr)
    }

    /// Read a register at `offset` from 0x1F801080
    pub fn read(&self, offset: u32) -> Result<u32> {
        let (index, register) = split_offset(offset);

        match ChannelKind::from_index(index) {
            Some(kind) => self.channels[kind.index()].read(register),
            None => match offset & !3 {
                DPCR_OFFSET => Ok(self.controller.read_control()),
                DICR_OFFSET => Ok(self.controller.read_interrupt()),
                0x78 => Ok(0x7FFA_C68B),
                0x7C => Ok(0x00FF_FFF7),
                _ => Err(DmaError::InvalidRegister {
                    channel: index,
                    offset: register,
                }
                .into()),
            },
        }
    }

    /// Masked write of a register at `offset` from 0x1F801080
    ///
    /// Returns `true` when a transfer became serviceable (a channel started,
    /// or DPCR enabled a channel that was already armed).
    pub fn write(&mut self, offset: u32, value: u32, mask: u32) -> Result<bool> {
        let (index, register) = split_offset(offset);

        match ChannelKind::from_index(index) {
            Some(kind) => {
                let started = self.channels[kind.index()].write(register, value, mask)?;
                Ok(started && self.controller.channel_enabled(kind.index()))
            }
            None => match offset & !3 {
                DPCR_OFFSET => {
                    let dpcr = merge(self.controller.read_control(), value, mask);
                    self.controller.write_control(dpcr);
                    Ok(self.service_pending())
                }
                DICR_OFFSET => {
                    // Flag bits only clear when explicitly written
                    let kept = self.controller.read_interrupt() & !DICR_FLAG_BITS;
                    self.controller.write_interrupt(merge(kept, value, mask));
                    Ok(false)
                }
                0x78 | 0x7C => Ok(false),
                _ => Err(DmaError::InvalidRegister {
                    channel: index,
                    offset: register,
                }
                .into()),
            },
        }
    }

    /// Route a DMA request edge from a peripheral
    ///
    /// Returns `true` when the channel needs servicing.
    pub fn dreq_rising_edge(&mut self, kind: ChannelKind) -> Result<bool> {
        let armed = self.channels[kind.index()].dreq_rising_edge()?;
        Ok(armed && self.controller.channel_enabled(kind.index()))
    }

    /// Resume a chopped channel once its CPU window has passed
    ///
    /// `generation` is the channel's [`DmaChannel::transfer_generation`] when
    /// it yielded. A resume for a transfer that has since been aborted,
    /// restarted or resumed is ignored.
    pub fn resume(&mut self, kind: ChannelKind, generation: u32) -> Result<bool> {
        let channel = &mut self.channels[kind.index()];
        if channel.transfer_generation() != generation
            || !channel.is_running()
            || channel.is_transfer_active()
        {
            return Ok(false);
        }
        channel.transfer_start(true)?;
        Ok(self.controller.channel_enabled(kind.index()))
    }

    /// Step every active, enabled channel in priority order
    ///
    /// Returns the outcome for each channel that ran.
    pub fn service(&mut self, bus: &mut Bus) -> Result<Vec<(ChannelKind, TransferStatus)>> {
        let mut outcomes = Vec::new();

        for index in self.controller.channels_by_priority() {
            let channel = &mut self.channels[index];
            if !channel.is_transfer_active() {
                continue;
            }
            let status = channel.advance_transfer(&mut self.controller, bus)?;
            outcomes.push((channel.kind(), status));
        }

        Ok(outcomes)
    }

    /// Step a single channel regardless of DPCR
    pub fn advance_transfer(&mut self, kind: ChannelKind, bus: &mut Bus) -> Result<TransferStatus> {
        self.channels[kind.index()].advance_transfer(&mut self.controller, bus)
    }

    /// Whether any enabled channel is waiting to be serviced
    pub fn service_pending(&self) -> bool {
        self.channels
            .iter()
            .any(|ch| ch.is_transfer_active() && self.controller.channel_enabled(ch.kind().index()))
    }

    #[inline]
    pub fn channel(&self, kind: ChannelKind) -> &DmaChannel {
        &self.channels[kind.index()]
    }

    #[inline]
    pub fn controller(&self) -> &DmaController {
        &self.controller
    }

    /// DMA interrupt line level
    #[inline]
    pub fn interrupt_line(&self) -> bool {
        self.controller.irq_line()
    }

    /// Consume a latched rising edge of the interrupt line
    pub fn take_irq_edge(&mut self) -> bool {
        self.controller.take_irq_edge()
    }

    pub(crate) fn channels_mut(&mut self) -> &mut [DmaChannel; NUM_CHANNELS] {
        &mut self.channels
    }

    pub(crate) fn controller_mut(&mut self) -> &mut DmaController {
        &mut self.controller
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a window offset into channel index and register offset
#[inline(always)]
fn split_offset(offset: u32) -> (usize, u32) {
    (((offset >> 4) & 7) as usize, offset & 0xC)
}

#[cfg(test)]
mod tests;
