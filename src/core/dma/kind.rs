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

//! Per-channel specializations
//!
//! Every channel shares the state machine in [`DmaChannel`](super::DmaChannel);
//! what differs is the peripheral data port and the bus accesses that make up
//! one transfer unit.
//!
//! | Channel | Device   | Port       | Directions        | Unit                 |
//! |---------|----------|------------|-------------------|----------------------|
//! | 0       | MDEC In  | 0x1F801820 | from RAM          | one 32-bit write     |
//! | 1       | MDEC Out | 0x1F801820 | to RAM            | one 32-bit read      |
//! | 2       | GPU      | 0x1F801810 | both (+ list)     | GP0 write / GPUREAD  |
//! | 3       | CD-ROM   | 0x1F801802 | to RAM            | four 8-bit FIFO pops |
//! | 4       | SPU      | 0x1F801DA8 | both              | two 16-bit accesses  |
//! | 5       | PIO      | 0x1F000000 | both              | one 32-bit access    |
//! | 6       | OTC      | -          | to RAM            | own algorithm        |

use super::registers::Direction;
use crate::core::error::{DmaError, Result};
use crate::core::memory::Bus;

/// DMA channel identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    MdecIn,
    MdecOut,
    Gpu,
    CdRom,
    Spu,
    Pio,
    Otc,
}

/// Peripheral data port and its access width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPort {
    /// One 32-bit access per unit
    Word(u32),
    /// Two 16-bit accesses per unit, low half first
    HalfWords(u32),
    /// Four 8-bit accesses per unit, lowest byte first
    Bytes(u32),
}

impl DataPort {
    /// Pull one unit out of the peripheral
    pub fn read(self, bus: &mut Bus) -> Result<u32> {
        match self {
            DataPort::Word(address) => bus.read32(address),
            DataPort::HalfWords(address) => {
                let low = bus.read16(address)? as u32;
                let high = bus.read16(address)? as u32;
                Ok(low | (high << 16))
            }
            DataPort::Bytes(address) => {
                let mut bytes = [0u8; 4];
                for byte in &mut bytes {
                    *byte = bus.read8(address)?;
                }
                Ok(u32::from_le_bytes(bytes))
            }
        }
    }

    /// Push one unit into the peripheral
    pub fn write(self, bus: &mut Bus, value: u32) -> Result<()> {
        match self {
            DataPort::Word(address) => bus.write32(address, value),
            DataPort::HalfWords(address) => {
                bus.write16(address, value as u16)?;
                bus.write16(address, (value >> 16) as u16)
            }
            DataPort::Bytes(address) => {
                for byte in value.to_le_bytes() {
                    bus.write8(address, byte)?;
                }
                Ok(())
            }
        }
    }
}

impl ChannelKind {
    /// All channels in register order
    pub const ALL: [ChannelKind; 7] = [
        ChannelKind::MdecIn,
        ChannelKind::MdecOut,
        ChannelKind::Gpu,
        ChannelKind::CdRom,
        ChannelKind::Spu,
        ChannelKind::Pio,
        ChannelKind::Otc,
    ];

    /// Channel number (0-6)
    pub fn index(self) -> usize {
        match self {
            ChannelKind::MdecIn => 0,
            ChannelKind::MdecOut => 1,
            ChannelKind::Gpu => 2,
            ChannelKind::CdRom => 3,
            ChannelKind::Spu => 4,
            ChannelKind::Pio => 5,
            ChannelKind::Otc => 6,
        }
    }

    /// Channel for a register window index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::MdecIn => "MDEC In",
            ChannelKind::MdecOut => "MDEC Out",
            ChannelKind::Gpu => "GPU",
            ChannelKind::CdRom => "CD-ROM",
            ChannelKind::Spu => "SPU",
            ChannelKind::Pio => "PIO",
            ChannelKind::Otc => "OTC",
        }
    }

    /// Peripheral data port, `None` for the ordering table builder
    pub fn data_port(self) -> Option<DataPort> {
        match self {
            ChannelKind::MdecIn | ChannelKind::MdecOut => Some(DataPort::Word(0x1F80_1820)),
            ChannelKind::Gpu => Some(DataPort::Word(0x1F80_1810)),
            ChannelKind::CdRom => Some(DataPort::Bytes(0x1F80_1802)),
            ChannelKind::Spu => Some(DataPort::HalfWords(0x1F80_1DA8)),
            ChannelKind::Pio => Some(DataPort::Word(0x1F00_0000)),
            ChannelKind::Otc => None,
        }
    }

    /// Whether the hardware can move data in this direction
    pub fn supports(self, direction: Direction) -> bool {
        match self {
            ChannelKind::MdecIn => direction == Direction::FromRam,
            ChannelKind::MdecOut | ChannelKind::CdRom | ChannelKind::Otc => {
                direction == Direction::ToRam
            }
            ChannelKind::Gpu | ChannelKind::Spu | ChannelKind::Pio => true,
        }
    }

    /// Only the GPU channel walks linked lists
    pub fn supports_linked_list(self) -> bool {
        self == ChannelKind::Gpu
    }

    /// Move one unit between RAM at `address` and the data port
    ///
    /// Returns `false` when a bus access faulted; the exception flag is left
    /// raised for the caller. A faulting RAM read never reaches the port. A
    /// word already pulled from the port when the RAM write faults is parked
    /// in `held` and written on the next attempt instead of popping again.
    pub(super) fn transfer_unit(
        self,
        bus: &mut Bus,
        address: u32,
        direction: Direction,
        held: &mut Option<u32>,
    ) -> Result<bool> {
        let port = self.data_port().ok_or(DmaError::NoDataPort {
            channel: self.index(),
            name: self.name(),
        })?;

        match direction {
            Direction::FromRam => {
                let word = bus.read32(address)?;
                if bus.exception_pending() {
                    return Ok(false);
                }
                port.write(bus, word)?;
            }
            Direction::ToRam => {
                let word = match held.take() {
                    Some(word) => word,
                    None => {
                        let word = port.read(bus)?;
                        if bus.exception_pending() {
                            return Ok(false);
                        }
                        word
                    }
                };
                bus.write32(address, word)?;
                if bus.exception_pending() {
                    *held = Some(word);
                    return Ok(false);
                }
            }
        }

        Ok(!bus.exception_pending())
    }
}
