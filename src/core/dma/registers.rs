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

//! Channel register layouts
//!
//! # CHCR (Channel Control, +0x08)
//!
//! ```text
//! Bit   | Field
//! ------|------------------------------------------------
//! 0     | Direction (0 = to RAM, 1 = from RAM)
//! 1     | Address step (0 = +4, 1 = -4)
//! 8     | Chopping enable
//! 9-10  | Sync mode (0 = burst, 1 = slice, 2 = linked list, 3 = reserved)
//! 16-18 | Chopping DMA window (2^N words)
//! 20-22 | Chopping CPU window (2^N cycles)
//! 24    | Start/busy
//! 28    | Force start
//! 29    | Pause
//! 30    | Unknown (read/write)
//! ```
//!
//! # BCR (Block Control, +0x04)
//!
//! - Burst: bits 0-15 word count (0 = 0x10000)
//! - Slice: bits 0-15 block size in words, bits 16-31 block count

use bitflags::bitflags;

/// Mask for the 24-bit DMA address space
pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

bitflags! {
    /// Single-bit CHCR fields
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChcrFlags: u32 {
        const FROM_RAM = 1 << 0;
        const DECREMENT = 1 << 1;
        const CHOPPING = 1 << 8;
        const START_BUSY = 1 << 24;
        const FORCE_START = 1 << 28;
        const PAUSE = 1 << 29;
        const UNKNOWN_30 = 1 << 30;
    }
}

/// Transfer direction (CHCR bit 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to RAM
    ToRam,
    /// RAM to device
    FromRam,
}

impl Direction {
    pub fn describe(self) -> &'static str {
        match self {
            Direction::ToRam => "to RAM",
            Direction::FromRam => "from RAM",
        }
    }
}

/// Sync mode (CHCR bits 9-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Whole block at once (optionally chopped)
    Burst,
    /// Fixed-size blocks, one per DREQ
    Slice,
    /// Linked list of variable-size nodes
    LinkedList,
    /// Not used by hardware
    Reserved,
}

impl SyncMode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => SyncMode::Burst,
            1 => SyncMode::Slice,
            2 => SyncMode::LinkedList,
            _ => SyncMode::Reserved,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            SyncMode::Burst => 0,
            SyncMode::Slice => 1,
            SyncMode::LinkedList => 2,
            SyncMode::Reserved => 3,
        }
    }
}

/// Channel Control Register (CHCR)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelControl(pub u32);

impl ChannelControl {
    /// Bits that hold state; everything else reads as zero
    pub const WRITE_MASK: u32 = 0x7177_0703;

    #[inline(always)]
    fn flags(self) -> ChcrFlags {
        ChcrFlags::from_bits_truncate(self.0)
    }

    #[inline(always)]
    pub fn direction(self) -> Direction {
        if self.flags().contains(ChcrFlags::FROM_RAM) {
            Direction::FromRam
        } else {
            Direction::ToRam
        }
    }

    #[inline(always)]
    pub fn decrement(self) -> bool {
        self.flags().contains(ChcrFlags::DECREMENT)
    }

    #[inline(always)]
    pub fn chopping(self) -> bool {
        self.flags().contains(ChcrFlags::CHOPPING)
    }

    #[inline(always)]
    pub fn sync_mode(self) -> SyncMode {
        SyncMode::from_bits(self.0 >> 9)
    }

    /// Words moved per chopping window
    #[inline(always)]
    pub fn chopping_dma_window(self) -> u32 {
        1 << ((self.0 >> 16) & 7)
    }

    /// Cycles given back to the CPU between chopping windows
    #[inline(always)]
    pub fn chopping_cpu_window(self) -> u32 {
        1 << ((self.0 >> 20) & 7)
    }

    #[inline(always)]
    pub fn start_busy(self) -> bool {
        self.flags().contains(ChcrFlags::START_BUSY)
    }

    #[inline(always)]
    pub fn force_start(self) -> bool {
        self.flags().contains(ChcrFlags::FORCE_START)
    }

    #[inline(always)]
    pub fn pause(self) -> bool {
        self.flags().contains(ChcrFlags::PAUSE)
    }

    #[inline(always)]
    pub fn set(&mut self, flag: ChcrFlags, value: bool) {
        if value {
            self.0 |= flag.bits();
        } else {
            self.0 &= !flag.bits();
        }
    }
}

/// Block Control Register (BCR)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockControl(pub u32);

impl BlockControl {
    /// Burst word count; zero means 0x10000
    #[inline(always)]
    pub fn word_count(self) -> u32 {
        match self.0 & 0xFFFF {
            0 => 0x1_0000,
            count => count,
        }
    }

    /// Slice block size in words; zero means 0x10000
    #[inline(always)]
    pub fn block_size(self) -> u32 {
        self.word_count()
    }

    /// Slice block count; zero means 0x10000
    #[inline(always)]
    pub fn block_count(self) -> u32 {
        match self.0 >> 16 {
            0 => 0x1_0000,
            count => count,
        }
    }

    #[inline(always)]
    pub fn with_block_count(self, count: u32) -> Self {
        BlockControl((self.0 & 0xFFFF) | ((count & 0xFFFF) << 16))
    }
}
