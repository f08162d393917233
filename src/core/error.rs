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

/// Emulator error types
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Main error type for the emulator
///
/// Every variant except `Io`, `Config` and `SaveState` is fatal for the
/// emulated session: it means the core or the guest software left the
/// envelope the hardware model supports.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Event table full: {capacity} events already scheduled")]
    SchedulerFull { capacity: usize },

    #[error("Invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess { address: u32 },

    #[error("Unaligned memory access: {size}-byte access at 0x{address:08X}")]
    UnalignedAccess { address: u32, size: u8 },

    #[error("DMA error: {0}")]
    Dma(#[from] DmaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Save state error: {0}")]
    SaveState(String),
}

/// DMA protocol violations
///
/// Raised when guest software programs a channel in a way the hardware
/// cannot carry out. None of these are recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DmaError {
    #[error("DMA{channel} ({name}) does not support transfers {direction}")]
    UnsupportedDirection {
        channel: usize,
        name: &'static str,
        direction: &'static str,
    },

    #[error("DMA{channel} ({name}) does not support sync mode {mode}")]
    UnsupportedSyncMode {
        channel: usize,
        name: &'static str,
        mode: u32,
    },

    #[error("DMA{channel} linked list exceeded {limit} nodes (last node at 0x{address:06X})")]
    LinkedListOverflow {
        channel: usize,
        limit: u32,
        address: u32,
    },

    #[error("DMA{channel} register offset 0x{offset:02X} is not mapped")]
    InvalidRegister { channel: usize, offset: u32 },

    #[error("DMA{channel} ({name}) has no peripheral data port")]
    NoDataPort { channel: usize, name: &'static str },
}
