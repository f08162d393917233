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

//! I/O Device Trait
//!
//! Peripherals (GPU, CD-ROM, SPU, MDEC, expansion hardware) are external
//! collaborators of this crate. They plug into the [`Bus`](super::Bus) through
//! the [`IODevice`] trait, and DMA channels reach them with ordinary bus
//! accesses to their data ports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Memory Bus                     │
//! ├─────────────────────────────────────────────┤
//! │  Devices: Vec<Box<dyn IODevice>>            │
//! │                                             │
//! │  read32(addr) {                             │
//! │    for device in devices {                  │
//! │      if device.contains(addr) {             │
//! │        return device.read_register(offset)  │
//! │      }                                      │
//! │    }                                        │
//! │  }                                          │
//! └─────────────────────────────────────────────┘
//!           ▲                   ▲
//!           │                   │
//!    ┌──────┴──────┐    ┌──────┴──────┐
//!    │  GPU port   │    │  CD-ROM     │
//!    │ (IODevice)  │    │ (IODevice)  │
//!    └─────────────┘    └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use psxcore::core::memory::IODevice;
//! use psxcore::core::error::Result;
//!
//! struct Latch {
//!     base_addr: u32,
//!     value: u32,
//! }
//!
//! impl IODevice for Latch {
//!     fn address_range(&self) -> (u32, u32) {
//!         (self.base_addr, self.base_addr + 0x03)
//!     }
//!
//!     fn read_register(&mut self, _offset: u32) -> Result<u32> {
//!         Ok(self.value)
//!     }
//!
//!     fn write_register(&mut self, _offset: u32, value: u32) -> Result<()> {
//!         self.value = value;
//!         Ok(())
//!     }
//! }
//! ```

use crate::core::error::Result;

/// Trait for memory-mapped I/O devices
///
/// Each device declares its physical address range and implements 32-bit
/// register access. 8-bit and 16-bit access default to read-modify-write on
/// the containing word; FIFO-style ports override them.
///
/// Reads take `&mut self`: reading a data port pops a FIFO on real hardware.
///
/// # Address Translation
///
/// The Bus passes device-relative offsets:
///
/// - Device address range: `0x1F801810 - 0x1F801817`
/// - Physical address: `0x1F801814`
/// - Offset passed to device: `0x04`
pub trait IODevice {
    /// Get the address range this device responds to
    ///
    /// Returns `(start, end)` physical addresses, inclusive.
    fn address_range(&self) -> (u32, u32);

    /// Check if this device contains the given address
    fn contains(&self, addr: u32) -> bool {
        let (start, end) = self.address_range();
        addr >= start && addr <= end
    }

    /// Read a 32-bit value from a device register
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is not a valid register. Errors are
    /// fatal for the session; recoverable conditions belong in the value.
    fn read_register(&mut self, offset: u32) -> Result<u32>;

    /// Write a 32-bit value to a device register
    fn write_register(&mut self, offset: u32, value: u32) -> Result<()>;

    /// Read a 16-bit value from a device register
    fn read_register16(&mut self, offset: u32) -> Result<u16> {
        let value = self.read_register(offset & !0x03)?;
        let shift = (offset & 0x02) * 8;
        Ok(((value >> shift) & 0xFFFF) as u16)
    }

    /// Write a 16-bit value to a device register
    ///
    /// Default implementation updates only the targeted half of the word.
    fn write_register16(&mut self, offset: u32, value: u16) -> Result<()> {
        let aligned = offset & !0x03;
        let shift = (offset & 0x02) * 8;
        let mask = !(0xFFFFu32 << shift);
        let current = self.read_register(aligned)?;
        let new_value = (current & mask) | ((value as u32) << shift);
        self.write_register(aligned, new_value)
    }

    /// Read an 8-bit value from a device register
    fn read_register8(&mut self, offset: u32) -> Result<u8> {
        let value = self.read_register(offset & !0x03)?;
        let shift = (offset & 0x03) * 8;
        Ok(((value >> shift) & 0xFF) as u8)
    }

    /// Write an 8-bit value to a device register
    fn write_register8(&mut self, offset: u32, value: u8) -> Result<()> {
        let aligned = offset & !0x03;
        let shift = (offset & 0x03) * 8;
        let mask = !(0xFFu32 << shift);
        let current = self.read_register(aligned)?;
        let new_value = (current & mask) | ((value as u32) << shift);
        self.write_register(aligned, new_value)
    }

    /// Device name for logging
    fn name(&self) -> &str {
        "Unknown Device"
    }
}
