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

//! System bus
//!
//! The Bus is the collaborator every DMA channel moves data through. Besides
//! plain reads and writes it exposes two side channels:
//!
//! - an **exception flag**, raised when an access hits an address with nothing
//!   behind it (bus error), which the DMA engine checks after every unit
//! - a **pending cycle counter** that the DMA engine charges one cycle per
//!   transferred unit, drained by the CPU driver into the scheduler
//!
//! # Memory Map
//!
//! | Physical Address Range | Region        | Behaviour                     |
//! |------------------------|---------------|-------------------------------|
//! | 0x00000000-0x007FFFFF  | RAM           | 2MB, mirrored four times      |
//! | 0x1F000000-0x1F7FFFFF  | Expansion 1   | Attached devices, open bus    |
//! | 0x1F801000-0x1F802FFF  | I/O Ports     | Attached devices              |
//! | anything else          | Unmapped      | Bus error                     |
//!
//! Virtual segments (KUSEG/KSEG0/KSEG1) are folded by masking the top three
//! address bits.
//!
//! # Example
//!
//! ```
//! use psxcore::core::memory::Bus;
//!
//! let mut bus = Bus::new();
//!
//! bus.write32(0x80000000, 0x12345678).unwrap();
//! assert_eq!(bus.read32(0x00000000).unwrap(), 0x12345678);
//! assert_eq!(bus.read32(0x00600000).unwrap(), 0x12345678); // mirror
//!
//! // Nothing lives at 8MB: the access faults instead of failing
//! assert_eq!(bus.read32(0x00800000).unwrap(), 0xFFFFFFFF);
//! assert!(bus.take_exception());
//! ```

mod io_device;

pub use io_device::IODevice;

use crate::core::error::{EmulatorError, Result};
use crate::core::scheduler::Cycles;

/// Memory region identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    /// Main RAM (2MB, mirrored)
    RAM,
    /// Expansion region 1 (parallel port)
    Expansion,
    /// I/O ports
    IO,
    /// Nothing mapped, accesses raise a bus error
    Unmapped,
}

/// System bus
pub struct Bus {
    /// Main RAM (2MB)
    ram: Vec<u8>,

    /// Memory-mapped peripherals
    devices: Vec<Box<dyn IODevice>>,

    /// Set by a faulting access, cleared by `take_exception`
    exception: bool,

    /// Address of the most recent faulting access
    last_fault_address: Option<u32>,

    /// Cycles consumed by bus masters other than the CPU
    pending_cycles: Cycles,
}

impl Bus {
    /// RAM size (2MB)
    pub const RAM_SIZE: usize = 2 * 1024 * 1024;

    /// RAM physical address range (including mirrors)
    const RAM_START: u32 = 0x0000_0000;
    const RAM_END: u32 = 0x007F_FFFF;

    /// Expansion Region 1 physical address range
    const EXP1_START: u32 = 0x1F00_0000;
    const EXP1_END: u32 = 0x1F7F_FFFF;

    /// I/O ports physical address range
    const IO_START: u32 = 0x1F80_1000;
    const IO_END: u32 = 0x1F80_2FFF;

    /// Value read back from a faulting or floating address
    const OPEN_BUS: u32 = 0xFFFF_FFFF;

    /// Create a new Bus with zeroed RAM and no devices
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; Self::RAM_SIZE],
            devices: Vec::new(),
            exception: false,
            last_fault_address: None,
            pending_cycles: 0,
        }
    }

    /// Reset volatile state
    ///
    /// RAM is cleared and both side channels drained. Attached devices stay
    /// attached; they are reset by their owners.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.exception = false;
        self.last_fault_address = None;
        self.pending_cycles = 0;
    }

    /// Attach a memory-mapped device
    ///
    /// Devices are searched in attach order; the first one whose range
    /// contains the address wins.
    pub fn attach(&mut self, device: Box<dyn IODevice>) {
        let (start, end) = device.address_range();
        log::debug!(
            "Bus: attached '{}' at 0x{:08X}-0x{:08X}",
            device.name(),
            start,
            end
        );
        self.devices.push(device);
    }

    /// Translate virtual address to physical address
    #[inline(always)]
    fn translate_address(&self, vaddr: u32) -> u32 {
        vaddr & 0x1FFF_FFFF
    }

    /// Identify memory region for an address
    ///
    /// # Example
    ///
    /// ```
    /// use psxcore::core::memory::{Bus, MemoryRegion};
    ///
    /// let bus = Bus::new();
    /// assert_eq!(bus.identify_region(0x80000000), MemoryRegion::RAM);
    /// assert_eq!(bus.identify_region(0x1F801810), MemoryRegion::IO);
    /// assert_eq!(bus.identify_region(0x00C00000), MemoryRegion::Unmapped);
    /// ```
    pub fn identify_region(&self, vaddr: u32) -> MemoryRegion {
        let paddr = self.translate_address(vaddr);

        if (Self::RAM_START..=Self::RAM_END).contains(&paddr) {
            MemoryRegion::RAM
        } else if (Self::EXP1_START..=Self::EXP1_END).contains(&paddr) {
            MemoryRegion::Expansion
        } else if (Self::IO_START..=Self::IO_END).contains(&paddr) {
            MemoryRegion::IO
        } else {
            MemoryRegion::Unmapped
        }
    }

    #[inline(always)]
    fn ram_offset(paddr: u32) -> usize {
        (paddr as usize) & (Self::RAM_SIZE - 1)
    }

    /// Find the device mapped at `paddr` and the offset into it
    fn device_at(&mut self, paddr: u32) -> Option<(&mut Box<dyn IODevice>, u32)> {
        self.devices
            .iter_mut()
            .find(|device| device.contains(paddr))
            .map(|device| {
                let offset = paddr - device.address_range().0;
                (device, offset)
            })
    }

    /// Record a bus error
    fn fault(&mut self, vaddr: u32, size: u8, write: bool) {
        log::debug!(
            "Bus error: {}-byte {} at 0x{:08X}",
            size,
            if write { "write" } else { "read" },
            vaddr
        );
        self.exception = true;
        self.last_fault_address = Some(vaddr);
    }

    fn check_alignment(vaddr: u32, size: u8) -> Result<()> {
        if vaddr & (size as u32 - 1) != 0 {
            return Err(EmulatorError::UnalignedAccess {
                address: vaddr,
                size,
            });
        }
        Ok(())
    }

    /// Read 8-bit value
    pub fn read8(&mut self, vaddr: u32) -> Result<u8> {
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => Ok(self.ram[Self::ram_offset(paddr)]),
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.read_register8(offset),
                None => {
                    log::warn!("Unmapped I/O read8 at 0x{:08X}", vaddr);
                    Ok(Self::OPEN_BUS as u8)
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 1, false);
                Ok(Self::OPEN_BUS as u8)
            }
        }
    }

    /// Read 16-bit value
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::UnalignedAccess` if `vaddr` is not 2-byte aligned.
    pub fn read16(&mut self, vaddr: u32) -> Result<u16> {
        Self::check_alignment(vaddr, 2)?;
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => {
                let offset = Self::ram_offset(paddr);
                Ok(u16::from_le_bytes([self.ram[offset], self.ram[offset + 1]]))
            }
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.read_register16(offset),
                None => {
                    log::warn!("Unmapped I/O read16 at 0x{:08X}", vaddr);
                    Ok(Self::OPEN_BUS as u16)
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 2, false);
                Ok(Self::OPEN_BUS as u16)
            }
        }
    }

    /// Read 32-bit value
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::UnalignedAccess` if `vaddr` is not 4-byte aligned.
    /// Bus errors are not `Err`: they raise the exception flag and read as
    /// open bus.
    pub fn read32(&mut self, vaddr: u32) -> Result<u32> {
        Self::check_alignment(vaddr, 4)?;
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => {
                let offset = Self::ram_offset(paddr);
                let bytes = [
                    self.ram[offset],
                    self.ram[offset + 1],
                    self.ram[offset + 2],
                    self.ram[offset + 3],
                ];
                Ok(u32::from_le_bytes(bytes))
            }
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.read_register(offset),
                None => {
                    log::warn!("Unmapped I/O read32 at 0x{:08X}", vaddr);
                    Ok(Self::OPEN_BUS)
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 4, false);
                Ok(Self::OPEN_BUS)
            }
        }
    }

    /// Write 8-bit value
    pub fn write8(&mut self, vaddr: u32, value: u8) -> Result<()> {
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => {
                self.ram[Self::ram_offset(paddr)] = value;
                Ok(())
            }
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.write_register8(offset, value),
                None => {
                    log::warn!("Unmapped I/O write8 at 0x{:08X} = 0x{:02X}", vaddr, value);
                    Ok(())
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 1, true);
                Ok(())
            }
        }
    }

    /// Write 16-bit value
    pub fn write16(&mut self, vaddr: u32, value: u16) -> Result<()> {
        Self::check_alignment(vaddr, 2)?;
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => {
                let offset = Self::ram_offset(paddr);
                self.ram[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.write_register16(offset, value),
                None => {
                    log::warn!("Unmapped I/O write16 at 0x{:08X} = 0x{:04X}", vaddr, value);
                    Ok(())
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 2, true);
                Ok(())
            }
        }
    }

    /// Write 32-bit value
    pub fn write32(&mut self, vaddr: u32, value: u32) -> Result<()> {
        Self::check_alignment(vaddr, 4)?;
        let paddr = self.translate_address(vaddr);

        match self.identify_region(vaddr) {
            MemoryRegion::RAM => {
                let offset = Self::ram_offset(paddr);
                self.ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            MemoryRegion::IO | MemoryRegion::Expansion => match self.device_at(paddr) {
                Some((device, offset)) => device.write_register(offset, value),
                None => {
                    log::warn!("Unmapped I/O write32 at 0x{:08X} = 0x{:08X}", vaddr, value);
                    Ok(())
                }
            },
            MemoryRegion::Unmapped => {
                self.fault(vaddr, 4, true);
                Ok(())
            }
        }
    }

    /// Whether an access raised a bus error since the last `take_exception`
    #[inline]
    pub fn exception_pending(&self) -> bool {
        self.exception
    }

    /// Consume the exception flag
    #[inline]
    pub fn take_exception(&mut self) -> bool {
        std::mem::take(&mut self.exception)
    }

    /// Address of the most recent faulting access
    pub fn last_fault_address(&self) -> Option<u32> {
        self.last_fault_address
    }

    /// Charge cycles consumed by a bus master (DMA)
    #[inline]
    pub fn charge_cycles(&mut self, cycles: Cycles) {
        self.pending_cycles += cycles;
    }

    /// Cycles charged but not yet handed to the scheduler
    #[inline]
    pub fn pending_cycles(&self) -> Cycles {
        self.pending_cycles
    }

    /// Drain the pending cycle counter
    #[inline]
    pub fn take_pending_cycles(&mut self) -> Cycles {
        std::mem::take(&mut self.pending_cycles)
    }

    /// Main RAM contents
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Replace RAM contents (save-state loading)
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::SaveState` if `data` is not exactly 2MB.
    pub fn load_ram(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != Self::RAM_SIZE {
            return Err(EmulatorError::SaveState(format!(
                "RAM image is {} bytes (expected {})",
                data.len(),
                Self::RAM_SIZE
            )));
        }
        self.ram.copy_from_slice(data);
        Ok(())
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
