// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Unit tests for the DMA engine organized by category

mod transfers;

use super::*;
use crate::core::error::{EmulatorError, Result};
use crate::core::memory::IODevice;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Full 32-bit write mask
const FULL: u32 = 0xFFFF_FFFF;

/// DPCR with every channel enabled, default priorities
const DPCR_ALL_ENABLED: u32 = 0x0FED_CBA9;

/// Access observed by a [`FifoPort`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read32,
    Read16,
    Read8,
    Write32(u32),
    Write16(u16),
    Write8(u8),
}

#[derive(Default)]
struct PortState {
    log: Vec<Access>,
    fifo: VecDeque<u32>,
}

impl PortState {
    fn words_written(&self) -> Vec<u32> {
        self.log
            .iter()
            .filter_map(|access| match access {
                Access::Write32(value) => Some(*value),
                _ => None,
            })
            .collect()
    }
}

type SharedPort = Rc<RefCell<PortState>>;

/// Peripheral data port stand-in
///
/// Logs every access and serves reads from a queue (zero once drained).
struct FifoPort {
    address: u32,
    state: SharedPort,
}

impl FifoPort {
    fn attach(bus: &mut Bus, address: u32) -> SharedPort {
        let state = SharedPort::default();
        bus.attach(Box::new(FifoPort {
            address,
            state: state.clone(),
        }));
        state
    }

    fn pop(&self, access: Access) -> u32 {
        let mut state = self.state.borrow_mut();
        state.log.push(access);
        state.fifo.pop_front().unwrap_or(0)
    }

    fn push(&self, access: Access) {
        self.state.borrow_mut().log.push(access);
    }
}

impl IODevice for FifoPort {
    fn address_range(&self) -> (u32, u32) {
        (self.address, self.address + 3)
    }

    fn read_register(&mut self, _offset: u32) -> Result<u32> {
        Ok(self.pop(Access::Read32))
    }

    fn write_register(&mut self, _offset: u32, value: u32) -> Result<()> {
        self.push(Access::Write32(value));
        Ok(())
    }

    fn read_register16(&mut self, _offset: u32) -> Result<u16> {
        Ok(self.pop(Access::Read16) as u16)
    }

    fn write_register16(&mut self, _offset: u32, value: u16) -> Result<()> {
        self.push(Access::Write16(value));
        Ok(())
    }

    fn read_register8(&mut self, _offset: u32) -> Result<u8> {
        Ok(self.pop(Access::Read8) as u8)
    }

    fn write_register8(&mut self, _offset: u32, value: u8) -> Result<()> {
        self.push(Access::Write8(value));
        Ok(())
    }

    fn name(&self) -> &str {
        "FIFO port"
    }
}

/// Program MADR, BCR and CHCR of a channel; returns the CHCR write result
fn program(dma: &mut Dma, kind: ChannelKind, madr: u32, bcr: u32, chcr: u32) -> Result<bool> {
    let base = kind.index() as u32 * 0x10;
    dma.write(base, madr, FULL)?;
    dma.write(base + 0x4, bcr, FULL)?;
    dma.write(base + 0x8, chcr, FULL)
}

/// DMA engine with every channel enabled
fn enabled_dma() -> Dma {
    let mut dma = Dma::new();
    dma.write(0x70, DPCR_ALL_ENABLED, FULL).unwrap();
    dma
}

fn fill_ram(bus: &mut Bus, address: u32, words: &[u32]) {
    for (i, word) in words.iter().enumerate() {
        bus.write32(address + 4 * i as u32, *word).unwrap();
    }
}
