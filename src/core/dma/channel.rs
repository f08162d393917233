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

//! DMA channel state machine
//!
//! A channel is idle until the CPU sets START_BUSY (or FORCE_START) in
//! CHCR. At that point the live MADR/BCR are copied into shadow registers and
//! the transfer is armed. The owner then calls
//! [`DmaChannel::advance_transfer`] which moves data until one of:
//!
//! - the transfer completes (`Completed`)
//! - a slice block finishes and the channel waits for DREQ (`BlockDone`)
//! - a chopping window is used up (`Chopped`)
//! - a bus error stops the step (`Faulted`)
//!
//! ```text
//!            CHCR start            advance_transfer
//!   Idle ─────────────────> Active ─────────────────> Idle (Completed)
//!                             ^  │
//!          DREQ / resume      │  │ BlockDone / Chopped / Faulted
//!                             └──┘ (running, not active)
//! ```

use super::controller::DmaController;
use super::kind::ChannelKind;
use super::registers::{BlockControl, ChannelControl, ChcrFlags, Direction, SyncMode, ADDRESS_MASK};
use crate::core::error::{DmaError, Result};
use crate::core::memory::Bus;
use crate::core::scheduler::Cycles;

/// Maximum number of nodes a single linked-list transfer may visit
pub const LINKED_MAX_NODE_COUNT: u32 = 4096;

/// Linked-list header bit marking the last node
const LINK_END_BIT: u32 = 0x0080_0000;

/// Terminator written into the last ordering table entry
const OTC_END_MARKER: u32 = 0x00FF_FFFF;

/// Word-aligned part of the DMA address space
const WORD_ADDRESS_MASK: u32 = 0x00FF_FFFC;

/// CHCR bits writable on the ordering table channel
const OTC_WRITE_MASK: u32 = 0x5100_0000;

/// Outcome of one `advance_transfer` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// No transfer was armed
    Idle,
    /// The whole transfer finished
    Completed,
    /// A slice block finished; the next one waits for DREQ
    BlockDone,
    /// Chopping window used up; resume after `resume_in` cycles
    Chopped { resume_in: Cycles },
    /// A bus error stopped the transfer; the failing unit was not retired
    Faulted,
}

/// Single DMA channel
#[derive(Debug, Clone)]
pub struct DmaChannel {
    kind: ChannelKind,

    /// Memory Address Register (MADR)
    base_address: u32,

    /// Block Control Register (BCR)
    block_control: BlockControl,

    /// Channel Control Register (CHCR)
    control: ChannelControl,

    /// MADR snapshot taken when the transfer started
    shadow_base_address: u32,

    /// BCR snapshot taken when the transfer started
    shadow_block_control: BlockControl,

    words_remaining: u32,
    blocks_remaining: u32,

    /// Next RAM address to access
    current_address: u32,

    /// Header address of the next linked-list node
    next_node_address: u32,

    /// The node being transferred carries the end marker
    last_node: bool,

    linked_list_node_count: u32,

    /// Word pulled from the port whose RAM write faulted
    held_unit: Option<u32>,

    /// Bumped on every start, resume and abort
    generation: u32,

    /// A transfer is in progress (possibly waiting between steps)
    running: bool,

    /// The transfer can make progress right now
    transfer_active: bool,
}

impl DmaChannel {
    pub fn new(kind: ChannelKind) -> Self {
        let mut channel = Self {
            kind,
            base_address: 0,
            block_control: BlockControl::default(),
            control: ChannelControl::default(),
            shadow_base_address: 0,
            shadow_block_control: BlockControl::default(),
            words_remaining: 0,
            blocks_remaining: 0,
            current_address: 0,
            next_node_address: 0,
            last_node: false,
            linked_list_node_count: 0,
            held_unit: None,
            generation: 0,
            running: false,
            transfer_active: false,
        };
        channel.reset();
        channel
    }

    /// Return to power-on state
    pub fn reset(&mut self) {
        self.base_address = 0;
        self.block_control = BlockControl::default();
        self.control = ChannelControl::default();
        if self.kind == ChannelKind::Otc {
            // OTC always walks downwards
            self.control.set(ChcrFlags::DECREMENT, true);
        }
        self.shadow_base_address = 0;
        self.shadow_block_control = BlockControl::default();
        self.words_remaining = 0;
        self.blocks_remaining = 0;
        self.current_address = 0;
        self.next_node_address = 0;
        self.last_node = false;
        self.linked_list_node_count = 0;
        self.held_unit = None;
        self.generation = 0;
        self.running = false;
        self.transfer_active = false;
    }

    #[inline]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    #[inline]
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    #[inline]
    pub fn block_control(&self) -> BlockControl {
        self.block_control
    }

    #[inline]
    pub fn control(&self) -> ChannelControl {
        self.control
    }

    #[inline]
    pub fn shadow_base_address(&self) -> u32 {
        self.shadow_base_address
    }

    #[inline]
    pub fn shadow_block_control(&self) -> BlockControl {
        self.shadow_block_control
    }

    #[inline]
    pub fn words_remaining(&self) -> u32 {
        self.words_remaining
    }

    #[inline]
    pub fn blocks_remaining(&self) -> u32 {
        self.blocks_remaining
    }

    #[inline]
    pub fn current_address(&self) -> u32 {
        self.current_address
    }

    #[inline]
    pub fn linked_list_node_count(&self) -> u32 {
        self.linked_list_node_count
    }

    /// Changes whenever the transfer is started, resumed or aborted
    ///
    /// A deferred resume captured under an older value no longer applies.
    #[inline]
    pub fn transfer_generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_transfer_active(&self) -> bool {
        self.transfer_active
    }

    /// Read a channel register (0x0 MADR, 0x4 BCR, 0x8 CHCR)
    pub fn read(&self, offset: u32) -> Result<u32> {
        match offset {
            0x0 => Ok(self.base_address),
            0x4 => Ok(self.block_control.0),
            0x8 => Ok(self.control.0),
            _ => Err(self.invalid_register(offset)),
        }
    }

    /// Masked register write
    ///
    /// Only the bits set in `mask` change. Returns `true` when the write
    /// started or resumed a transfer that now needs servicing.
    pub fn write(&mut self, offset: u32, value: u32, mask: u32) -> Result<bool> {
        match offset {
            0x0 => {
                self.base_address = merge(self.base_address, value, mask) & ADDRESS_MASK;
                log::trace!("DMA{} MADR = 0x{:06X}", self.kind.index(), self.base_address);
                Ok(false)
            }
            0x4 => {
                self.block_control = BlockControl(merge(self.block_control.0, value, mask));
                log::trace!("DMA{} BCR = 0x{:08X}", self.kind.index(), self.block_control.0);
                Ok(false)
            }
            0x8 => self.write_control(merge(self.control.0, value, mask)),
            _ => Err(self.invalid_register(offset)),
        }
    }

    fn write_control(&mut self, value: u32) -> Result<bool> {
        let old = self.control;
        self.control = if self.kind == ChannelKind::Otc {
            ChannelControl((value & OTC_WRITE_MASK) | ChcrFlags::DECREMENT.bits())
        } else {
            ChannelControl(value & ChannelControl::WRITE_MASK)
        };
        log::trace!("DMA{} CHCR = 0x{:08X}", self.kind.index(), self.control.0);

        if self.running && !self.control.start_busy() {
            log::debug!(
                "DMA{} ({}) aborted with {} words left",
                self.kind.index(),
                self.kind.name(),
                self.words_remaining
            );
            self.running = false;
            self.transfer_active = false;
            self.held_unit = None;
            self.generation = self.generation.wrapping_add(1);
            return Ok(false);
        }

        let start_rise = self.control.start_busy() && !old.start_busy();
        let force_rise = self.control.force_start() && !old.force_start();

        if !(start_rise || force_rise) {
            return Ok(false);
        }

        if !self.running {
            self.transfer_start(false)?;
            Ok(true)
        } else if !self.transfer_active {
            self.transfer_start(true)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Arm the transfer
    ///
    /// A fresh start validates the programming, snapshots MADR/BCR and loads
    /// the counters. A resume only re-activates the existing state.
    ///
    /// # Errors
    ///
    /// Returns `DmaError::UnsupportedDirection` or
    /// `DmaError::UnsupportedSyncMode` before any bus access when the channel
    /// is programmed for something its hardware cannot do.
    pub fn transfer_start(&mut self, resume: bool) -> Result<()> {
        if !resume {
            self.validate()?;

            self.shadow_base_address = self.base_address;
            self.shadow_block_control = self.block_control;
            self.current_address = self.base_address & WORD_ADDRESS_MASK;
            self.linked_list_node_count = 0;
            self.last_node = false;
            self.held_unit = None;

            let bcr = self.shadow_block_control;
            match self.sync_mode() {
                SyncMode::Slice => {
                    self.words_remaining = bcr.block_size().saturating_mul(bcr.block_count());
                    self.blocks_remaining = bcr.block_count();
                }
                SyncMode::LinkedList => {
                    self.words_remaining = 0;
                    self.blocks_remaining = 0;
                    self.next_node_address = self.current_address;
                }
                SyncMode::Burst | SyncMode::Reserved => {
                    self.words_remaining = bcr.word_count();
                    self.blocks_remaining = 1;
                }
            }

            log::debug!(
                "DMA{} ({}) start: {:?} {} addr=0x{:06X} bcr=0x{:08X}",
                self.kind.index(),
                self.kind.name(),
                self.sync_mode(),
                self.control.direction().describe(),
                self.current_address,
                bcr.0
            );
        } else {
            log::trace!(
                "DMA{} resume at 0x{:06X} ({} words left)",
                self.kind.index(),
                self.current_address,
                self.words_remaining
            );
        }

        self.control.set(ChcrFlags::START_BUSY, true);
        self.control.set(ChcrFlags::FORCE_START, false);
        self.generation = self.generation.wrapping_add(1);
        self.running = true;
        self.transfer_active = true;
        Ok(())
    }

    /// Handle a rising edge of the peripheral's DMA request line
    ///
    /// Returns `true` when the channel became active and needs servicing.
    pub fn dreq_rising_edge(&mut self) -> Result<bool> {
        if self.transfer_active || !self.control.start_busy() {
            return Ok(false);
        }
        self.transfer_start(self.running)?;
        Ok(true)
    }

    /// Move data until the transfer completes or has to wait
    ///
    /// Every unit charges one bus cycle. The bus exception flag is inspected
    /// after every unit; on a fault the controller's bus error is raised and
    /// the channel stops without retiring the failing unit.
    ///
    /// # Errors
    ///
    /// Protocol violations (reserved sync mode, linked-list overflow) are
    /// fatal and returned as `Err`.
    pub fn advance_transfer(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<TransferStatus> {
        if !self.transfer_active {
            return Ok(TransferStatus::Idle);
        }

        if self.kind == ChannelKind::Otc {
            return self.advance_ordering_table(controller, bus);
        }

        match self.sync_mode() {
            SyncMode::Burst => self.advance_burst(controller, bus),
            SyncMode::Slice => self.advance_slice(controller, bus),
            SyncMode::LinkedList => self.advance_linked_list(controller, bus),
            SyncMode::Reserved => Err(self.unsupported_sync_mode()),
        }
    }

    /// Finish the current block or the whole transfer
    ///
    /// Only the run flags and START_BUSY change on completion; the
    /// programmed registers keep their values.
    pub fn transfer_end(&mut self, controller: &mut DmaController, last_block: bool) {
        let channel = self.kind.index();

        if last_block {
            // Linked lists already left MADR at the final link
            if self.sync_mode() == SyncMode::Slice {
                self.base_address = self.current_address;
            }
            self.running = false;
            self.transfer_active = false;
            self.control.set(ChcrFlags::START_BUSY, false);
            log::debug!("DMA{} ({}) complete", channel, self.kind.name());
            controller.request_interrupt(channel);
        } else {
            self.transfer_active = false;
            self.base_address = self.current_address;
            self.block_control = self.block_control.with_block_count(self.blocks_remaining);
            self.shadow_base_address = self.base_address;
            self.shadow_block_control = self.shadow_block_control.with_block_count(self.blocks_remaining);
            log::trace!("DMA{} block done, {} left", channel, self.blocks_remaining);
            if controller.block_irq_enabled(channel) {
                controller.request_interrupt(channel);
            }
        }
    }

    fn sync_mode(&self) -> SyncMode {
        if self.kind == ChannelKind::Otc {
            SyncMode::Burst
        } else {
            self.control.sync_mode()
        }
    }

    fn validate(&self) -> Result<()> {
        let direction = self.control.direction();
        let mode = self.sync_mode();

        if mode == SyncMode::Reserved {
            return Err(self.unsupported_sync_mode());
        }
        if mode == SyncMode::LinkedList && !self.kind.supports_linked_list() {
            return Err(self.unsupported_sync_mode());
        }
        if !self.kind.supports(direction) || (mode == SyncMode::LinkedList && direction == Direction::ToRam) {
            log::error!(
                "DMA{} ({}) programmed for an unsupported transfer {}",
                self.kind.index(),
                self.kind.name(),
                direction.describe()
            );
            return Err(DmaError::UnsupportedDirection {
                channel: self.kind.index(),
                name: self.kind.name(),
                direction: direction.describe(),
            }
            .into());
        }
        Ok(())
    }

    /// Transfer one unit at `current_address`
    ///
    /// Returns `false` if the unit faulted; it is then left to be retried.
    fn do_burst(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<bool> {
        let retired = self.kind.transfer_unit(
            bus,
            self.current_address,
            self.control.direction(),
            &mut self.held_unit,
        )?;
        bus.charge_cycles(1);

        if bus.take_exception() || !retired {
            controller.signal_exception();
            self.transfer_active = false;
            return Ok(false);
        }

        self.current_address = self.step_address(self.current_address);
        self.words_remaining -= 1;
        Ok(true)
    }

    fn step_address(&self, address: u32) -> u32 {
        let decrement = self.control.decrement() && self.sync_mode() != SyncMode::LinkedList;
        let next = if decrement {
            address.wrapping_sub(4)
        } else {
            address.wrapping_add(4)
        };
        next & ADDRESS_MASK
    }

    fn advance_burst(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<TransferStatus> {
        let window = if self.control.chopping() {
            Some(self.control.chopping_dma_window())
        } else {
            None
        };
        let mut moved = 0;

        while self.words_remaining > 0 {
            if window == Some(moved) {
                self.transfer_active = false;
                return Ok(TransferStatus::Chopped {
                    resume_in: self.control.chopping_cpu_window() as Cycles,
                });
            }
            if !self.do_burst(controller, bus)? {
                return Ok(TransferStatus::Faulted);
            }
            moved += 1;
        }

        self.transfer_end(controller, true);
        Ok(TransferStatus::Completed)
    }

    fn advance_slice(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<TransferStatus> {
        let block_size = self.shadow_block_control.block_size();
        let block_end = self.blocks_remaining.saturating_sub(1).saturating_mul(block_size);

        while self.words_remaining > block_end {
            if !self.do_burst(controller, bus)? {
                return Ok(TransferStatus::Faulted);
            }
        }

        self.blocks_remaining = self.blocks_remaining.saturating_sub(1);
        let last_block = self.blocks_remaining == 0;
        self.transfer_end(controller, last_block);

        Ok(if last_block {
            TransferStatus::Completed
        } else {
            TransferStatus::BlockDone
        })
    }

    fn advance_linked_list(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<TransferStatus> {
        loop {
            while self.words_remaining > 0 {
                if !self.do_burst(controller, bus)? {
                    return Ok(TransferStatus::Faulted);
                }
            }

            if self.last_node {
                self.transfer_end(controller, true);
                return Ok(TransferStatus::Completed);
            }

            if self.linked_list_node_count >= LINKED_MAX_NODE_COUNT {
                log::error!(
                    "DMA{} linked list did not terminate after {} nodes",
                    self.kind.index(),
                    LINKED_MAX_NODE_COUNT
                );
                return Err(DmaError::LinkedListOverflow {
                    channel: self.kind.index(),
                    limit: LINKED_MAX_NODE_COUNT,
                    address: self.next_node_address,
                }
                .into());
            }

            let node = self.next_node_address;
            let header = bus.read32(node)?;
            bus.charge_cycles(1);

            if bus.take_exception() {
                controller.signal_exception();
                self.transfer_active = false;
                return Ok(TransferStatus::Faulted);
            }

            self.linked_list_node_count += 1;
            self.words_remaining = header >> 24;
            self.last_node = header & LINK_END_BIT != 0;
            self.current_address = (node + 4) & ADDRESS_MASK;
            self.next_node_address = header & WORD_ADDRESS_MASK;
            self.base_address = header & ADDRESS_MASK;

            log::trace!(
                "DMA{} node #{} at 0x{:06X}: {} words, next 0x{:06X}",
                self.kind.index(),
                self.linked_list_node_count,
                node,
                self.words_remaining,
                header & ADDRESS_MASK
            );
        }
    }

    /// Build a backward-linked ordering table
    ///
    /// Each entry points at the word below it; the last one holds the end
    /// marker.
    fn advance_ordering_table(&mut self, controller: &mut DmaController, bus: &mut Bus) -> Result<TransferStatus> {
        while self.words_remaining > 0 {
            let link = if self.words_remaining == 1 {
                OTC_END_MARKER
            } else {
                self.current_address.wrapping_sub(4) & ADDRESS_MASK
            };

            bus.write32(self.current_address, link)?;
            bus.charge_cycles(1);

            if bus.take_exception() {
                controller.signal_exception();
                self.transfer_active = false;
                return Ok(TransferStatus::Faulted);
            }

            self.current_address = self.current_address.wrapping_sub(4) & ADDRESS_MASK;
            self.words_remaining -= 1;
        }

        self.transfer_end(controller, true);
        Ok(TransferStatus::Completed)
    }

    fn invalid_register(&self, offset: u32) -> crate::core::error::EmulatorError {
        DmaError::InvalidRegister {
            channel: self.kind.index(),
            offset,
        }
        .into()
    }

    fn unsupported_sync_mode(&self) -> crate::core::error::EmulatorError {
        log::error!(
            "DMA{} ({}) programmed with unsupported sync mode {}",
            self.kind.index(),
            self.kind.name(),
            self.control.sync_mode().bits()
        );
        DmaError::UnsupportedSyncMode {
            channel: self.kind.index(),
            name: self.kind.name(),
            mode: self.control.sync_mode().bits(),
        }
        .into()
    }

    /// Restore register state (save-state loading)
    ///
    /// In-flight transfers are not part of a snapshot; the channel comes back
    /// idle with its programmed registers.
    pub(crate) fn restore(&mut self, madr: u32, bcr: u32, chcr: u32) {
        self.reset();
        self.base_address = madr & ADDRESS_MASK;
        self.block_control = BlockControl(bcr);
        let chcr = chcr & !ChcrFlags::START_BUSY.bits() & !ChcrFlags::FORCE_START.bits();
        self.control = if self.kind == ChannelKind::Otc {
            ChannelControl((chcr & OTC_WRITE_MASK) | ChcrFlags::DECREMENT.bits())
        } else {
            ChannelControl(chcr & ChannelControl::WRITE_MASK)
        };
    }
}

/// Apply a masked write: bits outside `mask` keep their old value
#[inline(always)]
pub(crate) fn merge(old: u32, value: u32, mask: u32) -> u32 {
    (old & !mask) | (value & mask)
}
