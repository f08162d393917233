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

//! System integration module
//!
//! Ties the scheduler, bus and DMA engine together. The [`System`] is the
//! scheduler's host, so every event callback receives `&mut System` and can
//! reach any component.
//!
//! # Time
//!
//! [`System::run`] stands in for the CPU: it advances the global clock by the
//! given number of cycles, then keeps advancing by whatever the DMA engine
//! charged to the bus until nothing is left. DMA work itself runs from a
//! scheduler event, so a transfer started by a register write happens at the
//! next scheduler advance, on the cycle it was requested.
//!
//! # Example
//!
//! ```
//! use psxcore::core::system::System;
//!
//! let mut system = System::new();
//!
//! // Enable OTC and build a 16-entry ordering table at 0x100
//! system.write32(0x1F8010F0, 0x0800_0000).unwrap();
//! system.write32(0x1F8010E0, 0x100).unwrap();
//! system.write32(0x1F8010E4, 16).unwrap();
//! system.write32(0x1F8010E8, 0x1100_0002).unwrap();
//!
//! system.run(100).unwrap();
//!
//! assert_eq!(system.bus_mut().read32(0x100).unwrap(), 0xFC);
//! assert_eq!(system.stats().dma_cycles, 16);
//! assert_eq!(system.now(), 116);
//! ```

use super::dma::{ChannelKind, Dma, TransferStatus, DMA_START, NUM_CHANNELS};
use super::error::{EmulatorError, Result};
use super::memory::{Bus, IODevice};
use super::scheduler::{Cycles, Event, EventId, Scheduler, SchedulerHost};
use serde::Serialize;
use std::rc::Rc;

/// Handler invoked by a periodic event
///
/// Receives the system and the overshoot of this firing.
pub type PeriodicHandler = Rc<dyn Fn(&mut System, Cycles) -> Result<()>>;

/// Handle to a periodic event registered with [`System::schedule_periodic`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodicHandle {
    slot: usize,
    generation: u32,
}

/// Registration slot for a periodic event; reused once cancelled
#[derive(Debug, Clone, Copy, Default)]
struct PeriodicSlot {
    generation: u32,
    /// Current event (`None` once cancelled)
    event: Option<EventId>,
}

/// Counters describing what the system has done since reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    /// Cycles consumed by DMA bus traffic
    pub dma_cycles: Cycles,
    /// Transfers that ran to completion
    pub transfers_completed: u64,
    /// Slice blocks that finished and waited for DREQ
    pub blocks_completed: u64,
    /// Chopping windows that yielded to the CPU
    pub chopped_windows: u64,
    /// Transfer steps stopped by a bus error
    pub bus_faults: u64,
    /// Rising edges of the DMA interrupt line
    pub dma_interrupts: u64,
}

/// PlayStation-class system core
///
/// # Components
/// - Scheduler: global clock and event queue
/// - Bus: RAM, expansion and I/O devices
/// - DMA: seven channels and the DPCR/DICR controller
pub struct System {
    /// Event scheduler
    scheduler: Scheduler<System>,
    /// Memory bus
    bus: Bus,
    /// DMA engine
    dma: Dma,
    /// Pending DMA service event, if any
    dma_service_event: Option<EventId>,
    /// Pending chopping resume per channel
    resume_events: [Option<EventId>; NUM_CHANNELS],
    /// Periodic registrations
    periodic_events: Vec<PeriodicSlot>,
    /// Activity counters
    stats: SystemStats,
}

impl System {
    /// Create a new System instance with no devices attached
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            bus: Bus::new(),
            dma: Dma::new(),
            dma_service_event: None,
            resume_events: [None; NUM_CHANNELS],
            periodic_events: Vec::new(),
            stats: SystemStats::default(),
        }
    }

    /// Reset all components
    ///
    /// Pending events (including periodic ones) are dropped; attached devices
    /// stay attached.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.bus.reset();
        self.dma.reset();
        self.dma_service_event = None;
        self.resume_events = [None; NUM_CHANNELS];
        self.periodic_events.clear();
        self.stats = SystemStats::default();
        log::info!("System reset");
    }

    /// Attach a memory-mapped peripheral to the bus
    pub fn attach_device(&mut self, device: Box<dyn IODevice>) {
        self.bus.attach(device);
    }

    /// Run the CPU side for `cycles` cycles
    ///
    /// Cycles stolen by DMA during that time are added on top, so the clock
    /// ends at least `cycles` past where it started.
    ///
    /// # Errors
    ///
    /// Any fatal error raised by an event callback or a DMA transfer.
    pub fn run(&mut self, cycles: Cycles) -> Result<()> {
        Scheduler::advance(self, cycles)?;

        loop {
            let stolen = self.bus.take_pending_cycles();
            if stolen == 0 {
                break;
            }
            self.stats.dma_cycles += stolen;
            Scheduler::advance(self, stolen)?;
        }

        Ok(())
    }

    /// Run up to the next scheduled event
    ///
    /// Returns the number of CPU cycles run, zero if no event is pending.
    pub fn run_to_next_event(&mut self) -> Result<Cycles> {
        match self.scheduler.cycles_until_next_event() {
            Some(cycles) => {
                self.run(cycles)?;
                Ok(cycles)
            }
            None => Ok(0),
        }
    }

    /// Schedule a one-shot event
    pub fn schedule<F>(&mut self, name: &'static str, delay: Cycles, callback: F) -> Result<EventId>
    where
        F: FnOnce(&mut System, Cycles) -> Result<()> + 'static,
    {
        self.scheduler.schedule(name, delay, callback)
    }

    /// Cancel a one-shot event
    pub fn deschedule(&mut self, id: EventId) -> bool {
        self.scheduler.deschedule(id)
    }

    /// Schedule `handler` every `period` cycles, first after `period`
    ///
    /// Each firing re-arms itself `period - overshoot` cycles later, so the
    /// deadlines stay on the original grid however late the driver advances.
    /// An advance spanning several periods calls the handler once per
    /// deadline, each with its own overshoot.
    ///
    /// # Errors
    ///
    /// `EmulatorError::Config` for a zero period, `SchedulerFull` if the
    /// event table is exhausted.
    pub fn schedule_periodic(
        &mut self,
        name: &'static str,
        period: Cycles,
        handler: PeriodicHandler,
    ) -> Result<PeriodicHandle> {
        if period == 0 {
            return Err(EmulatorError::Config(format!(
                "periodic event '{}' needs a non-zero period",
                name
            )));
        }

        let slot = match self.periodic_events.iter().position(|slot| slot.event.is_none()) {
            Some(slot) => slot,
            None => {
                self.periodic_events.push(PeriodicSlot::default());
                self.periodic_events.len() - 1
            }
        };
        let entry = &mut self.periodic_events[slot];
        entry.generation = entry.generation.wrapping_add(1);
        let handle = PeriodicHandle {
            slot,
            generation: entry.generation,
        };

        self.arm_periodic(handle, name, period, period, handler)?;
        Ok(handle)
    }

    /// Number of periodic registration slots allocated so far
    pub fn periodic_capacity(&self) -> usize {
        self.periodic_events.len()
    }

    /// Stop a periodic event
    ///
    /// Returns `false` if it was already cancelled.
    pub fn cancel_periodic(&mut self, handle: PeriodicHandle) -> bool {
        let event = self
            .periodic_events
            .get_mut(handle.slot)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.event.take());
        match event {
            Some(id) => {
                // Already popped if called from the handler itself
                self.scheduler.deschedule(id);
                true
            }
            None => false,
        }
    }

    fn periodic_active(&self, handle: PeriodicHandle) -> bool {
        matches!(
            self.periodic_events.get(handle.slot),
            Some(slot) if slot.generation == handle.generation && slot.event.is_some()
        )
    }

    fn arm_periodic(
        &mut self,
        handle: PeriodicHandle,
        name: &'static str,
        delay: Cycles,
        period: Cycles,
        handler: PeriodicHandler,
    ) -> Result<()> {
        let id = self.scheduler.schedule(name, delay, move |system: &mut System, mut late| {
            // Deadlines missed by a long advance are still due now
            loop {
                handler(system, late)?;
                if !system.periodic_active(handle) {
                    return Ok(());
                }
                if late < period {
                    break;
                }
                late -= period;
            }
            system.arm_periodic(handle, name, period - late, period, handler)
        })?;

        if let Some(slot) = self.periodic_events.get_mut(handle.slot) {
            if slot.generation == handle.generation {
                slot.event = Some(id);
            }
        }
        Ok(())
    }

    /// Read a 32-bit value as the CPU sees it
    pub fn read32(&mut self, vaddr: u32) -> Result<u32> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            return self.dma.read(paddr - DMA_START);
        }
        self.bus.read32(vaddr)
    }

    /// Read a 16-bit value as the CPU sees it
    pub fn read16(&mut self, vaddr: u32) -> Result<u16> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            let word = self.dma.read((paddr - DMA_START) & !3)?;
            return Ok((word >> ((paddr & 2) * 8)) as u16);
        }
        self.bus.read16(vaddr)
    }

    /// Read an 8-bit value as the CPU sees it
    pub fn read8(&mut self, vaddr: u32) -> Result<u8> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            let word = self.dma.read((paddr - DMA_START) & !3)?;
            return Ok((word >> ((paddr & 3) * 8)) as u8);
        }
        self.bus.read8(vaddr)
    }

    /// Write a 32-bit value as the CPU sees it
    pub fn write32(&mut self, vaddr: u32, value: u32) -> Result<()> {
        self.write(vaddr, value, 0xFFFF_FFFF)
    }

    /// Write a 16-bit value as the CPU sees it
    pub fn write16(&mut self, vaddr: u32, value: u16) -> Result<()> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            let shift = (paddr & 2) * 8;
            return self.write(vaddr & !3, (value as u32) << shift, 0xFFFF << shift);
        }
        self.bus.write16(vaddr, value)
    }

    /// Write an 8-bit value as the CPU sees it
    pub fn write8(&mut self, vaddr: u32, value: u8) -> Result<()> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            let shift = (paddr & 3) * 8;
            return self.write(vaddr & !3, (value as u32) << shift, 0xFF << shift);
        }
        self.bus.write8(vaddr, value)
    }

    /// Masked word write: only the bits set in `mask` change
    ///
    /// DMA registers honour the mask directly. Elsewhere the mask is split
    /// into 16- or 8-bit lanes and each lane becomes a narrow bus write, so
    /// devices never see a read they did not ask for. A lane that is only
    /// partly masked merges with the current byte and is meant for RAM.
    pub fn write(&mut self, vaddr: u32, value: u32, mask: u32) -> Result<()> {
        let paddr = vaddr & 0x1FFF_FFFF;
        if Dma::contains(paddr) {
            if self.dma.write(paddr - DMA_START, value, mask)? {
                self.request_dma_service()?;
            }
            return Ok(());
        }

        match mask {
            0xFFFF_FFFF => self.bus.write32(vaddr, value),
            0x0000_FFFF => self.bus.write16(vaddr, value as u16),
            0xFFFF_0000 => self.bus.write16(vaddr.wrapping_add(2), (value >> 16) as u16),
            _ => {
                for lane in 0..4u32 {
                    let shift = lane * 8;
                    let lane_mask = ((mask >> shift) & 0xFF) as u8;
                    if lane_mask == 0 {
                        continue;
                    }
                    let address = vaddr.wrapping_add(lane);
                    let mut byte = (value >> shift) as u8;
                    if lane_mask != 0xFF {
                        let old = self.bus.read8(address)?;
                        byte = (old & !lane_mask) | (byte & lane_mask);
                    }
                    self.bus.write8(address, byte)?;
                }
                Ok(())
            }
        }
    }

    /// A peripheral raised its DMA request line
    ///
    /// Returns `true` if a transfer was started or resumed.
    pub fn dreq_rising_edge(&mut self, kind: ChannelKind) -> Result<bool> {
        let armed = self.dma.dreq_rising_edge(kind)?;
        if armed {
            self.request_dma_service()?;
        }
        Ok(armed)
    }

    /// DMA interrupt line as seen by the CPU's interrupt controller
    #[inline]
    pub fn interrupt_line(&self) -> bool {
        self.dma.interrupt_line()
    }

    /// Consume a rising edge of the DMA interrupt line
    pub fn take_irq_edge(&mut self) -> bool {
        self.dma.take_irq_edge()
    }

    /// Make sure a DMA service pass is pending at the current cycle
    fn request_dma_service(&mut self) -> Result<()> {
        if let Some(id) = self.dma_service_event {
            if self.scheduler.is_scheduled(id) {
                return Ok(());
            }
        }

        let id = self
            .scheduler
            .schedule("DMA", 0, |system: &mut System, _late| system.service_dma())?;
        self.dma_service_event = Some(id);
        Ok(())
    }

    /// Run every active channel and book-keep the outcomes
    fn service_dma(&mut self) -> Result<()> {
        self.dma_service_event = None;
        let line_before = self.dma.interrupt_line();

        let outcomes = self.dma.service(&mut self.bus)?;
        for (kind, status) in outcomes {
            match status {
                TransferStatus::Completed => self.stats.transfers_completed += 1,
                TransferStatus::BlockDone => self.stats.blocks_completed += 1,
                TransferStatus::Faulted => self.stats.bus_faults += 1,
                TransferStatus::Chopped { resume_in } => {
                    self.stats.chopped_windows += 1;
                    self.schedule_resume(kind, resume_in)?;
                }
                TransferStatus::Idle => {}
            }
        }

        if !line_before && self.dma.interrupt_line() {
            self.stats.dma_interrupts += 1;
            log::debug!("DMA interrupt raised at cycle {}", self.scheduler.now());
        }
        Ok(())
    }

    /// Wake a chopped channel after its CPU window
    ///
    /// At most one resume is pending per channel. The event is tied to the
    /// transfer that yielded, so it does nothing if that transfer was
    /// aborted or replaced in the meantime.
    fn schedule_resume(&mut self, kind: ChannelKind, delay: Cycles) -> Result<()> {
        let index = kind.index();
        let generation = self.dma.channel(kind).transfer_generation();

        if let Some(stale) = self.resume_events[index].take() {
            self.scheduler.deschedule(stale);
        }

        let id = self
            .scheduler
            .schedule("DMA resume", delay, move |system: &mut System, _late| {
                system.resume_events[index] = None;
                if system.dma.resume(kind, generation)? {
                    system.request_dma_service()?;
                }
                Ok(())
            })?;
        self.resume_events[index] = Some(id);
        Ok(())
    }

    /// Current global cycle count
    #[inline]
    pub fn now(&self) -> Cycles {
        self.scheduler.now()
    }

    /// Pending events in firing order
    pub fn pending_events(&self) -> &[Event<System>] {
        self.scheduler.events()
    }

    /// Cycles until the next event fires
    pub fn cycles_until_next_event(&self) -> Option<Cycles> {
        self.scheduler.cycles_until_next_event()
    }

    pub fn stats(&self) -> SystemStats {
        self.stats
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn dma(&self) -> &Dma {
        &self.dma
    }

    pub(crate) fn dma_mut(&mut self) -> &mut Dma {
        &mut self.dma
    }

    pub(crate) fn scheduler_ref(&self) -> &Scheduler<System> {
        &self.scheduler
    }
}

impl SchedulerHost for System {
    fn scheduler(&mut self) -> &mut Scheduler<Self> {
        &mut self.scheduler
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
