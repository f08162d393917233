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

//! Event Scheduler
//!
//! This module implements the global event scheduler that keeps every hardware
//! timeline consistent with a single, monotonically advancing cycle counter.
//!
//! # Architecture
//!
//! The scheduler owns a small, fixed-capacity table of events sorted by the
//! absolute cycle at which they trigger. The CPU driver calls
//! [`Scheduler::advance`] after every instruction (or batch of instructions)
//! and every event whose deadline has been reached fires, in deadline order.
//!
//! Callbacks receive the scheduler's host (the object that owns the
//! scheduler, usually the [`System`](crate::core::system::System)) and the
//! number of cycles they fired late. They are free to schedule or cancel
//! events, including re-arming themselves:
//!
//! ```text
//! target = now + n
//! while head.trigger_at <= target:
//!     pop head
//!     head.callback(host, target - head.trigger_at)   // may mutate the queue
//! now = target
//! ```
//!
//! The head is re-read after every callback, so insertions and removals made
//! by a callback are always observed.
//!
//! # Example
//!
//! ```
//! use psxcore::core::scheduler::{Scheduler, SchedulerHost};
//!
//! struct Host {
//!     scheduler: Scheduler<Host>,
//!     fired: u32,
//! }
//!
//! impl SchedulerHost for Host {
//!     fn scheduler(&mut self) -> &mut Scheduler<Self> {
//!         &mut self.scheduler
//!     }
//! }
//!
//! let mut host = Host { scheduler: Scheduler::new(), fired: 0 };
//! host.scheduler
//!     .schedule("Tick", 1000, |host: &mut Host, _late| {
//!         host.fired += 1;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! Scheduler::advance(&mut host, 1000).unwrap();
//! assert_eq!(host.fired, 1);
//! assert_eq!(host.scheduler.now(), 1000);
//! ```

use crate::core::error::{EmulatorError, Result};
use arrayvec::ArrayVec;
use std::fmt;

/// Absolute or relative time in CPU cycles
pub type Cycles = u64;

/// Event identifier, unique for the lifetime of a scheduler
pub type EventId = u64;

/// Maximum number of live events
///
/// The table never grows. Running out of slots means a component leaks
/// events, which is a bug rather than a runtime condition.
pub const MAX_EVENTS: usize = 60;

/// Event callback
///
/// Invoked with the scheduler host and the overshoot (cycles elapsed past the
/// event's own deadline at the moment it fires).
pub type EventCallback<C> = Box<dyn FnOnce(&mut C, Cycles) -> Result<()>>;

/// Implemented by whatever owns the scheduler
///
/// [`Scheduler::advance`] needs mutable access to both the queue and the rest
/// of the host while callbacks run; the host hands out the queue on demand
/// instead of the scheduler holding a pointer back to its owner.
pub trait SchedulerHost: Sized {
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

/// Scheduled event
pub struct Event<C> {
    /// Event ID (allocation order)
    pub id: EventId,

    /// Event name (for debugging)
    pub name: &'static str,

    /// Timestamp at which the event was scheduled
    pub registered_at: Cycles,

    /// Timestamp at which the event fires
    pub trigger_at: Cycles,

    callback: EventCallback<C>,
}

impl<C> fmt::Debug for Event<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("registered_at", &self.registered_at)
            .field("trigger_at", &self.trigger_at)
            .finish_non_exhaustive()
    }
}

/// Event Scheduler
///
/// Bounded priority queue of events keyed to the global cycle counter.
///
/// # Design
///
/// - Events live in a fixed-capacity array sorted by `trigger_at`
/// - Insertion is a linear scan; equal deadlines keep their scheduling order
/// - Removal is a linear scan that shifts the tail, preserving order
///
/// With at most [`MAX_EVENTS`] entries the linear walks are cheaper than a heap
/// and ordering stability comes for free.
pub struct Scheduler<C> {
    /// Current global time
    curr_timestamp: Cycles,

    /// Next event ID to hand out
    next_id: EventId,

    /// Live events in firing order
    events: ArrayVec<Event<C>, MAX_EVENTS>,
}

impl<C> Scheduler<C> {
    /// Create an empty scheduler at cycle 0
    ///
    /// # Example
    ///
    /// ```
    /// use psxcore::core::scheduler::Scheduler;
    ///
    /// let scheduler: Scheduler<()> = Scheduler::new();
    /// assert_eq!(scheduler.now(), 0);
    /// assert_eq!(scheduler.num_events(), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            curr_timestamp: 0,
            next_id: 0,
            events: ArrayVec::new(),
        }
    }

    /// Schedule `callback` to run `delay` cycles from now
    ///
    /// # Arguments
    ///
    /// * `name` - Event name for debugging
    /// * `delay` - Cycles until the event fires
    /// * `callback` - Called with the host and the overshoot
    ///
    /// # Returns
    ///
    /// The new event's ID. IDs increase with every call regardless of where
    /// the event lands in the queue.
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::SchedulerFull` if [`MAX_EVENTS`] events are
    /// already live.
    pub fn schedule<F>(&mut self, name: &'static str, delay: Cycles, callback: F) -> Result<EventId>
    where
        F: FnOnce(&mut C, Cycles) -> Result<()> + 'static,
    {
        if self.events.is_full() {
            log::error!(
                "Scheduler: cannot schedule '{}', {} events live",
                name,
                self.events.len()
            );
            return Err(EmulatorError::SchedulerFull {
                capacity: MAX_EVENTS,
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let trigger_at = self.curr_timestamp + delay;

        // First event strictly later than us; equal deadlines stay ahead
        let position = self
            .events
            .iter()
            .position(|event| event.trigger_at > trigger_at)
            .unwrap_or(self.events.len());

        self.events.insert(
            position,
            Event {
                id,
                name,
                registered_at: self.curr_timestamp,
                trigger_at,
                callback: Box::new(callback),
            },
        );

        log::trace!(
            "Scheduler: '{}' #{} scheduled at {} (delay {})",
            name,
            id,
            trigger_at,
            delay
        );

        Ok(id)
    }

    /// Cancel a scheduled event
    ///
    /// # Returns
    ///
    /// `true` if the event was live and has been removed
    pub fn deschedule(&mut self, id: EventId) -> bool {
        match self.events.iter().position(|event| event.id == id) {
            Some(index) => {
                let event = self.events.remove(index);
                log::trace!("Scheduler: '{}' #{} descheduled", event.name, id);
                true
            }
            None => false,
        }
    }

    /// Whether an event with this ID is still pending
    pub fn is_scheduled(&self, id: EventId) -> bool {
        self.events.iter().any(|event| event.id == id)
    }

    /// Current global time
    #[inline]
    pub fn now(&self) -> Cycles {
        self.curr_timestamp
    }

    /// ID the next `schedule` call will return
    #[inline]
    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    /// Number of live events
    #[inline]
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Live events in firing order
    pub fn events(&self) -> &[Event<C>] {
        &self.events
    }

    /// Cycles until the head event is due
    ///
    /// A CPU driver can run this many cycles before it has to call
    /// [`Scheduler::advance`]. `None` when no event is scheduled.
    pub fn cycles_until_next_event(&self) -> Option<Cycles> {
        self.events
            .first()
            .map(|event| event.trigger_at.saturating_sub(self.curr_timestamp))
    }

    /// Reset time and drop every pending event
    ///
    /// IDs keep increasing across resets so a stale handle can never cancel
    /// an event scheduled after the reset.
    pub fn reset(&mut self) {
        self.curr_timestamp = 0;
        self.events.clear();
    }

    /// Restore the global time (save-state loading)
    ///
    /// Time only moves forward while running; this is the one place it is set
    /// directly, and only with an empty queue.
    pub(crate) fn restore_timestamp(&mut self, timestamp: Cycles, next_id: EventId) {
        debug_assert!(self.events.is_empty());
        self.curr_timestamp = timestamp;
        self.next_id = self.next_id.max(next_id);
    }

    /// Pop the head event if it is due by `target`
    fn pop_due(&mut self, target: Cycles) -> Option<Event<C>> {
        if self.events.first()?.trigger_at <= target {
            Some(self.events.remove(0))
        } else {
            None
        }
    }
}

impl<C: SchedulerHost> Scheduler<C> {
    /// Advance global time by `num_cycles`, firing every event that falls due
    ///
    /// Events fire in ascending `trigger_at` order. Events scheduled by a
    /// callback fire within the same call if their deadline is not past the
    /// target. The host's clock reads the target while callbacks run, so a
    /// periodic event re-arming itself with `period - overshoot` lands exactly
    /// one period after its previous deadline.
    ///
    /// # Errors
    ///
    /// The first callback error aborts the advance and is returned. The clock
    /// has already moved to the target at that point.
    ///
    /// # Example
    ///
    /// ```
    /// use psxcore::core::scheduler::{Cycles, Scheduler, SchedulerHost};
    ///
    /// #[derive(Default)]
    /// struct Host {
    ///     scheduler: Scheduler<Host>,
    ///     late: Vec<Cycles>,
    /// }
    ///
    /// impl SchedulerHost for Host {
    ///     fn scheduler(&mut self) -> &mut Scheduler<Self> {
    ///         &mut self.scheduler
    ///     }
    /// }
    ///
    /// let mut host = Host::default();
    /// host.scheduler
    ///     .schedule("A", 5, |host: &mut Host, late| {
    ///         host.late.push(late);
    ///         Ok(())
    ///     })
    ///     .unwrap();
    ///
    /// Scheduler::advance(&mut host, 20).unwrap();
    /// assert_eq!(host.late, vec![15]);
    /// ```
    pub fn advance(host: &mut C, num_cycles: Cycles) -> Result<()> {
        let target = {
            let scheduler = host.scheduler();
            let target = scheduler.curr_timestamp + num_cycles;
            scheduler.curr_timestamp = target;
            target
        };

        while let Some(event) = host.scheduler().pop_due(target) {
            let overshoot = target - event.trigger_at;

            log::trace!(
                "Scheduler: '{}' #{} fired at {} (late: {} cycles)",
                event.name,
                event.id,
                target,
                overshoot
            );

            (event.callback)(host, overshoot)?;
        }

        Ok(())
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("curr_timestamp", &self.curr_timestamp)
            .field("next_id", &self.next_id)
            .field("events", &self.events)
            .finish()
    }
}
