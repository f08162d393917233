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

//! Save state serialization
//!
//! Captures the programmed state of the core so a session can be resumed:
//! - Metadata (timestamp, label, cycle count)
//! - Scheduler counters (global time, next event ID)
//! - DMA state (channel register files, DPCR, DICR)
//! - Main RAM
//!
//! Pending events hold boxed callbacks and cannot be serialized, so they are
//! not part of a save state. Channels come back idle with their registers
//! intact; a transfer in flight at save time has to be restarted by the guest.
//!
//! # Save State Format
//!
//! States are encoded with bincode (standard configuration). The version
//! number is checked on load and a mismatch is rejected.
//!
//! # Example
//!
//! ```
//! use psxcore::core::save_state::SaveState;
//! use psxcore::core::system::System;
//!
//! let mut system = System::new();
//! system.write32(0x1000, 0xCAFE_F00D).unwrap();
//! system.run(500).unwrap();
//!
//! let bytes = SaveState::from_system(&system, "checkpoint").to_bytes().unwrap();
//!
//! let mut restored = System::new();
//! SaveState::from_bytes(&bytes).unwrap().apply_to(&mut restored).unwrap();
//! assert_eq!(restored.now(), 500);
//! assert_eq!(restored.read32(0x1000).unwrap(), 0xCAFE_F00D);
//! ```

use crate::core::dma::{ChannelKind, NUM_CHANNELS};
use crate::core::error::{EmulatorError, Result};
use crate::core::memory::Bus;
use crate::core::scheduler::{Cycles, EventId, SchedulerHost};
use crate::core::system::System;
use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Save state version for compatibility checking
///
/// Incremented whenever the format changes incompatibly.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Complete core save state
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct SaveState {
    /// Version number for compatibility checking
    pub version: u32,

    pub metadata: SaveStateMetadata,

    pub scheduler: SchedulerState,

    pub dma: DmaState,

    /// Main RAM
    #[serde(skip)]
    pub ram: Vec<u8>,
}

/// Save state metadata
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct SaveStateMetadata {
    /// When the state was taken
    #[bincode(with_serde)]
    pub timestamp: DateTime<Utc>,

    /// Free-form label given by the caller
    pub label: String,

    /// Global cycle count at save time
    pub cycle: Cycles,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SchedulerState {
    pub now: Cycles,
    pub next_id: EventId,
}

/// DMA engine registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DmaState {
    /// One entry per channel, in channel order
    pub channels: Vec<DmaChannelState>,

    /// DMA control register (DPCR)
    pub control: u32,

    /// DMA interrupt register (DICR)
    pub interrupt: u32,
}

/// Register file of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DmaChannelState {
    pub channel_id: u8,

    /// Base address register (MADR)
    pub base_address: u32,

    /// Block control register (BCR)
    pub block_control: u32,

    /// Channel control register (CHCR)
    pub channel_control: u32,
}

impl SaveState {
    /// Capture the current state of `system`
    pub fn from_system(system: &System, label: &str) -> Self {
        let dma = system.dma();
        let channels = ChannelKind::ALL
            .iter()
            .map(|&kind| {
                let channel = dma.channel(kind);
                DmaChannelState {
                    channel_id: kind.index() as u8,
                    base_address: channel.base_address(),
                    block_control: channel.block_control().0,
                    channel_control: channel.control().0,
                }
            })
            .collect();

        Self {
            version: SAVE_STATE_VERSION,
            metadata: SaveStateMetadata {
                timestamp: Utc::now(),
                label: label.to_string(),
                cycle: system.now(),
            },
            scheduler: SchedulerState {
                now: system.now(),
                next_id: system.scheduler_ref().next_id(),
            },
            dma: DmaState {
                channels,
                control: dma.controller().read_control(),
                interrupt: dma.controller().read_interrupt(),
            },
            ram: system.bus().ram().to_vec(),
        }
    }

    /// Load this state into `system`
    ///
    /// The system is reset first, so pending events (periodic ones included)
    /// are dropped. Attached devices stay attached.
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::SaveState` if the state does not describe this
    /// core (wrong channel count or RAM size). The system is left untouched in
    /// that case.
    pub fn apply_to(&self, system: &mut System) -> Result<()> {
        if self.dma.channels.len() != NUM_CHANNELS {
            return Err(EmulatorError::SaveState(format!(
                "expected {} DMA channels, found {}",
                NUM_CHANNELS,
                self.dma.channels.len()
            )));
        }
        if self.ram.len() != Bus::RAM_SIZE {
            return Err(EmulatorError::SaveState(format!(
                "RAM image is {} bytes (expected {})",
                self.ram.len(),
                Bus::RAM_SIZE
            )));
        }

        system.reset();
        system.bus_mut().load_ram(&self.ram)?;

        let dma = system.dma_mut();
        for (channel, state) in dma.channels_mut().iter_mut().zip(&self.dma.channels) {
            channel.restore(state.base_address, state.block_control, state.channel_control);
        }
        dma.controller_mut().restore(self.dma.control, self.dma.interrupt);

        system
            .scheduler()
            .restore_timestamp(self.scheduler.now, self.scheduler.next_id);

        log::info!(
            "Save state '{}' restored at cycle {}",
            self.metadata.label,
            self.scheduler.now
        );
        Ok(())
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, config::standard())
            .map_err(|e| EmulatorError::SaveState(format!("encode failed: {}", e)))
    }

    /// Decode a bincode image and check its version
    ///
    /// # Errors
    ///
    /// Returns `EmulatorError::SaveState` for a malformed image or a version
    /// other than [`SAVE_STATE_VERSION`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (state, _): (SaveState, usize) = bincode::decode_from_slice(bytes, config::standard())
            .map_err(|e| EmulatorError::SaveState(format!("decode failed: {}", e)))?;

        if state.version != SAVE_STATE_VERSION {
            return Err(EmulatorError::SaveState(format!(
                "Incompatible save state version: expected {}, got {}",
                SAVE_STATE_VERSION, state.version
            )));
        }

        Ok(state)
    }

    /// Save state to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        Ok(())
    }

    /// Load state from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Human-readable dump of everything but RAM
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EmulatorError::SaveState(e.to_string()))
    }
}
