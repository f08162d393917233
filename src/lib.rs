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

//! PlayStation-class emulator timing core
//!
//! A cycle-accurate event scheduler keyed to one global clock, and the DMA
//! engine that runs on top of it: seven channels moving data between main RAM
//! and memory-mapped peripherals, with the DPCR/DICR controller deciding
//! priorities and interrupts.
//!
//! # Example
//!
//! ```
//! use psxcore::core::system::System;
//!
//! let mut system = System::new();
//!
//! // Enable OTC, then clear an eight-entry ordering table at 0x2000
//! system.write32(0x1F8010F0, 0x0800_0000).unwrap();
//! system.write32(0x1F8010E0, 0x2000).unwrap();
//! system.write32(0x1F8010E4, 8).unwrap();
//! system.write32(0x1F8010E8, 0x1100_0000).unwrap();
//! system.run(10).unwrap();
//!
//! assert_eq!(system.read32(0x2000).unwrap(), 0x1FFC);
//! assert_eq!(system.stats().transfers_completed, 1);
//! ```

pub mod core;
