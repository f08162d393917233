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

//! Session configuration
//!
//! Loaded from a TOML file. Every key is optional and falls back to the
//! value in [`Config::default`]:
//!
//! ```toml
//! run_cycles = 200000
//! dpcr = 0x0FEDCBA9
//! dicr = 0x00C40000
//! timer_period = 33868
//! log_level = "debug"
//! save_state = "session.state"
//! ```

use crate::core::error::{EmulatorError, Result};
use crate::core::scheduler::Cycles;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// CPU cycles to run before stopping
    pub run_cycles: Cycles,

    /// DPCR value written before the workload starts
    pub dpcr: u32,

    /// DICR value written before the workload starts
    pub dicr: u32,

    /// Period of the timer event, in cycles
    pub timer_period: Cycles,

    /// Default log filter (`RUST_LOG` still wins)
    pub log_level: String,

    /// Where to write a save state when the run ends
    pub save_state: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_cycles: 100_000,
            dpcr: 0x0FED_CBA9,
            dicr: 0x00C4_0000,
            // Roughly one millisecond at 33.8688 MHz
            timer_period: 33_868,
            log_level: "info".to_string(),
            save_state: None,
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// `EmulatorError::Io` if the file cannot be read, `EmulatorError::Config`
    /// if it does not parse or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = contents.parse()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| EmulatorError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check values that parse but cannot drive a session
    pub fn validate(&self) -> Result<()> {
        if self.run_cycles == 0 {
            return Err(EmulatorError::Config("run_cycles must be non-zero".to_string()));
        }
        if self.timer_period == 0 {
            return Err(EmulatorError::Config("timer_period must be non-zero".to_string()));
        }
        self.level_filter()?;
        Ok(())
    }

    /// `log_level` as a filter
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| EmulatorError::Config(format!("unknown log level '{}'", self.log_level)))
    }
}

impl FromStr for Config {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)
            .map_err(|e| EmulatorError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
