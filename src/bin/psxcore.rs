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

//! DMA workload runner
//!
//! Drives the core the way a game's frame loop would: a periodic timer
//! clears an ordering table with the OTC channel, hooks a display list into
//! it and submits the list to a recording GP0 port through the GPU channel.
//! DMA interrupts are acknowledged like a CPU handler would. At the end the
//! activity counters are printed as JSON.

use clap::Parser;
use log::{error, info, warn};
use psxcore::core::config::Config;
use psxcore::core::error::Result;
use psxcore::core::memory::IODevice;
use psxcore::core::save_state::SaveState;
use psxcore::core::scheduler::Cycles;
use psxcore::core::system::{PeriodicHandler, System, SystemStats};
use serde::Serialize;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

const DPCR: u32 = 0x1F80_10F0;
const DICR: u32 = 0x1F80_10F4;
const GPU_MADR: u32 = 0x1F80_10A0;
const GPU_BCR: u32 = 0x1F80_10A4;
const GPU_CHCR: u32 = 0x1F80_10A8;
const OTC_MADR: u32 = 0x1F80_10E0;
const OTC_BCR: u32 = 0x1F80_10E4;
const OTC_CHCR: u32 = 0x1F80_10E8;

/// Ordering table: 16 slots, highest address first
const OT_BASE: u32 = 0x0001_0000;
const OT_LEN: u32 = 16;
const OT_HEAD: u32 = OT_BASE + 4 * (OT_LEN - 1);

/// Display list packet hooked into the middle slot each frame
const PACKET_ADDR: u32 = 0x0002_0000;
const PACKET: [u32; 3] = [0xE100_0400, 0xE200_0000, 0xE300_0000];

/// PlayStation DMA scheduler/engine workload runner
#[derive(Parser)]
#[command(name = "psxcore")]
#[command(about = "Runs a DMA workload on the psxcore scheduler", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of CPU cycles to run (overrides the configuration)
    #[arg(short = 'n', long)]
    cycles: Option<Cycles>,

    /// Write a save state here when the run ends
    #[arg(short = 's', long)]
    save_state: Option<PathBuf>,

    /// Default log level (overrides the configuration)
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

/// GP0 port that only counts the words it receives
struct Gp0Sink {
    words: Rc<Cell<u64>>,
}

impl IODevice for Gp0Sink {
    fn address_range(&self) -> (u32, u32) {
        (0x1F80_1810, 0x1F80_1817)
    }

    fn read_register(&mut self, offset: u32) -> Result<u32> {
        // GPUSTAT: ready for commands and DMA
        Ok(if offset == 4 { 0x1C00_0000 } else { 0 })
    }

    fn write_register(&mut self, offset: u32, _value: u32) -> Result<()> {
        if offset == 0 {
            self.words.set(self.words.get() + 1);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "GP0 sink"
    }
}

#[derive(Serialize)]
struct Report {
    cycles: Cycles,
    frames: u64,
    gp0_words: u64,
    irqs_acknowledged: u64,
    stats: SystemStats,
}

fn main() -> Result<()> {
    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(cycles) = args.cycles {
        config.run_cycles = cycles;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if args.save_state.is_some() {
        config.save_state = args.save_state;
    }
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    info!("psxcore v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!("Run failed: {}", e);
        return Err(e);
    }
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    let gp0_words = Rc::new(Cell::new(0));
    let frames = Rc::new(Cell::new(0));

    let mut system = System::new();
    system.attach_device(Box::new(Gp0Sink {
        words: gp0_words.clone(),
    }));

    system.write32(DPCR, config.dpcr)?;
    system.write32(DICR, config.dicr)?;
    system.schedule_periodic("Frame", config.timer_period, frame_handler(frames.clone()))?;

    info!(
        "Running {} cycles (frame every {} cycles)",
        config.run_cycles, config.timer_period
    );

    let mut irqs_acknowledged = 0;
    let mut remaining = config.run_cycles;
    while remaining > 0 {
        let slice = remaining.min(config.timer_period);
        system.run(slice)?;
        remaining -= slice;

        if system.take_irq_edge() {
            // Acknowledge whatever is flagged, keep everything else
            let dicr = system.read32(DICR)?;
            system.write32(DICR, dicr & 0x7FFF_FFFF)?;
            irqs_acknowledged += 1;
        }
    }

    let report = Report {
        cycles: system.now(),
        frames: frames.get(),
        gp0_words: gp0_words.get(),
        irqs_acknowledged,
        stats: system.stats(),
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("Failed to format report: {}", e),
    }

    if let Some(path) = &config.save_state {
        SaveState::from_system(&system, "psxcore").save_to_file(path)?;
        info!("Save state written to {}", path.display());
    }

    Ok(())
}

/// Clear the ordering table, then submit it once OTC has had time to finish
fn frame_handler(frames: Rc<Cell<u64>>) -> PeriodicHandler {
    Rc::new(move |system: &mut System, _late| {
        frames.set(frames.get() + 1);

        system.write32(OTC_MADR, OT_HEAD)?;
        system.write32(OTC_BCR, OT_LEN)?;
        system.write32(OTC_CHCR, 0x1100_0000)?;

        system.schedule("GPU submit", OT_LEN as Cycles + 8, |system: &mut System, _late| {
            submit_display_list(system)
        })?;
        Ok(())
    })
}

fn submit_display_list(system: &mut System) -> Result<()> {
    let slot = OT_BASE + 4 * (OT_LEN / 2);

    // Packet header: word count and the link the slot held before
    let next = system.read32(slot)? & 0x00FF_FFFF;
    system.write32(PACKET_ADDR, ((PACKET.len() as u32) << 24) | next)?;
    for (i, &word) in PACKET.iter().enumerate() {
        system.write32(PACKET_ADDR + 4 * (i as u32 + 1), word)?;
    }
    system.write32(slot, PACKET_ADDR)?;

    system.write32(GPU_MADR, OT_HEAD)?;
    system.write32(GPU_BCR, 0)?;
    system.write32(GPU_CHCR, 0x0100_0401)?;
    Ok(())
}
