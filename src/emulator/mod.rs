mod env;
mod state;

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::bus::{Bus, WRAM_SIZE};
use crate::cartridge::{Cartridge, Region};
use crate::cpu::Cpu;
use crate::error::{EmulatorError, Result};
use crate::input::Button;
use crate::ppu::{FRAME_HEIGHT, FRAME_WIDTH};

pub use state::{SaveState, StateSlots};

pub const DEFAULT_RESYNC_INTERVAL: u32 = 8;

/// Encoded layout of a snapshot: cartridge fingerprint, CPU, bus (which
/// carries every other chip) and the fast-frame streak.
type Snapshot = (u64, Cpu, Bus, u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Every this many consecutive [`Emulator::run_frame_fast`] calls, one
    /// is promoted to a fully rendered frame. 0 and 1 render every frame.
    pub resync_interval: u32,
    /// Overrides the region byte of the cartridge header.
    pub region: Option<Region>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            region: None,
        }
    }
}

impl EmulatorConfig {
    /// Defaults with `SNES_RESYNC_INTERVAL` and `SNES_FORCE_PAL` applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            resync_interval: Self::env_resync_interval().unwrap_or(defaults.resync_interval),
            region: Self::env_force_pal().then_some(Region::Pal),
        }
    }
}

/// The whole console: the 65816 plus the bus that owns every other chip.
/// This is the only type front-ends need to drive.
#[derive(Clone)]
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    config: EmulatorConfig,
    /// Fast frames run since the last fully rendered one.
    fast_streak: u32,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    /// A machine configured from [`EmulatorConfig::from_env`]. Use
    /// [`Emulator::with_config`] to ignore the environment.
    pub fn new() -> Self {
        Self::with_config(EmulatorConfig::from_env())
    }

    /// A machine with no cartridge inserted; every cartridge access is open bus.
    pub fn with_config(config: EmulatorConfig) -> Self {
        let mut emulator = Self {
            cpu: Cpu::new(),
            bus: Bus::new(Cartridge::empty()),
            config,
            fast_streak: 0,
        };
        emulator.apply_region();
        emulator
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    fn apply_region(&mut self) {
        if let Some(region) = self.config.region {
            self.bus.set_pal(region == Region::Pal);
        }
    }

    /// Insert a cartridge image and power-cycle. A rejected image leaves the
    /// running machine as it was.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<()> {
        let cartridge = Cartridge::load(image, None)?;
        self.bus = Bus::new(cartridge);
        self.apply_region();
        self.reset(true);
        Ok(())
    }

    /// Restart from the reset vector. `hard` also clears WRAM, video memory
    /// and audio RAM; battery SRAM survives both kinds.
    pub fn reset(&mut self, hard: bool) {
        log::debug!("{} reset", if hard { "hard" } else { "soft" });
        self.bus.reset(hard);
        self.cpu.reset(&mut self.bus);
        self.fast_streak = 0;
    }

    /// Run one CPU instruction (or DMA burst) and let the rest of the machine
    /// catch up. Returns the master cycles that elapsed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus) + self.bus.take_dma_cycles();
        self.bus.tick(cycles);
        cycles
    }

    /// Run until the beam wraps back to line 0, rendering every visible line.
    pub fn run_frame(&mut self) {
        self.fast_streak = 0;
        self.run_until_frame_end(false);
    }

    /// Same stepping as [`Emulator::run_frame`] without compositing
    /// scanlines. Sprite evaluation still runs so STAT77 stays live, and every
    /// `resync_interval`-th call renders a full frame.
    pub fn run_frame_fast(&mut self) {
        self.fast_streak += 1;
        if self.fast_streak >= self.config.resync_interval {
            log::debug!("resync: full frame after {} fast frames", self.fast_streak - 1);
            self.run_frame();
        } else {
            self.run_until_frame_end(true);
        }
    }

    fn run_until_frame_end(&mut self, skip_render: bool) {
        self.bus.set_skip_render(skip_render);
        let frame = self.bus.ppu.frame_count();
        while self.bus.ppu.frame_count() == frame {
            self.step();
        }
        self.bus.set_skip_render(false);
    }

    pub fn set_button_pressed(&mut self, pad: usize, button: Button) {
        self.set_button(pad, button, true);
    }

    pub fn set_button_released(&mut self, pad: usize, button: Button) {
        self.set_button(pad, button, false);
    }

    fn set_button(&mut self, pad: usize, button: Button, pressed: bool) {
        match self.bus.joypads.get_mut(pad) {
            Some(joypad) => joypad.set(button, pressed),
            None => log::warn!("button {button:?} on missing pad {pad} ignored"),
        }
    }

    pub fn save_state(&self) -> Result<SaveState> {
        let snapshot = (
            self.bus.cartridge.fingerprint(),
            &self.cpu,
            &self.bus,
            self.fast_streak,
        );
        let bytes = bincode::encode_to_vec(snapshot, bincode::config::standard())?;
        Ok(SaveState::from_bytes(bytes))
    }

    /// Replace the whole machine with `state`. The snapshot is decoded and
    /// checked in full before anything live is touched.
    pub fn load_state(&mut self, state: &SaveState) -> Result<()> {
        let bytes = state.as_bytes();
        let ((fingerprint, cpu, mut bus, fast_streak), consumed): (Snapshot, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        if consumed != bytes.len() {
            return Err(EmulatorError::InvalidState(format!(
                "{} trailing bytes after snapshot",
                bytes.len() - consumed
            )));
        }
        let live = &self.bus.cartridge;
        if fingerprint != live.fingerprint() || bus.cartridge.fingerprint() != fingerprint {
            return Err(EmulatorError::InvalidState(format!(
                "snapshot taken with cartridge {fingerprint:016X}, loaded cartridge is {:016X}",
                live.fingerprint()
            )));
        }
        if bus.cartridge.sram().len() != live.sram().len() {
            return Err(EmulatorError::InvalidState(format!(
                "snapshot has {} bytes of SRAM, cartridge has {}",
                bus.cartridge.sram().len(),
                live.sram().len()
            )));
        }

        bus.cartridge.adopt_rom(&mut self.bus.cartridge);
        self.cpu = cpu;
        self.bus = bus;
        self.fast_streak = fast_streak;
        log::debug!("state restored ({} bytes)", bytes.len());
        Ok(())
    }

    pub fn save_state_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.save_state()?.into_bytes())?;
        Ok(())
    }

    pub fn load_state_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_state(&SaveState::from_bytes(bytes))
    }

    /// Work RAM from `start`, clamped to the end of the 128 KiB array.
    pub fn dump_ram(&self, start: usize, len: usize) -> &[u8] {
        let wram = self.bus.wram();
        let start = start.min(WRAM_SIZE);
        let end = start.saturating_add(len).min(WRAM_SIZE);
        &wram[start..end]
    }

    /// One Work RAM byte; `addr` wraps at 128 KiB.
    pub fn read_ram_byte(&self, addr: usize) -> u8 {
        self.bus.wram()[addr % WRAM_SIZE]
    }

    /// The last composited frame as 512x480 RGBA8.
    pub fn frame_rgba(&self) -> &[u8] {
        self.bus.ppu.frame_rgba()
    }

    pub fn frame_dimensions(&self) -> (usize, usize) {
        (FRAME_WIDTH, FRAME_HEIGHT)
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frame_count()
    }

    /// Decimate the audio produced since the last call into `left`/`right`.
    /// Ask for the same count every frame.
    pub fn audio_samples(&mut self, left: &mut [i16], right: &mut [i16]) {
        self.bus.apu.set_samples(left, right);
    }

    pub fn sram(&self) -> &[u8] {
        self.bus.cartridge.sram()
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<()> {
        self.bus.cartridge.load_sram(data)
    }
}
