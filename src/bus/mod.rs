use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::input::Joypad;
use crate::ppu::{MASTER_CYCLES_PER_LINE, Ppu};

mod dma;
mod io;
#[cfg(test)]
mod tests;
mod types;

use self::io::{AUTO_JOYPAD_CYCLES, CpuIo, MDMAEN};
pub(crate) use self::types::TransientBool;
use self::types::DmaChannel;

pub const WRAM_SIZE: usize = 0x20000;
pub const NTSC_MASTER_CLOCK_HZ: u64 = 21_477_272;
pub const PAL_MASTER_CLOCK_HZ: u64 = 21_281_370;
pub const APU_CLOCK_HZ: u64 = 1_024_000;
const FAST_ACCESS_CYCLES: u32 = 6;
const SLOW_ACCESS_CYCLES: u32 = 8;
const XSLOW_ACCESS_CYCLES: u32 = 12;
const JOYSER0: u16 = 0x4016;
const JOYSER1: u16 = 0x4017;
const WMDATA: u16 = 0x2180;
const WMADDL: u16 = 0x2181;
const WMADDM: u16 = 0x2182;
const WMADDH: u16 = 0x2183;

/// System bus of the 5A22: 24-bit address decode over WRAM, the PPU and APU
/// ports, on-chip registers, DMA and the cartridge. The bus also owns the
/// scheduling of everything that is not the CPU.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Bus {
    pub(crate) cartridge: Cartridge,
    wram: Vec<u8>,
    wram_port_addr: u32,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) io: CpuIo,
    pub(crate) dma: [DmaChannel; 8],
    pub(crate) joypads: [Joypad; 2],
    joypad_strobe: bool,
    apu_accumulator: u64,
    master_clock_hz: u64,
    dma_cycles: u32,
    /// Set while a frame is being run without rendering.
    skip_render: TransientBool,
}

impl Bus {
    pub fn new(cartridge: Cartridge) -> Self {
        let pal = cartridge.region() == crate::cartridge::Region::Pal;
        let mut bus = Self {
            cartridge,
            wram: vec![0; WRAM_SIZE],
            wram_port_addr: 0,
            ppu: Ppu::new(),
            apu: Apu::new(),
            io: CpuIo::new(),
            dma: [DmaChannel::default(); 8],
            joypads: [Joypad::default(), Joypad::default()],
            joypad_strobe: false,
            apu_accumulator: 0,
            master_clock_hz: NTSC_MASTER_CLOCK_HZ,
            dma_cycles: 0,
            skip_render: TransientBool(false),
        };
        bus.set_pal(pal);
        bus
    }

    pub fn set_pal(&mut self, pal: bool) {
        self.ppu.set_pal(pal);
        self.master_clock_hz = if pal {
            PAL_MASTER_CLOCK_HZ
        } else {
            NTSC_MASTER_CLOCK_HZ
        };
    }

    pub fn master_clock_hz(&self) -> u64 {
        self.master_clock_hz
    }

    /// Clear counters and chip registers. `hard` also wipes WRAM, video
    /// memory and audio RAM; cartridge SRAM always survives.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.wram.fill(0);
        }
        self.wram_port_addr = 0;
        self.ppu.reset(hard);
        self.apu.reset(hard);
        self.io = CpuIo::new();
        self.dma = [DmaChannel::default(); 8];
        self.joypad_strobe = false;
        self.apu_accumulator = 0;
        self.dma_cycles = 0;
    }

    pub(crate) fn set_skip_render(&mut self, skip: bool) {
        *self.skip_render = skip;
    }

    pub fn wram(&self) -> &[u8] {
        &self.wram
    }

    pub fn read(&mut self, addr: u32) -> u8 {
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        match (bank, offset) {
            (0x7E | 0x7F, _) => self.wram[(addr & 0x1_FFFF) as usize],
            (0x00..=0x3F | 0x80..=0xBF, 0x0000..=0x1FFF) => self.wram[offset as usize],
            (0x00..=0x3F | 0x80..=0xBF, 0x2000..=0x7FFF) => self.read_io(addr, offset),
            _ => self.read_cartridge(addr),
        }
    }

    pub fn write(&mut self, addr: u32, value: u8) {
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        match (bank, offset) {
            (0x7E | 0x7F, _) => self.wram[(addr & 0x1_FFFF) as usize] = value,
            (0x00..=0x3F | 0x80..=0xBF, 0x0000..=0x1FFF) => self.wram[offset as usize] = value,
            (0x00..=0x3F | 0x80..=0xBF, 0x2000..=0x7FFF) => self.write_io(addr, offset, value),
            _ => {
                if !self.cartridge.write(addr, value) {
                    log::trace!("unmapped write {addr:06X} <= {value:02X}");
                }
            }
        }
    }

    /// Side-effect-free read of anything backed by plain memory; I/O reads 0.
    pub fn peek(&self, addr: u32) -> u8 {
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        match (bank, offset) {
            (0x7E | 0x7F, _) => self.wram[(addr & 0x1_FFFF) as usize],
            (0x00..=0x3F | 0x80..=0xBF, 0x0000..=0x1FFF) => self.wram[offset as usize],
            _ => self.cartridge.read(addr).unwrap_or(0),
        }
    }

    fn read_cartridge(&self, addr: u32) -> u8 {
        match self.cartridge.read(addr) {
            Some(value) => value,
            None => {
                log::trace!("unmapped read {addr:06X}");
                0
            }
        }
    }

    fn read_io(&mut self, addr: u32, offset: u16) -> u8 {
        match offset {
            0x2100..=0x213F => self.ppu.read_register(offset),
            0x2140..=0x217F => self.apu.cpu_read_port((offset & 0x03) as usize),
            WMDATA => {
                let value = self.wram[self.wram_port_addr as usize];
                self.wram_port_addr = (self.wram_port_addr + 1) & 0x1_FFFF;
                value
            }
            JOYSER0 => self.joypads[0].read_serial(),
            JOYSER1 => self.joypads[1].read_serial() | 0x1C,
            0x4200..=0x421F => {
                let vblank = self.ppu.in_vblank();
                let hblank = self.ppu.in_hblank();
                self.io.read(offset, vblank, hblank)
            }
            0x4300..=0x437F => {
                self.dma[((offset >> 4) & 0x07) as usize].read_register(offset & 0x0F)
            }
            _ => self.read_cartridge(addr),
        }
    }

    fn write_io(&mut self, addr: u32, offset: u16, value: u8) {
        match offset {
            0x2100..=0x2133 => self.ppu.write_register(offset, value),
            0x2140..=0x217F => self.apu.cpu_write_port((offset & 0x03) as usize, value),
            WMDATA => {
                self.wram[self.wram_port_addr as usize] = value;
                self.wram_port_addr = (self.wram_port_addr + 1) & 0x1_FFFF;
            }
            WMADDL => self.wram_port_addr = (self.wram_port_addr & 0x1_FF00) | value as u32,
            WMADDM => {
                self.wram_port_addr = (self.wram_port_addr & 0x1_00FF) | ((value as u32) << 8)
            }
            WMADDH => {
                self.wram_port_addr =
                    (self.wram_port_addr & 0x0_FFFF) | (((value & 0x01) as u32) << 16)
            }
            JOYSER0 => {
                let strobe = value & 0x01 != 0;
                if strobe || self.joypad_strobe {
                    self.joypads.iter_mut().for_each(Joypad::latch);
                }
                self.joypad_strobe = strobe;
            }
            MDMAEN => {
                if value != 0 {
                    self.run_gp_dma(value);
                }
            }
            0x4200..=0x421F => {
                if self.io.write(offset, value).is_some() {
                    self.ppu.latch_counters();
                }
            }
            0x4300..=0x437F => {
                self.dma[((offset >> 4) & 0x07) as usize].write_register(offset & 0x0F, value)
            }
            _ => {
                if !self.cartridge.write(addr, value) {
                    log::trace!("unmapped write {addr:06X} <= {value:02X}");
                }
            }
        }
    }

    /// Master cycles one CPU access to `addr` costs.
    pub fn access_cycles(&self, addr: u32) -> u32 {
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        if bank & 0x40 == 0 {
            match offset {
                0x0000..=0x1FFF => SLOW_ACCESS_CYCLES,
                0x2000..=0x3FFF => FAST_ACCESS_CYCLES,
                0x4000..=0x41FF => XSLOW_ACCESS_CYCLES,
                0x4200..=0x5FFF => FAST_ACCESS_CYCLES,
                0x6000..=0x7FFF => SLOW_ACCESS_CYCLES,
                _ if bank & 0x80 != 0 && self.io.fast_rom => FAST_ACCESS_CYCLES,
                _ => SLOW_ACCESS_CYCLES,
            }
        } else if bank >= 0xC0 && self.io.fast_rom {
            FAST_ACCESS_CYCLES
        } else {
            SLOW_ACCESS_CYCLES
        }
    }

    /// NMI edge for the CPU; consumed on read.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.io.nmi_pending)
    }

    pub fn irq_line(&self) -> bool {
        self.io.irq_flag
    }

    /// Cycles the CPU was stalled by DMA/HDMA since the last call.
    pub fn take_dma_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.dma_cycles)
    }

    /// Advance every non-CPU component by `cycles` master cycles.
    pub fn tick(&mut self, cycles: u32) {
        let mut remaining = cycles;
        while remaining > 0 {
            let chunk = remaining.min(self.ppu.cycles_to_next_event());
            let line = self.ppu.scanline();
            let h_before = self.ppu.h_cycle();
            let events = self.ppu.step(chunk);
            self.io.auto_read_cycles = self.io.auto_read_cycles.saturating_sub(chunk);
            if self.io.timer_irq_hit(line, h_before, h_before + chunk) {
                self.io.irq_flag = true;
            }
            if events.hblank_start {
                self.on_hblank(line);
            }
            if events.frame_start {
                self.io.leave_vblank();
                self.hdma_init();
            }
            if events.vblank_start {
                self.on_vblank();
            }
            remaining -= chunk;
        }

        self.catch_up_apu(cycles);
    }

    fn on_hblank(&mut self, line: u16) {
        let vblank_line = self.ppu.vblank_line();
        if (1..vblank_line).contains(&line) {
            if *self.skip_render {
                self.ppu.evaluate_sprites(line);
            } else {
                self.ppu.render_scanline(line);
            }
        }
        if line < vblank_line {
            self.hdma_line();
        }
    }

    fn on_vblank(&mut self) {
        self.io.enter_vblank();
        if self.io.auto_joypad {
            for (index, pad) in self.joypads.iter_mut().enumerate() {
                pad.latch();
                self.io.joy_data[index] = pad.buttons();
            }
            self.io.auto_read_cycles = AUTO_JOYPAD_CYCLES;
        }
    }

    fn catch_up_apu(&mut self, cycles: u32) {
        self.apu_accumulator += cycles as u64 * APU_CLOCK_HZ;
        while self.apu_accumulator >= self.master_clock_hz {
            self.apu_accumulator -= self.master_clock_hz;
            self.apu.cycle();
        }
    }

    /// Master cycles in one frame at the current region.
    pub fn cycles_per_frame(&self) -> u32 {
        MASTER_CYCLES_PER_LINE * self.ppu.lines_per_frame() as u32
    }
}
