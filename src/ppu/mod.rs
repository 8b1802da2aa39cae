// PPU (S-PPU1/S-PPU2): video memories, register file and scanline timing.
//
// The bus owns the PPU and forwards $2100-$213F here. Rendering lives in
// render.rs and is driven one scanline at a time from the bus when the
// H-blank boundary of a visible line is crossed.

mod render;
#[cfg(test)]
mod tests;

pub const FRAME_WIDTH: usize = 512;
pub const FRAME_HEIGHT: usize = 480;
pub(crate) const MASTER_CYCLES_PER_LINE: u32 = 1364;
pub(crate) const MASTER_CYCLES_PER_DOT: u32 = 4;
/// Dot 274: the renderer composites the current line once the beam leaves it.
pub(crate) const HBLANK_START_CYCLE: u32 = 274 * MASTER_CYCLES_PER_DOT;
pub(crate) const LINES_PER_FRAME_NTSC: u16 = 262;
pub(crate) const LINES_PER_FRAME_PAL: u16 = 312;
pub(crate) const VRAM_WORDS: usize = 0x8000;
pub(crate) const CGRAM_COLORS: usize = 256;
pub(crate) const OAM_SIZE: usize = 544;
const PPU1_VERSION: u8 = 0x01;
const PPU2_VERSION: u8 = 0x03;

pub(crate) const INIDISP: u16 = 0x2100;
pub(crate) const OBSEL: u16 = 0x2101;
pub(crate) const OAMADDL: u16 = 0x2102;
pub(crate) const OAMADDH: u16 = 0x2103;
pub(crate) const OAMDATA: u16 = 0x2104;
pub(crate) const BGMODE: u16 = 0x2105;
pub(crate) const MOSAIC: u16 = 0x2106;
pub(crate) const BG1SC: u16 = 0x2107;
pub(crate) const BG12NBA: u16 = 0x210B;
pub(crate) const BG34NBA: u16 = 0x210C;
pub(crate) const BG1HOFS: u16 = 0x210D;
pub(crate) const BG4VOFS: u16 = 0x2114;
pub(crate) const VMAIN: u16 = 0x2115;
pub(crate) const VMADDL: u16 = 0x2116;
pub(crate) const VMADDH: u16 = 0x2117;
pub(crate) const VMDATAL: u16 = 0x2118;
pub(crate) const VMDATAH: u16 = 0x2119;
pub(crate) const M7SEL: u16 = 0x211A;
pub(crate) const M7A: u16 = 0x211B;
pub(crate) const M7Y: u16 = 0x2120;
pub(crate) const CGADD: u16 = 0x2121;
pub(crate) const CGDATA: u16 = 0x2122;
pub(crate) const W12SEL: u16 = 0x2123;
pub(crate) const WOBJSEL: u16 = 0x2125;
pub(crate) const WH0: u16 = 0x2126;
pub(crate) const WH3: u16 = 0x2129;
pub(crate) const WBGLOG: u16 = 0x212A;
pub(crate) const WOBJLOG: u16 = 0x212B;
pub(crate) const TM: u16 = 0x212C;
pub(crate) const TS: u16 = 0x212D;
pub(crate) const TMW: u16 = 0x212E;
pub(crate) const TSW: u16 = 0x212F;
pub(crate) const CGWSEL: u16 = 0x2130;
pub(crate) const CGADSUB: u16 = 0x2131;
pub(crate) const COLDATA: u16 = 0x2132;
pub(crate) const SETINI: u16 = 0x2133;
pub(crate) const MPYL: u16 = 0x2134;
pub(crate) const MPYM: u16 = 0x2135;
pub(crate) const MPYH: u16 = 0x2136;
pub(crate) const SLHV: u16 = 0x2137;
pub(crate) const RDOAM: u16 = 0x2138;
pub(crate) const RDVRAML: u16 = 0x2139;
pub(crate) const RDVRAMH: u16 = 0x213A;
pub(crate) const RDCGRAM: u16 = 0x213B;
pub(crate) const OPHCT: u16 = 0x213C;
pub(crate) const OPVCT: u16 = 0x213D;
pub(crate) const STAT77: u16 = 0x213E;
pub(crate) const STAT78: u16 = 0x213F;

pub(crate) const SETINI_OVERSCAN: u8 = 0x04;
pub(crate) const SETINI_PSEUDO_HIRES: u8 = 0x08;
pub(crate) const SETINI_EXTBG: u8 = 0x40;

/// Boundaries crossed by one call to [`Ppu::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PpuEvents {
    pub hblank_start: bool,
    pub line_start: bool,
    pub vblank_start: bool,
    pub frame_start: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) struct Mode7 {
    pub(crate) a: i16,
    pub(crate) b: i16,
    pub(crate) c: i16,
    pub(crate) d: i16,
    pub(crate) x: i16,
    pub(crate) y: i16,
    pub(crate) hofs: i16,
    pub(crate) vofs: i16,
    pub(crate) latch: u8,
    pub(crate) settings: u8,
}

#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Ppu {
    pub(crate) vram: Vec<u16>,
    pub(crate) cgram: Vec<u16>,
    pub(crate) oam: Vec<u8>,

    h_cycle: u32,
    pub(crate) scanline: u16,
    lines_per_frame: u16,
    frame_count: u64,
    in_vblank: bool,
    pal: bool,

    pub(crate) forced_blank: bool,
    pub(crate) brightness: u8,
    pub(crate) obsel: u8,
    oam_reload: u16,
    pub(crate) oam_addr: u16,
    pub(crate) oam_priority_rotate: bool,
    oam_latch: u8,
    pub(crate) bg_mode: u8,
    pub(crate) bg3_priority: bool,
    pub(crate) bg_large_tiles: [bool; 4],
    pub(crate) mosaic_size: u8,
    pub(crate) mosaic_enabled: [bool; 4],
    pub(crate) bg_map_base: [u16; 4],
    pub(crate) bg_map_size: [u8; 4],
    pub(crate) bg_tile_base: [u16; 4],
    pub(crate) bg_hofs: [u16; 4],
    pub(crate) bg_vofs: [u16; 4],
    scroll_prev: u8,
    scroll_prev_h: u8,
    pub(crate) m7: Mode7,
    vram_increment_high: bool,
    vram_step: u16,
    vram_remap: u8,
    pub(crate) vram_addr: u16,
    vram_read_latch: u16,
    pub(crate) cgram_addr: u8,
    cgram_high: bool,
    cgram_latch: u8,
    pub(crate) window_select: [u8; 3],
    pub(crate) window_pos: [u8; 4],
    pub(crate) window_bg_logic: u8,
    pub(crate) window_obj_logic: u8,
    pub(crate) main_screen: u8,
    pub(crate) sub_screen: u8,
    pub(crate) main_window_mask: u8,
    pub(crate) sub_window_mask: u8,
    pub(crate) color_window_select: u8,
    pub(crate) color_math: u8,
    pub(crate) fixed_color: u16,
    pub(crate) setini: u8,

    h_latch: u16,
    v_latch: u16,
    h_latch_high: bool,
    v_latch_high: bool,
    counters_latched: bool,
    ppu1_open_bus: u8,
    ppu2_open_bus: u8,
    pub(crate) range_over: bool,
    pub(crate) time_over: bool,

    pub(crate) frame: Vec<u8>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_WORDS],
            cgram: vec![0; CGRAM_COLORS],
            oam: vec![0; OAM_SIZE],
            h_cycle: 0,
            scanline: 0,
            lines_per_frame: LINES_PER_FRAME_NTSC,
            frame_count: 0,
            in_vblank: false,
            pal: false,
            forced_blank: true,
            brightness: 0,
            obsel: 0,
            oam_reload: 0,
            oam_addr: 0,
            oam_priority_rotate: false,
            oam_latch: 0,
            bg_mode: 0,
            bg3_priority: false,
            bg_large_tiles: [false; 4],
            mosaic_size: 1,
            mosaic_enabled: [false; 4],
            bg_map_base: [0; 4],
            bg_map_size: [0; 4],
            bg_tile_base: [0; 4],
            bg_hofs: [0; 4],
            bg_vofs: [0; 4],
            scroll_prev: 0,
            scroll_prev_h: 0,
            m7: Mode7::default(),
            vram_increment_high: false,
            vram_step: 1,
            vram_remap: 0,
            vram_addr: 0,
            vram_read_latch: 0,
            cgram_addr: 0,
            cgram_high: false,
            cgram_latch: 0,
            window_select: [0; 3],
            window_pos: [0; 4],
            window_bg_logic: 0,
            window_obj_logic: 0,
            main_screen: 0,
            sub_screen: 0,
            main_window_mask: 0,
            sub_window_mask: 0,
            color_window_select: 0,
            color_math: 0,
            fixed_color: 0,
            setini: 0,
            h_latch: 0,
            v_latch: 0,
            h_latch_high: false,
            v_latch_high: false,
            counters_latched: false,
            ppu1_open_bus: 0,
            ppu2_open_bus: 0,
            range_over: false,
            time_over: false,
            frame: vec![0; FRAME_WIDTH * FRAME_HEIGHT * 4],
        }
    }

    /// Power-cycle state. `hard` also clears the video memories.
    pub fn reset(&mut self, hard: bool) {
        let pal = self.pal;
        if hard {
            *self = Self::new();
        } else {
            let vram = std::mem::take(&mut self.vram);
            let cgram = std::mem::take(&mut self.cgram);
            let oam = std::mem::take(&mut self.oam);
            let frame = std::mem::take(&mut self.frame);
            *self = Self {
                vram,
                cgram,
                oam,
                frame,
                ..Self::new()
            };
        }
        self.set_pal(pal);
    }

    pub fn set_pal(&mut self, pal: bool) {
        self.pal = pal;
        self.lines_per_frame = if pal {
            LINES_PER_FRAME_PAL
        } else {
            LINES_PER_FRAME_NTSC
        };
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn h_cycle(&self) -> u32 {
        self.h_cycle
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn lines_per_frame(&self) -> u16 {
        self.lines_per_frame
    }

    pub fn in_vblank(&self) -> bool {
        self.in_vblank
    }

    pub fn in_hblank(&self) -> bool {
        self.h_cycle >= HBLANK_START_CYCLE
    }

    /// First V-blank line: 225 normally, 240 with SETINI overscan.
    pub fn vblank_line(&self) -> u16 {
        if self.setini & SETINI_OVERSCAN != 0 {
            240
        } else {
            225
        }
    }

    pub fn frame_rgba(&self) -> &[u8] {
        &self.frame
    }

    /// Master cycles until the next H-blank or line boundary.
    pub fn cycles_to_next_event(&self) -> u32 {
        if self.h_cycle < HBLANK_START_CYCLE {
            HBLANK_START_CYCLE - self.h_cycle
        } else {
            MASTER_CYCLES_PER_LINE - self.h_cycle
        }
    }

    /// Advance the beam by `cycles` master cycles. Callers split their budget
    /// with [`Ppu::cycles_to_next_event`] so at most one boundary is crossed.
    pub fn step(&mut self, cycles: u32) -> PpuEvents {
        let mut events = PpuEvents::default();
        let before = self.h_cycle;
        self.h_cycle += cycles;
        if before < HBLANK_START_CYCLE && self.h_cycle >= HBLANK_START_CYCLE {
            events.hblank_start = true;
        }
        if self.h_cycle >= MASTER_CYCLES_PER_LINE {
            self.h_cycle -= MASTER_CYCLES_PER_LINE;
            self.scanline += 1;
            events.line_start = true;
            if self.scanline >= self.lines_per_frame {
                self.scanline = 0;
                self.frame_count += 1;
                self.in_vblank = false;
                events.frame_start = true;
                if !self.forced_blank {
                    self.range_over = false;
                    self.time_over = false;
                }
            } else if self.scanline == self.vblank_line() {
                self.in_vblank = true;
                events.vblank_start = true;
                if !self.forced_blank {
                    self.oam_addr = self.oam_reload;
                }
            }
        }
        events
    }

    fn vram_writable(&self) -> bool {
        self.forced_blank || self.in_vblank
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        log::trace!("PPU write {addr:04X} <= {value:02X}");
        match addr {
            INIDISP => {
                let was_blank = self.forced_blank;
                self.forced_blank = value & 0x80 != 0;
                self.brightness = value & 0x0F;
                if was_blank && !self.forced_blank && self.scanline == self.vblank_line() {
                    self.oam_addr = self.oam_reload;
                }
            }
            OBSEL => self.obsel = value,
            OAMADDL => {
                self.oam_reload = (self.oam_reload & 0x200) | ((value as u16) << 1);
                self.oam_addr = self.oam_reload;
            }
            OAMADDH => {
                self.oam_reload = (self.oam_reload & 0x1FE) | (((value & 0x01) as u16) << 9);
                self.oam_priority_rotate = value & 0x80 != 0;
                self.oam_addr = self.oam_reload;
            }
            OAMDATA => self.write_oam(value),
            BGMODE => {
                self.bg_mode = value & 0x07;
                self.bg3_priority = value & 0x08 != 0;
                for (layer, large) in self.bg_large_tiles.iter_mut().enumerate() {
                    *large = value & (0x10 << layer) != 0;
                }
            }
            MOSAIC => {
                self.mosaic_size = (value >> 4) + 1;
                for (layer, enabled) in self.mosaic_enabled.iter_mut().enumerate() {
                    *enabled = value & (1 << layer) != 0;
                }
            }
            0x2107..=0x210A => {
                let layer = (addr - BG1SC) as usize;
                self.bg_map_base[layer] = ((value as u16) & 0xFC) << 8;
                self.bg_map_size[layer] = value & 0x03;
            }
            BG12NBA => {
                self.bg_tile_base[0] = ((value as u16) & 0x0F) << 12;
                self.bg_tile_base[1] = ((value as u16) >> 4) << 12;
            }
            BG34NBA => {
                self.bg_tile_base[2] = ((value as u16) & 0x0F) << 12;
                self.bg_tile_base[3] = ((value as u16) >> 4) << 12;
            }
            BG1HOFS..=BG4VOFS => self.write_scroll(addr, value),
            VMAIN => {
                self.vram_increment_high = value & 0x80 != 0;
                self.vram_remap = (value >> 2) & 0x03;
                self.vram_step = match value & 0x03 {
                    0 => 1,
                    1 => 32,
                    _ => 128,
                };
            }
            VMADDL => {
                self.vram_addr = (self.vram_addr & 0xFF00) | value as u16;
                self.prefetch_vram();
            }
            VMADDH => {
                self.vram_addr = (self.vram_addr & 0x00FF) | ((value as u16) << 8);
                self.prefetch_vram();
            }
            VMDATAL => {
                if self.vram_writable() {
                    let index = self.vram_index();
                    self.vram[index] = (self.vram[index] & 0xFF00) | value as u16;
                }
                if !self.vram_increment_high {
                    self.vram_addr = self.vram_addr.wrapping_add(self.vram_step);
                }
            }
            VMDATAH => {
                if self.vram_writable() {
                    let index = self.vram_index();
                    self.vram[index] = (self.vram[index] & 0x00FF) | ((value as u16) << 8);
                }
                if self.vram_increment_high {
                    self.vram_addr = self.vram_addr.wrapping_add(self.vram_step);
                }
            }
            M7SEL => self.m7.settings = value,
            M7A..=M7Y => self.write_mode7(addr, value),
            CGADD => {
                self.cgram_addr = value;
                self.cgram_high = false;
            }
            CGDATA => {
                if self.cgram_high {
                    let color = (((value & 0x7F) as u16) << 8) | self.cgram_latch as u16;
                    self.cgram[self.cgram_addr as usize] = color;
                    self.cgram_addr = self.cgram_addr.wrapping_add(1);
                } else {
                    self.cgram_latch = value;
                }
                self.cgram_high = !self.cgram_high;
            }
            0x2123..=WOBJSEL => self.window_select[(addr - W12SEL) as usize] = value,
            WH0..=WH3 => self.window_pos[(addr - WH0) as usize] = value,
            WBGLOG => self.window_bg_logic = value,
            WOBJLOG => self.window_obj_logic = value,
            TM => self.main_screen = value & 0x1F,
            TS => self.sub_screen = value & 0x1F,
            TMW => self.main_window_mask = value & 0x1F,
            TSW => self.sub_window_mask = value & 0x1F,
            CGWSEL => self.color_window_select = value,
            CGADSUB => self.color_math = value,
            COLDATA => {
                let intensity = (value & 0x1F) as u16;
                if value & 0x20 != 0 {
                    self.fixed_color = (self.fixed_color & !0x001F) | intensity;
                }
                if value & 0x40 != 0 {
                    self.fixed_color = (self.fixed_color & !0x03E0) | (intensity << 5);
                }
                if value & 0x80 != 0 {
                    self.fixed_color = (self.fixed_color & !0x7C00) | (intensity << 10);
                }
            }
            SETINI => self.setini = value,
            _ => log::trace!("PPU write to read-only/unused register {addr:04X}"),
        }
    }

    /// Read $2100-$213F. Write-only registers return PPU1 open bus.
    pub fn read_register(&mut self, addr: u16) -> u8 {
        let value = match addr {
            MPYL | MPYM | MPYH => {
                let product = self.mode7_product();
                let shift = (addr - MPYL) * 8;
                (product >> shift) as u8
            }
            SLHV => {
                self.latch_counters();
                self.ppu1_open_bus
            }
            RDOAM => self.read_oam(),
            RDVRAML => {
                let value = self.vram_read_latch as u8;
                if !self.vram_increment_high {
                    self.prefetch_vram();
                    self.vram_addr = self.vram_addr.wrapping_add(self.vram_step);
                }
                value
            }
            RDVRAMH => {
                let value = (self.vram_read_latch >> 8) as u8;
                if self.vram_increment_high {
                    self.prefetch_vram();
                    self.vram_addr = self.vram_addr.wrapping_add(self.vram_step);
                }
                value
            }
            RDCGRAM => {
                let color = self.cgram[self.cgram_addr as usize];
                let value = if self.cgram_high {
                    self.cgram_addr = self.cgram_addr.wrapping_add(1);
                    ((color >> 8) as u8 & 0x7F) | (self.ppu2_open_bus & 0x80)
                } else {
                    color as u8
                };
                self.cgram_high = !self.cgram_high;
                value
            }
            OPHCT => {
                let value = if self.h_latch_high {
                    ((self.h_latch >> 8) as u8 & 0x01) | (self.ppu2_open_bus & 0xFE)
                } else {
                    self.h_latch as u8
                };
                self.h_latch_high = !self.h_latch_high;
                value
            }
            OPVCT => {
                let value = if self.v_latch_high {
                    ((self.v_latch >> 8) as u8 & 0x01) | (self.ppu2_open_bus & 0xFE)
                } else {
                    self.v_latch as u8
                };
                self.v_latch_high = !self.v_latch_high;
                value
            }
            STAT77 => {
                (u8::from(self.time_over) << 7)
                    | (u8::from(self.range_over) << 6)
                    | (self.ppu1_open_bus & 0x10)
                    | PPU1_VERSION
            }
            STAT78 => {
                self.h_latch_high = false;
                self.v_latch_high = false;
                let value = (u8::from(self.counters_latched) << 6)
                    | (u8::from(self.pal) << 4)
                    | (self.ppu2_open_bus & 0x20)
                    | PPU2_VERSION;
                self.counters_latched = false;
                value
            }
            _ => return self.ppu1_open_bus,
        };
        match addr {
            MPYL..=RDOAM | RDVRAML | RDVRAMH | STAT77 => self.ppu1_open_bus = value,
            _ => self.ppu2_open_bus = value,
        }
        value
    }

    /// SLHV: freeze the H/V counters for OPHCT/OPVCT.
    pub fn latch_counters(&mut self) {
        self.h_latch = (self.h_cycle / MASTER_CYCLES_PER_DOT) as u16;
        self.v_latch = self.scanline;
        self.counters_latched = true;
    }

    fn mode7_product(&self) -> u32 {
        let product = self.m7.a as i32 * ((self.m7.b >> 8) as i8) as i32;
        (product as u32) & 0x00FF_FFFF
    }

    fn write_scroll(&mut self, addr: u16, value: u8) {
        let index = (addr - BG1HOFS) as usize;
        let layer = index / 2;
        if index % 2 == 0 {
            self.bg_hofs[layer] = (((value as u16) << 8)
                | (self.scroll_prev & !0x07) as u16
                | (self.scroll_prev_h & 0x07) as u16)
                & 0x03FF;
            self.scroll_prev_h = value;
            if layer == 0 {
                self.m7.hofs = sign_extend_13(((value as u16) << 8) | self.m7.latch as u16);
                self.m7.latch = value;
            }
        } else {
            self.bg_vofs[layer] = (((value as u16) << 8) | self.scroll_prev as u16) & 0x03FF;
            if layer == 0 {
                self.m7.vofs = sign_extend_13(((value as u16) << 8) | self.m7.latch as u16);
                self.m7.latch = value;
            }
        }
        self.scroll_prev = value;
    }

    fn write_mode7(&mut self, addr: u16, value: u8) {
        let word = ((value as u16) << 8) | self.m7.latch as u16;
        self.m7.latch = value;
        match addr - M7A {
            0 => self.m7.a = word as i16,
            1 => self.m7.b = word as i16,
            2 => self.m7.c = word as i16,
            3 => self.m7.d = word as i16,
            4 => self.m7.x = sign_extend_13(word),
            _ => self.m7.y = sign_extend_13(word),
        }
    }

    fn vram_index(&self) -> usize {
        let addr = self.vram_addr;
        let remapped = match self.vram_remap {
            0 => addr,
            1 => (addr & 0xFF00) | ((addr & 0x001F) << 3) | ((addr >> 5) & 0x07),
            2 => (addr & 0xFE00) | ((addr & 0x003F) << 3) | ((addr >> 6) & 0x07),
            _ => (addr & 0xFC00) | ((addr & 0x007F) << 3) | ((addr >> 7) & 0x07),
        };
        (remapped as usize) & (VRAM_WORDS - 1)
    }

    fn prefetch_vram(&mut self) {
        self.vram_read_latch = self.vram[self.vram_index()];
    }

    fn write_oam(&mut self, value: u8) {
        let addr = self.oam_addr as usize;
        if self.vram_writable() {
            if addr >= 0x200 {
                self.oam[0x200 | (addr & 0x1F)] = value;
            } else if addr & 1 == 0 {
                self.oam_latch = value;
            } else {
                self.oam[addr - 1] = self.oam_latch;
                self.oam[addr] = value;
            }
        }
        self.oam_addr = (self.oam_addr + 1) & 0x3FF;
    }

    fn read_oam(&mut self) -> u8 {
        let addr = self.oam_addr as usize;
        let value = if addr >= 0x200 {
            self.oam[0x200 | (addr & 0x1F)]
        } else {
            self.oam[addr]
        };
        self.oam_addr = (self.oam_addr + 1) & 0x3FF;
        value
    }
}

fn sign_extend_13(value: u16) -> i16 {
    ((value << 3) as i16) >> 3
}
