// Scanline compositor: BG modes 0-7, sprites, windows, color math and
// brightness. One call produces two identical rows of the 512x480 frame.

use super::{FRAME_WIDTH, Ppu, SETINI_EXTBG, SETINI_PSEUDO_HIRES};

const OBJ: usize = 4;
const BACKDROP: usize = 5;
const COLOR_WINDOW: usize = 5;
const MAX_SPRITES_PER_LINE: usize = 32;
const MAX_SPRITE_TILES_PER_LINE: usize = 34;
const OBJ_PALETTE_BASE: usize = 128;

/// (small w, small h, large w, large h) indexed by OBSEL bits 5-7.
const OBJ_SIZES: [(u16, u16, u16, u16); 8] = [
    (8, 8, 16, 16),
    (8, 8, 32, 32),
    (8, 8, 64, 64),
    (16, 16, 32, 32),
    (16, 16, 64, 64),
    (32, 32, 64, 64),
    (16, 32, 32, 64),
    (16, 32, 32, 32),
];

#[derive(Clone, Copy, Default)]
struct BgPixel {
    color: u16,
    priority: bool,
    opaque: bool,
}

#[derive(Clone, Copy, Default)]
struct ObjPixel {
    color: u16,
    priority: u8,
    math: bool,
    opaque: bool,
}

#[derive(Clone, Copy)]
struct Pixel {
    color: u16,
    depth: u8,
    layer: usize,
    math: bool,
}

/// Front-to-back ordering keys; higher draws in front, the backdrop is 0.
struct Depths {
    bg: [[u8; 2]; 4],
    obj: [u8; 4],
}

fn depths(mode: u8, bg3_priority: bool) -> Depths {
    match mode {
        0 => Depths {
            bg: [[8, 11], [7, 10], [2, 5], [1, 4]],
            obj: [3, 6, 9, 12],
        },
        1 if bg3_priority => Depths {
            bg: [[5, 8], [4, 7], [1, 10], [0, 0]],
            obj: [2, 3, 6, 9],
        },
        1 => Depths {
            bg: [[6, 9], [5, 8], [1, 3], [0, 0]],
            obj: [2, 4, 7, 10],
        },
        2..=5 => Depths {
            bg: [[3, 7], [1, 5], [0, 0], [0, 0]],
            obj: [2, 4, 6, 8],
        },
        6 => Depths {
            bg: [[2, 5], [0, 0], [0, 0], [0, 0]],
            obj: [1, 3, 4, 6],
        },
        _ => Depths {
            bg: [[3, 3], [1, 5], [0, 0], [0, 0]],
            obj: [2, 4, 6, 7],
        },
    }
}

/// Bits per pixel of each BG in modes 0-6; `None` when the layer is absent.
fn bg_bpp(mode: u8, layer: usize) -> Option<u8> {
    let table: [Option<u8>; 4] = match mode {
        0 => [Some(2), Some(2), Some(2), Some(2)],
        1 => [Some(4), Some(4), Some(2), None],
        2 => [Some(4), Some(4), None, None],
        3 => [Some(8), Some(4), None, None],
        4 => [Some(8), Some(2), None, None],
        5 => [Some(4), Some(2), None, None],
        6 => [Some(4), None, None, None],
        _ => [None; 4],
    };
    table[layer]
}

fn direct_color(index: u8, palette: u8) -> u16 {
    let r = (((index & 0x07) << 2) | ((palette & 0x01) << 1)) as u16;
    let g = ((((index >> 3) & 0x07) << 2) | (palette & 0x02)) as u16;
    let b = ((((index >> 6) & 0x03) << 3) | (palette & 0x04)) as u16;
    r | (g << 5) | (b << 10)
}

fn expand_channel(value: u16, brightness: u8) -> u8 {
    let scaled = (value as u32 * (brightness as u32 + 1)) >> 4;
    ((scaled << 3) | (scaled >> 2)) as u8
}

impl Ppu {
    /// Composite visible line `line` (1-based) into the frame buffer.
    pub fn render_scanline(&mut self, line: u16) {
        if line == 0 {
            return;
        }
        let row = (line - 1) as usize;
        if row * 2 + 1 >= super::FRAME_HEIGHT {
            return;
        }

        let blank = self.forced_blank;
        let mut colors = vec![0u16; FRAME_WIDTH];
        if !blank {
            self.composite_line(line, &mut colors);
        }

        let brightness = self.brightness;
        for half in 0..2 {
            let start = ((row * 2 + half) * FRAME_WIDTH) * 4;
            let out = &mut self.frame[start..start + FRAME_WIDTH * 4];
            for (pixel, &color) in out.chunks_exact_mut(4).zip(colors.iter()) {
                if blank {
                    pixel.copy_from_slice(&[0, 0, 0, 0xFF]);
                    continue;
                }
                pixel[0] = expand_channel(color & 0x1F, brightness);
                pixel[1] = expand_channel((color >> 5) & 0x1F, brightness);
                pixel[2] = expand_channel((color >> 10) & 0x1F, brightness);
                pixel[3] = 0xFF;
            }
        }
    }

    /// Sprite range/time evaluation without drawing, so STAT77 stays correct
    /// when frames are not rendered.
    pub fn evaluate_sprites(&mut self, line: u16) {
        if line == 0 || self.forced_blank {
            return;
        }
        self.sprite_line(line);
    }

    fn composite_line(&mut self, line: u16, colors: &mut [u16]) {
        let hires = matches!(self.bg_mode, 5 | 6);
        let pseudo_hires = self.setini & SETINI_PSEUDO_HIRES != 0;
        let depths = depths(self.bg_mode, self.bg3_priority);

        let mut layers: [Option<Vec<BgPixel>>; 4] = [None, None, None, None];
        if self.bg_mode == 7 {
            layers[0] = Some(self.mode7_line(line, false));
            if self.setini & SETINI_EXTBG != 0 {
                layers[1] = Some(self.mode7_line(line, true));
            }
        } else {
            for (layer, slot) in layers.iter_mut().enumerate() {
                if let Some(bpp) = bg_bpp(self.bg_mode, layer) {
                    *slot = Some(self.bg_line(layer, bpp, line, hires));
                }
            }
        }
        let objs = self.sprite_line(line);

        for x in 0..256usize {
            let (main_sample, sub_sample) = if hires { (x * 2 + 1, x * 2) } else { (x, x) };
            let main = self.pick_pixel(
                x,
                main_sample,
                &layers,
                &objs,
                &depths,
                self.main_screen,
                self.main_window_mask,
                false,
            );
            let sub = self.pick_pixel(
                x,
                sub_sample,
                &layers,
                &objs,
                &depths,
                self.sub_screen,
                self.sub_window_mask,
                true,
            );
            let blended = self.blend(x, main, sub);
            if hires || pseudo_hires {
                colors[x * 2] = sub.color;
                colors[x * 2 + 1] = blended;
            } else {
                colors[x * 2] = blended;
                colors[x * 2 + 1] = blended;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn pick_pixel(
        &self,
        x: usize,
        sample: usize,
        layers: &[Option<Vec<BgPixel>>; 4],
        objs: &[ObjPixel],
        depths: &Depths,
        enabled: u8,
        window_mask: u8,
        sub_screen: bool,
    ) -> Pixel {
        let mut best = Pixel {
            color: if sub_screen { self.fixed_color } else { self.cgram[0] },
            depth: 0,
            layer: BACKDROP,
            math: true,
        };
        for (layer, pixels) in layers.iter().enumerate() {
            let Some(pixels) = pixels else { continue };
            if enabled & (1 << layer) == 0 {
                continue;
            }
            let pixel = pixels[sample.min(pixels.len() - 1)];
            if !pixel.opaque {
                continue;
            }
            if window_mask & (1 << layer) != 0 && self.in_window(layer, x as u16) {
                continue;
            }
            let depth = depths.bg[layer][pixel.priority as usize];
            if depth > best.depth {
                best = Pixel {
                    color: pixel.color,
                    depth,
                    layer,
                    math: true,
                };
            }
        }

        let obj = objs[x];
        if obj.opaque
            && enabled & (1 << OBJ) != 0
            && !(window_mask & (1 << OBJ) != 0 && self.in_window(OBJ, x as u16))
        {
            let depth = depths.obj[obj.priority as usize];
            if depth > best.depth {
                best = Pixel {
                    color: obj.color,
                    depth,
                    layer: OBJ,
                    math: obj.math,
                };
            }
        }
        best
    }

    fn blend(&self, x: usize, main: Pixel, sub: Pixel) -> u16 {
        let inside = self.in_window(COLOR_WINDOW, x as u16);
        let region = |mode: u8| match mode & 0x03 {
            0 => false,
            1 => !inside,
            2 => inside,
            _ => true,
        };
        let black = region(self.color_window_select >> 6);
        let prevent = region(self.color_window_select >> 4);

        let color = if black { 0 } else { main.color };
        let layer_bit = 1u8 << main.layer;
        if prevent || !main.math || self.color_math & layer_bit == 0 {
            return color;
        }

        let use_sub = self.color_window_select & 0x02 != 0;
        let (operand, can_halve) = match (use_sub, sub.layer) {
            (true, BACKDROP) => (self.fixed_color, false),
            (true, _) => (sub.color, true),
            (false, _) => (self.fixed_color, true),
        };
        let subtract = self.color_math & 0x80 != 0;
        let halve = self.color_math & 0x40 != 0 && can_halve && !black;

        let mut out = 0u16;
        for shift in [0, 5, 10] {
            let a = ((color >> shift) & 0x1F) as i32;
            let b = ((operand >> shift) & 0x1F) as i32;
            let mut channel = if subtract { a - b } else { a + b };
            if halve {
                channel >>= 1;
            }
            out |= (channel.clamp(0, 31) as u16) << shift;
        }
        out
    }

    /// Window 1/2 test for `layer` (0-3 BG, 4 OBJ, 5 color window) at column `x`.
    fn in_window(&self, layer: usize, x: u16) -> bool {
        let select = (self.window_select[layer / 2] >> ((layer & 1) * 4)) & 0x0F;
        let logic = if layer < 4 {
            (self.window_bg_logic >> (layer * 2)) & 0x03
        } else {
            (self.window_obj_logic >> ((layer - 4) * 2)) & 0x03
        };
        let w1_enabled = select & 0x02 != 0;
        let w2_enabled = select & 0x08 != 0;
        let in_w1 = (self.window_pos[0] as u16..=self.window_pos[1] as u16).contains(&x)
            ^ (select & 0x01 != 0);
        let in_w2 = (self.window_pos[2] as u16..=self.window_pos[3] as u16).contains(&x)
            ^ (select & 0x04 != 0);
        match (w1_enabled, w2_enabled) {
            (false, false) => false,
            (true, false) => in_w1,
            (false, true) => in_w2,
            (true, true) => match logic {
                0 => in_w1 || in_w2,
                1 => in_w1 && in_w2,
                2 => in_w1 ^ in_w2,
                _ => !(in_w1 ^ in_w2),
            },
        }
    }

    fn map_entry(&self, layer: usize, tx: u16, ty: u16) -> u16 {
        let size = self.bg_map_size[layer];
        let mut addr = self.bg_map_base[layer] as usize
            + (((ty & 0x1F) as usize) << 5)
            + (tx & 0x1F) as usize;
        if size & 0x01 != 0 && tx & 0x20 != 0 {
            addr += 0x400;
        }
        if size & 0x02 != 0 && ty & 0x20 != 0 {
            addr += if size & 0x01 != 0 { 0x800 } else { 0x400 };
        }
        self.vram[addr & 0x7FFF]
    }

    fn tile_pixel(&self, base: usize, bpp: u8, row: u16, col: u16) -> u8 {
        let bit = 7 - col;
        let mut index = 0u8;
        for pair in 0..(bpp as usize / 2) {
            let word = self.vram[(base + pair * 8 + row as usize) & 0x7FFF];
            index |= (((word >> bit) & 1) as u8) << (pair * 2);
            index |= (((word >> (8 + bit)) & 1) as u8) << (pair * 2 + 1);
        }
        index
    }

    /// Scroll pair for one column, with offset-per-tile applied in modes 2, 4 and 6.
    fn column_scroll(&self, layer: usize, screen_x: u16) -> (u16, u16) {
        let mut hofs = self.bg_hofs[layer];
        let mut vofs = self.bg_vofs[layer];
        if !matches!(self.bg_mode, 2 | 4 | 6) {
            return (hofs, vofs);
        }
        let column = (screen_x + (hofs & 0x07)) >> 3;
        if column == 0 {
            return (hofs, vofs);
        }
        let tx = (column - 1) + (self.bg_hofs[2] >> 3);
        let ty = self.bg_vofs[2] >> 3;
        let enable = 0x2000u16 << layer;
        if self.bg_mode == 4 {
            let entry = self.map_entry(2, tx, ty);
            if entry & enable != 0 {
                if entry & 0x8000 != 0 {
                    vofs = entry & 0x03FF;
                } else {
                    hofs = (entry & 0x03F8) | (hofs & 0x07);
                }
            }
        } else {
            let h_entry = self.map_entry(2, tx, ty);
            let v_entry = self.map_entry(2, tx, ty + 1);
            if h_entry & enable != 0 {
                hofs = (h_entry & 0x03F8) | (hofs & 0x07);
            }
            if v_entry & enable != 0 {
                vofs = v_entry & 0x03FF;
            }
        }
        (hofs, vofs)
    }

    fn bg_line(&self, layer: usize, bpp: u8, line: u16, hires: bool) -> Vec<BgPixel> {
        let width = if hires { 512 } else { 256 };
        let large = self.bg_large_tiles[layer];
        let tile_h: u16 = if large { 16 } else { 8 };
        let tile_w: u16 = if large || hires { 16 } else { 8 };
        let mosaic = if self.mosaic_enabled[layer] {
            self.mosaic_size as u16
        } else {
            1
        };
        let screen_y = line - 1;
        let y = screen_y - screen_y % mosaic;
        let palette_offset = if self.bg_mode == 0 { layer * 32 } else { 0 };
        let direct = bpp == 8 && self.color_window_select & 0x01 != 0;

        let mut out = vec![BgPixel::default(); width];
        for (x, pixel) in out.iter_mut().enumerate() {
            let screen_x = if hires { (x / 2) as u16 } else { x as u16 };
            let mx = screen_x - screen_x % mosaic;
            let (hofs, vofs) = self.column_scroll(layer, mx);
            let px = if hires {
                (mx * 2 + (x as u16 & 1)).wrapping_add(hofs * 2)
            } else {
                mx.wrapping_add(hofs)
            };
            let py = y.wrapping_add(vofs);

            let entry = self.map_entry(layer, px / tile_w, py / tile_h);
            let mut fx = px % tile_w;
            let mut fy = py % tile_h;
            if entry & 0x4000 != 0 {
                fx = tile_w - 1 - fx;
            }
            if entry & 0x8000 != 0 {
                fy = tile_h - 1 - fy;
            }
            let character = ((entry & 0x03FF) + (fx / 8) + (fy / 8) * 16) & 0x03FF;
            let base = self.bg_tile_base[layer] as usize + character as usize * (bpp as usize * 4);
            let index = self.tile_pixel(base, bpp, fy % 8, fx % 8);
            if index == 0 {
                continue;
            }
            let palette = ((entry >> 10) & 0x07) as u8;
            let color = match bpp {
                2 => self.cgram[palette_offset + palette as usize * 4 + index as usize],
                4 => self.cgram[palette as usize * 16 + index as usize],
                _ if direct => direct_color(index, palette),
                _ => self.cgram[index as usize],
            };
            *pixel = BgPixel {
                color,
                priority: entry & 0x2000 != 0,
                opaque: true,
            };
        }
        out
    }

    fn mode7_line(&self, line: u16, extbg: bool) -> Vec<BgPixel> {
        let m7 = self.m7;
        let (a, b, c, d) = (m7.a as i32, m7.b as i32, m7.c as i32, m7.d as i32);
        let (cx, cy) = (m7.x as i32, m7.y as i32);
        let repeat = m7.settings >> 6;
        let layer = usize::from(extbg);
        let mosaic = if self.mosaic_enabled[layer] {
            self.mosaic_size as i32
        } else {
            1
        };

        let mut y = (line - 1) as i32;
        y -= y % mosaic;
        if m7.settings & 0x02 != 0 {
            y = 255 - y;
        }
        let clip = |v: i32| if v & 0x2000 != 0 { v | !0x03FF } else { v & 0x03FF };
        let dx = clip(m7.hofs as i32 - cx);
        let dy = clip(m7.vofs as i32 - cy);
        let base_x = ((a * dx) & !63) + ((b * dy) & !63) + ((b * y) & !63) + (cx << 8);
        let base_y = ((c * dx) & !63) + ((d * dy) & !63) + ((d * y) & !63) + (cy << 8);
        let direct = !extbg && self.color_window_select & 0x01 != 0;

        let mut out = vec![BgPixel::default(); 256];
        for (screen_x, pixel) in out.iter_mut().enumerate() {
            let mut x = screen_x as i32;
            x -= x % mosaic;
            if m7.settings & 0x01 != 0 {
                x = 255 - x;
            }
            let vx = (base_x + a * x) >> 8;
            let vy = (base_y + c * x) >> 8;
            let outside = !(0..1024).contains(&vx) || !(0..1024).contains(&vy);
            let tile = match (outside, repeat) {
                (true, 2) => continue,
                (true, 3) => 0,
                _ => {
                    let map_addr = (((vy >> 3) & 0x7F) * 128 + ((vx >> 3) & 0x7F)) as usize;
                    self.vram[map_addr] & 0xFF
                }
            };
            let pixel_addr = (tile as usize * 64) + ((vy & 7) * 8 + (vx & 7)) as usize;
            let raw = (self.vram[pixel_addr & 0x7FFF] >> 8) as u8;
            let index = if extbg { raw & 0x7F } else { raw };
            if index == 0 {
                continue;
            }
            let color = if direct {
                direct_color(index, 0)
            } else {
                self.cgram[index as usize]
            };
            *pixel = BgPixel {
                color,
                priority: extbg && raw & 0x80 != 0,
                opaque: true,
            };
        }
        out
    }

    fn sprite_line(&mut self, line: u16) -> Vec<ObjPixel> {
        let (small_w, small_h, large_w, large_h) = OBJ_SIZES[(self.obsel >> 5) as usize];
        let name_base = ((self.obsel & 0x07) as usize) << 13;
        let name_select = ((((self.obsel >> 3) & 0x03) as usize) + 1) << 12;
        let first = if self.oam_priority_rotate {
            ((self.oam_addr >> 2) & 0x7F) as usize
        } else {
            0
        };

        let mut selected = Vec::with_capacity(MAX_SPRITES_PER_LINE);
        for i in 0..128 {
            let index = (first + i) & 0x7F;
            let (x, y, large) = self.sprite_position(index);
            let (w, h) = if large { (large_w, large_h) } else { (small_w, small_h) };
            if x == -256 || x <= -(w as i32) || x >= 256 {
                continue;
            }
            if (line.wrapping_sub(y) & 0xFF) >= h {
                continue;
            }
            if selected.len() == MAX_SPRITES_PER_LINE {
                self.range_over = true;
                break;
            }
            selected.push((index, x, y, w, h));
        }

        let mut out = vec![ObjPixel::default(); 256];
        let mut tiles = 0usize;
        let mut fetched = Vec::with_capacity(selected.len());
        'fetch: for &(index, x, y, w, h) in &selected {
            let attr = self.oam[index * 4 + 3];
            let tile = self.oam[index * 4 + 2] as usize;
            let mut row = (line.wrapping_sub(y) & 0xFF) as usize;
            if attr & 0x80 != 0 {
                row = h as usize - 1 - row;
            }
            let columns = (w / 8) as usize;
            let mut slivers = Vec::with_capacity(columns);
            for column in 0..columns {
                let sx = x + column as i32 * 8;
                if sx <= -8 || sx >= 256 {
                    continue;
                }
                if tiles == MAX_SPRITE_TILES_PER_LINE {
                    self.time_over = true;
                    fetched.push((index, attr, slivers));
                    break 'fetch;
                }
                tiles += 1;
                let source = if attr & 0x40 != 0 { columns - 1 - column } else { column };
                let chr_y = ((tile >> 4) + row / 8) & 0x0F;
                let chr_x = ((tile & 0x0F) + source) & 0x0F;
                let character = (chr_y << 4) | chr_x;
                let table = if attr & 0x01 != 0 { name_select } else { 0 };
                let addr = (name_base + table + character * 16) & 0x7FFF;
                slivers.push((sx, addr, (row % 8) as u16));
            }
            fetched.push((index, attr, slivers));
        }

        // Lower OAM indices win, so draw the selection back to front.
        for (_, attr, slivers) in fetched.iter().rev() {
            let palette = ((attr >> 1) & 0x07) as usize;
            let priority = (attr >> 4) & 0x03;
            for &(sx, addr, row) in slivers {
                for px in 0..8u16 {
                    let x = sx + px as i32;
                    if !(0..256).contains(&x) {
                        continue;
                    }
                    let col = if attr & 0x40 != 0 { 7 - px } else { px };
                    let index = self.tile_pixel(addr, 4, row, col);
                    if index == 0 {
                        continue;
                    }
                    out[x as usize] = ObjPixel {
                        color: self.cgram[OBJ_PALETTE_BASE + palette * 16 + index as usize],
                        priority,
                        math: palette >= 4,
                        opaque: true,
                    };
                }
            }
        }
        out
    }

    /// (x, y, large) for OAM entry `index`; x is sign-extended from 9 bits.
    fn sprite_position(&self, index: usize) -> (i32, u16, bool) {
        let high = self.oam[0x200 + index / 4] >> ((index % 4) * 2);
        let mut x = self.oam[index * 4] as i32 | (((high & 0x01) as i32) << 8);
        if x >= 256 {
            x -= 512;
        }
        (x, self.oam[index * 4 + 1] as u16, high & 0x02 != 0)
    }
}
