use super::*;

fn write_vram_word(ppu: &mut Ppu, addr: u16, value: u16) {
    ppu.write_register(VMAIN, 0x80);
    ppu.write_register(VMADDL, addr as u8);
    ppu.write_register(VMADDH, (addr >> 8) as u8);
    ppu.write_register(VMDATAL, value as u8);
    ppu.write_register(VMDATAH, (value >> 8) as u8);
}

fn write_color(ppu: &mut Ppu, index: u8, color: u16) {
    ppu.write_register(CGADD, index);
    ppu.write_register(CGDATA, color as u8);
    ppu.write_register(CGDATA, (color >> 8) as u8);
}

fn pixel(ppu: &Ppu, x: usize, y: usize) -> [u8; 4] {
    let offset = (y * FRAME_WIDTH + x) * 4;
    ppu.frame_rgba()[offset..offset + 4].try_into().unwrap()
}

/// Mode 0 with BG1 showing a solid red 8x8 tile in the top-left map cell.
fn mode0_red_tile() -> Ppu {
    let mut ppu = Ppu::new();
    ppu.write_register(BGMODE, 0x00);
    ppu.write_register(BG1SC, 0x04); // map at word $0400
    ppu.write_register(BG12NBA, 0x00);
    write_vram_word(&mut ppu, 0x0400, 0x0001);
    for row in 0..8 {
        write_vram_word(&mut ppu, 8 + row, 0x00FF);
    }
    write_color(&mut ppu, 1, 0x001F);
    ppu.write_register(TM, 0x01);
    ppu.write_register(INIDISP, 0x0F);
    ppu
}

#[test]
fn vram_writes_are_dropped_during_active_display() {
    let mut ppu = Ppu::new();
    write_vram_word(&mut ppu, 0x1000, 0x1234);
    assert_eq!(ppu.vram[0x1000], 0x1234);
    assert_eq!(ppu.vram_addr, 0x1001);

    ppu.write_register(INIDISP, 0x0F);
    ppu.write_register(VMDATAL, 0xAA);
    ppu.write_register(VMDATAH, 0xBB);
    assert_eq!(ppu.vram[0x1001], 0);
    // The address still advances.
    assert_eq!(ppu.vram_addr, 0x1002);
}

#[test]
fn oam_writes_are_dropped_during_active_display() {
    let mut ppu = Ppu::new();
    ppu.write_register(INIDISP, 0x0F);
    ppu.write_register(OAMADDL, 0x00);
    ppu.write_register(OAMDATA, 0x11);
    ppu.write_register(OAMDATA, 0x22);
    assert_eq!(&ppu.oam[0..2], &[0, 0]);

    ppu.write_register(INIDISP, 0x80);
    ppu.write_register(OAMADDL, 0x00);
    ppu.write_register(OAMDATA, 0x11);
    // The low byte waits for its partner.
    assert_eq!(ppu.oam[0], 0);
    ppu.write_register(OAMDATA, 0x22);
    assert_eq!(&ppu.oam[0..2], &[0x11, 0x22]);
}

#[test]
fn cgram_writes_are_always_accepted() {
    let mut ppu = Ppu::new();
    ppu.write_register(INIDISP, 0x0F);
    write_color(&mut ppu, 5, 0x7FFF);
    assert_eq!(ppu.cgram[5], 0x7FFF);

    ppu.write_register(CGADD, 5);
    assert_eq!(ppu.read_register(RDCGRAM), 0xFF);
    assert_eq!(ppu.read_register(RDCGRAM) & 0x7F, 0x7F);
}

#[test]
fn vram_reads_use_the_prefetch_latch() {
    let mut ppu = Ppu::new();
    ppu.vram[0x20] = 0xBEEF;
    ppu.vram[0x21] = 0x1234;
    ppu.write_register(VMAIN, 0x80);
    ppu.write_register(VMADDL, 0x20);
    ppu.write_register(VMADDH, 0x00);
    assert_eq!(ppu.read_register(RDVRAML), 0xEF);
    assert_eq!(ppu.read_register(RDVRAMH), 0xBE);
    // The latch reloads before the address steps, so reads trail by one word.
    assert_eq!(ppu.read_register(RDVRAML), 0xEF);
    assert_eq!(ppu.read_register(RDVRAMH), 0xBE);
    assert_eq!(ppu.read_register(RDVRAML), 0x34);
    assert_eq!(ppu.read_register(RDVRAMH), 0x12);
}

#[test]
fn vram_increment_step_and_remap() {
    let mut ppu = Ppu::new();
    ppu.write_register(VMAIN, 0x81); // +32 after high byte
    ppu.write_register(VMADDL, 0x00);
    ppu.write_register(VMADDH, 0x00);
    ppu.write_register(VMDATAL, 0x01);
    ppu.write_register(VMDATAH, 0x00);
    assert_eq!(ppu.vram_addr, 32);

    ppu.write_register(VMAIN, 0x04); // 2bpp remap, step 1 after low byte
    ppu.write_register(VMADDL, 0x01);
    ppu.write_register(VMADDH, 0x00);
    ppu.write_register(VMDATAL, 0x55);
    assert_eq!(ppu.vram[8] & 0xFF, 0x55);
    assert_eq!(ppu.vram_addr, 2);
}

#[test]
fn scroll_registers_share_the_write_twice_latch() {
    let mut ppu = Ppu::new();
    ppu.write_register(BG1HOFS, 0x34);
    ppu.write_register(BG1HOFS, 0x01);
    assert_eq!(ppu.bg_hofs[0], 0x134);

    ppu.write_register(BG1HOFS + 1, 0x78);
    ppu.write_register(BG1HOFS + 1, 0x02);
    assert_eq!(ppu.bg_vofs[0], 0x278);
}

#[test]
fn mode7_multiplier_is_signed() {
    let mut ppu = Ppu::new();
    ppu.write_register(M7A, 0x00);
    ppu.write_register(M7A, 0x10);
    ppu.write_register(M7A + 1, 0x00);
    ppu.write_register(M7A + 1, 0x03);
    assert_eq!(ppu.read_register(MPYL), 0x00);
    assert_eq!(ppu.read_register(MPYM), 0x30);
    assert_eq!(ppu.read_register(MPYH), 0x00);

    ppu.write_register(M7A + 1, 0x00);
    ppu.write_register(M7A + 1, 0xFF);
    assert_eq!(ppu.read_register(MPYL), 0x00);
    assert_eq!(ppu.read_register(MPYM), 0xF0);
    assert_eq!(ppu.read_register(MPYH), 0xFF);
}

#[test]
fn one_frame_crosses_each_boundary_once() {
    let mut ppu = Ppu::new();
    let mut remaining = MASTER_CYCLES_PER_LINE * LINES_PER_FRAME_NTSC as u32;
    let (mut vblanks, mut frames, mut lines, mut hblanks) = (0, 0, 0, 0);
    let mut vblank_line = None;
    while remaining > 0 {
        let chunk = remaining.min(ppu.cycles_to_next_event());
        let events = ppu.step(chunk);
        remaining -= chunk;
        if events.vblank_start {
            vblanks += 1;
            vblank_line = Some(ppu.scanline());
            assert!(ppu.in_vblank());
        }
        frames += usize::from(events.frame_start);
        lines += usize::from(events.line_start);
        hblanks += usize::from(events.hblank_start);
    }
    assert_eq!(vblanks, 1);
    assert_eq!(frames, 1);
    assert_eq!(lines, LINES_PER_FRAME_NTSC as usize);
    assert_eq!(hblanks, LINES_PER_FRAME_NTSC as usize);
    assert_eq!(vblank_line, Some(225));
    assert_eq!(ppu.scanline(), 0);
    assert_eq!(ppu.frame_count(), 1);
    assert!(!ppu.in_vblank());
}

#[test]
fn pal_frames_are_312_lines() {
    let mut ppu = Ppu::new();
    ppu.set_pal(true);
    assert_eq!(ppu.lines_per_frame(), 312);
    ppu.set_pal(false);
    assert_eq!(ppu.lines_per_frame(), 262);
}

#[test]
fn counter_latch_reports_dot_and_line() {
    let mut ppu = Ppu::new();
    ppu.step(400);
    ppu.read_register(SLHV);
    assert_eq!(ppu.read_register(OPHCT), 100);
    assert_eq!(ppu.read_register(OPHCT) & 0x01, 0);
    assert_eq!(ppu.read_register(OPVCT), 0);
    assert_ne!(ppu.read_register(STAT78) & 0x40, 0);
    assert_eq!(ppu.read_register(STAT78) & 0x40, 0);
}

#[test]
fn forced_blank_renders_black() {
    let mut ppu = Ppu::new();
    write_color(&mut ppu, 0, 0x7FFF);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0, 0xFF]);
}

#[test]
fn mode0_tile_is_drawn_on_both_frame_rows() {
    let mut ppu = mode0_red_tile();
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0xFF, 0, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 15, 1), [0xFF, 0, 0, 0xFF]);
    // Column 8 falls in the next (empty) map cell: backdrop.
    assert_eq!(pixel(&ppu, 16, 0), [0, 0, 0, 0xFF]);
}

#[test]
fn brightness_scales_output() {
    let mut ppu = mode0_red_tile();
    ppu.write_register(INIDISP, 0x07);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0)[0], 123);
}

#[test]
fn disabled_layer_shows_backdrop() {
    let mut ppu = mode0_red_tile();
    ppu.write_register(TM, 0x00);
    write_color(&mut ppu, 0, 0x7C00);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0xFF, 0xFF]);
}

#[test]
fn window_masks_main_screen_layer() {
    let mut ppu = mode0_red_tile();
    ppu.write_register(W12SEL, 0x02);
    ppu.write_register(WH0, 0);
    ppu.write_register(WH0 + 1, 3);
    ppu.write_register(TMW, 0x01);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 7, 0), [0, 0, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 8, 0), [0xFF, 0, 0, 0xFF]);
}

#[test]
fn fixed_color_addition_on_backdrop() {
    let mut ppu = mode0_red_tile();
    ppu.write_register(TM, 0x00);
    ppu.write_register(COLDATA, 0x20 | 0x1F);
    ppu.write_register(CGADSUB, 0x20);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0xFF, 0, 0, 0xFF]);

    ppu.write_register(CGADSUB, 0x60);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0)[0], 123);
}

#[test]
fn color_subtraction_clamps_at_zero() {
    let mut ppu = mode0_red_tile();
    ppu.write_register(COLDATA, 0xE0 | 0x1F);
    ppu.write_register(CGADSUB, 0x81);
    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0, 0xFF]);
}

#[test]
fn sprite_is_drawn_one_line_below_its_y() {
    let mut ppu = Ppu::new();
    for index in 0..128 {
        ppu.oam[index * 4 + 1] = 0xF0;
    }
    ppu.oam[0] = 10;
    ppu.oam[1] = 0;
    ppu.oam[2] = 2;
    ppu.oam[3] = 0x30;
    // Tile 2, row 1, plane 0 solid.
    ppu.vram[32 + 1] = 0x00FF;
    ppu.cgram[128 + 1] = 0x03E0;
    ppu.write_register(TM, 0x10);
    ppu.write_register(INIDISP, 0x0F);

    ppu.render_scanline(1);
    assert_eq!(pixel(&ppu, 20, 0), [0, 0xFF, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 35, 0), [0, 0xFF, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 36, 0), [0, 0, 0, 0xFF]);
    assert_eq!(pixel(&ppu, 19, 0), [0, 0, 0, 0xFF]);
    assert!(!ppu.range_over);
    assert!(!ppu.time_over);
}

#[test]
fn more_than_32_sprites_on_a_line_sets_range_over() {
    let mut ppu = Ppu::new();
    ppu.write_register(INIDISP, 0x0F);
    // All 128 entries sit at (0, 0) after power-on.
    ppu.evaluate_sprites(1);
    assert!(ppu.range_over);
    assert_ne!(ppu.read_register(STAT77) & 0x40, 0);
}

#[test]
fn soft_reset_keeps_video_memory() {
    let mut ppu = mode0_red_tile();
    ppu.reset(false);
    assert_eq!(ppu.cgram[1], 0x001F);
    assert!(ppu.forced_blank);
    ppu.reset(true);
    assert_eq!(ppu.cgram[1], 0);
}
