use super::io::{
    HDMAEN, HTIMEL, HVBJOY, JOY1L, NMITIMEN, RDDIVH, RDDIVL, RDMPYH, RDMPYL, RDNMI, TIMEUP,
    VTIMEL, WRDIVB, WRDIVH, WRDIVL, WRMPYA, WRMPYB,
};
use super::*;
use crate::input::Button;
use crate::ppu::MASTER_CYCLES_PER_LINE;

fn test_bus() -> Bus {
    let cart = Cartridge::load(&vec![0u8; 0x8000], None).unwrap();
    Bus::new(cart)
}

#[test]
fn wram_low_mirror_and_full_banks() {
    let mut bus = test_bus();
    bus.write(0x00_0010, 0x5A);
    assert_eq!(bus.read(0x7E_0010), 0x5A);
    assert_eq!(bus.read(0x80_0010), 0x5A);
    assert_eq!(bus.read(0x3F_0010), 0x5A);

    bus.write(0x7F_FFFF, 0x77);
    assert_eq!(bus.wram()[WRAM_SIZE - 1], 0x77);
    assert_eq!(bus.peek(0x7F_FFFF), 0x77);
}

#[test]
fn wram_port_auto_increments() {
    let mut bus = test_bus();
    bus.write(0x00_2181, 0x00);
    bus.write(0x00_2182, 0x00);
    bus.write(0x00_2183, 0x01);
    bus.write(0x00_2180, 0xAB);
    bus.write(0x00_2180, 0xCD);
    assert_eq!(bus.read(0x7F_0000), 0xAB);
    assert_eq!(bus.read(0x7F_0001), 0xCD);

    bus.write(0x00_2183, 0x01);
    bus.write(0x00_2181, 0x00);
    bus.write(0x00_2182, 0x00);
    assert_eq!(bus.read(0x00_2180), 0xAB);
    assert_eq!(bus.read(0x00_2180), 0xCD);
}

#[test]
fn unmapped_reads_return_zero() {
    let mut bus = test_bus();
    assert_eq!(bus.read(0x00_5000), 0);
    assert_eq!(bus.read(0x00_2190), 0);
    bus.write(0x00_5000, 0xFF);
}

#[test]
fn write_only_ppu_registers_read_back_ppu1_open_bus() {
    let mut bus = test_bus();
    for (addr, value) in [(0x211B, 0x03), (0x211B, 0x00), (0x211C, 0x00), (0x211C, 0x05)] {
        bus.write(addr, value);
    }
    assert_eq!(bus.read(0x00_2134), 15);
    assert_eq!(bus.read(0x00_2104), 15);
    assert_eq!(bus.read(0x80_2133), 15);
}

#[test]
fn hardware_multiply_and_divide() {
    let mut bus = test_bus();
    bus.write(WRMPYA as u32, 12);
    bus.write(WRMPYB as u32, 10);
    assert_eq!(bus.read(RDMPYL as u32), 120);
    assert_eq!(bus.read(RDMPYH as u32), 0);

    bus.write(WRDIVL as u32, 0xE8);
    bus.write(WRDIVH as u32, 0x03);
    bus.write(WRDIVB as u32, 7);
    assert_eq!(bus.read(RDDIVL as u32), 142);
    assert_eq!(bus.read(RDDIVH as u32), 0);
    assert_eq!(bus.read(RDMPYL as u32), 6);

    bus.write(WRDIVB as u32, 0);
    assert_eq!(bus.read(RDDIVL as u32), 0xFF);
    assert_eq!(bus.read(RDDIVH as u32), 0xFF);
    assert_eq!(bus.read(RDMPYL as u32), 0xE8);
    assert_eq!(bus.read(RDMPYH as u32), 0x03);
}

#[test]
fn access_cycles_follow_region_and_memsel() {
    let mut bus = test_bus();
    assert_eq!(bus.access_cycles(0x00_0000), 8);
    assert_eq!(bus.access_cycles(0x00_2100), 6);
    assert_eq!(bus.access_cycles(0x00_4016), 12);
    assert_eq!(bus.access_cycles(0x00_4200), 6);
    assert_eq!(bus.access_cycles(0x00_8000), 8);
    assert_eq!(bus.access_cycles(0x80_8000), 8);
    assert_eq!(bus.access_cycles(0x7E_0000), 8);
    assert_eq!(bus.access_cycles(0xC0_0000), 8);

    bus.write(0x00_420D, 0x01);
    assert_eq!(bus.access_cycles(0x80_8000), 6);
    assert_eq!(bus.access_cycles(0xC0_0000), 6);
    assert_eq!(bus.access_cycles(0x00_8000), 8);
    assert_eq!(bus.access_cycles(0x40_0000), 8);
}

#[test]
fn gp_dma_copies_wram_into_vram() {
    let mut bus = test_bus();
    bus.write(0x7E_1000, 0x11);
    bus.write(0x7E_1001, 0x22);
    bus.write(0x7E_1002, 0x33);
    bus.write(0x7E_1003, 0x44);
    bus.write(0x00_2115, 0x80);
    bus.write(0x00_2116, 0x00);
    bus.write(0x00_2117, 0x00);

    bus.write(0x00_4300, 0x01);
    bus.write(0x00_4301, 0x18);
    bus.write(0x00_4302, 0x00);
    bus.write(0x00_4303, 0x10);
    bus.write(0x00_4304, 0x7E);
    bus.write(0x00_4305, 0x04);
    bus.write(0x00_4306, 0x00);
    bus.write(0x00_420B, 0x01);

    assert_eq!(bus.ppu.vram[0], 0x2211);
    assert_eq!(bus.ppu.vram[1], 0x4433);
    assert_eq!(bus.read(0x00_4305), 0);
    assert_eq!(bus.read(0x00_4302), 0x04);
    assert_eq!(bus.take_dma_cycles(), 12 + 8 + 4 * 8);
    assert_eq!(bus.take_dma_cycles(), 0);
}

#[test]
fn vblank_raises_nmi_when_enabled() {
    let mut bus = test_bus();
    bus.write(NMITIMEN as u32, 0x80);
    bus.tick(MASTER_CYCLES_PER_LINE * 224);
    assert!(!bus.take_nmi());
    bus.tick(MASTER_CYCLES_PER_LINE);
    assert!(bus.take_nmi());
    assert!(!bus.take_nmi());
    assert_eq!(bus.read(RDNMI as u32) & 0x80, 0x80);
    assert_eq!(bus.read(RDNMI as u32) & 0x80, 0x00);
    assert_ne!(bus.read(HVBJOY as u32) & 0x80, 0);
}

#[test]
fn enabling_nmi_inside_vblank_fires_immediately() {
    let mut bus = test_bus();
    bus.tick(MASTER_CYCLES_PER_LINE * 226);
    assert!(!bus.take_nmi());
    bus.write(NMITIMEN as u32, 0x80);
    assert!(bus.take_nmi());
}

#[test]
fn v_timer_irq_fires_at_line_start() {
    let mut bus = test_bus();
    bus.write(VTIMEL as u32, 10);
    bus.write(VTIMEL as u32 + 1, 0);
    bus.write(NMITIMEN as u32, 0x20);
    bus.tick(MASTER_CYCLES_PER_LINE * 10);
    assert!(!bus.irq_line());
    bus.tick(4);
    assert!(bus.irq_line());
    assert_eq!(bus.read(TIMEUP as u32), 0x80);
    assert!(!bus.irq_line());
}

#[test]
fn h_timer_irq_fires_every_line() {
    let mut bus = test_bus();
    bus.write(HTIMEL as u32, 100);
    bus.write(HTIMEL as u32 + 1, 0);
    bus.write(NMITIMEN as u32, 0x10);
    bus.tick(399);
    assert!(!bus.irq_line());
    bus.tick(2);
    assert!(bus.irq_line());
    bus.read(TIMEUP as u32);
    bus.tick(MASTER_CYCLES_PER_LINE);
    assert!(bus.irq_line());
}

#[test]
fn disabling_timer_irq_acknowledges_it() {
    let mut bus = test_bus();
    bus.write(HTIMEL as u32, 0);
    bus.write(HTIMEL as u32 + 1, 0);
    bus.write(NMITIMEN as u32, 0x10);
    bus.tick(8);
    assert!(bus.irq_line());
    bus.write(NMITIMEN as u32, 0x00);
    assert!(!bus.irq_line());
}

#[test]
fn auto_joypad_read_latches_at_vblank() {
    let mut bus = test_bus();
    bus.joypads[0].set(Button::A, true);
    bus.joypads[1].set(Button::B, true);
    bus.write(NMITIMEN as u32, 0x01);
    bus.tick(MASTER_CYCLES_PER_LINE * 225);
    assert_eq!(bus.read(JOY1L as u32), 0x80);
    assert_eq!(bus.read(JOY1L as u32 + 1), 0x00);
    assert_eq!(bus.read(JOY1L as u32 + 3), 0x80);
    assert_eq!(bus.read(HVBJOY as u32) & 0x01, 0x01);
    bus.tick(AUTO_JOYPAD_CYCLES);
    assert_eq!(bus.read(HVBJOY as u32) & 0x01, 0x00);
}

#[test]
fn manual_joypad_shifts_out_msb_first() {
    let mut bus = test_bus();
    bus.joypads[0].set(Button::B, true);
    bus.joypads[0].set(Button::R, true);
    bus.write(0x00_4016, 0x01);
    bus.write(0x00_4016, 0x00);
    let bits: Vec<u8> = (0..16).map(|_| bus.read(0x00_4016)).collect();
    assert_eq!(bits[0], 1);
    assert_eq!(&bits[1..11], &[0; 10]);
    assert_eq!(bits[11], 1);
    assert_eq!(&bits[12..], &[0; 4]);
    assert_eq!(bus.read(0x00_4016), 1);
}

#[test]
fn hdma_writes_one_entry_per_line() {
    let mut bus = test_bus();
    for (i, byte) in [0x01, 0x0F, 0x01, 0x05, 0x00].into_iter().enumerate() {
        bus.write(0x7E_2000 + i as u32, byte);
    }
    bus.write(0x00_4300, 0x00);
    bus.write(0x00_4301, 0x00);
    bus.write(0x00_4302, 0x00);
    bus.write(0x00_4303, 0x20);
    bus.write(0x00_4304, 0x7E);
    bus.write(HDMAEN as u32, 0x01);

    let frame = bus.cycles_per_frame();
    bus.tick(frame);
    assert_eq!(bus.ppu.scanline(), 0);
    bus.tick(1100);
    assert_eq!(bus.ppu.brightness, 0x0F);
    assert!(!bus.ppu.forced_blank);
    bus.tick(MASTER_CYCLES_PER_LINE);
    assert_eq!(bus.ppu.brightness, 0x05);
    assert!(bus.dma[0].hdma_terminated);
}

#[test]
fn apu_ipl_announces_itself_on_the_ports() {
    let mut bus = test_bus();
    let frame = bus.cycles_per_frame();
    bus.tick(frame);
    assert_eq!(bus.read(0x00_2140), 0xAA);
    assert_eq!(bus.read(0x00_2141), 0xBB);
}

#[test]
fn pal_cartridge_uses_312_lines() {
    let mut rom = vec![0u8; 0x8000];
    rom[0x7FD9] = 0x02;
    let bus = Bus::new(Cartridge::load(&rom, None).unwrap());
    assert_eq!(bus.ppu.lines_per_frame(), 312);
    assert_eq!(bus.master_clock_hz(), PAL_MASTER_CLOCK_HZ);
}
