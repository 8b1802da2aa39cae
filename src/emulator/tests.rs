use super::*;

const NMI_HANDLER: usize = 0x0100;
const IRQ_HANDLER: usize = 0x0180;

/// Sets up a red 8x8 tile at the top-left of BG1, turns the screen on and
/// enables NMI with auto-joypad read, then spins. The NMI handler counts
/// frames into $10, scrolls BG1 by that count and copies JOY1H to $11.
#[rustfmt::skip]
const DEMO_PROGRAM: [u8; 93] = [
    0x78,                   // SEI
    0xA9, 0x80,             // LDA #$80
    0x8D, 0x00, 0x21,       // STA INIDISP (forced blank)
    0x9C, 0x21, 0x21,       // STZ CGADD
    0x9C, 0x22, 0x21,       // STZ CGDATA
    0x9C, 0x22, 0x21,       // STZ CGDATA (color 0 black)
    0xA9, 0x1F,             // LDA #$1F
    0x8D, 0x22, 0x21,       // STA CGDATA
    0x9C, 0x22, 0x21,       // STZ CGDATA (color 1 red)
    0x9C, 0x05, 0x21,       // STZ BGMODE
    0xA9, 0x04,             // LDA #$04
    0x8D, 0x07, 0x21,       // STA BG1SC (map at $0400)
    0x9C, 0x0B, 0x21,       // STZ BG12NBA
    0xA9, 0x80,             // LDA #$80
    0x8D, 0x15, 0x21,       // STA VMAIN
    0xA9, 0x08,             // LDA #$08
    0x8D, 0x16, 0x21,       // STA VMADDL
    0x9C, 0x17, 0x21,       // STZ VMADDH (tile 1)
    0xA2, 0x08,             // LDX #$08
    0xA9, 0xFF,             // LDA #$FF
    0x8D, 0x18, 0x21,       // STA VMDATAL
    0x9C, 0x19, 0x21,       // STZ VMDATAH
    0xCA,                   // DEX
    0xD0, 0xF5,             // BNE -11
    0x9C, 0x16, 0x21,       // STZ VMADDL
    0xA9, 0x04,             // LDA #$04
    0x8D, 0x17, 0x21,       // STA VMADDH
    0xA9, 0x01,             // LDA #$01
    0x8D, 0x18, 0x21,       // STA VMDATAL
    0x9C, 0x19, 0x21,       // STZ VMDATAH (map entry 0 = tile 1)
    0xA9, 0x01,             // LDA #$01
    0x8D, 0x2C, 0x21,       // STA TM
    0xA9, 0x0F,             // LDA #$0F
    0x8D, 0x00, 0x21,       // STA INIDISP
    0xA9, 0x81,             // LDA #$81
    0x8D, 0x00, 0x42,       // STA NMITIMEN
    0x80, 0xFE,             // BRA *
];

#[rustfmt::skip]
const DEMO_NMI: [u8; 18] = [
    0xE6, 0x10,             // INC $10
    0xA5, 0x10,             // LDA $10
    0x8D, 0x0D, 0x21,       // STA BG1HOFS
    0x9C, 0x0D, 0x21,       // STZ BG1HOFS
    0xAD, 0x19, 0x42,       // LDA JOY1H
    0x85, 0x11,             // STA $11
    0xAD, 0x10, 0x42,       // LDA RDNMI
];

fn set_vector(rom: &mut [u8], offset: usize, target: u16) {
    rom[offset..offset + 2].copy_from_slice(&target.to_le_bytes());
}

/// 32 KiB LoROM image with a valid checksum pair and 2 KiB of SRAM.
fn demo_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[..DEMO_PROGRAM.len()].copy_from_slice(&DEMO_PROGRAM);
    rom[NMI_HANDLER..NMI_HANDLER + DEMO_NMI.len()].copy_from_slice(&DEMO_NMI);
    rom[NMI_HANDLER + DEMO_NMI.len()] = 0x40; // RTI
    rom[IRQ_HANDLER] = 0x40;

    let title = b"EMULATOR TEST        ";
    rom[0x7FC0..0x7FC0 + title.len()].copy_from_slice(title);
    rom[0x7FD5] = 0x20;
    rom[0x7FD7] = 0x08;
    rom[0x7FD8] = 0x01;
    rom[0x7FD9] = 0x01;
    set_vector(&mut rom, 0x7FFC, 0x8000);
    set_vector(&mut rom, 0x7FFA, 0x8000 + NMI_HANDLER as u16);
    set_vector(&mut rom, 0x7FFE, 0x8000 + IRQ_HANDLER as u16);
    set_vector(&mut rom, 0x7FEA, 0x8000 + NMI_HANDLER as u16);
    set_vector(&mut rom, 0x7FEE, 0x8000 + IRQ_HANDLER as u16);

    // Sum with a placeholder pair contributes the same as any valid pair.
    set_vector(&mut rom, 0x7FDC, 0xFFFF);
    set_vector(&mut rom, 0x7FDE, 0x0000);
    let checksum = rom.iter().fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16));
    set_vector(&mut rom, 0x7FDC, checksum ^ 0xFFFF);
    set_vector(&mut rom, 0x7FDE, checksum);
    rom
}

fn demo_emulator(config: EmulatorConfig) -> Emulator {
    let mut emu = Emulator::with_config(config);
    emu.load_rom(&demo_rom()).unwrap();
    emu
}

fn is_uniform(frame: &[u8]) -> bool {
    let first = &frame[..4];
    frame.chunks_exact(4).all(|pixel| pixel == first)
}

#[test]
fn five_frames_produce_a_picture() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    assert_eq!(emu.bus.cartridge.map_mode(), crate::cartridge::MapMode::LoRom);
    emu.reset(true);
    for _ in 0..5 {
        emu.run_frame();
    }

    assert!(emu.frame_count() >= 5);
    let (width, height) = emu.frame_dimensions();
    assert_eq!(emu.frame_rgba().len(), width * height * 4);
    assert!(!is_uniform(emu.frame_rgba()));
    assert!(emu.read_ram_byte(0x10) >= 4, "NMI handler ran every frame");
}

#[test]
fn rejected_rom_leaves_machine_untouched() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    let before = emu.save_state().unwrap();

    let err = emu.load_rom(&[0u8; 0x100]).unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidRom(_)));
    assert_eq!(emu.save_state().unwrap(), before);
}

#[test]
fn save_then_load_is_idempotent() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    for _ in 0..3 {
        emu.run_frame();
    }
    let first = emu.save_state().unwrap();
    emu.load_state(&first).unwrap();
    assert_eq!(emu.save_state().unwrap(), first);
}

#[test]
fn restored_machine_continues_like_the_original() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    for _ in 0..3 {
        emu.run_frame();
    }
    let snapshot = emu.save_state().unwrap();
    let mut original = emu.clone();

    for _ in 0..2 {
        emu.run_frame();
    }
    emu.load_state(&snapshot).unwrap();

    for _ in 0..3 {
        original.run_frame();
        emu.run_frame();
    }
    assert_eq!(emu.frame_rgba(), original.frame_rgba());
    assert_eq!(emu.save_state().unwrap(), original.save_state().unwrap());
}

#[test]
fn snapshot_from_another_cartridge_is_rejected() {
    let source = demo_emulator(EmulatorConfig::default());
    let snapshot = source.save_state().unwrap();

    let mut other_rom = demo_rom();
    other_rom[0x4000] = 0xEA;
    let mut emu = Emulator::with_config(EmulatorConfig::default());
    emu.load_rom(&other_rom).unwrap();
    emu.run_frame();
    let before = emu.save_state().unwrap();

    let err = emu.load_state(&snapshot).unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidState(_)));
    assert_eq!(emu.save_state().unwrap(), before);
}

#[test]
fn malformed_snapshots_are_rejected() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    let bytes = emu.save_state().unwrap().into_bytes();
    let before = emu.save_state().unwrap();

    let truncated = SaveState::from_bytes(bytes[..bytes.len() / 2].to_vec());
    assert!(matches!(
        emu.load_state(&truncated),
        Err(EmulatorError::InvalidState(_))
    ));

    let mut padded = bytes.clone();
    padded.push(0);
    assert!(matches!(
        emu.load_state(&SaveState::from_bytes(padded)),
        Err(EmulatorError::InvalidState(_))
    ));

    assert!(matches!(
        emu.load_state(&SaveState::from_bytes(Vec::new())),
        Err(EmulatorError::InvalidState(_))
    ));
    assert_eq!(emu.save_state().unwrap(), before);
}

#[test]
fn fast_frames_skip_rendering_until_resync() {
    let config = EmulatorConfig {
        resync_interval: 4,
        region: None,
    };
    let mut full = demo_emulator(config);
    let mut fast = demo_emulator(config);

    for _ in 0..3 {
        full.run_frame();
        fast.run_frame_fast();
    }
    assert!(fast.frame_rgba().iter().all(|&byte| byte == 0));
    assert_eq!(fast.read_ram_byte(0x10), full.read_ram_byte(0x10));

    full.run_frame();
    fast.run_frame_fast();
    assert_eq!(fast.frame_count(), full.frame_count());
    assert_eq!(fast.frame_rgba(), full.frame_rgba());
    assert_eq!(fast.save_state().unwrap(), full.save_state().unwrap());
}

#[test]
fn resync_interval_of_one_renders_every_frame() {
    let config = EmulatorConfig {
        resync_interval: 1,
        region: None,
    };
    let mut emu = demo_emulator(config);
    emu.run_frame_fast();
    emu.run_frame_fast();
    assert!(!is_uniform(emu.frame_rgba()));
}

#[test]
fn buttons_reach_auto_joypad_registers() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    emu.set_button_pressed(0, Button::Start);
    emu.run_frame();
    emu.run_frame();
    assert_eq!(emu.read_ram_byte(0x11), 0x10);

    emu.set_button_released(0, Button::Start);
    emu.set_button_pressed(0, Button::B);
    emu.run_frame();
    emu.run_frame();
    assert_eq!(emu.read_ram_byte(0x11), 0x80);

    // Only two ports exist.
    emu.set_button_pressed(5, Button::A);
}

#[test]
fn ram_dumps_are_clamped_and_side_effect_free() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.bus.write(0x7E_0020, 0xAB);
    emu.bus.write(0x7F_FFFF, 0xCD);
    let before = emu.save_state().unwrap();

    assert_eq!(emu.dump_ram(0x20, 2), &[0xAB, 0x00]);
    assert_eq!(emu.dump_ram(WRAM_SIZE - 1, 16), &[0xCD]);
    assert!(emu.dump_ram(WRAM_SIZE + 5, 4).is_empty());
    assert_eq!(emu.read_ram_byte(0x20), 0xAB);
    assert_eq!(emu.read_ram_byte(WRAM_SIZE + 0x20), 0xAB);
    assert_eq!(emu.save_state().unwrap(), before);
}

#[test]
fn sram_survives_resets_and_checks_size() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    let size = emu.bus.cartridge.header().sram_bytes();
    assert!(size > 0);
    assert_eq!(emu.sram().len(), size);

    let err = emu.load_sram(&vec![0; size + 1]).unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidSram { .. }));

    emu.load_sram(&vec![0x5A; size]).unwrap();
    emu.reset(true);
    emu.reset(false);
    assert!(emu.sram().iter().all(|&byte| byte == 0x5A));
}

#[test]
fn hard_reset_clears_work_ram() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    emu.bus.write(0x7E_0040, 0x99);
    emu.reset(false);
    assert_eq!(emu.read_ram_byte(0x40), 0x99);
    assert_eq!(emu.cpu.pc, 0x8000);
    emu.reset(true);
    assert_eq!(emu.read_ram_byte(0x40), 0);
}

#[test]
fn audio_samples_drain_the_ring() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    let mut left = vec![0i16; 256];
    let mut right = vec![0i16; 256];
    emu.audio_samples(&mut left, &mut right);
    assert_eq!(emu.bus.apu.bus.dsp.ring_offset, 0);
    // The DSP powers up muted.
    assert!(left.iter().chain(right.iter()).all(|&sample| sample == 0));
}

#[test]
fn state_slots_restore_by_name() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    let mut slots = StateSlots::new();
    emu.run_frame();
    slots.save("start", &emu).unwrap();
    let frames = emu.frame_count();

    emu.run_frame();
    emu.run_frame();
    slots.restore("start", &mut emu).unwrap();
    assert_eq!(emu.frame_count(), frames);
    assert_eq!(slots.keys().collect::<Vec<_>>(), vec!["start"]);

    assert!(matches!(
        slots.restore("missing", &mut emu),
        Err(EmulatorError::InvalidState(_))
    ));
    assert!(slots.remove("start").is_some());
    assert!(slots.is_empty());
}

#[test]
fn state_files_round_trip() {
    let mut emu = demo_emulator(EmulatorConfig::default());
    emu.run_frame();
    let path = std::env::temp_dir().join(format!("snes-state-{}.bin", std::process::id()));
    emu.save_state_to_file(&path).unwrap();
    let saved = emu.save_state().unwrap();

    emu.run_frame();
    emu.load_state_from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(emu.save_state().unwrap(), saved);

    let missing = std::env::temp_dir().join("snes-state-does-not-exist.bin");
    assert!(matches!(
        emu.load_state_from_file(missing),
        Err(EmulatorError::Io(_))
    ));
}

#[test]
fn region_override_selects_pal_timing() {
    let config = EmulatorConfig {
        resync_interval: DEFAULT_RESYNC_INTERVAL,
        region: Some(Region::Pal),
    };
    let emu = demo_emulator(config);
    assert_eq!(emu.bus.ppu.lines_per_frame(), 312);

    let emu = demo_emulator(EmulatorConfig::default());
    assert_eq!(emu.bus.ppu.lines_per_frame(), 262);
}

#[test]
fn new_takes_its_config_from_the_environment() {
    let emu = Emulator::new();
    assert_eq!(*emu.config(), EmulatorConfig::from_env());
    assert_eq!(EmulatorConfig::default().resync_interval, DEFAULT_RESYNC_INTERVAL);
    assert_eq!(EmulatorConfig::default().region, None);
}
