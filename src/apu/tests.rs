use super::dsp::SAMPLE_RING_LEN;
use super::smp::{FLAG_C, FLAG_V, FLAG_Z};
use super::*;

const PROGRAM_BASE: u16 = 0x0200;

fn setup_smp_with_program(program: &[u8]) -> (Spc700, ApuBus) {
    let mut bus = ApuBus::new();
    for (offset, byte) in program.iter().enumerate() {
        bus.write(PROGRAM_BASE + offset as u16, *byte);
    }
    let mut smp = Spc700::new();
    smp.pc = PROGRAM_BASE;
    (smp, bus)
}

#[test]
fn timer_fires_after_target_times_prescaler() {
    let mut apu = Apu::new();
    let bus = &mut apu.bus;
    bus.write(0x00FA, 4);
    bus.write(0x00F1, 0x01);
    for _ in 0..128 * 4 - 1 {
        bus.tick_timers();
    }
    assert_eq!(bus.read(0x00FD), 0);
    bus.tick_timers();
    assert_eq!(bus.read(0x00FD), 1);
    assert_eq!(bus.read(0x00FD), 0, "counter clears on read");
}

#[test]
fn timer_counter_saturates_at_fifteen() {
    let mut apu = Apu::new();
    let bus = &mut apu.bus;
    bus.write(0x00FC, 1);
    bus.write(0x00F1, 0x04);
    for _ in 0..16 * 40 {
        bus.tick_timers();
    }
    assert_eq!(bus.read(0x00FF), 15);
    assert_eq!(bus.read(0x00FF), 0);
}

#[test]
fn target_zero_counts_256_steps() {
    let mut apu = Apu::new();
    let bus = &mut apu.bus;
    bus.write(0x00F1, 0x04);
    for _ in 0..16 * 256 - 1 {
        bus.tick_timers();
    }
    assert_eq!(bus.read(0x00FF), 0);
    bus.tick_timers();
    assert_eq!(bus.read(0x00FF), 1);
}

#[test]
fn timer_restarts_only_on_enable_edge() {
    let mut apu = Apu::new();
    let bus = &mut apu.bus;
    bus.write(0x00FC, 4);
    bus.write(0x00F1, 0x04);
    for _ in 0..16 * 4 + 16 * 2 {
        bus.tick_timers();
    }

    // Rewriting the enable bit while already running keeps divider and counter.
    bus.write(0x00F1, 0x04);
    for _ in 0..16 * 2 {
        bus.tick_timers();
    }
    assert_eq!(bus.read(0x00FF), 2);

    for _ in 0..16 * 2 {
        bus.tick_timers();
    }
    bus.write(0x00F1, 0x00);
    bus.write(0x00F1, 0x04);
    for _ in 0..16 * 4 - 1 {
        bus.tick_timers();
    }
    assert_eq!(bus.read(0x00FF), 0);
    bus.tick_timers();
    assert_eq!(bus.read(0x00FF), 1);
}

#[test]
fn ports_cross_between_cpu_and_smp() {
    let mut apu = Apu::new();
    apu.cpu_write_port(1, 0x5A);
    assert_eq!(apu.bus.read(0x00F5), 0x5A);
    apu.bus.write(0x00F6, 0x33);
    assert_eq!(apu.cpu_read_port(2), 0x33);
    // The SPC700 side never sees its own writes on the input latch.
    assert_eq!(apu.bus.read(0x00F6), 0);
}

#[test]
fn control_clears_input_ports_and_hides_boot_rom() {
    let mut apu = Apu::new();
    for port in 0..4 {
        apu.cpu_write_port(port, 0x11 * (port as u8 + 1));
    }
    apu.bus.write(0xFFC0, 0x77);
    assert_eq!(apu.bus.read(0xFFC0), 0xCD);

    apu.bus.write(0x00F1, 0x10);
    assert_eq!(apu.bus.read(0x00F4), 0);
    assert_eq!(apu.bus.read(0x00F5), 0);
    assert_eq!(apu.bus.read(0x00F6), 0x33);
    assert_eq!(apu.bus.read(0xFFC0), 0x77);

    apu.bus.write(0x00F1, 0xA0);
    assert_eq!(apu.bus.read(0x00F6), 0);
    assert_eq!(apu.bus.read(0xFFC0), 0xCD);
}

#[test]
fn boot_rom_signals_ready() {
    let mut apu = Apu::new();
    for _ in 0..20_000 {
        apu.cycle();
    }
    assert_eq!(apu.cpu_read_port(0), 0xAA);
    assert_eq!(apu.cpu_read_port(1), 0xBB);
}

#[test]
fn dsp_registers_through_address_and_data_ports() {
    let mut apu = Apu::new();
    apu.bus.write(0x00F2, 0x0C);
    apu.bus.write(0x00F3, 0x55);
    assert_eq!(apu.bus.dsp.read(0x0C), 0x55);

    apu.bus.write(0x00F2, 0x8C);
    assert_eq!(apu.bus.read(0x00F2), 0x8C);
    assert_eq!(apu.bus.read(0x00F3), 0x55);
}

/// One looping BRR block of constant samples on voice 0 with fast attack.
fn setup_voice(apu: &mut Apu) {
    let bus = &mut apu.bus;
    // Directory at $0200: start and loop both $0300.
    for (offset, byte) in [0x00, 0x03, 0x00, 0x03].into_iter().enumerate() {
        bus.write(0x0200 + offset as u16, byte);
    }
    bus.write(0x0300, 0xC3);
    for offset in 1..9 {
        bus.write(0x0300 + offset, 0x77);
    }

    let dsp = &mut bus.dsp;
    dsp.write(0x5D, 0x02);
    dsp.write(0x00, 0x7F);
    dsp.write(0x01, 0x7F);
    dsp.write(0x02, 0x00);
    dsp.write(0x03, 0x10);
    dsp.write(0x04, 0x00);
    dsp.write(0x05, 0x8F);
    dsp.write(0x06, 0xE0);
    dsp.write(0x0C, 0x7F);
    dsp.write(0x1C, 0x7F);
    dsp.write(0x6C, 0x20);
    dsp.write(0x4C, 0x01);
}

#[test]
fn keyed_voice_produces_sound_and_sets_endx() {
    let mut apu = Apu::new();
    setup_voice(&mut apu);

    for _ in 0..40 {
        apu.bus.step_dsp();
    }
    let dsp = &apu.bus.dsp;
    assert_ne!(dsp.read(0x08), 0, "envelope should be audible");
    assert_eq!(dsp.read(0x7C) & 0x01, 0x01);
    assert!(dsp.ring_left.iter().any(|&sample| sample > 0));
    assert!(dsp.ring_right.iter().any(|&sample| sample > 0));

    apu.bus.dsp.write(0x7C, 0xFF);
    assert_eq!(apu.bus.dsp.read(0x7C), 0);
}

#[test]
fn key_on_waits_before_output() {
    let mut apu = Apu::new();
    setup_voice(&mut apu);
    for _ in 0..5 {
        apu.bus.step_dsp();
    }
    assert_eq!(apu.bus.dsp.voices[0].envelope, 0);
    assert!(apu.bus.dsp.ring_left[..5].iter().all(|&sample| sample == 0));
}

#[test]
fn key_off_releases_to_silence() {
    let mut apu = Apu::new();
    setup_voice(&mut apu);
    for _ in 0..40 {
        apu.bus.step_dsp();
    }
    assert!(apu.bus.dsp.voices[0].envelope > 0);

    apu.bus.dsp.write(0x5C, 0x01);
    for _ in 0..300 {
        apu.bus.step_dsp();
    }
    assert_eq!(apu.bus.dsp.voices[0].envelope, 0);
    assert_eq!(apu.bus.dsp.read(0x08), 0);
}

#[test]
fn mute_flag_silences_output() {
    let mut apu = Apu::new();
    setup_voice(&mut apu);
    apu.bus.dsp.write(0x6C, 0x60);
    for _ in 0..40 {
        apu.bus.step_dsp();
    }
    assert!(apu.bus.dsp.ring_left.iter().all(|&sample| sample == 0));
    assert!(apu.bus.dsp.voices[0].envelope > 0);
}

#[test]
fn set_samples_decimates_ring_and_restarts_it() {
    let mut apu = Apu::new();
    for (index, sample) in apu.bus.dsp.ring_left.iter_mut().enumerate() {
        *sample = index as i16;
    }
    for (index, sample) in apu.bus.dsp.ring_right.iter_mut().enumerate() {
        *sample = -(index as i16);
    }
    apu.bus.dsp.ring_offset = 100;

    let mut left = vec![0i16; SAMPLE_RING_LEN / 2];
    let mut right = vec![0i16; SAMPLE_RING_LEN / 2];
    apu.set_samples(&mut left, &mut right);

    assert_eq!(left[0], 0);
    assert_eq!(left[10], 20);
    assert_eq!(right[100], -200);
    assert_eq!(apu.bus.dsp.ring_offset, 0);
}

#[test]
fn adc_immediate_sets_carry() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0xE8, 0x10, 0x88, 0xF5]);
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.a, 0x05);
    assert_ne!(smp.psw & FLAG_C, 0);
    assert_eq!(smp.psw & FLAG_Z, 0);
}

#[test]
fn taken_branch_costs_two_more_cycles() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0xE8, 0x00, 0xF0, 0x02]);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 4);
    assert_eq!(smp.pc, PROGRAM_BASE + 6);

    let (mut smp, mut bus) = setup_smp_with_program(&[0xE8, 0x01, 0xF0, 0x02]);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.pc, PROGRAM_BASE + 4);
}

#[test]
fn bra_always_costs_four() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0x2F, 0xFE]);
    assert_eq!(smp.step(&mut bus), 4);
    assert_eq!(smp.pc, PROGRAM_BASE);
}

#[test]
fn mul_and_div() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0x8D, 0x12, 0xE8, 0x34, 0xCF]);
    smp.step(&mut bus);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 9);
    assert_eq!((smp.y, smp.a), (0x03, 0xA8));

    let (mut smp, mut bus) =
        setup_smp_with_program(&[0x8D, 0x01, 0xE8, 0x05, 0xCD, 0x10, 0x9E]);
    for _ in 0..3 {
        smp.step(&mut bus);
    }
    assert_eq!(smp.step(&mut bus), 12);
    assert_eq!((smp.a, smp.y), (0x10, 0x05));
    assert_eq!(smp.psw & FLAG_V, 0);
}

#[test]
fn sleep_halts_the_core() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0xEF, 0xE8, 0x42]);
    smp.step(&mut bus);
    assert!(smp.is_halted());
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.a, 0);
}

#[test]
fn register_store_reads_destination_first() {
    let (mut smp, mut bus) = setup_smp_with_program(&[0xC4, 0xFD, 0x8F, 0x00, 0xFE]);
    bus.write(0x00FA, 1);
    bus.write(0x00FB, 1);
    bus.write(0x00F1, 0x03);
    for _ in 0..128 {
        bus.tick_timers();
    }

    // MOV $FD,A clears timer 0 through its dummy read.
    smp.step(&mut bus);
    assert_eq!(bus.read(0x00FD), 0);

    // MOV $FE,#imm writes without reading.
    smp.step(&mut bus);
    assert_eq!(bus.read(0x00FE), 1);
}
