use super::dsp::Dsp;
use super::timer::Timer;

pub(crate) const APU_RAM_SIZE: usize = 0x10000;
pub(crate) const IPL_BASE: u16 = 0xFFC0;
const TEST: u16 = 0x00F0;
const CONTROL: u16 = 0x00F1;
const DSP_ADDR: u16 = 0x00F2;
const DSP_DATA: u16 = 0x00F3;
const PORT0: u16 = 0x00F4;
const PORT3: u16 = 0x00F7;
const TIMER0_TARGET: u16 = 0x00FA;
const TIMER2_TARGET: u16 = 0x00FC;
const TIMER0_COUNTER: u16 = 0x00FD;
const TIMER2_COUNTER: u16 = 0x00FF;
const CONTROL_CLEAR_PORTS_01: u8 = 0x10;
const CONTROL_CLEAR_PORTS_23: u8 = 0x20;
const CONTROL_IPL_ENABLE: u8 = 0x80;

/// 64-byte boot program mapped at $FFC0 while CONTROL bit 7 is set.
pub(crate) const IPL_ROM: [u8; 64] = [
    0xCD, 0xEF, 0xBD, 0xE8, 0x00, 0xC6, 0x1D, 0xD0, 0xFC, 0x8F, 0xAA, 0xF4, 0x8F, 0xBB, 0xF5, 0x78,
    0xCC, 0xF4, 0xD0, 0xFB, 0x2F, 0x19, 0xEB, 0xF4, 0xD0, 0xFC, 0x7E, 0xF4, 0xD0, 0x0B, 0xE4, 0xF5,
    0xCB, 0xF4, 0xD7, 0x00, 0xFC, 0xD0, 0xF3, 0xAB, 0x01, 0x10, 0xEF, 0x7E, 0xF4, 0x10, 0xEB, 0xBA,
    0xF6, 0xDA, 0x00, 0xBA, 0xF4, 0xC4, 0xF4, 0xDD, 0x5D, 0xD0, 0xDB, 0x1F, 0x00, 0x00, 0xC0, 0xFF,
];

/// The SPC700's view of the world: audio RAM with the I/O page at
/// $F0-$FF, the boot ROM overlay, timers and the DSP.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub(crate) struct ApuBus {
    ram: Vec<u8>,
    pub(crate) dsp: Dsp,
    dsp_addr: u8,
    ipl_enabled: bool,
    pub(crate) timers: [Timer; 3],
    /// Written by the main CPU, read by the SPC700 at $F4-$F7.
    pub(crate) cpu_to_apu: [u8; 4],
    /// Written by the SPC700, read by the main CPU at $2140-$2143.
    pub(crate) apu_to_cpu: [u8; 4],
}

impl ApuBus {
    pub(crate) fn new() -> Self {
        Self {
            ram: vec![0; APU_RAM_SIZE],
            dsp: Dsp::new(),
            dsp_addr: 0,
            ipl_enabled: true,
            timers: [Timer::new(128), Timer::new(128), Timer::new(16)],
            cpu_to_apu: [0; 4],
            apu_to_cpu: [0; 4],
        }
    }

    pub(crate) fn reset(&mut self, hard: bool) {
        if hard {
            self.ram.fill(0);
            self.dsp = Dsp::new();
        } else {
            self.dsp.soft_reset();
        }
        self.dsp_addr = 0;
        self.ipl_enabled = true;
        self.timers = [Timer::new(128), Timer::new(128), Timer::new(16)];
        self.cpu_to_apu = [0; 4];
        self.apu_to_cpu = [0; 4];
    }

    pub(crate) fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub(crate) fn read(&mut self, addr: u16) -> u8 {
        match addr {
            TEST | CONTROL => 0,
            DSP_ADDR => self.dsp_addr,
            DSP_DATA => self.dsp.read(self.dsp_addr & 0x7F),
            PORT0..=PORT3 => self.cpu_to_apu[(addr - PORT0) as usize],
            TIMER0_TARGET..=TIMER2_TARGET => 0,
            TIMER0_COUNTER..=TIMER2_COUNTER => {
                self.timers[(addr - TIMER0_COUNTER) as usize].take_counter()
            }
            IPL_BASE..=0xFFFF if self.ipl_enabled => IPL_ROM[(addr - IPL_BASE) as usize],
            _ => self.ram[addr as usize],
        }
    }

    /// Every write also lands in RAM, including the I/O page and the RAM
    /// hidden under the boot ROM.
    pub(crate) fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
        match addr {
            TEST => log::trace!("SPC700 test register write {value:02X} ignored"),
            CONTROL => self.write_control(value),
            DSP_ADDR => self.dsp_addr = value,
            DSP_DATA => self.dsp.write(self.dsp_addr & 0x7F, value),
            PORT0..=PORT3 => self.apu_to_cpu[(addr - PORT0) as usize] = value,
            TIMER0_TARGET..=TIMER2_TARGET => {
                self.timers[(addr - TIMER0_TARGET) as usize].target = value
            }
            _ => {}
        }
    }

    fn write_control(&mut self, value: u8) {
        log::trace!("SPC700 control write {value:02X}");
        for (index, timer) in self.timers.iter_mut().enumerate() {
            timer.set_enabled(value & (1 << index) != 0);
        }
        if value & CONTROL_CLEAR_PORTS_01 != 0 {
            self.cpu_to_apu[0] = 0;
            self.cpu_to_apu[1] = 0;
        }
        if value & CONTROL_CLEAR_PORTS_23 != 0 {
            self.cpu_to_apu[2] = 0;
            self.cpu_to_apu[3] = 0;
        }
        self.ipl_enabled = value & CONTROL_IPL_ENABLE != 0;
    }

    pub(crate) fn tick_timers(&mut self) {
        self.timers.iter_mut().for_each(Timer::tick);
    }

    pub(crate) fn step_dsp(&mut self) {
        self.dsp.step(&mut self.ram);
    }
}
