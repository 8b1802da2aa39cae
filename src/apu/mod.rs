mod bus;
mod dsp;
mod smp;
#[cfg(test)]
mod tests;
mod timer;

pub(crate) use bus::ApuBus;
pub(crate) use smp::Spc700;

/// APU cycles per DSP output sample.
const DSP_CYCLE_DIVIDER: u8 = 32;

/// Sony audio unit: the SPC700 with its 64 KiB RAM, boot ROM, timers and
/// the S-DSP. The main CPU only sees the four communication ports.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Apu {
    pub(crate) smp: Spc700,
    pub(crate) bus: ApuBus,
    /// APU cycles left before the SPC700 starts its next instruction.
    smp_wait: u32,
    dsp_divider: u8,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    pub fn new() -> Self {
        let mut apu = Self {
            smp: Spc700::new(),
            bus: ApuBus::new(),
            smp_wait: 0,
            dsp_divider: 0,
        };
        apu.smp.reset(&mut apu.bus);
        apu
    }

    /// `hard` also clears audio RAM and the DSP register file.
    pub fn reset(&mut self, hard: bool) {
        self.bus.reset(hard);
        self.smp.reset(&mut self.bus);
        self.smp_wait = 0;
        self.dsp_divider = 0;
    }

    /// Advance the APU by one SPC700 clock.
    pub fn cycle(&mut self) {
        if self.smp_wait == 0 {
            self.smp_wait = self.smp.step(&mut self.bus);
        }
        self.smp_wait -= 1;

        self.bus.tick_timers();

        self.dsp_divider += 1;
        if self.dsp_divider == DSP_CYCLE_DIVIDER {
            self.dsp_divider = 0;
            self.bus.step_dsp();
        }
    }

    /// Main CPU read of $2140+`port`.
    pub fn cpu_read_port(&self, port: usize) -> u8 {
        self.bus.apu_to_cpu[port & 0x03]
    }

    /// Main CPU write of $2140+`port`.
    pub fn cpu_write_port(&mut self, port: usize, value: u8) {
        self.bus.cpu_to_apu[port & 0x03] = value;
    }

    pub fn ram(&self) -> &[u8] {
        self.bus.ram()
    }

    /// Decimate the DSP sample ring into the caller's buffers, then restart
    /// the ring at offset zero.
    pub fn set_samples(&mut self, left: &mut [i16], right: &mut [i16]) {
        self.bus.dsp.set_samples(left, right);
    }
}
