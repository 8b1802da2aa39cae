use super::tables::{
    BRR_BLOCK_LEN, BRR_END, BRR_LOOP, BRR_SAMPLES, ENVELOPE_MAX, GAUSSIAN, KEY_ON_DELAY,
};

/// Samples kept from the previous BRR block for interpolation.
const HISTORY: usize = 3;
/// Pitch counter value of one whole decoded block.
pub(crate) const BLOCK_POSITION_SPAN: u32 = (BRR_SAMPLES as u32) << 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    #[default]
    Release,
}

#[derive(Clone, Copy, Debug, Default, bincode::Encode, bincode::Decode)]
pub(crate) struct Voice {
    pub(crate) block_addr: u16,
    header: u8,
    /// Tail of the previous block followed by the current one, stored
    /// doubled as the hardware does.
    pub(crate) buffer: [i16; HISTORY + BRR_SAMPLES],
    /// 4.12 fixed-point read position inside `buffer`.
    pub(crate) position: u32,
    pub(crate) envelope: i32,
    hidden_envelope: i32,
    pub(crate) phase: EnvelopePhase,
    pub(crate) key_on_delay: u8,
    /// Last enveloped output, the pitch-modulation source for the next voice.
    pub(crate) output: i32,
}

impl Voice {
    pub(crate) fn key_on(&mut self, ram: &[u8], start: u16) {
        self.block_addr = start;
        self.buffer = [0; HISTORY + BRR_SAMPLES];
        self.position = 0;
        self.envelope = 0;
        self.hidden_envelope = 0;
        self.phase = EnvelopePhase::Attack;
        self.key_on_delay = KEY_ON_DELAY;
        self.output = 0;
        self.decode_block(ram);
    }

    pub(crate) fn silence(&mut self) {
        self.phase = EnvelopePhase::Release;
        self.envelope = 0;
    }

    fn decode_block(&mut self, ram: &[u8]) {
        let addr = self.block_addr;
        self.header = ram[addr as usize];
        self.buffer.copy_within(BRR_SAMPLES.., 0);

        let shift = self.header >> 4;
        let filter = (self.header >> 2) & 0x03;
        for index in 0..BRR_SAMPLES {
            let byte = ram[addr.wrapping_add(1 + (index / 2) as u16) as usize];
            let nibble = if index % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            let nibble = (((nibble << 4) as i8) >> 4) as i32;
            let mut sample = if shift <= 12 {
                (nibble << shift) >> 1
            } else if nibble < 0 {
                -2048
            } else {
                0
            };

            let p1 = self.buffer[index + HISTORY - 1] as i32;
            let p2 = (self.buffer[index + HISTORY - 2] as i32) >> 1;
            match filter {
                1 => {
                    sample += p1 >> 1;
                    sample += (-p1) >> 5;
                }
                2 => {
                    sample += p1;
                    sample -= p2;
                    sample += p2 >> 4;
                    sample += (p1 * -3) >> 6;
                }
                3 => {
                    sample += p1;
                    sample -= p2;
                    sample += (p1 * -13) >> 7;
                    sample += (p2 * 3) >> 4;
                }
                _ => {}
            }
            let sample = sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            self.buffer[index + HISTORY] = sample.wrapping_mul(2);
        }
    }

    /// Move to the following block, or to `loop_addr` after an end block.
    /// Returns whether the finished block carried the end flag.
    pub(crate) fn next_block(&mut self, ram: &[u8], loop_addr: u16) -> bool {
        let ended = self.header & BRR_END != 0;
        if ended {
            self.block_addr = loop_addr;
            if self.header & BRR_LOOP == 0 {
                self.silence();
            }
        } else {
            self.block_addr = self.block_addr.wrapping_add(BRR_BLOCK_LEN);
        }
        self.decode_block(ram);
        ended
    }

    /// Four-tap Gaussian interpolation at the current position.
    pub(crate) fn interpolate(&self) -> i32 {
        let gauss = |index: usize| GAUSSIAN[index] as i32;
        let offset = ((self.position >> 4) & 0xFF) as usize;
        let base = (self.position >> 12) as usize;
        let taps = &self.buffer[base..base + 4];
        let mut out = (gauss(255 - offset) * taps[0] as i32) >> 11;
        out += (gauss(511 - offset) * taps[1] as i32) >> 11;
        out += (gauss(256 + offset) * taps[2] as i32) >> 11;
        out = out as i16 as i32;
        out += (gauss(offset) * taps[3] as i32) >> 11;
        out.clamp(i16::MIN as i32, i16::MAX as i32) & !1
    }

    /// One envelope step. `rate_elapsed` reports whether the global counter
    /// fires for a given rate this sample.
    pub(crate) fn run_envelope(
        &mut self,
        adsr1: u8,
        adsr2: u8,
        gain: u8,
        rate_elapsed: impl Fn(usize) -> bool,
    ) {
        let mut env = self.envelope;
        if self.phase == EnvelopePhase::Release {
            self.envelope = (env - 0x8).max(0);
            return;
        }

        let rate;
        let env_data;
        if adsr1 & 0x80 != 0 {
            env_data = adsr2;
            if self.phase == EnvelopePhase::Attack {
                rate = (adsr1 & 0x0F) as usize * 2 + 1;
                env += if rate < 31 { 0x20 } else { 0x400 };
            } else {
                env -= 1;
                env -= env >> 8;
                rate = if self.phase == EnvelopePhase::Decay {
                    (((adsr1 >> 3) & 0x0E) + 0x10) as usize
                } else {
                    (adsr2 & 0x1F) as usize
                };
            }
        } else {
            env_data = gain;
            let mode = gain >> 5;
            if mode < 4 {
                env = gain as i32 * 0x10;
                rate = 31;
            } else {
                rate = (gain & 0x1F) as usize;
                match mode {
                    4 => env -= 0x20,
                    5 => {
                        env -= 1;
                        env -= env >> 8;
                    }
                    6 => env += 0x20,
                    _ => {
                        env += 0x20;
                        if self.hidden_envelope as u32 >= 0x600 {
                            env += 0x8 - 0x20;
                        }
                    }
                }
            }
        }

        if self.phase == EnvelopePhase::Decay && (env >> 8) == (env_data >> 5) as i32 {
            self.phase = EnvelopePhase::Sustain;
        }
        self.hidden_envelope = env;
        if !(0..=ENVELOPE_MAX).contains(&env) {
            env = if env < 0 { 0 } else { ENVELOPE_MAX };
            if self.phase == EnvelopePhase::Attack {
                self.phase = EnvelopePhase::Decay;
            }
        }
        if rate_elapsed(rate) {
            self.envelope = env;
        }
    }
}
