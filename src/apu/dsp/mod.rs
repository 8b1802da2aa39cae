mod tables;
#[cfg(test)]
mod tests;
mod voice;

use tables::*;
use voice::{BLOCK_POSITION_SPAN, EnvelopePhase, Voice};

/// Output samples buffered per channel between `set_samples` calls.
pub(crate) const SAMPLE_RING_LEN: usize = 534;
const ECHO_TAPS: usize = 8;
const ECHO_BLOCK_BYTES: u16 = 0x800;
const NOISE_SEED: i32 = 0x4000;
const PITCH_MAX: i32 = 0x3FFF;

fn clamp16(value: i32) -> i32 {
    value.clamp(i16::MIN as i32, i16::MAX as i32)
}

/// S-DSP: eight BRR voices with ADSR/GAIN envelopes, noise, pitch
/// modulation and an 8-tap FIR echo, producing one stereo sample per step.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub(crate) struct Dsp {
    regs: [u8; REG_COUNT],
    pub(crate) voices: [Voice; VOICE_COUNT],
    /// KON bits written since the last sample.
    pending_kon: u8,
    counter: u32,
    noise: i32,
    echo_offset: u16,
    /// Oldest first; the newest input is the last entry.
    echo_history: [[i32; 2]; ECHO_TAPS],
    pub(crate) ring_left: Vec<i16>,
    pub(crate) ring_right: Vec<i16>,
    pub(crate) ring_offset: usize,
}

impl Dsp {
    pub(crate) fn new() -> Self {
        let mut regs = [0; REG_COUNT];
        regs[FLG] = FLG_SOFT_RESET | FLG_MUTE | FLG_ECHO_DISABLE;
        Self {
            regs,
            voices: [Voice::default(); VOICE_COUNT],
            pending_kon: 0,
            counter: 0,
            noise: NOISE_SEED,
            echo_offset: 0,
            echo_history: [[0; 2]; ECHO_TAPS],
            ring_left: vec![0; SAMPLE_RING_LEN],
            ring_right: vec![0; SAMPLE_RING_LEN],
            ring_offset: 0,
        }
    }

    /// Registers survive; playback stops and FLG returns to its power-on value.
    pub(crate) fn soft_reset(&mut self) {
        self.regs[FLG] = FLG_SOFT_RESET | FLG_MUTE | FLG_ECHO_DISABLE;
        self.voices.iter_mut().for_each(Voice::silence);
        self.pending_kon = 0;
        self.counter = 0;
        self.noise = NOISE_SEED;
        self.echo_offset = 0;
        self.ring_offset = 0;
    }

    pub(crate) fn read(&self, addr: u8) -> u8 {
        self.regs[addr as usize & (REG_COUNT - 1)]
    }

    pub(crate) fn write(&mut self, addr: u8, value: u8) {
        let index = addr as usize & (REG_COUNT - 1);
        self.regs[index] = value;
        match index {
            KON => self.pending_kon |= value,
            ENDX => self.regs[ENDX] = 0,
            _ => {}
        }
    }

    fn rate_elapsed(counter: u32, rate: usize) -> bool {
        rate != 0 && (counter + COUNTER_OFFSETS[rate]) % COUNTER_RATES[rate] == 0
    }

    /// Start and loop addresses of a sample from the directory at DIR.
    fn source_addrs(&self, ram: &[u8], srcn: u8) -> (u16, u16) {
        let entry = ((self.regs[DIR] as u16) << 8).wrapping_add(srcn as u16 * 4);
        let word = |offset: u16| {
            let addr = entry.wrapping_add(offset);
            u16::from_le_bytes([ram[addr as usize], ram[addr.wrapping_add(1) as usize]])
        };
        (word(0), word(2))
    }

    /// Produce one stereo sample into the ring.
    pub(crate) fn step(&mut self, ram: &mut [u8]) {
        self.counter = if self.counter == 0 {
            COUNTER_RANGE - 1
        } else {
            self.counter - 1
        };

        let flg = self.regs[FLG];
        if Self::rate_elapsed(self.counter, (flg & FLG_NOISE_RATE) as usize) {
            let feedback = (self.noise << 13) ^ (self.noise << 14);
            self.noise = (feedback & 0x4000) ^ (self.noise >> 1);
        }

        let kon = std::mem::take(&mut self.pending_kon);
        for index in 0..VOICE_COUNT {
            let bit = 1 << index;
            if kon & bit != 0 {
                let srcn = self.regs[(index << 4) + V_SRCN];
                let (start, _) = self.source_addrs(ram, srcn);
                self.voices[index].key_on(ram, start);
                self.regs[ENDX] &= !bit;
            }
            if flg & FLG_SOFT_RESET != 0 {
                self.voices[index].silence();
            }
        }

        let mut main = [0i32; 2];
        let mut echo = [0i32; 2];
        for index in 0..VOICE_COUNT {
            let out = self.run_voice(ram, index);
            for channel in 0..2 {
                main[channel] = clamp16(main[channel] + out[channel]);
                if self.regs[EON] & (1 << index) != 0 {
                    echo[channel] = clamp16(echo[channel] + out[channel]);
                }
            }
        }

        let echo_out = self.run_echo(ram, echo);
        let mut output = [0i16; 2];
        if flg & FLG_MUTE == 0 {
            for channel in 0..2 {
                let mvol = self.regs[[MVOLL, MVOLR][channel]] as i8 as i32;
                let evol = self.regs[[EVOLL, EVOLR][channel]] as i8 as i32;
                let mixed = ((main[channel] * mvol) >> 7) + ((echo_out[channel] * evol) >> 7);
                output[channel] = clamp16(mixed) as i16;
            }
        }

        self.ring_left[self.ring_offset] = output[0];
        self.ring_right[self.ring_offset] = output[1];
        self.ring_offset = (self.ring_offset + 1) % SAMPLE_RING_LEN;
    }

    fn run_voice(&mut self, ram: &[u8], index: usize) -> [i32; 2] {
        let base = index << 4;
        let bit = 1u8 << index;

        let mut pitch =
            (u16::from_le_bytes([self.regs[base + V_PITCHL], self.regs[base + V_PITCHH]]) as i32)
                & PITCH_MAX;
        if index > 0 && self.regs[PMON] & bit != 0 {
            pitch += ((self.voices[index - 1].output >> 5) * pitch) >> 10;
        }

        if self.voices[index].key_on_delay > 0 {
            let voice = &mut self.voices[index];
            voice.key_on_delay -= 1;
            voice.output = 0;
            self.regs[base + V_ENVX] = 0;
            self.regs[base + V_OUTX] = 0;
            return [0, 0];
        }
        if self.regs[KOFF] & bit != 0 {
            self.voices[index].phase = EnvelopePhase::Release;
        }

        let noise = self.regs[NON] & bit != 0;
        let srcn = self.regs[base + V_SRCN];
        let (_, loop_addr) = self.source_addrs(ram, srcn);
        let (adsr1, adsr2, gain) = (
            self.regs[base + V_ADSR1],
            self.regs[base + V_ADSR2],
            self.regs[base + V_GAIN],
        );
        let counter = self.counter;
        let noise_sample = (self.noise << 1) as i16 as i32;

        let voice = &mut self.voices[index];
        let sample = if noise {
            noise_sample
        } else {
            voice.interpolate()
        };
        let output = ((sample * voice.envelope) >> 11) & !1;
        voice.output = output;
        voice.run_envelope(adsr1, adsr2, gain, |rate| Self::rate_elapsed(counter, rate));

        voice.position += pitch.clamp(0, 0x7FFF) as u32;
        let mut ended = false;
        while voice.position >= BLOCK_POSITION_SPAN {
            voice.position -= BLOCK_POSITION_SPAN;
            ended |= voice.next_block(ram, loop_addr);
        }
        let envx = (voice.envelope >> 4) as u8;

        if ended {
            self.regs[ENDX] |= bit;
        }
        self.regs[base + V_ENVX] = envx;
        self.regs[base + V_OUTX] = (output >> 8) as u8;

        let left = self.regs[base + V_VOLL] as i8 as i32;
        let right = self.regs[base + V_VOLR] as i8 as i32;
        [(output * left) >> 7, (output * right) >> 7]
    }

    /// Read the echo buffer through the FIR, write back the new input with
    /// feedback and return the filtered output.
    fn run_echo(&mut self, ram: &mut [u8], input: [i32; 2]) -> [i32; 2] {
        let start = (self.regs[ESA] as u16) << 8;
        let addr = start.wrapping_add(self.echo_offset);

        self.echo_history.copy_within(1.., 0);
        for channel in 0..2 {
            let sample_addr = addr.wrapping_add(channel as u16 * 2);
            let sample = i16::from_le_bytes([
                ram[sample_addr as usize],
                ram[sample_addr.wrapping_add(1) as usize],
            ]);
            self.echo_history[ECHO_TAPS - 1][channel] = (sample as i32) >> 1;
        }

        let mut filtered = [0i32; 2];
        for (channel, out) in filtered.iter_mut().enumerate() {
            let tap = |n: usize| {
                let coefficient = self.regs[FIR + n * 0x10] as i8 as i32;
                (self.echo_history[n][channel] * coefficient) >> 6
            };
            let mut sum = (0..ECHO_TAPS - 1).map(&tap).sum::<i32>() as i16 as i32;
            sum += tap(ECHO_TAPS - 1);
            *out = clamp16(sum) & !1;
        }

        if self.regs[FLG] & FLG_ECHO_DISABLE == 0 {
            let feedback = self.regs[EFB] as i8 as i32;
            for channel in 0..2 {
                let value = clamp16(input[channel] + ((filtered[channel] * feedback) >> 7)) & !1;
                let bytes = (value as i16).to_le_bytes();
                let sample_addr = addr.wrapping_add(channel as u16 * 2);
                ram[sample_addr as usize] = bytes[0];
                ram[sample_addr.wrapping_add(1) as usize] = bytes[1];
            }
        }

        let length = (self.regs[EDL] as u16 & 0x0F) * ECHO_BLOCK_BYTES;
        self.echo_offset += 4;
        if self.echo_offset >= length.max(4) {
            self.echo_offset = 0;
        }
        filtered
    }

    /// Nearest-neighbour decimation of the whole ring into the caller's
    /// buffers; the ring then restarts at offset zero.
    pub(crate) fn set_samples(&mut self, left: &mut [i16], right: &mut [i16]) {
        let count = left.len().min(right.len());
        for index in 0..count {
            let source = (index * SAMPLE_RING_LEN / count).min(SAMPLE_RING_LEN - 1);
            left[index] = self.ring_left[source];
            right[index] = self.ring_right[source];
        }
        self.ring_offset = 0;
    }
}
