/// Visible counters are four bits wide and stop at their maximum.
const COUNTER_MAX: u8 = 0x0F;

/// One of the three SPC700 interval timers.
#[derive(Clone, Copy, Debug, bincode::Encode, bincode::Decode)]
pub(crate) struct Timer {
    /// APU cycles per divider step: 128 for timers 0/1, 16 for timer 2.
    prescaler: u16,
    stage: u16,
    enabled: bool,
    pub(crate) target: u8,
    divider: u8,
    counter: u8,
}

impl Timer {
    pub(crate) fn new(prescaler: u16) -> Self {
        Self {
            prescaler,
            stage: 0,
            enabled: false,
            target: 0,
            divider: 0,
            counter: 0,
        }
    }

    /// A 0→1 enable restarts the divider and clears the counter.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.stage = 0;
            self.divider = 0;
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    pub(crate) fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        self.stage += 1;
        if self.stage < self.prescaler {
            return;
        }
        self.stage = 0;
        // A target of 0 is reached after the divider wraps, i.e. 256 steps.
        self.divider = self.divider.wrapping_add(1);
        if self.divider == self.target {
            self.divider = 0;
            self.counter = (self.counter + 1).min(COUNTER_MAX);
        }
    }

    /// Read of $FD-$FF: return the counter and clear it.
    pub(crate) fn take_counter(&mut self) -> u8 {
        std::mem::take(&mut self.counter)
    }
}
