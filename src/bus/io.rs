// 5A22 on-chip registers at $4200-$421F: interrupt control, the hardware
// multiplier/divider, H/V timer targets, MEMSEL and auto-joypad results.

use super::types::IrqMode;

pub(crate) const NMITIMEN: u16 = 0x4200;
pub(crate) const WRIO: u16 = 0x4201;
pub(crate) const WRMPYA: u16 = 0x4202;
pub(crate) const WRMPYB: u16 = 0x4203;
pub(crate) const WRDIVL: u16 = 0x4204;
pub(crate) const WRDIVH: u16 = 0x4205;
pub(crate) const WRDIVB: u16 = 0x4206;
pub(crate) const HTIMEL: u16 = 0x4207;
pub(crate) const HTIMEH: u16 = 0x4208;
pub(crate) const VTIMEL: u16 = 0x4209;
pub(crate) const VTIMEH: u16 = 0x420A;
pub(crate) const MDMAEN: u16 = 0x420B;
pub(crate) const HDMAEN: u16 = 0x420C;
pub(crate) const MEMSEL: u16 = 0x420D;
pub(crate) const RDNMI: u16 = 0x4210;
pub(crate) const TIMEUP: u16 = 0x4211;
pub(crate) const HVBJOY: u16 = 0x4212;
pub(crate) const RDIO: u16 = 0x4213;
pub(crate) const RDDIVL: u16 = 0x4214;
pub(crate) const RDDIVH: u16 = 0x4215;
pub(crate) const RDMPYL: u16 = 0x4216;
pub(crate) const RDMPYH: u16 = 0x4217;
pub(crate) const JOY1L: u16 = 0x4218;
pub(crate) const JOY4H: u16 = 0x421F;
const CPU_VERSION: u8 = 0x02;
/// Auto-read keeps HVBJOY bit 0 set for roughly three scanlines.
pub(crate) const AUTO_JOYPAD_CYCLES: u32 = 4224;

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub(crate) struct CpuIo {
    pub(crate) nmi_enabled: bool,
    pub(crate) irq_mode: IrqMode,
    pub(crate) auto_joypad: bool,
    pub(crate) wrio: u8,
    mul_a: u8,
    dividend: u16,
    pub(crate) quotient: u16,
    pub(crate) product: u16,
    pub(crate) htime: u16,
    pub(crate) vtime: u16,
    pub(crate) hdma_enable: u8,
    pub(crate) fast_rom: bool,
    /// RDNMI bit 7: set at V-blank start, cleared by reading $4210 or at line 0.
    pub(crate) vblank_nmi_flag: bool,
    /// TIMEUP bit 7; also the level of the CPU IRQ line.
    pub(crate) irq_flag: bool,
    pub(crate) nmi_pending: bool,
    pub(crate) auto_read_cycles: u32,
    pub(crate) joy_data: [u16; 4],
}

impl Default for CpuIo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuIo {
    pub(crate) fn new() -> Self {
        Self {
            nmi_enabled: false,
            irq_mode: IrqMode::Off,
            auto_joypad: false,
            wrio: 0xFF,
            mul_a: 0xFF,
            dividend: 0xFFFF,
            quotient: 0,
            product: 0,
            htime: 0x1FF,
            vtime: 0x1FF,
            hdma_enable: 0,
            fast_rom: false,
            vblank_nmi_flag: false,
            irq_flag: false,
            nmi_pending: false,
            auto_read_cycles: 0,
            joy_data: [0; 4],
        }
    }

    /// Register write. Returns the new WRIO value when bit 7 falls, which
    /// latches the PPU counters.
    pub(crate) fn write(&mut self, addr: u16, value: u8) -> Option<u8> {
        log::trace!("CPU register write: {addr:04X} {value:02X}");
        match addr {
            NMITIMEN => {
                self.auto_joypad = value & 0x01 != 0;
                self.irq_mode = IrqMode::from_byte(value);
                let nmi_enabled = value & 0x80 != 0;
                if !self.nmi_enabled && nmi_enabled && self.vblank_nmi_flag {
                    self.nmi_pending = true;
                }
                self.nmi_enabled = nmi_enabled;
                if self.irq_mode == IrqMode::Off {
                    self.irq_flag = false;
                }
            }
            WRIO => {
                let falling = self.wrio & 0x80 != 0 && value & 0x80 == 0;
                self.wrio = value;
                if falling {
                    return Some(value);
                }
            }
            WRMPYA => self.mul_a = value,
            WRMPYB => {
                self.product = self.mul_a as u16 * value as u16;
                self.quotient = value as u16;
            }
            WRDIVL => self.dividend = (self.dividend & 0xFF00) | value as u16,
            WRDIVH => self.dividend = (self.dividend & 0x00FF) | ((value as u16) << 8),
            WRDIVB => {
                if value == 0 {
                    self.quotient = 0xFFFF;
                    self.product = self.dividend;
                } else {
                    self.quotient = self.dividend / value as u16;
                    self.product = self.dividend % value as u16;
                }
            }
            HTIMEL => self.htime = (self.htime & 0x100) | value as u16,
            HTIMEH => self.htime = (self.htime & 0x0FF) | (((value & 0x01) as u16) << 8),
            VTIMEL => self.vtime = (self.vtime & 0x100) | value as u16,
            VTIMEH => self.vtime = (self.vtime & 0x0FF) | (((value & 0x01) as u16) << 8),
            HDMAEN => self.hdma_enable = value,
            MEMSEL => self.fast_rom = value & 0x01 != 0,
            _ => log::trace!("write to unused CPU register {addr:04X}"),
        }
        None
    }

    /// Register read. `vblank`/`hblank` come from the PPU beam position.
    pub(crate) fn read(&mut self, addr: u16, vblank: bool, hblank: bool) -> u8 {
        match addr {
            RDNMI => {
                let flag = self.vblank_nmi_flag;
                self.vblank_nmi_flag = false;
                (u8::from(flag) << 7) | CPU_VERSION
            }
            TIMEUP => {
                let flag = self.irq_flag;
                self.irq_flag = false;
                u8::from(flag) << 7
            }
            HVBJOY => {
                (u8::from(vblank) << 7)
                    | (u8::from(hblank) << 6)
                    | u8::from(self.auto_read_cycles > 0)
            }
            RDIO => self.wrio,
            RDDIVL => self.quotient as u8,
            RDDIVH => (self.quotient >> 8) as u8,
            RDMPYL => self.product as u8,
            RDMPYH => (self.product >> 8) as u8,
            JOY1L..=JOY4H => {
                let index = (addr - JOY1L) as usize;
                let word = self.joy_data[index / 2];
                if index % 2 == 0 {
                    word as u8
                } else {
                    (word >> 8) as u8
                }
            }
            _ => 0,
        }
    }

    /// V-blank entry: latch RDNMI and queue an NMI when enabled.
    pub(crate) fn enter_vblank(&mut self) {
        self.vblank_nmi_flag = true;
        if self.nmi_enabled {
            self.nmi_pending = true;
        }
    }

    pub(crate) fn leave_vblank(&mut self) {
        self.vblank_nmi_flag = false;
    }

    /// Whether an H/V timer IRQ fires while the beam moves from `h_before`
    /// to `h_after` (master cycles into `line`, never wrapping).
    pub(crate) fn timer_irq_hit(&self, line: u16, h_before: u32, h_after: u32) -> bool {
        let htime_cycle = self.htime as u32 * crate::ppu::MASTER_CYCLES_PER_DOT;
        let target = match self.irq_mode {
            IrqMode::Off => return false,
            IrqMode::H => htime_cycle,
            IrqMode::V if line == self.vtime => 0,
            IrqMode::HV if line == self.vtime => htime_cycle,
            IrqMode::V | IrqMode::HV => return false,
        };
        h_before <= target && target < h_after
    }
}
