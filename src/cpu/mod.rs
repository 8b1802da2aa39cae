use crate::bus::Bus;


pub const FLAG_CARRY: u8 = 0b0000_0001;
pub const FLAG_ZERO: u8 = 0b0000_0010;
pub const FLAG_IRQ_DISABLE: u8 = 0b0000_0100;
pub const FLAG_DECIMAL: u8 = 0b0000_1000;
/// X in native mode (8-bit index registers), B on the emulation-mode stack.
pub const FLAG_INDEX_8: u8 = 0b0001_0000;
/// M in native mode (8-bit accumulator and memory).
pub const FLAG_MEMORY_8: u8 = 0b0010_0000;
pub const FLAG_OVERFLOW: u8 = 0b0100_0000;
pub const FLAG_NEGATIVE: u8 = 0b1000_0000;
const FLAG_BREAK: u8 = FLAG_INDEX_8;

const VECTOR_COP_NATIVE: u16 = 0xFFE4;
const VECTOR_BRK_NATIVE: u16 = 0xFFE6;
const VECTOR_NMI_NATIVE: u16 = 0xFFEA;
const VECTOR_IRQ_NATIVE: u16 = 0xFFEE;
const VECTOR_COP_EMULATION: u16 = 0xFFF4;
const VECTOR_NMI_EMULATION: u16 = 0xFFFA;
const VECTOR_RESET: u16 = 0xFFFC;
const VECTOR_IRQ_EMULATION: u16 = 0xFFFE;
/// Master cycles of one internal (non-bus) CPU cycle.
pub(crate) const IO_CYCLES: u32 = 6;

/// Effective address of an operand. Direct-page and stack-relative operands
/// wrap inside bank 0; everything else carries into the next bank.
#[derive(Clone, Copy, Debug)]
enum Addr {
    Bank0(u16),
    Long(u32),
}

impl Addr {
    fn offset(self, n: u16) -> u32 {
        match self {
            Addr::Bank0(addr) => addr.wrapping_add(n) as u32,
            Addr::Long(addr) => (addr + n as u32) & 0xFF_FFFF,
        }
    }
}

/// WDC 65C816 core as found in the 5A22. Every bus access is charged at the
/// speed the bus reports for its address, internal cycles at [`IO_CYCLES`].
#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct Cpu {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub dp: u16,
    pub pc: u16,
    pub pbr: u8,
    pub dbr: u8,
    pub p: u8,
    pub emulation: bool,
    waiting: bool,
    stopped: bool,
    nmi_pending: bool,
    irq_line: bool,
    cycles: u32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x01FF,
            dp: 0,
            pc: 0,
            pbr: 0,
            dbr: 0,
            p: FLAG_IRQ_DISABLE | FLAG_INDEX_8 | FLAG_MEMORY_8,
            emulation: true,
            waiting: false,
            stopped: false,
            nmi_pending: false,
            irq_line: false,
            cycles: 0,
        }
    }

    pub fn reset(&mut self, bus: &mut Bus) {
        self.emulation = true;
        self.p = (self.p | FLAG_IRQ_DISABLE | FLAG_INDEX_8 | FLAG_MEMORY_8) & !FLAG_DECIMAL;
        self.x &= 0x00FF;
        self.y &= 0x00FF;
        self.sp = 0x01FF;
        self.dp = 0;
        self.pbr = 0;
        self.dbr = 0;
        let lo = bus.read(VECTOR_RESET as u32);
        let hi = bus.read(VECTOR_RESET as u32 + 1);
        self.pc = u16::from_le_bytes([lo, hi]);
        self.waiting = false;
        self.stopped = false;
        self.nmi_pending = false;
        self.irq_line = false;
        log::debug!("CPU reset, PC=${:04X}", self.pc);
    }

    /// Latch an NMI edge; serviced at the next instruction boundary.
    pub fn raise_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Level-sensitive IRQ input.
    pub fn set_irq_line(&mut self, level: bool) {
        self.irq_line = level;
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Full 24-bit program counter.
    pub fn program_counter(&self) -> u32 {
        ((self.pbr as u32) << 16) | self.pc as u32
    }

    /// Execute one instruction, or enter one interrupt handler. Returns the
    /// master cycles consumed; a halted or waiting CPU idles for one cycle.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        self.cycles = 0;
        if bus.take_nmi() {
            self.raise_nmi();
        }
        self.set_irq_line(bus.irq_line());

        if self.stopped {
            return IO_CYCLES;
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.waiting = false;
            self.interrupt(bus, VECTOR_NMI_NATIVE, VECTOR_NMI_EMULATION, false);
            return self.cycles;
        }

        if self.irq_line {
            // WAI resumes on IRQ even while I masks it.
            self.waiting = false;
            if !self.flag(FLAG_IRQ_DISABLE) {
                self.interrupt(bus, VECTOR_IRQ_NATIVE, VECTOR_IRQ_EMULATION, false);
                return self.cycles;
            }
        }

        if self.waiting {
            return IO_CYCLES;
        }

        let opcode = self.fetch8(bus);
        self.execute(bus, opcode);
        self.cycles
    }

    fn execute(&mut self, bus: &mut Bus, opcode: u8) {
        match opcode {
            // ORA / AND / EOR / ADC / LDA / CMP / SBC share one addressing grid.
            0x09 => {
                let value = self.imm(bus, self.wide_m());
                self.ora(value);
            }
            0x29 => {
                let value = self.imm(bus, self.wide_m());
                self.and(value);
            }
            0x49 => {
                let value = self.imm(bus, self.wide_m());
                self.eor(value);
            }
            0x69 => {
                let value = self.imm(bus, self.wide_m());
                self.adc(value);
            }
            0xA9 => {
                let value = self.imm(bus, self.wide_m());
                self.lda(value);
            }
            0xC9 => {
                let value = self.imm(bus, self.wide_m());
                self.compare(self.a, value, self.wide_m());
            }
            0xE9 => {
                let value = self.imm(bus, self.wide_m());
                self.sbc(value);
            }
            0x01 | 0x03 | 0x05 | 0x07 | 0x0D | 0x0F | 0x11 | 0x12 | 0x13 | 0x15 | 0x17 | 0x19
            | 0x1D | 0x1F => {
                let value = self.read_group1(bus, opcode);
                self.ora(value);
            }
            0x21 | 0x23 | 0x25 | 0x27 | 0x2D | 0x2F | 0x31 | 0x32 | 0x33 | 0x35 | 0x37 | 0x39
            | 0x3D | 0x3F => {
                let value = self.read_group1(bus, opcode);
                self.and(value);
            }
            0x41 | 0x43 | 0x45 | 0x47 | 0x4D | 0x4F | 0x51 | 0x52 | 0x53 | 0x55 | 0x57 | 0x59
            | 0x5D | 0x5F => {
                let value = self.read_group1(bus, opcode);
                self.eor(value);
            }
            0x61 | 0x63 | 0x65 | 0x67 | 0x6D | 0x6F | 0x71 | 0x72 | 0x73 | 0x75 | 0x77 | 0x79
            | 0x7D | 0x7F => {
                let value = self.read_group1(bus, opcode);
                self.adc(value);
            }
            0xA1 | 0xA3 | 0xA5 | 0xA7 | 0xAD | 0xAF | 0xB1 | 0xB2 | 0xB3 | 0xB5 | 0xB7 | 0xB9
            | 0xBD | 0xBF => {
                let value = self.read_group1(bus, opcode);
                self.lda(value);
            }
            0xC1 | 0xC3 | 0xC5 | 0xC7 | 0xCD | 0xCF | 0xD1 | 0xD2 | 0xD3 | 0xD5 | 0xD7 | 0xD9
            | 0xDD | 0xDF => {
                let value = self.read_group1(bus, opcode);
                self.compare(self.a, value, self.wide_m());
            }
            0xE1 | 0xE3 | 0xE5 | 0xE7 | 0xED | 0xEF | 0xF1 | 0xF2 | 0xF3 | 0xF5 | 0xF7 | 0xF9
            | 0xFD | 0xFF => {
                let value = self.read_group1(bus, opcode);
                self.sbc(value);
            }
            // STA
            0x81 | 0x83 | 0x85 | 0x87 | 0x8D | 0x8F | 0x91 | 0x92 | 0x93 | 0x95 | 0x97 | 0x99
            | 0x9D | 0x9F => {
                let addr = self.group1_addr(bus, opcode, true);
                self.write_addr(bus, addr, self.a, self.wide_m());
            }

            // BIT
            0x89 => {
                let value = self.imm(bus, self.wide_m());
                self.bit(value, true);
            }
            0x24 => {
                let addr = self.addr_dp(bus);
                let value = self.read_addr(bus, addr, self.wide_m());
                self.bit(value, false);
            }
            0x2C => {
                let addr = self.addr_abs(bus);
                let value = self.read_addr(bus, addr, self.wide_m());
                self.bit(value, false);
            }
            0x34 => {
                let addr = self.addr_dp_indexed(bus, self.x);
                let value = self.read_addr(bus, addr, self.wide_m());
                self.bit(value, false);
            }
            0x3C => {
                let addr = self.addr_abs_indexed(bus, self.x, false);
                let value = self.read_addr(bus, addr, self.wide_m());
                self.bit(value, false);
            }

            // Shifts, rotates, INC/DEC
            0x0A => self.modify_acc(Self::asl),
            0x2A => self.modify_acc(Self::rol),
            0x4A => self.modify_acc(Self::lsr),
            0x6A => self.modify_acc(Self::ror),
            0x1A => self.modify_acc(Self::inc),
            0x3A => self.modify_acc(Self::dec),
            0x06 | 0x0E | 0x16 | 0x1E => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::asl);
            }
            0x26 | 0x2E | 0x36 | 0x3E => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::rol);
            }
            0x46 | 0x4E | 0x56 | 0x5E => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::lsr);
            }
            0x66 | 0x6E | 0x76 | 0x7E => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::ror);
            }
            0xE6 | 0xEE | 0xF6 | 0xFE => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::inc);
            }
            0xC6 | 0xCE | 0xD6 | 0xDE => {
                let addr = self.rmw_addr(bus, opcode);
                self.modify(bus, addr, Self::dec);
            }
            0x04 => {
                let addr = self.addr_dp(bus);
                self.test_bits(bus, addr, true);
            }
            0x0C => {
                let addr = self.addr_abs(bus);
                self.test_bits(bus, addr, true);
            }
            0x14 => {
                let addr = self.addr_dp(bus);
                self.test_bits(bus, addr, false);
            }
            0x1C => {
                let addr = self.addr_abs(bus);
                self.test_bits(bus, addr, false);
            }

            // Index register loads, stores and compares
            0xA2 => {
                let value = self.imm(bus, self.wide_x());
                self.ldx(value);
            }
            0xA6 => {
                let addr = self.addr_dp(bus);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldx(value);
            }
            0xAE => {
                let addr = self.addr_abs(bus);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldx(value);
            }
            0xB6 => {
                let addr = self.addr_dp_indexed(bus, self.y);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldx(value);
            }
            0xBE => {
                let addr = self.addr_abs_indexed(bus, self.y, false);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldx(value);
            }
            0xA0 => {
                let value = self.imm(bus, self.wide_x());
                self.ldy(value);
            }
            0xA4 => {
                let addr = self.addr_dp(bus);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldy(value);
            }
            0xAC => {
                let addr = self.addr_abs(bus);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldy(value);
            }
            0xB4 => {
                let addr = self.addr_dp_indexed(bus, self.x);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldy(value);
            }
            0xBC => {
                let addr = self.addr_abs_indexed(bus, self.x, false);
                let value = self.read_addr(bus, addr, self.wide_x());
                self.ldy(value);
            }
            0x86 => {
                let addr = self.addr_dp(bus);
                self.write_addr(bus, addr, self.x, self.wide_x());
            }
            0x8E => {
                let addr = self.addr_abs(bus);
                self.write_addr(bus, addr, self.x, self.wide_x());
            }
            0x96 => {
                let addr = self.addr_dp_indexed(bus, self.y);
                self.write_addr(bus, addr, self.x, self.wide_x());
            }
            0x84 => {
                let addr = self.addr_dp(bus);
                self.write_addr(bus, addr, self.y, self.wide_x());
            }
            0x8C => {
                let addr = self.addr_abs(bus);
                self.write_addr(bus, addr, self.y, self.wide_x());
            }
            0x94 => {
                let addr = self.addr_dp_indexed(bus, self.x);
                self.write_addr(bus, addr, self.y, self.wide_x());
            }
            0x64 => {
                let addr = self.addr_dp(bus);
                self.write_addr(bus, addr, 0, self.wide_m());
            }
            0x74 => {
                let addr = self.addr_dp_indexed(bus, self.x);
                self.write_addr(bus, addr, 0, self.wide_m());
            }
            0x9C => {
                let addr = self.addr_abs(bus);
                self.write_addr(bus, addr, 0, self.wide_m());
            }
            0x9E => {
                let addr = self.addr_abs_indexed(bus, self.x, true);
                self.write_addr(bus, addr, 0, self.wide_m());
            }
            0xE0 => {
                let value = self.imm(bus, self.wide_x());
                self.compare(self.x, value, self.wide_x());
            }
            0xE4 | 0xEC => {
                let addr = if opcode == 0xE4 { self.addr_dp(bus) } else { self.addr_abs(bus) };
                let value = self.read_addr(bus, addr, self.wide_x());
                self.compare(self.x, value, self.wide_x());
            }
            0xC0 => {
                let value = self.imm(bus, self.wide_x());
                self.compare(self.y, value, self.wide_x());
            }
            0xC4 | 0xCC => {
                let addr = if opcode == 0xC4 { self.addr_dp(bus) } else { self.addr_abs(bus) };
                let value = self.read_addr(bus, addr, self.wide_x());
                self.compare(self.y, value, self.wide_x());
            }

            // Branches
            0x10 => self.branch(bus, !self.flag(FLAG_NEGATIVE)),
            0x30 => self.branch(bus, self.flag(FLAG_NEGATIVE)),
            0x50 => self.branch(bus, !self.flag(FLAG_OVERFLOW)),
            0x70 => self.branch(bus, self.flag(FLAG_OVERFLOW)),
            0x90 => self.branch(bus, !self.flag(FLAG_CARRY)),
            0xB0 => self.branch(bus, self.flag(FLAG_CARRY)),
            0xD0 => self.branch(bus, !self.flag(FLAG_ZERO)),
            0xF0 => self.branch(bus, self.flag(FLAG_ZERO)),
            0x80 => self.branch(bus, true),
            0x82 => {
                let offset = self.fetch16(bus);
                self.idle();
                self.pc = self.pc.wrapping_add(offset);
            }

            // Jumps and calls
            0x4C => self.pc = self.fetch16(bus),
            0x5C => {
                let target = self.fetch24(bus);
                self.pc = target as u16;
                self.pbr = (target >> 16) as u8;
            }
            0x6C => {
                let pointer = self.fetch16(bus);
                self.pc = self.read_addr(bus, Addr::Bank0(pointer), true);
            }
            0x7C => {
                let pointer = self.fetch16(bus).wrapping_add(self.x);
                self.idle();
                self.pc = self.read_program_word(bus, pointer);
            }
            0xDC => {
                let pointer = self.fetch16(bus);
                let target = self.read_addr(bus, Addr::Bank0(pointer), true);
                self.pbr = self.read(bus, pointer.wrapping_add(2) as u32);
                self.pc = target;
            }
            0x20 => {
                let target = self.fetch16(bus);
                self.idle();
                self.push16(bus, self.pc.wrapping_sub(1));
                self.pc = target;
            }
            0xFC => {
                let pointer = self.fetch16(bus);
                self.push16(bus, self.pc.wrapping_sub(1));
                self.idle();
                self.pc = self.read_program_word(bus, pointer.wrapping_add(self.x));
            }
            0x22 => {
                let target = self.fetch16(bus);
                self.push8(bus, self.pbr);
                self.idle();
                let bank = self.fetch8(bus);
                self.push16(bus, self.pc.wrapping_sub(1));
                self.pbr = bank;
                self.pc = target;
            }
            0x60 => {
                self.idle();
                self.idle();
                self.pc = self.pull16(bus).wrapping_add(1);
                self.idle();
            }
            0x6B => {
                self.idle();
                self.idle();
                self.pc = self.pull16(bus).wrapping_add(1);
                self.pbr = self.pull8(bus);
            }
            0x40 => {
                self.idle();
                self.idle();
                let p = self.pull8(bus);
                self.set_p(p);
                self.pc = self.pull16(bus);
                if !self.emulation {
                    self.pbr = self.pull8(bus);
                }
            }

            // Stack
            0x48 => {
                self.idle();
                self.push_sized(bus, self.a, self.wide_m());
            }
            0xDA => {
                self.idle();
                self.push_sized(bus, self.x, self.wide_x());
            }
            0x5A => {
                self.idle();
                self.push_sized(bus, self.y, self.wide_x());
            }
            0x08 => {
                self.idle();
                self.push8(bus, self.p);
            }
            0x8B => {
                self.idle();
                self.push8(bus, self.dbr);
            }
            0x0B => {
                self.idle();
                self.push16(bus, self.dp);
            }
            0x4B => {
                self.idle();
                self.push8(bus, self.pbr);
            }
            0x68 => {
                self.idle();
                self.idle();
                let value = self.pull_sized(bus, self.wide_m());
                self.lda(value);
            }
            0xFA => {
                self.idle();
                self.idle();
                let value = self.pull_sized(bus, self.wide_x());
                self.ldx(value);
            }
            0x7A => {
                self.idle();
                self.idle();
                let value = self.pull_sized(bus, self.wide_x());
                self.ldy(value);
            }
            0x28 => {
                self.idle();
                self.idle();
                let p = self.pull8(bus);
                self.set_p(p);
            }
            0xAB => {
                self.idle();
                self.idle();
                self.dbr = self.pull8(bus);
                self.set_nz(self.dbr as u16, false);
            }
            0x2B => {
                self.idle();
                self.idle();
                self.dp = self.pull16(bus);
                self.set_nz(self.dp, true);
            }
            0xF4 => {
                let value = self.fetch16(bus);
                self.push16(bus, value);
            }
            0xD4 => {
                let addr = self.addr_dp(bus);
                let value = self.read_addr(bus, addr, true);
                self.push16(bus, value);
            }
            0x62 => {
                let offset = self.fetch16(bus);
                self.idle();
                self.push16(bus, self.pc.wrapping_add(offset));
            }

            // Transfers
            0xAA => self.transfer_to_index(self.a, true),
            0xA8 => self.transfer_to_index(self.a, false),
            0x8A => self.transfer_to_a(self.x),
            0x98 => self.transfer_to_a(self.y),
            0xBA => self.transfer_to_index(self.sp, true),
            0x9B => self.transfer_to_index(self.x, false),
            0xBB => self.transfer_to_index(self.y, true),
            0x9A => {
                self.idle();
                self.sp = if self.emulation {
                    0x0100 | (self.x & 0x00FF)
                } else {
                    self.x
                };
            }
            0x5B => {
                self.idle();
                self.dp = self.a;
                self.set_nz(self.dp, true);
            }
            0x7B => {
                self.idle();
                self.a = self.dp;
                self.set_nz(self.a, true);
            }
            0x1B => {
                self.idle();
                self.sp = if self.emulation {
                    0x0100 | (self.a & 0x00FF)
                } else {
                    self.a
                };
            }
            0x3B => {
                self.idle();
                self.a = self.sp;
                self.set_nz(self.a, true);
            }
            0xEB => {
                self.idle();
                self.idle();
                self.a = self.a.swap_bytes();
                self.set_nz(self.a & 0x00FF, false);
            }

            // Flags
            0x18 => self.change_flag(FLAG_CARRY, false),
            0x38 => self.change_flag(FLAG_CARRY, true),
            0x58 => self.change_flag(FLAG_IRQ_DISABLE, false),
            0x78 => self.change_flag(FLAG_IRQ_DISABLE, true),
            0xD8 => self.change_flag(FLAG_DECIMAL, false),
            0xF8 => self.change_flag(FLAG_DECIMAL, true),
            0xB8 => self.change_flag(FLAG_OVERFLOW, false),
            0xC2 => {
                let mask = self.fetch8(bus);
                self.idle();
                self.set_p(self.p & !mask);
            }
            0xE2 => {
                let mask = self.fetch8(bus);
                self.idle();
                self.set_p(self.p | mask);
            }
            0xFB => {
                self.idle();
                let carry = self.flag(FLAG_CARRY);
                self.set_flag(FLAG_CARRY, self.emulation);
                self.emulation = carry;
                if self.emulation {
                    self.sp = 0x0100 | (self.sp & 0x00FF);
                }
                self.set_p(self.p);
            }

            // Index increments
            0xE8 => self.step_index(true, 1),
            0xCA => self.step_index(true, -1),
            0xC8 => self.step_index(false, 1),
            0x88 => self.step_index(false, -1),

            // Block moves
            0x54 => self.block_move(bus, 1),
            0x44 => self.block_move(bus, -1),

            // Software interrupts and processor control
            0x00 => {
                self.fetch8(bus);
                self.interrupt(bus, VECTOR_BRK_NATIVE, VECTOR_IRQ_EMULATION, true);
            }
            0x02 => {
                self.fetch8(bus);
                self.interrupt(bus, VECTOR_COP_NATIVE, VECTOR_COP_EMULATION, true);
            }
            0x42 => {
                // WDM: reserved two-byte no-op.
                self.fetch8(bus);
            }
            0xEA => self.idle(),
            0xCB => {
                self.idle();
                self.idle();
                self.waiting = true;
            }
            0xDB => {
                self.idle();
                self.idle();
                self.stopped = true;
                log::debug!("STP at ${:06X}", self.program_counter());
            }
        }
    }

    // ----- flags and registers -----

    fn flag(&self, flag: u8) -> bool {
        self.p & flag != 0
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    fn change_flag(&mut self, flag: u8, on: bool) {
        self.idle();
        self.set_flag(flag, on);
    }

    /// Install a new P, honouring emulation-mode forcing and index truncation.
    fn set_p(&mut self, value: u8) {
        self.p = value;
        if self.emulation {
            self.p |= FLAG_MEMORY_8 | FLAG_INDEX_8;
        }
        if self.flag(FLAG_INDEX_8) {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    fn wide_m(&self) -> bool {
        !self.flag(FLAG_MEMORY_8)
    }

    fn wide_x(&self) -> bool {
        !self.flag(FLAG_INDEX_8)
    }

    fn set_nz(&mut self, value: u16, wide: bool) {
        if wide {
            self.set_flag(FLAG_ZERO, value == 0);
            self.set_flag(FLAG_NEGATIVE, value & 0x8000 != 0);
        } else {
            self.set_flag(FLAG_ZERO, value & 0x00FF == 0);
            self.set_flag(FLAG_NEGATIVE, value & 0x0080 != 0);
        }
    }

    fn set_a(&mut self, value: u16) {
        if self.wide_m() {
            self.a = value;
        } else {
            self.a = (self.a & 0xFF00) | (value & 0x00FF);
        }
    }

    // ----- bus access -----

    fn idle(&mut self) {
        self.cycles += IO_CYCLES;
    }

    fn read(&mut self, bus: &mut Bus, addr: u32) -> u8 {
        self.cycles += bus.access_cycles(addr);
        bus.read(addr)
    }

    fn write(&mut self, bus: &mut Bus, addr: u32, value: u8) {
        self.cycles += bus.access_cycles(addr);
        bus.write(addr, value);
    }

    fn read_addr(&mut self, bus: &mut Bus, addr: Addr, wide: bool) -> u16 {
        let lo = self.read(bus, addr.offset(0)) as u16;
        if !wide {
            return lo;
        }
        let hi = self.read(bus, addr.offset(1)) as u16;
        lo | (hi << 8)
    }

    fn write_addr(&mut self, bus: &mut Bus, addr: Addr, value: u16, wide: bool) {
        self.write(bus, addr.offset(0), value as u8);
        if wide {
            self.write(bus, addr.offset(1), (value >> 8) as u8);
        }
    }

    fn read_program_word(&mut self, bus: &mut Bus, pointer: u16) -> u16 {
        let bank = (self.pbr as u32) << 16;
        let lo = self.read(bus, bank | pointer as u32) as u16;
        let hi = self.read(bus, bank | pointer.wrapping_add(1) as u32) as u16;
        lo | (hi << 8)
    }

    fn fetch8(&mut self, bus: &mut Bus) -> u8 {
        let value = self.read(bus, self.program_counter());
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        lo | (hi << 8)
    }

    fn fetch24(&mut self, bus: &mut Bus) -> u32 {
        let word = self.fetch16(bus) as u32;
        let bank = self.fetch8(bus) as u32;
        word | (bank << 16)
    }

    fn imm(&mut self, bus: &mut Bus, wide: bool) -> u16 {
        if wide {
            self.fetch16(bus)
        } else {
            self.fetch8(bus) as u16
        }
    }

    fn push8(&mut self, bus: &mut Bus, value: u8) {
        self.write(bus, self.sp as u32, value);
        self.sp = if self.emulation {
            0x0100 | (self.sp.wrapping_sub(1) & 0x00FF)
        } else {
            self.sp.wrapping_sub(1)
        };
    }

    fn pull8(&mut self, bus: &mut Bus) -> u8 {
        self.sp = if self.emulation {
            0x0100 | (self.sp.wrapping_add(1) & 0x00FF)
        } else {
            self.sp.wrapping_add(1)
        };
        self.read(bus, self.sp as u32)
    }

    fn push16(&mut self, bus: &mut Bus, value: u16) {
        self.push8(bus, (value >> 8) as u8);
        self.push8(bus, value as u8);
    }

    fn pull16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.pull8(bus) as u16;
        let hi = self.pull8(bus) as u16;
        lo | (hi << 8)
    }

    fn push_sized(&mut self, bus: &mut Bus, value: u16, wide: bool) {
        if wide {
            self.push16(bus, value);
        } else {
            self.push8(bus, value as u8);
        }
    }

    fn pull_sized(&mut self, bus: &mut Bus, wide: bool) -> u16 {
        if wide {
            self.pull16(bus)
        } else {
            self.pull8(bus) as u16
        }
    }

    // ----- addressing modes -----

    fn direct_penalty(&mut self) {
        if self.dp & 0x00FF != 0 {
            self.idle();
        }
    }

    fn index_penalty(&mut self, base: u32, index: u16, write: bool) {
        let crossed = (base & 0xFF_FF00) != ((base + index as u32) & 0xFF_FF00);
        if write || self.wide_x() || crossed {
            self.idle();
        }
    }

    fn data_bank(&self) -> u32 {
        (self.dbr as u32) << 16
    }

    fn addr_dp(&mut self, bus: &mut Bus) -> Addr {
        let offset = self.fetch8(bus) as u16;
        self.direct_penalty();
        Addr::Bank0(self.dp.wrapping_add(offset))
    }

    fn addr_dp_indexed(&mut self, bus: &mut Bus, index: u16) -> Addr {
        let offset = self.fetch8(bus) as u16;
        self.direct_penalty();
        self.idle();
        if self.emulation && self.dp & 0x00FF == 0 {
            Addr::Bank0((self.dp & 0xFF00) | (offset.wrapping_add(index) & 0x00FF))
        } else {
            Addr::Bank0(self.dp.wrapping_add(offset).wrapping_add(index))
        }
    }

    fn addr_dp_indirect(&mut self, bus: &mut Bus) -> Addr {
        let pointer = self.addr_dp(bus);
        let target = self.read_addr(bus, pointer, true) as u32;
        Addr::Long(self.data_bank() | target)
    }

    fn addr_dp_x_indirect(&mut self, bus: &mut Bus) -> Addr {
        let pointer = self.addr_dp_indexed(bus, self.x);
        let target = self.read_addr(bus, pointer, true) as u32;
        Addr::Long(self.data_bank() | target)
    }

    fn addr_dp_indirect_y(&mut self, bus: &mut Bus, write: bool) -> Addr {
        let pointer = self.addr_dp(bus);
        let base = self.data_bank() | self.read_addr(bus, pointer, true) as u32;
        self.index_penalty(base, self.y, write);
        Addr::Long((base + self.y as u32) & 0xFF_FFFF)
    }

    fn read_long_pointer(&mut self, bus: &mut Bus, pointer: Addr) -> u32 {
        let word = self.read_addr(bus, pointer, true) as u32;
        let bank = self.read(bus, pointer.offset(2)) as u32;
        word | (bank << 16)
    }

    fn addr_dp_indirect_long(&mut self, bus: &mut Bus) -> Addr {
        let pointer = self.addr_dp(bus);
        Addr::Long(self.read_long_pointer(bus, pointer))
    }

    fn addr_dp_indirect_long_y(&mut self, bus: &mut Bus) -> Addr {
        let pointer = self.addr_dp(bus);
        let base = self.read_long_pointer(bus, pointer);
        Addr::Long((base + self.y as u32) & 0xFF_FFFF)
    }

    fn addr_abs(&mut self, bus: &mut Bus) -> Addr {
        let offset = self.fetch16(bus) as u32;
        Addr::Long(self.data_bank() | offset)
    }

    fn addr_abs_indexed(&mut self, bus: &mut Bus, index: u16, write: bool) -> Addr {
        let base = self.data_bank() | self.fetch16(bus) as u32;
        self.index_penalty(base, index, write);
        Addr::Long((base + index as u32) & 0xFF_FFFF)
    }

    fn addr_long(&mut self, bus: &mut Bus) -> Addr {
        Addr::Long(self.fetch24(bus))
    }

    fn addr_long_x(&mut self, bus: &mut Bus) -> Addr {
        let base = self.fetch24(bus);
        Addr::Long((base + self.x as u32) & 0xFF_FFFF)
    }

    fn addr_stack_relative(&mut self, bus: &mut Bus) -> Addr {
        let offset = self.fetch8(bus) as u16;
        self.idle();
        Addr::Bank0(self.sp.wrapping_add(offset))
    }

    fn addr_stack_relative_indirect_y(&mut self, bus: &mut Bus) -> Addr {
        let pointer = self.addr_stack_relative(bus);
        let base = self.data_bank() | self.read_addr(bus, pointer, true) as u32;
        self.idle();
        Addr::Long((base + self.y as u32) & 0xFF_FFFF)
    }

    /// Operand address for the ORA/AND/EOR/ADC/STA/LDA/CMP/SBC column,
    /// selected by the low five opcode bits.
    fn group1_addr(&mut self, bus: &mut Bus, opcode: u8, write: bool) -> Addr {
        match opcode & 0x1F {
            0x01 => self.addr_dp_x_indirect(bus),
            0x03 => self.addr_stack_relative(bus),
            0x05 => self.addr_dp(bus),
            0x07 => self.addr_dp_indirect_long(bus),
            0x0D => self.addr_abs(bus),
            0x0F => self.addr_long(bus),
            0x11 => self.addr_dp_indirect_y(bus, write),
            0x12 => self.addr_dp_indirect(bus),
            0x13 => self.addr_stack_relative_indirect_y(bus),
            0x15 => self.addr_dp_indexed(bus, self.x),
            0x17 => self.addr_dp_indirect_long_y(bus),
            0x19 => self.addr_abs_indexed(bus, self.y, write),
            0x1D => self.addr_abs_indexed(bus, self.x, write),
            _ => self.addr_long_x(bus),
        }
    }

    fn read_group1(&mut self, bus: &mut Bus, opcode: u8) -> u16 {
        let addr = self.group1_addr(bus, opcode, false);
        self.read_addr(bus, addr, self.wide_m())
    }

    /// dp / abs / dp,X / abs,X for the read-modify-write column.
    fn rmw_addr(&mut self, bus: &mut Bus, opcode: u8) -> Addr {
        match opcode & 0x1F {
            0x06 => self.addr_dp(bus),
            0x0E => self.addr_abs(bus),
            0x16 => self.addr_dp_indexed(bus, self.x),
            _ => self.addr_abs_indexed(bus, self.x, true),
        }
    }

    // ----- ALU -----

    fn lda(&mut self, value: u16) {
        let wide = self.wide_m();
        self.set_nz(value, wide);
        self.set_a(value);
    }

    fn ldx(&mut self, value: u16) {
        let wide = self.wide_x();
        self.set_nz(value, wide);
        self.x = if wide { value } else { value & 0x00FF };
    }

    fn ldy(&mut self, value: u16) {
        let wide = self.wide_x();
        self.set_nz(value, wide);
        self.y = if wide { value } else { value & 0x00FF };
    }

    fn ora(&mut self, value: u16) {
        self.lda(self.a | value);
    }

    fn and(&mut self, value: u16) {
        self.lda(self.a & value);
    }

    fn eor(&mut self, value: u16) {
        self.lda(self.a ^ value);
    }

    fn compare(&mut self, register: u16, value: u16, wide: bool) {
        let mask = if wide { 0xFFFF } else { 0x00FF };
        let register = register & mask;
        let value = value & mask;
        self.set_flag(FLAG_CARRY, register >= value);
        self.set_nz(register.wrapping_sub(value), wide);
    }

    fn bit(&mut self, value: u16, immediate: bool) {
        let wide = self.wide_m();
        let mask = if wide { 0xFFFF } else { 0x00FF };
        self.set_flag(FLAG_ZERO, self.a & value & mask == 0);
        if !immediate {
            let sign = if wide { 0x8000 } else { 0x0080 };
            self.set_flag(FLAG_NEGATIVE, value & sign != 0);
            self.set_flag(FLAG_OVERFLOW, value & (sign >> 1) != 0);
        }
    }

    fn adc(&mut self, value: u16) {
        self.add_with_carry(value, false);
    }

    fn sbc(&mut self, value: u16) {
        self.add_with_carry(value, true);
    }

    /// Binary and BCD add/subtract, digit by digit so decimal carries and
    /// the overflow flag come out as on hardware.
    fn add_with_carry(&mut self, value: u16, subtract: bool) {
        let wide = self.wide_m();
        let (mask, sign, digits): (i32, i32, u32) = if wide {
            (0xFFFF, 0x8000, 4)
        } else {
            (0x00FF, 0x0080, 2)
        };
        let a = self.a as i32 & mask;
        let data = if subtract {
            !(value as i32) & mask
        } else {
            value as i32 & mask
        };
        let mut carry = i32::from(self.flag(FLAG_CARRY));
        let decimal = self.flag(FLAG_DECIMAL);

        let mut result;
        let top_shift = (digits - 1) * 4;
        if !decimal {
            result = a + data + carry;
        } else {
            result = 0;
            for digit in 0..digits {
                let shift = digit * 4;
                let nibble = 0xF << shift;
                let below = (1 << shift) - 1;
                result = (a & nibble) + (data & nibble) + (carry << shift) + (result & below);
                if digit == digits - 1 {
                    break;
                }
                let digit_max = (0x10 << shift) - 1;
                if subtract {
                    if result <= digit_max {
                        result -= 0x6 << shift;
                    }
                } else if result > (0xA << shift) - 1 {
                    result += 0x6 << shift;
                }
                carry = i32::from(result > digit_max);
            }
        }

        let overflow = !(a ^ data) & (a ^ result) & sign != 0;
        if decimal {
            if subtract {
                if result <= mask {
                    result -= 0x6 << top_shift;
                }
            } else if result > (0xA << top_shift) - 1 {
                result += 0x6 << top_shift;
            }
        }

        self.set_flag(FLAG_OVERFLOW, overflow);
        self.set_flag(FLAG_CARRY, result > mask);
        let result = (result & mask) as u16;
        self.set_nz(result, wide);
        self.set_a(result);
    }

    fn asl(&mut self, value: u16, wide: bool) -> u16 {
        let sign = if wide { 0x8000 } else { 0x0080 };
        self.set_flag(FLAG_CARRY, value & sign != 0);
        let result = value << 1;
        self.set_nz(result, wide);
        result
    }

    fn lsr(&mut self, value: u16, wide: bool) -> u16 {
        self.set_flag(FLAG_CARRY, value & 1 != 0);
        let result = value >> 1;
        self.set_nz(result, wide);
        result
    }

    fn rol(&mut self, value: u16, wide: bool) -> u16 {
        let sign = if wide { 0x8000 } else { 0x0080 };
        let carry_in = u16::from(self.flag(FLAG_CARRY));
        self.set_flag(FLAG_CARRY, value & sign != 0);
        let result = (value << 1) | carry_in;
        self.set_nz(result, wide);
        result
    }

    fn ror(&mut self, value: u16, wide: bool) -> u16 {
        let sign = if wide { 0x8000 } else { 0x0080 };
        let carry_in = if self.flag(FLAG_CARRY) { sign } else { 0 };
        self.set_flag(FLAG_CARRY, value & 1 != 0);
        let result = (value >> 1) | carry_in;
        self.set_nz(result, wide);
        result
    }

    fn inc(&mut self, value: u16, wide: bool) -> u16 {
        let result = value.wrapping_add(1);
        self.set_nz(result, wide);
        result
    }

    fn dec(&mut self, value: u16, wide: bool) -> u16 {
        let result = value.wrapping_sub(1);
        self.set_nz(result, wide);
        result
    }

    fn modify_acc(&mut self, op: fn(&mut Self, u16, bool) -> u16) {
        self.idle();
        let wide = self.wide_m();
        let value = if wide { self.a } else { self.a & 0x00FF };
        let result = op(self, value, wide);
        self.set_a(result);
    }

    fn modify(&mut self, bus: &mut Bus, addr: Addr, op: fn(&mut Self, u16, bool) -> u16) {
        let wide = self.wide_m();
        let value = self.read_addr(bus, addr, wide);
        self.idle();
        let result = op(self, value, wide);
        self.write_addr(bus, addr, result, wide);
    }

    /// TSB (`set`) / TRB: Z from A & memory, then set or clear A's bits.
    fn test_bits(&mut self, bus: &mut Bus, addr: Addr, set: bool) {
        let wide = self.wide_m();
        let mask = if wide { 0xFFFF } else { 0x00FF };
        let value = self.read_addr(bus, addr, wide);
        self.idle();
        self.set_flag(FLAG_ZERO, value & self.a & mask == 0);
        let result = if set { value | self.a } else { value & !self.a };
        self.write_addr(bus, addr, result, wide);
    }

    fn transfer_to_index(&mut self, value: u16, to_x: bool) {
        self.idle();
        let wide = self.wide_x();
        let value = if wide { value } else { value & 0x00FF };
        self.set_nz(value, wide);
        if to_x {
            self.x = value;
        } else {
            self.y = value;
        }
    }

    fn transfer_to_a(&mut self, value: u16) {
        self.idle();
        self.lda(value);
    }

    fn step_index(&mut self, x: bool, delta: i16) {
        self.idle();
        let wide = self.wide_x();
        let register = if x { self.x } else { self.y };
        let mut value = register.wrapping_add(delta as u16);
        if !wide {
            value &= 0x00FF;
        }
        self.set_nz(value, wide);
        if x {
            self.x = value;
        } else {
            self.y = value;
        }
    }

    fn branch(&mut self, bus: &mut Bus, condition: bool) {
        let offset = self.fetch8(bus) as i8;
        if !condition {
            return;
        }
        self.idle();
        let target = self.pc.wrapping_add(offset as u16);
        if self.emulation && (target & 0xFF00) != (self.pc & 0xFF00) {
            self.idle();
        }
        self.pc = target;
    }

    /// MVN (`step` = 1) / MVP (`step` = -1): move one byte, then rewind PC
    /// onto the instruction until the count in A underflows.
    fn block_move(&mut self, bus: &mut Bus, step: i16) {
        let dest_bank = self.fetch8(bus);
        let source_bank = self.fetch8(bus);
        self.dbr = dest_bank;
        let value = self.read(bus, ((source_bank as u32) << 16) | self.x as u32);
        self.write(bus, ((dest_bank as u32) << 16) | self.y as u32, value);
        self.idle();
        self.idle();

        let mask = if self.wide_x() { 0xFFFF } else { 0x00FF };
        self.x = self.x.wrapping_add(step as u16) & mask;
        self.y = self.y.wrapping_add(step as u16) & mask;
        self.a = self.a.wrapping_sub(1);
        if self.a != 0xFFFF {
            self.pc = self.pc.wrapping_sub(3);
        }
    }

    fn interrupt(&mut self, bus: &mut Bus, native: u16, emulation: u16, software: bool) {
        if !software {
            self.idle();
            self.idle();
        }
        if !self.emulation {
            self.push8(bus, self.pbr);
        }
        self.push16(bus, self.pc);
        let status = if !self.emulation {
            self.p
        } else if software {
            self.p | FLAG_BREAK
        } else {
            self.p & !FLAG_BREAK
        };
        self.push8(bus, status);
        self.set_flag(FLAG_IRQ_DISABLE, true);
        self.set_flag(FLAG_DECIMAL, false);
        self.pbr = 0;
        let vector = if self.emulation { emulation } else { native };
        self.pc = self.read_addr(bus, Addr::Bank0(vector), true);
    }
}
