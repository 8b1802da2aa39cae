use super::bus::ApuBus;

pub(crate) const FLAG_C: u8 = 0x01;
pub(crate) const FLAG_Z: u8 = 0x02;
pub(crate) const FLAG_I: u8 = 0x04;
pub(crate) const FLAG_H: u8 = 0x08;
pub(crate) const FLAG_B: u8 = 0x10;
/// Direct page at $0100 instead of $0000.
pub(crate) const FLAG_P: u8 = 0x20;
pub(crate) const FLAG_V: u8 = 0x40;
pub(crate) const FLAG_N: u8 = 0x80;

const RESET_VECTOR: u16 = 0xFFFE;
/// TCALL 0 vector; TCALL n reads two bytes lower per n. BRK shares it.
const TCALL_VECTOR: u16 = 0xFFDE;
const BRANCH_TAKEN_CYCLES: u32 = 2;
/// Cycles reported per step while halted by SLEEP/STOP.
const HALTED_CYCLES: u32 = 2;

/// Base cycle cost of every opcode; conditional branches add
/// [`BRANCH_TAKEN_CYCLES`] when taken.
#[rustfmt::skip]
const CYCLES: [u8; 256] = [
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 6, 8,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 4, 6,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 5, 4,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 3, 8,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 6, 6,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 4, 5, 2, 2, 4, 3,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 5, 5,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 6,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 2, 4, 5,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 12, 5,
    3, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 2, 4, 4,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 4,
    3, 8, 4, 5, 4, 5, 4, 7, 2, 5, 6, 4, 5, 2, 4, 9,
    2, 8, 4, 5, 5, 6, 6, 7, 4, 5, 5, 5, 2, 2, 6, 3,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 4, 5, 3, 4, 3, 4, 3,
    2, 8, 4, 5, 4, 5, 5, 6, 3, 4, 5, 4, 2, 2, 4, 3,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AluOp {
    Or,
    And,
    Eor,
    Cmp,
    Adc,
    Sbc,
}

/// Row pairs $0x/$1x .. $Ax/$Bx of the arithmetic block.
const ALU_OPS: [AluOp; 6] = [
    AluOp::Or,
    AluOp::And,
    AluOp::Eor,
    AluOp::Cmp,
    AluOp::Adc,
    AluOp::Sbc,
];

type ModifyOp = fn(&mut Spc700, u8) -> u8;

#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub(crate) struct Spc700 {
    pub(crate) a: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) sp: u8,
    pub(crate) pc: u16,
    pub(crate) psw: u8,
    halted: bool,
    branch_taken: bool,
}

impl Spc700 {
    pub(crate) fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            psw: 0,
            halted: false,
            branch_taken: false,
        }
    }

    pub(crate) fn reset(&mut self, bus: &mut ApuBus) {
        *self = Self::new();
        self.pc = Self::read16(bus, RESET_VECTOR);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }

    /// Execute one instruction and return its cost in APU cycles.
    pub(crate) fn step(&mut self, bus: &mut ApuBus) -> u32 {
        if self.halted {
            return HALTED_CYCLES;
        }
        self.branch_taken = false;
        let opcode = self.fetch8(bus);
        self.execute(bus, opcode);
        let mut cycles = CYCLES[opcode as usize] as u32;
        if self.branch_taken {
            cycles += BRANCH_TAKEN_CYCLES;
        }
        cycles
    }

    fn execute(&mut self, bus: &mut ApuBus, opcode: u8) {
        match opcode {
            0x04..=0x09 | 0x14..=0x19 | 0x24..=0x29 | 0x34..=0x39 | 0x44..=0x49 | 0x54..=0x59
            | 0x64..=0x69 | 0x74..=0x79 | 0x84..=0x89 | 0x94..=0x99 | 0xA4..=0xA9
            | 0xB4..=0xB9 => self.alu_group(bus, opcode),

            // Column 0: flags and relative branches
            0x00 => {}
            0x20 => self.set_flag(FLAG_P, false),
            0x40 => self.set_flag(FLAG_P, true),
            0x60 => self.set_flag(FLAG_C, false),
            0x80 => self.set_flag(FLAG_C, true),
            0xA0 => self.set_flag(FLAG_I, true),
            0xC0 => self.set_flag(FLAG_I, false),
            0xE0 => {
                self.set_flag(FLAG_V, false);
                self.set_flag(FLAG_H, false);
            }
            0x10 => self.branch(bus, !self.flag(FLAG_N)),
            0x30 => self.branch(bus, self.flag(FLAG_N)),
            0x50 => self.branch(bus, !self.flag(FLAG_V)),
            0x70 => self.branch(bus, self.flag(FLAG_V)),
            0x90 => self.branch(bus, !self.flag(FLAG_C)),
            0xB0 => self.branch(bus, self.flag(FLAG_C)),
            0xD0 => self.branch(bus, !self.flag(FLAG_Z)),
            0xF0 => self.branch(bus, self.flag(FLAG_Z)),

            // Column 1: TCALL n
            0x01 | 0x11 | 0x21 | 0x31 | 0x41 | 0x51 | 0x61 | 0x71 | 0x81 | 0x91 | 0xA1 | 0xB1
            | 0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let vector = TCALL_VECTOR - 2 * (opcode >> 4) as u16;
                self.push16(bus, self.pc);
                self.pc = Self::read16(bus, vector);
            }

            // Column 2: SET1 / CLR1 d.b
            0x02 | 0x22 | 0x42 | 0x62 | 0x82 | 0xA2 | 0xC2 | 0xE2 => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr) | (1 << (opcode >> 5));
                bus.write(addr, value);
            }
            0x12 | 0x32 | 0x52 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr) & !(1 << (opcode >> 5));
                bus.write(addr, value);
            }

            // Column 3: BBS / BBC d.b, rel
            0x03 | 0x23 | 0x43 | 0x63 | 0x83 | 0xA3 | 0xC3 | 0xE3 => {
                let addr = self.addr_dp(bus);
                let set = bus.read(addr) & (1 << (opcode >> 5)) != 0;
                self.branch(bus, set);
            }
            0x13 | 0x33 | 0x53 | 0x73 | 0x93 | 0xB3 | 0xD3 | 0xF3 => {
                let addr = self.addr_dp(bus);
                let set = bus.read(addr) & (1 << (opcode >> 5)) != 0;
                self.branch(bus, !set);
            }

            // MOV stores from A
            0xC4 | 0xC5 | 0xC6 | 0xC7 | 0xD4 | 0xD5 | 0xD6 | 0xD7 => {
                let addr = self.operand_addr(bus, opcode & 0x1F);
                Self::store(bus, addr, self.a);
            }
            // MOV loads into A
            0xE4 | 0xE5 | 0xE6 | 0xE7 | 0xF4 | 0xF5 | 0xF6 | 0xF7 => {
                let addr = self.operand_addr(bus, opcode & 0x1F);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xE8 => {
                self.a = self.fetch8(bus);
                self.set_nz(self.a);
            }
            0xC8 => {
                let value = self.fetch8(bus);
                self.compare(self.x, value);
            }
            0xC9 => {
                let addr = self.fetch16(bus);
                Self::store(bus, addr, self.x);
            }
            0xD8 => {
                let addr = self.addr_dp(bus);
                Self::store(bus, addr, self.x);
            }
            0xD9 => {
                let addr = self.addr_dp_indexed(bus, self.y);
                Self::store(bus, addr, self.x);
            }
            0xE9 => {
                let addr = self.fetch16(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            0xF8 => {
                let addr = self.addr_dp(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            0xF9 => {
                let addr = self.addr_dp_indexed(bus, self.y);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }

            // Column A: bit operations on m.b and word operations
            0x0A => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, self.flag(FLAG_C) | bit);
            }
            0x2A => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, self.flag(FLAG_C) | !bit);
            }
            0x4A => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, self.flag(FLAG_C) & bit);
            }
            0x6A => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, self.flag(FLAG_C) & !bit);
            }
            0x8A => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, self.flag(FLAG_C) ^ bit);
            }
            0xAA => {
                let bit = self.read_mem_bit(bus);
                self.set_flag(FLAG_C, bit);
            }
            0xCA => {
                let (addr, bit) = self.mem_bit_operand(bus);
                let mut value = bus.read(addr);
                if self.flag(FLAG_C) {
                    value |= 1 << bit;
                } else {
                    value &= !(1 << bit);
                }
                bus.write(addr, value);
            }
            0xEA => {
                let (addr, bit) = self.mem_bit_operand(bus);
                let value = bus.read(addr) ^ (1 << bit);
                bus.write(addr, value);
            }
            0x1A | 0x3A => {
                let offset = self.fetch8(bus);
                let word = self.read_dp_word(bus, offset);
                let word = if opcode == 0x3A {
                    word.wrapping_add(1)
                } else {
                    word.wrapping_sub(1)
                };
                self.write_dp_word(bus, offset, word);
                self.set_nz16(word);
            }
            0x5A => {
                let offset = self.fetch8(bus);
                let word = self.read_dp_word(bus, offset);
                let ya = self.ya();
                self.set_flag(FLAG_C, ya >= word);
                self.set_nz16(ya.wrapping_sub(word));
            }
            0x7A | 0x9A => {
                let offset = self.fetch8(bus);
                let word = self.read_dp_word(bus, offset);
                let [lo, hi] = word.to_le_bytes();
                let (a, y) = if opcode == 0x7A {
                    self.set_flag(FLAG_C, false);
                    let a = self.adc(self.a, lo);
                    (a, self.adc(self.y, hi))
                } else {
                    self.set_flag(FLAG_C, true);
                    let a = self.adc(self.a, !lo);
                    (a, self.adc(self.y, !hi))
                };
                self.a = a;
                self.y = y;
                self.set_flag(FLAG_Z, self.ya() == 0);
            }
            0xBA => {
                let offset = self.fetch8(bus);
                let word = self.read_dp_word(bus, offset);
                [self.a, self.y] = word.to_le_bytes();
                self.set_nz16(word);
            }
            0xDA => {
                let offset = self.fetch8(bus);
                self.write_dp_word(bus, offset, self.ya());
            }
            0xFA => {
                let source = self.addr_dp(bus);
                let value = bus.read(source);
                let dest = self.addr_dp(bus);
                bus.write(dest, value);
            }

            // Columns B/C: shifts, rotates, INC/DEC
            0x0B | 0x2B | 0x4B | 0x6B | 0x8B | 0xAB => {
                let addr = self.addr_dp(bus);
                self.modify(bus, addr, Self::modify_op(opcode));
            }
            0x1B | 0x3B | 0x5B | 0x7B | 0x9B | 0xBB => {
                let addr = self.addr_dp_indexed(bus, self.x);
                self.modify(bus, addr, Self::modify_op(opcode));
            }
            0x0C | 0x2C | 0x4C | 0x6C | 0x8C | 0xAC => {
                let addr = self.fetch16(bus);
                self.modify(bus, addr, Self::modify_op(opcode));
            }
            0x1C | 0x3C | 0x5C | 0x7C | 0x9C | 0xBC => {
                let op = Self::modify_op(opcode);
                self.a = op(self, self.a);
            }
            0xCB => {
                let addr = self.addr_dp(bus);
                Self::store(bus, addr, self.y);
            }
            0xDB => {
                let addr = self.addr_dp_indexed(bus, self.x);
                Self::store(bus, addr, self.y);
            }
            0xEB => {
                let addr = self.addr_dp(bus);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xFB => {
                let addr = self.addr_dp_indexed(bus, self.x);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xCC => {
                let addr = self.fetch16(bus);
                Self::store(bus, addr, self.y);
            }
            0xEC => {
                let addr = self.fetch16(bus);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xDC => self.y = self.dec(self.y),
            0xFC => self.y = self.inc(self.y),

            // Column D: stack, register moves
            0x0D => self.push8(bus, self.psw),
            0x2D => self.push8(bus, self.a),
            0x4D => self.push8(bus, self.x),
            0x6D => self.push8(bus, self.y),
            0x1D => self.x = self.dec(self.x),
            0x3D => self.x = self.inc(self.x),
            0x5D => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            0x7D => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            0x8D => {
                self.y = self.fetch8(bus);
                self.set_nz(self.y);
            }
            0x9D => {
                self.x = self.sp;
                self.set_nz(self.x);
            }
            0xAD => {
                let value = self.fetch8(bus);
                self.compare(self.y, value);
            }
            0xBD => self.sp = self.x,
            0xCD => {
                self.x = self.fetch8(bus);
                self.set_nz(self.x);
            }
            0xDD => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            0xED => self.psw ^= FLAG_C,
            0xFD => {
                self.y = self.a;
                self.set_nz(self.y);
            }

            // Column E
            0x0E | 0x4E => {
                let addr = self.fetch16(bus);
                let value = bus.read(addr);
                self.set_nz(self.a.wrapping_sub(value));
                let value = if opcode == 0x0E {
                    value | self.a
                } else {
                    value & !self.a
                };
                bus.write(addr, value);
            }
            0x1E => {
                let addr = self.fetch16(bus);
                let value = bus.read(addr);
                self.compare(self.x, value);
            }
            0x3E => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr);
                self.compare(self.x, value);
            }
            0x5E => {
                let addr = self.fetch16(bus);
                let value = bus.read(addr);
                self.compare(self.y, value);
            }
            0x7E => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr);
                self.compare(self.y, value);
            }
            0x2E => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr);
                self.branch(bus, self.a != value);
            }
            0xDE => {
                let addr = self.addr_dp_indexed(bus, self.x);
                let value = bus.read(addr);
                self.branch(bus, self.a != value);
            }
            0x6E => {
                let addr = self.addr_dp(bus);
                let value = bus.read(addr).wrapping_sub(1);
                bus.write(addr, value);
                self.branch(bus, value != 0);
            }
            0xFE => {
                self.y = self.y.wrapping_sub(1);
                self.branch(bus, self.y != 0);
            }
            0x8E => self.psw = self.pop8(bus),
            0xAE => self.a = self.pop8(bus),
            0xCE => self.x = self.pop8(bus),
            0xEE => self.y = self.pop8(bus),
            0x9E => self.div(),
            0xBE => self.das(),

            // Column F
            0x0F => {
                self.push16(bus, self.pc);
                self.push8(bus, self.psw);
                self.set_flag(FLAG_B, true);
                self.set_flag(FLAG_I, false);
                self.pc = Self::read16(bus, TCALL_VECTOR);
            }
            0x1F => {
                let pointer = self.fetch16(bus).wrapping_add(self.x as u16);
                self.pc = Self::read16(bus, pointer);
            }
            0x2F => {
                let offset = self.fetch8(bus) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
            }
            0x3F => {
                let target = self.fetch16(bus);
                self.push16(bus, self.pc);
                self.pc = target;
            }
            0x4F => {
                let page_offset = self.fetch8(bus);
                self.push16(bus, self.pc);
                self.pc = 0xFF00 | page_offset as u16;
            }
            0x5F => self.pc = self.fetch16(bus),
            0x6F => self.pc = self.pop16(bus),
            0x7F => {
                self.psw = self.pop8(bus);
                self.pc = self.pop16(bus);
            }
            0x8F => {
                let value = self.fetch8(bus);
                let addr = self.addr_dp(bus);
                bus.write(addr, value);
            }
            0x9F => {
                self.a = self.a.rotate_left(4);
                self.set_nz(self.a);
            }
            0xAF => {
                let addr = self.dp(self.x);
                bus.write(addr, self.a);
                self.x = self.x.wrapping_add(1);
            }
            0xBF => {
                let addr = self.dp(self.x);
                self.a = bus.read(addr);
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.a);
            }
            0xCF => {
                let product = self.y as u16 * self.a as u16;
                [self.a, self.y] = product.to_le_bytes();
                self.set_nz(self.y);
            }
            0xDF => self.daa(),
            0xEF | 0xFF => {
                self.halted = true;
                log::debug!("SPC700 halted by {opcode:02X} at {:04X}", self.pc);
            }
        }
    }

    // ----- registers and flags -----

    fn flag(&self, flag: u8) -> bool {
        self.psw & flag != 0
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.psw |= flag;
        } else {
            self.psw &= !flag;
        }
    }

    fn set_nz(&mut self, value: u8) {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
    }

    fn set_nz16(&mut self, value: u16) {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x8000 != 0);
    }

    fn ya(&self) -> u16 {
        u16::from_le_bytes([self.a, self.y])
    }

    // ----- memory -----

    fn read16(bus: &mut ApuBus, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn fetch8(&mut self, bus: &mut ApuBus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch16(&mut self, bus: &mut ApuBus) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push8(&mut self, bus: &mut ApuBus, value: u8) {
        bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop8(&mut self, bus: &mut ApuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | self.sp as u16)
    }

    fn push16(&mut self, bus: &mut ApuBus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push8(bus, hi);
        self.push8(bus, lo);
    }

    fn pop16(&mut self, bus: &mut ApuBus) -> u16 {
        let lo = self.pop8(bus);
        let hi = self.pop8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn dp(&self, offset: u8) -> u16 {
        if self.flag(FLAG_P) {
            0x0100 | offset as u16
        } else {
            offset as u16
        }
    }

    /// Register stores read the destination first, which matters for the
    /// read-to-clear timer counters.
    fn store(bus: &mut ApuBus, addr: u16, value: u8) {
        bus.read(addr);
        bus.write(addr, value);
    }

    /// Word at a direct-page offset; the high byte wraps inside the page.
    fn read_dp_word(&mut self, bus: &mut ApuBus, offset: u8) -> u16 {
        let lo = bus.read(self.dp(offset));
        let hi = bus.read(self.dp(offset.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    fn write_dp_word(&mut self, bus: &mut ApuBus, offset: u8, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        bus.write(self.dp(offset), lo);
        bus.write(self.dp(offset.wrapping_add(1)), hi);
    }

    fn addr_dp(&mut self, bus: &mut ApuBus) -> u16 {
        let offset = self.fetch8(bus);
        self.dp(offset)
    }

    fn addr_dp_indexed(&mut self, bus: &mut ApuBus, index: u8) -> u16 {
        let offset = self.fetch8(bus).wrapping_add(index);
        self.dp(offset)
    }

    /// Memory operand for the A-register forms of the arithmetic block and
    /// the MOV A loads/stores, selected by the low five opcode bits.
    fn operand_addr(&mut self, bus: &mut ApuBus, mode: u8) -> u16 {
        match mode {
            0x04 => self.addr_dp(bus),
            0x05 => self.fetch16(bus),
            0x06 => self.dp(self.x),
            0x07 => {
                let offset = self.fetch8(bus).wrapping_add(self.x);
                self.read_dp_word(bus, offset)
            }
            0x14 => self.addr_dp_indexed(bus, self.x),
            0x15 => self.fetch16(bus).wrapping_add(self.x as u16),
            0x16 => self.fetch16(bus).wrapping_add(self.y as u16),
            _ => {
                let offset = self.fetch8(bus);
                self.read_dp_word(bus, offset).wrapping_add(self.y as u16)
            }
        }
    }

    /// `m.b` operand: 13-bit address and bit number packed in one word.
    fn mem_bit_operand(&mut self, bus: &mut ApuBus) -> (u16, u8) {
        let operand = self.fetch16(bus);
        (operand & 0x1FFF, (operand >> 13) as u8)
    }

    fn read_mem_bit(&mut self, bus: &mut ApuBus) -> bool {
        let (addr, bit) = self.mem_bit_operand(bus);
        bus.read(addr) & (1 << bit) != 0
    }

    fn branch(&mut self, bus: &mut ApuBus, condition: bool) {
        let offset = self.fetch8(bus) as i8;
        if condition {
            self.pc = self.pc.wrapping_add(offset as u16);
            self.branch_taken = true;
        }
    }

    // ----- ALU -----

    fn alu_group(&mut self, bus: &mut ApuBus, opcode: u8) {
        let op = ALU_OPS[(opcode >> 5) as usize];
        match opcode & 0x1F {
            0x08 => {
                let value = self.fetch8(bus);
                self.alu_into_a(op, value);
            }
            0x09 => {
                let source = self.addr_dp(bus);
                let value = bus.read(source);
                let dest = self.addr_dp(bus);
                self.alu_into_memory(bus, op, dest, value);
            }
            0x18 => {
                let value = self.fetch8(bus);
                let dest = self.addr_dp(bus);
                self.alu_into_memory(bus, op, dest, value);
            }
            0x19 => {
                let value = bus.read(self.dp(self.y));
                let dest = self.dp(self.x);
                self.alu_into_memory(bus, op, dest, value);
            }
            mode => {
                let addr = self.operand_addr(bus, mode);
                let value = bus.read(addr);
                self.alu_into_a(op, value);
            }
        }
    }

    fn alu_into_a(&mut self, op: AluOp, value: u8) {
        let result = self.alu(op, self.a, value);
        if op != AluOp::Cmp {
            self.a = result;
        }
    }

    fn alu_into_memory(&mut self, bus: &mut ApuBus, op: AluOp, dest: u16, value: u8) {
        let current = bus.read(dest);
        let result = self.alu(op, current, value);
        if op != AluOp::Cmp {
            bus.write(dest, result);
        }
    }

    fn alu(&mut self, op: AluOp, lhs: u8, rhs: u8) -> u8 {
        let result = match op {
            AluOp::Or => lhs | rhs,
            AluOp::And => lhs & rhs,
            AluOp::Eor => lhs ^ rhs,
            AluOp::Cmp => {
                self.compare(lhs, rhs);
                return lhs;
            }
            AluOp::Adc => return self.adc(lhs, rhs),
            AluOp::Sbc => return self.adc(lhs, !rhs),
        };
        self.set_nz(result);
        result
    }

    fn adc(&mut self, lhs: u8, rhs: u8) -> u8 {
        let sum = lhs as u16 + rhs as u16 + u16::from(self.flag(FLAG_C));
        let result = sum as u8;
        self.set_flag(FLAG_C, sum > 0xFF);
        self.set_flag(FLAG_H, (lhs ^ rhs ^ result) & 0x10 != 0);
        self.set_flag(FLAG_V, !(lhs ^ rhs) & (lhs ^ result) & 0x80 != 0);
        self.set_nz(result);
        result
    }

    fn compare(&mut self, lhs: u8, rhs: u8) {
        self.set_flag(FLAG_C, lhs >= rhs);
        self.set_nz(lhs.wrapping_sub(rhs));
    }

    fn modify_op(opcode: u8) -> ModifyOp {
        match opcode >> 5 {
            0 => Self::asl,
            1 => Self::rol,
            2 => Self::lsr,
            3 => Self::ror,
            4 => Self::dec,
            _ => Self::inc,
        }
    }

    fn modify(&mut self, bus: &mut ApuBus, addr: u16, op: ModifyOp) {
        let value = bus.read(addr);
        let result = op(self, value);
        bus.write(addr, result);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x80 != 0);
        let result = value << 1;
        self.set_nz(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry = u8::from(self.flag(FLAG_C));
        self.set_flag(FLAG_C, value & 0x80 != 0);
        let result = (value << 1) | carry;
        self.set_nz(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x01 != 0);
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry = u8::from(self.flag(FLAG_C)) << 7;
        self.set_flag(FLAG_C, value & 0x01 != 0);
        let result = (value >> 1) | carry;
        self.set_nz(result);
        result
    }

    fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_nz(result);
        result
    }

    fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_nz(result);
        result
    }

    /// DIV YA,X including the out-of-range behaviour of the hardware divider.
    fn div(&mut self) {
        let ya = self.ya() as u32;
        let x = self.x as u32;
        let y = self.y as u32;
        self.set_flag(FLAG_V, y >= x);
        self.set_flag(FLAG_H, (y & 0x0F) >= (x & 0x0F));
        if y < x << 1 {
            self.a = (ya / x) as u8;
            self.y = (ya % x) as u8;
        } else {
            let excess = ya - (x << 9);
            self.a = (255 - excess / (256 - x)) as u8;
            self.y = (x + excess % (256 - x)) as u8;
        }
        self.set_nz(self.a);
    }

    fn daa(&mut self) {
        if self.flag(FLAG_C) || self.a > 0x99 {
            self.a = self.a.wrapping_add(0x60);
            self.set_flag(FLAG_C, true);
        }
        if self.flag(FLAG_H) || (self.a & 0x0F) > 0x09 {
            self.a = self.a.wrapping_add(0x06);
        }
        self.set_nz(self.a);
    }

    fn das(&mut self) {
        if !self.flag(FLAG_C) || self.a > 0x99 {
            self.a = self.a.wrapping_sub(0x60);
            self.set_flag(FLAG_C, false);
        }
        if !self.flag(FLAG_H) || (self.a & 0x0F) > 0x09 {
            self.a = self.a.wrapping_sub(0x06);
        }
        self.set_nz(self.a);
    }
}
