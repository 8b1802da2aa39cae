use super::Bus;
use super::types::{DmaDirection, DmaStep};

const DMA_START_CYCLES: u32 = 12;
const DMA_CHANNEL_CYCLES: u32 = 8;
const DMA_BYTE_CYCLES: u32 = 8;
const HDMA_LINE_CYCLES: u32 = 18;

impl Bus {
    /// MDMAEN: run every selected channel to completion, lowest first. The
    /// CPU is charged the elapsed time through [`Bus::take_dma_cycles`].
    pub(super) fn run_gp_dma(&mut self, channels: u8) {
        self.dma_cycles += DMA_START_CYCLES;
        for index in 0..8 {
            if channels & (1 << index) == 0 {
                continue;
            }
            let channel = self.dma[index];
            let pattern = channel.pattern();
            let direction = channel.direction();
            let step = channel.step();
            let mut count = channel.count;
            let mut a_addr = channel.a_addr;
            let mut transferred: u32 = 0;
            log::trace!(
                "DMA ch{index}: {:?} {:02X}:{:04X} <-> $21{:02X}, {} bytes",
                direction,
                channel.a_bank,
                a_addr,
                channel.b_addr,
                if count == 0 { 0x10000 } else { count as u32 }
            );

            loop {
                let offset = pattern[transferred as usize % pattern.len()];
                let b_addr = 0x2100 | channel.b_addr.wrapping_add(offset) as u32;
                let a_full = ((channel.a_bank as u32) << 16) | a_addr as u32;
                match direction {
                    DmaDirection::AToB => {
                        let value = self.read_a_bus(a_full);
                        self.write(b_addr, value);
                    }
                    DmaDirection::BToA => {
                        let value = self.read(b_addr);
                        self.write_a_bus(a_full, value);
                    }
                }
                a_addr = match step {
                    DmaStep::Increment => a_addr.wrapping_add(1),
                    DmaStep::Decrement => a_addr.wrapping_sub(1),
                    DmaStep::Fixed => a_addr,
                };
                transferred += 1;
                count = count.wrapping_sub(1);
                if count == 0 {
                    break;
                }
            }

            let channel = &mut self.dma[index];
            channel.a_addr = a_addr;
            channel.count = 0;
            self.dma_cycles += DMA_CHANNEL_CYCLES + transferred * DMA_BYTE_CYCLES;
        }
    }

    /// Line 0: reload every HDMAEN channel from its table start.
    pub(super) fn hdma_init(&mut self) {
        let enabled = self.io.hdma_enable;
        for index in 0..8 {
            let channel = &mut self.dma[index];
            channel.hdma_terminated = true;
            channel.hdma_do_transfer = false;
            if enabled & (1 << index) == 0 {
                continue;
            }
            channel.table_addr = channel.a_addr;
            channel.hdma_terminated = false;
            self.hdma_load_entry(index);
        }
    }

    /// One H-blank worth of HDMA for every live channel.
    pub(super) fn hdma_line(&mut self) {
        let enabled = self.io.hdma_enable;
        if enabled == 0 {
            return;
        }
        self.dma_cycles += HDMA_LINE_CYCLES;
        for index in 0..8 {
            if enabled & (1 << index) == 0 || self.dma[index].hdma_terminated {
                continue;
            }
            if self.dma[index].hdma_do_transfer {
                self.hdma_transfer(index);
            }
            let channel = &mut self.dma[index];
            channel.line_counter = channel.line_counter.wrapping_sub(1);
            channel.hdma_do_transfer = channel.line_counter & 0x80 != 0;
            if channel.line_counter & 0x7F == 0 {
                self.hdma_load_entry(index);
            }
        }
    }

    fn hdma_load_entry(&mut self, index: usize) {
        let bank = (self.dma[index].a_bank as u32) << 16;
        let table = self.dma[index].table_addr;
        let header = self.read_a_bus(bank | table as u32);
        let mut table = table.wrapping_add(1);
        if header == 0 {
            let channel = &mut self.dma[index];
            channel.table_addr = table;
            channel.hdma_terminated = true;
            channel.hdma_do_transfer = false;
            return;
        }
        if self.dma[index].indirect() {
            let low = self.read_a_bus(bank | table as u32);
            let high = self.read_a_bus(bank | table.wrapping_add(1) as u32);
            table = table.wrapping_add(2);
            self.dma[index].count = u16::from_le_bytes([low, high]);
            self.dma_cycles += 2 * DMA_BYTE_CYCLES;
        }
        let channel = &mut self.dma[index];
        channel.line_counter = header;
        channel.table_addr = table;
        channel.hdma_do_transfer = true;
    }

    fn hdma_transfer(&mut self, index: usize) {
        let channel = self.dma[index];
        let indirect = channel.indirect();
        for (unit, &offset) in channel.pattern().iter().enumerate() {
            let source = if indirect {
                ((channel.indirect_bank as u32) << 16) | channel.count.wrapping_add(unit as u16) as u32
            } else {
                ((channel.a_bank as u32) << 16) | channel.table_addr.wrapping_add(unit as u16) as u32
            };
            let b_addr = 0x2100 | channel.b_addr.wrapping_add(offset) as u32;
            match channel.direction() {
                DmaDirection::AToB => {
                    let value = self.read_a_bus(source);
                    self.write(b_addr, value);
                }
                DmaDirection::BToA => {
                    let value = self.read(b_addr);
                    self.write_a_bus(source, value);
                }
            }
        }
        let len = channel.pattern().len() as u16;
        let channel = &mut self.dma[index];
        if indirect {
            channel.count = channel.count.wrapping_add(len);
        } else {
            channel.table_addr = channel.table_addr.wrapping_add(len);
        }
        self.dma_cycles += len as u32 * DMA_BYTE_CYCLES;
    }

    /// The A bus cannot reach B-bus registers or the DMA block itself.
    fn read_a_bus(&mut self, addr: u32) -> u8 {
        if Self::a_bus_blocked(addr) {
            return 0;
        }
        self.read(addr)
    }

    fn write_a_bus(&mut self, addr: u32, value: u8) {
        if !Self::a_bus_blocked(addr) {
            self.write(addr, value);
        }
    }

    fn a_bus_blocked(addr: u32) -> bool {
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        bank & 0x40 == 0
            && matches!(offset, 0x2100..=0x21FF | 0x4300..=0x437F | 0x420B | 0x420C)
    }
}
