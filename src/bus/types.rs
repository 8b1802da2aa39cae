/// A `bool` wrapper that is invisible to bincode serialization.
/// Encodes as zero bytes; decodes as `false`. Used for per-frame frontend
/// switches that must not leak into save-state files.
#[derive(Clone, Copy, Default)]
pub(crate) struct TransientBool(pub(crate) bool);

impl bincode::Encode for TransientBool {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(()) // write nothing
    }
}

impl<Context> bincode::Decode<Context> for TransientBool {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self(false))
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for TransientBool {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self(false))
    }
}

impl core::ops::Deref for TransientBool {
    type Target = bool;
    fn deref(&self) -> &bool {
        &self.0
    }
}

impl core::ops::DerefMut for TransientBool {
    fn deref_mut(&mut self) -> &mut bool {
        &mut self.0
    }
}

/// NMITIMEN bits 4-5.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) enum IrqMode {
    #[default]
    Off,
    /// Every line at H=HTIME.
    H,
    /// Line VTIME at H=0.
    V,
    /// Line VTIME at H=HTIME.
    HV,
}

impl IrqMode {
    pub(crate) fn from_byte(byte: u8) -> Self {
        match (byte >> 4) & 0x03 {
            0 => IrqMode::Off,
            1 => IrqMode::H,
            2 => IrqMode::V,
            _ => IrqMode::HV,
        }
    }
}

/// DMAPx bit 7.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) enum DmaDirection {
    #[default]
    AToB,
    BToA,
}

/// DMAPx bits 3-4: how the A-bus address moves after each byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) enum DmaStep {
    #[default]
    Increment,
    Fixed,
    Decrement,
}

/// B-bus register offsets written per transfer unit, indexed by DMAPx bits 0-2.
pub(crate) const DMA_PATTERNS: [&[u8]; 8] = [
    &[0],
    &[0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
    &[0, 1, 2, 3],
    &[0, 1, 0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
];

/// One of the eight $43x0-$43xF register blocks, shared by GP DMA and HDMA.
#[derive(Clone, Copy, Debug, bincode::Encode, bincode::Decode)]
pub(crate) struct DmaChannel {
    pub(crate) params: u8,
    pub(crate) b_addr: u8,
    pub(crate) a_addr: u16,
    pub(crate) a_bank: u8,
    /// GP DMA byte count; HDMA indirect address.
    pub(crate) count: u16,
    pub(crate) indirect_bank: u8,
    pub(crate) table_addr: u16,
    pub(crate) line_counter: u8,
    pub(crate) unused: u8,
    pub(crate) hdma_do_transfer: bool,
    pub(crate) hdma_terminated: bool,
}

impl Default for DmaChannel {
    fn default() -> Self {
        Self {
            params: 0xFF,
            b_addr: 0xFF,
            a_addr: 0xFFFF,
            a_bank: 0xFF,
            count: 0xFFFF,
            indirect_bank: 0xFF,
            table_addr: 0xFFFF,
            line_counter: 0xFF,
            unused: 0xFF,
            hdma_do_transfer: false,
            hdma_terminated: true,
        }
    }
}

impl DmaChannel {
    pub(crate) fn direction(&self) -> DmaDirection {
        if self.params & 0x80 != 0 {
            DmaDirection::BToA
        } else {
            DmaDirection::AToB
        }
    }

    pub(crate) fn indirect(&self) -> bool {
        self.params & 0x40 != 0
    }

    pub(crate) fn step(&self) -> DmaStep {
        match (self.params >> 3) & 0x03 {
            0 => DmaStep::Increment,
            2 => DmaStep::Decrement,
            _ => DmaStep::Fixed,
        }
    }

    pub(crate) fn pattern(&self) -> &'static [u8] {
        DMA_PATTERNS[(self.params & 0x07) as usize]
    }

    pub(crate) fn read_register(&self, reg: u16) -> u8 {
        match reg {
            0x0 => self.params,
            0x1 => self.b_addr,
            0x2 => self.a_addr as u8,
            0x3 => (self.a_addr >> 8) as u8,
            0x4 => self.a_bank,
            0x5 => self.count as u8,
            0x6 => (self.count >> 8) as u8,
            0x7 => self.indirect_bank,
            0x8 => self.table_addr as u8,
            0x9 => (self.table_addr >> 8) as u8,
            0xA => self.line_counter,
            0xB | 0xF => self.unused,
            _ => 0,
        }
    }

    pub(crate) fn write_register(&mut self, reg: u16, value: u8) {
        match reg {
            0x0 => self.params = value,
            0x1 => self.b_addr = value,
            0x2 => self.a_addr = (self.a_addr & 0xFF00) | value as u16,
            0x3 => self.a_addr = (self.a_addr & 0x00FF) | ((value as u16) << 8),
            0x4 => self.a_bank = value,
            0x5 => self.count = (self.count & 0xFF00) | value as u16,
            0x6 => self.count = (self.count & 0x00FF) | ((value as u16) << 8),
            0x7 => self.indirect_bank = value,
            0x8 => self.table_addr = (self.table_addr & 0xFF00) | value as u16,
            0x9 => self.table_addr = (self.table_addr & 0x00FF) | ((value as u16) << 8),
            0xA => self.line_counter = value,
            0xB | 0xF => self.unused = value,
            _ => {}
        }
    }
}
