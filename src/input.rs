/// Standard controller buttons in auto-read bit order: B is bit 15 of JOYn,
/// R is bit 4. The discriminant doubles as the frontend button id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Button {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L = 10,
    R = 11,
}

impl Button {
    pub const ALL: [Button; 12] = [
        Button::B,
        Button::Y,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::X,
        Button::L,
        Button::R,
    ];

    pub fn mask(self) -> u16 {
        0x8000 >> (self as u16)
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// One controller port: live button state plus the serial shift register
/// behind $4016/$4017.
#[derive(Clone, Debug, Default, bincode::Encode, bincode::Decode)]
pub struct Joypad {
    buttons: u16,
    shift: u16,
    reads: u8,
}

impl Joypad {
    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }

    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    pub(crate) fn latch(&mut self) {
        self.shift = self.buttons;
        self.reads = 0;
    }

    /// Next serial bit, MSB first; 1 once all 16 bits have been shifted out.
    pub(crate) fn read_serial(&mut self) -> u8 {
        if self.reads >= 16 {
            return 1;
        }
        let bit = (self.shift >> 15) as u8 & 1;
        self.shift <<= 1;
        self.reads += 1;
        bit
    }
}
