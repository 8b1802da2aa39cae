pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod emulator;
pub mod error;
pub mod input;
pub mod ppu;

pub use cartridge::{MapMode, Region};
pub use emulator::{Emulator, EmulatorConfig, SaveState, StateSlots};
pub use error::{EmulatorError, Result};
pub use input::Button;
