
use crate::error::{EmulatorError, Result};

pub(crate) const COPIER_HEADER_SIZE: usize = 512;
pub(crate) const LOROM_HEADER_BASE: usize = 0x7FC0;
pub(crate) const HIROM_HEADER_BASE: usize = 0xFFC0;
/// Smallest image that still contains the LoROM header block.
pub(crate) const MIN_ROM_SIZE: usize = LOROM_HEADER_BASE + 0x40;
const HEADER_TITLE_LEN: usize = 21;
const HEADER_MAP_MODE: usize = 0x15;
const HEADER_ROM_TYPE: usize = 0x16;
const HEADER_ROM_SIZE: usize = 0x17;
const HEADER_SRAM_SIZE: usize = 0x18;
const HEADER_REGION: usize = 0x19;
const HEADER_COMPLEMENT: usize = 0x1C;
const HEADER_CHECKSUM: usize = 0x1E;
/// Low nibble of the map byte for HiROM boards ($21 / $31).
const MAP_MODE_HIROM: u8 = 0x01;
const MAX_SRAM_SHIFT: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapMode {
    LoRom,
    HiRom,
}

impl MapMode {
    fn header_base(self) -> usize {
        match self {
            MapMode::LoRom => LOROM_HEADER_BASE,
            MapMode::HiRom => HIROM_HEADER_BASE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    fn from_header_byte(byte: u8) -> Self {
        match byte {
            0x02..=0x0C => Region::Pal,
            _ => Region::Ntsc,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct CartridgeHeader {
    pub title: String,
    pub map_byte: u8,
    pub rom_type: u8,
    pub rom_size_byte: u8,
    pub sram_size_byte: u8,
    pub region_byte: u8,
    pub checksum: u16,
    pub complement: u16,
}

impl CartridgeHeader {
    fn parse(rom: &[u8], base: usize) -> Self {
        let byte = |offset: usize| rom.get(base + offset).copied().unwrap_or(0);
        let title = (0..HEADER_TITLE_LEN)
            .map(byte)
            .filter(|b| b.is_ascii_graphic() || *b == b' ')
            .map(char::from)
            .collect::<String>()
            .trim_end()
            .to_string();
        Self {
            title,
            map_byte: byte(HEADER_MAP_MODE),
            rom_type: byte(HEADER_ROM_TYPE),
            rom_size_byte: byte(HEADER_ROM_SIZE),
            sram_size_byte: byte(HEADER_SRAM_SIZE),
            region_byte: byte(HEADER_REGION),
            checksum: u16::from_le_bytes([byte(HEADER_CHECKSUM), byte(HEADER_CHECKSUM + 1)]),
            complement: u16::from_le_bytes([byte(HEADER_COMPLEMENT), byte(HEADER_COMPLEMENT + 1)]),
        }
    }

    pub fn sram_bytes(&self) -> usize {
        match self.sram_size_byte {
            0 => 0,
            n if n <= MAX_SRAM_SHIFT => 1024 << n,
            _ => 1024 << MAX_SRAM_SHIFT,
        }
    }

    pub fn region(&self) -> Region {
        Region::from_header_byte(self.region_byte)
    }
}

/// ROM bytes excluded from save-state encoding. Snapshots carry the
/// cartridge fingerprint instead and the live image is re-attached on restore.
#[derive(Clone, Default)]
pub(crate) struct RomImage(pub(crate) Vec<u8>);

impl bincode::Encode for RomImage {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> std::result::Result<(), bincode::error::EncodeError> {
        Ok(())
    }
}

impl<Context> bincode::Decode<Context> for RomImage {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> std::result::Result<Self, bincode::error::DecodeError> {
        Ok(Self::default())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for RomImage {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> std::result::Result<Self, bincode::error::DecodeError> {
        Ok(Self::default())
    }
}

#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Cartridge {
    rom: RomImage,
    sram: Vec<u8>,
    map_mode: MapMode,
    header: CartridgeHeader,
    fingerprint: u64,
}

impl Cartridge {
    /// Placeholder board used before any image is loaded: every access is unmapped.
    pub fn empty() -> Self {
        Self {
            rom: RomImage::default(),
            sram: Vec::new(),
            map_mode: MapMode::LoRom,
            header: CartridgeHeader::default(),
            fingerprint: 0,
        }
    }

    /// Parse a `.sfc`/`.smc` image. A 512-byte copier header is dropped when the
    /// image length leaves exactly that remainder modulo 1 KiB.
    pub fn load(image: &[u8], hint: Option<MapMode>) -> Result<Self> {
        let rom = strip_copier_header(image);
        if rom.len() < MIN_ROM_SIZE {
            return Err(EmulatorError::InvalidRom(format!(
                "image is {} bytes after header strip, need at least {MIN_ROM_SIZE}",
                rom.len()
            )));
        }

        let map_mode = hint.unwrap_or_else(|| detect_map_mode(rom));
        let header = CartridgeHeader::parse(rom, map_mode.header_base());
        let sram = vec![0; header.sram_bytes()];

        log::info!(
            "cartridge \"{}\": {:?}, {} KiB ROM, {} bytes SRAM, {:?}",
            header.title,
            map_mode,
            rom.len() / 1024,
            sram.len(),
            header.region()
        );

        Ok(Self {
            fingerprint: fingerprint(rom),
            rom: RomImage(rom.to_vec()),
            sram,
            map_mode,
            header,
        })
    }

    pub fn map_mode(&self) -> MapMode {
        self.map_mode
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn region(&self) -> Region {
        self.header.region()
    }

    pub fn rom_len(&self) -> usize {
        self.rom.0.len()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn load_sram(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.sram.len() {
            return Err(EmulatorError::InvalidSram {
                expected: self.sram.len(),
                actual: data.len(),
            });
        }
        self.sram.copy_from_slice(data);
        Ok(())
    }

    /// Move the ROM image of `other` into `self`; used when a decoded snapshot
    /// (which carries no ROM bytes) replaces the live cartridge.
    pub(crate) fn adopt_rom(&mut self, other: &mut Cartridge) {
        self.rom = std::mem::take(&mut other.rom);
    }

    pub fn read(&self, addr: u32) -> Option<u8> {
        match self.resolve(addr)? {
            Target::Rom(offset) => Some(self.rom.0[offset]),
            Target::Sram(offset) => Some(self.sram[offset]),
        }
    }

    /// Returns `false` when nothing writable sits at `addr`.
    pub fn write(&mut self, addr: u32, value: u8) -> bool {
        match self.resolve(addr) {
            Some(Target::Sram(offset)) => {
                self.sram[offset] = value;
                true
            }
            _ => false,
        }
    }

    fn resolve(&self, addr: u32) -> Option<Target> {
        let bank = ((addr >> 16) & 0xFF) as usize;
        let offset = (addr & 0xFFFF) as usize;
        match self.map_mode {
            MapMode::LoRom => self.resolve_lorom(bank, offset),
            MapMode::HiRom => self.resolve_hirom(bank, offset),
        }
    }

    fn resolve_lorom(&self, bank: usize, offset: usize) -> Option<Target> {
        match (bank, offset) {
            (0x70..=0x7D | 0xF0..=0xFF, 0x0000..=0x7FFF) => self.sram_target(
                ((bank & 0x0F) << 15) | offset,
            ),
            (0x7E | 0x7F, _) => None,
            (_, 0x8000..=0xFFFF) | (0x40..=0x6F | 0xC0..=0xEF, _) => {
                self.rom_target(((bank & 0x7F) << 15) | (offset & 0x7FFF))
            }
            _ => None,
        }
    }

    fn resolve_hirom(&self, bank: usize, offset: usize) -> Option<Target> {
        match (bank, offset) {
            (0x20..=0x3F | 0xA0..=0xBF, 0x6000..=0x7FFF) => {
                self.sram_target(((bank & 0x1F) << 13) | (offset - 0x6000))
            }
            (0x7E | 0x7F, _) => None,
            (0x40..=0x7D | 0xC0..=0xFF, _) | (_, 0x8000..=0xFFFF) => {
                self.rom_target(((bank & 0x3F) << 16) | offset)
            }
            _ => None,
        }
    }

    fn rom_target(&self, linear: usize) -> Option<Target> {
        let len = self.rom.0.len();
        (len > 0).then(|| Target::Rom(linear % len))
    }

    fn sram_target(&self, linear: usize) -> Option<Target> {
        let len = self.sram.len();
        (len > 0).then(|| Target::Sram(linear % len))
    }
}

#[derive(Clone, Copy)]
enum Target {
    Rom(usize),
    Sram(usize),
}

pub(crate) fn strip_copier_header(image: &[u8]) -> &[u8] {
    if image.len() % 1024 == COPIER_HEADER_SIZE {
        &image[COPIER_HEADER_SIZE..]
    } else {
        image
    }
}

fn checksum_pair_valid(rom: &[u8], base: usize) -> bool {
    if rom.len() < base + 0x40 {
        return false;
    }
    let complement = u16::from_le_bytes([rom[base + HEADER_COMPLEMENT], rom[base + HEADER_COMPLEMENT + 1]]);
    let checksum = u16::from_le_bytes([rom[base + HEADER_CHECKSUM], rom[base + HEADER_CHECKSUM + 1]]);
    checksum.wrapping_add(complement) == 0xFFFF
}

/// Pick LoROM or HiROM from the header checksum pairs. When both pairs check
/// out, the HiROM map byte decides; some homebrew and malformed images are
/// misclassified by this rule.
pub fn detect_map_mode(rom: &[u8]) -> MapMode {
    let lorom = checksum_pair_valid(rom, LOROM_HEADER_BASE);
    let hirom = checksum_pair_valid(rom, HIROM_HEADER_BASE);
    match (lorom, hirom) {
        (false, true) => MapMode::HiRom,
        (true, true) => {
            let map_byte = rom[HIROM_HEADER_BASE + HEADER_MAP_MODE];
            if map_byte & 0x0F == MAP_MODE_HIROM {
                MapMode::HiRom
            } else {
                MapMode::LoRom
            }
        }
        _ => MapMode::LoRom,
    }
}

/// FNV-1a over the ROM bytes; ties save states to the image they were taken from.
fn fingerprint(rom: &[u8]) -> u64 {
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for &byte in rom {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash ^ rom.len() as u64
}
