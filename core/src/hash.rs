//! Definition hashes and checksums.
//!
//! The definition hash is a CRC-32 running over the structural content of a
//! model subtree. It is seeded with `0xFFFFFFFF` and not inverted at the end,
//! so a hash over one subtree can be continued over the next one by feeding
//! the same [`Hasher`] (e.g. protocol, then its data pool).

use crc::{Crc, Digest, CRC_16_SPI_FUJITSU, CRC_32_ISO_HDLC, CRC_32_JAMCRC};

use crate::Content;

/// Running definition hash (reflected CRC-32, init `0xFFFFFFFF`, no final XOR).
pub static DEFINITION_HASH: Crc<u32> = Crc::<u32>::new(&CRC_32_JAMCRC);

/// CRC-16/CCITT with seed `0x1D0F`, protecting raw parameter blocks.
pub static BLOCK_CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_SPI_FUJITSU);

/// Whole-file CRC-32 appended to parameter set images.
pub static FILE_CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub type Hasher = Digest<'static, u32>;

/// Structural hash over a model subtree.
///
/// Implementations feed every semantically meaningful configuration field in
/// declaration order and leave out comments, ownership assignment and values
/// that only exist at runtime.
pub trait DefinitionHash {
    fn hash_into(&self, h: &mut Hasher);

    fn definition_hash(&self) -> u32 {
        let mut h = DEFINITION_HASH.digest();
        self.hash_into(&mut h);
        h.finalize()
    }
}

/// Hash over several subtrees in order, as one running hash.
pub fn chained_hash(parts: &[&dyn DefinitionHash]) -> u32 {
    let mut h = DEFINITION_HASH.digest();
    for part in parts {
        part.hash_into(&mut h);
    }
    h.finalize()
}

pub fn crc16(bytes: &[u8]) -> u16 {
    BLOCK_CRC16.checksum(bytes)
}

/// Length-prefixed, so adjacent strings cannot trade characters.
pub(crate) fn hash_str(h: &mut Hasher, s: &str) {
    h.update(&(s.len() as u32).to_le_bytes());
    h.update(s.as_bytes());
}

pub(crate) fn hash_bool(h: &mut Hasher, b: bool) {
    h.update(&[u8::from(b)]);
}

impl DefinitionHash for Content {
    fn hash_into(&self, h: &mut Hasher) {
        h.update(&[self.ty().tag()]);
        hash_bool(h, self.is_array());
        h.update(&(self.len() as u32).to_le_bytes());
        h.update(&self.to_le_bytes());
    }
}

impl<T: DefinitionHash> DefinitionHash for [T] {
    fn hash_into(&self, h: &mut Hasher) {
        for item in self {
            item.hash_into(h);
        }
    }
}
