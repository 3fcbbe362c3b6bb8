use byteorder::{LittleEndian, WriteBytesExt};
use foldhash::fast::FixedState;
use std::hash::BuildHasher;
use std::io::{Error, ErrorKind, Result, Write};

use crate::{ChainTableEmitInfo, ChainTableLookupInfo, PayloadCursor};

/// Key/value policy for raw byte-string entries.
///
/// Keys and values are stored verbatim behind a length prefix of two
/// little-endian `u16`s (`key_len`, then `data_len`); entries longer than
/// `u16::MAX` bytes on either side are rejected at emit time. Keys are hashed
/// with seeded foldhash truncated to 32 bits, so the builder and the reader
/// must be given the same seed.
#[derive(Debug)]
pub struct ChainTableBytesInfo {
    state: FixedState,
}

impl ChainTableBytesInfo {
    /// Creates an info with the given hash seed.
    pub fn new(seed: u64) -> Self {
        Self {
            state: FixedState::with_seed(seed),
        }
    }
}

impl Default for ChainTableBytesInfo {
    fn default() -> Self {
        Self::new(0)
    }
}

fn prefix_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        Error::new(
            ErrorKind::InvalidData,
            format!("{} of {} bytes exceeds the u16 length prefix", what, len),
        )
    })
}

impl ChainTableEmitInfo for ChainTableBytesInfo {
    type Key = Vec<u8>;
    type Data = Vec<u8>;

    fn compute_hash(&self, key: &Self::Key) -> u32 {
        self.state.hash_one(key.as_slice()) as u32
    }

    fn emit_key_data_length<W: Write>(
        &self,
        sink: &mut W,
        key: &Self::Key,
        data: &Self::Data,
    ) -> Result<(u32, u32)> {
        let key_len = prefix_len(key.len(), "key")?;
        let data_len = prefix_len(data.len(), "data")?;
        sink.write_u16::<LittleEndian>(key_len)?;
        sink.write_u16::<LittleEndian>(data_len)?;
        Ok((u32::from(key_len), u32::from(data_len)))
    }

    fn emit_key<W: Write>(&self, sink: &mut W, key: &Self::Key, _key_len: u32) -> Result<()> {
        sink.write_all(key)
    }

    fn emit_data<W: Write>(
        &self,
        sink: &mut W,
        _key: &Self::Key,
        data: &Self::Data,
        _data_len: u32,
    ) -> Result<()> {
        sink.write_all(data)
    }
}

impl ChainTableLookupInfo for ChainTableBytesInfo {
    type ExternalKey = Vec<u8>;
    type InternalKey = Vec<u8>;
    type Data = Vec<u8>;

    fn compute_hash(&self, key: &Self::InternalKey) -> u32 {
        self.state.hash_one(key.as_slice()) as u32
    }

    fn equal_key(&self, a: &Self::InternalKey, b: &Self::InternalKey) -> bool {
        a == b
    }

    fn internal_key(&self, key: &Self::ExternalKey) -> Self::InternalKey {
        key.clone()
    }

    fn external_key(&self, key: &Self::InternalKey) -> Self::ExternalKey {
        key.clone()
    }

    fn read_key_data_length(&self, cursor: &mut PayloadCursor<'_>) -> Result<(u32, u32)> {
        let key_len = cursor.read_u16()?;
        let data_len = cursor.read_u16()?;
        Ok((u32::from(key_len), u32::from(data_len)))
    }

    fn read_key(&self, bytes: &[u8]) -> Result<Self::InternalKey> {
        Ok(bytes.to_vec())
    }

    fn read_data(&self, _key: &Self::InternalKey, bytes: &[u8]) -> Result<Self::Data> {
        Ok(bytes.to_vec())
    }
}
