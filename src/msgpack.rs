use byteorder::{LittleEndian, WriteBytesExt};
use foldhash::fast::FixedState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::{BuildHasher, Hash};
use std::io::{Error, ErrorKind, Result, Write};
use std::marker::PhantomData;

use crate::{ChainTableEmitInfo, ChainTableLookupInfo, PayloadCursor};

/// Key/value policy encoding entries as MessagePack via serde.
///
/// The length prefix is two little-endian `u32`s. Keys are hashed with seeded
/// foldhash of the key value truncated to 32 bits; builder and reader must use
/// the same seed. Emission serializes each key and value once to measure and
/// once to write, relying on MessagePack encoding being deterministic for a
/// given value.
#[derive(Debug)]
pub struct ChainTableMsgpackInfo<K, V> {
    state: FixedState,
    phantom_data: PhantomData<(K, V)>,
}

impl<K, V> ChainTableMsgpackInfo<K, V> {
    /// Creates an info with the given hash seed.
    pub fn new(seed: u64) -> Self {
        Self {
            state: FixedState::with_seed(seed),
            phantom_data: PhantomData,
        }
    }
}

impl<K, V> Default for ChainTableMsgpackInfo<K, V> {
    fn default() -> Self {
        Self::new(0)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value)
        .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Failed to serialize: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Failed to deserialize: {}", e)))
}

fn encoded_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::new(
            ErrorKind::InvalidData,
            format!("encoded value of {} bytes exceeds the u32 length prefix", len),
        )
    })
}

fn write_encoded<W: Write>(sink: &mut W, bytes: &[u8], expected_len: u32) -> Result<()> {
    if bytes.len() as u64 != u64::from(expected_len) {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!(
                "value re-encoded to {} bytes, expected {}",
                bytes.len(),
                expected_len
            ),
        ));
    }
    sink.write_all(bytes)
}

impl<K, V> ChainTableEmitInfo for ChainTableMsgpackInfo<K, V>
where
    K: Serialize + Hash,
    V: Serialize,
{
    type Key = K;
    type Data = V;

    fn compute_hash(&self, key: &Self::Key) -> u32 {
        self.state.hash_one(key) as u32
    }

    fn emit_key_data_length<W: Write>(
        &self,
        sink: &mut W,
        key: &Self::Key,
        data: &Self::Data,
    ) -> Result<(u32, u32)> {
        let key_len = encoded_len(encode(key)?.len())?;
        let data_len = encoded_len(encode(data)?.len())?;
        sink.write_u32::<LittleEndian>(key_len)?;
        sink.write_u32::<LittleEndian>(data_len)?;
        Ok((key_len, data_len))
    }

    fn emit_key<W: Write>(&self, sink: &mut W, key: &Self::Key, key_len: u32) -> Result<()> {
        write_encoded(sink, &encode(key)?, key_len)
    }

    fn emit_data<W: Write>(
        &self,
        sink: &mut W,
        _key: &Self::Key,
        data: &Self::Data,
        data_len: u32,
    ) -> Result<()> {
        write_encoded(sink, &encode(data)?, data_len)
    }
}

impl<K, V> ChainTableLookupInfo for ChainTableMsgpackInfo<K, V>
where
    K: DeserializeOwned + Hash + Eq + Clone,
    V: DeserializeOwned,
{
    type ExternalKey = K;
    type InternalKey = K;
    type Data = V;

    fn compute_hash(&self, key: &Self::InternalKey) -> u32 {
        self.state.hash_one(key) as u32
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
        let key_len = cursor.read_u32()?;
        let data_len = cursor.read_u32()?;
        Ok((key_len, data_len))
    }

    fn read_key(&self, bytes: &[u8]) -> Result<Self::InternalKey> {
        decode(bytes)
    }

    fn read_data(&self, _key: &Self::InternalKey, bytes: &[u8]) -> Result<Self::Data> {
        decode(bytes)
    }
}
