use std::io::{Result, Write};

use crate::PayloadCursor;

/// Writer facet of the key/value policy consumed by [`ChainTableBuilder`].
///
/// The builder treats keys and values as opaque: how a key is hashed and how
/// key and value bytes land in the payload is decided entirely by this trait.
/// The serialized form of one entry is whatever [`emit_key_data_length`] wrote
/// (typically a length prefix), immediately followed by the bytes written by
/// [`emit_key`] and [`emit_data`], which must be exactly `key_len` and
/// `data_len` bytes long.
///
/// The hash function must agree with the [`ChainTableLookupInfo`] used to read
/// the emitted table: equal keys must produce equal 32-bit hashes on both
/// sides.
///
/// [`ChainTableBuilder`]: crate::ChainTableBuilder
/// [`emit_key_data_length`]: Self::emit_key_data_length
/// [`emit_key`]: Self::emit_key
/// [`emit_data`]: Self::emit_data
pub trait ChainTableEmitInfo {
    /// Key type accepted by the builder.
    type Key;
    /// Value type accepted by the builder.
    type Data;

    /// Hashes a key down to the 32 bits stored on the wire.
    fn compute_hash(&self, key: &Self::Key) -> u32;

    /// Writes whatever length prefix the encoding needs and returns the byte
    /// lengths that [`emit_key`](Self::emit_key) and
    /// [`emit_data`](Self::emit_data) will then produce for this entry.
    fn emit_key_data_length<W: Write>(
        &self,
        sink: &mut W,
        key: &Self::Key,
        data: &Self::Data,
    ) -> Result<(u32, u32)>;

    /// Writes the key. `key_len` is the length previously returned by
    /// [`emit_key_data_length`](Self::emit_key_data_length).
    fn emit_key<W: Write>(&self, sink: &mut W, key: &Self::Key, key_len: u32) -> Result<()>;

    /// Writes the value. The key is passed along because some encodings
    /// derive part of the value bytes from it.
    fn emit_data<W: Write>(
        &self,
        sink: &mut W,
        key: &Self::Key,
        data: &Self::Data,
        data_len: u32,
    ) -> Result<()>;
}

/// Reader facet of the key/value policy consumed by [`ChainTable`].
///
/// Lookups accept an [`ExternalKey`], a possibly cheaper representation that
/// [`internal_key`] translates into the stored [`InternalKey`] form before
/// hashing and comparison. When both representations coincide the translation
/// is simply a copy.
///
/// [`ChainTable`]: crate::ChainTable
/// [`ExternalKey`]: Self::ExternalKey
/// [`internal_key`]: Self::internal_key
/// [`InternalKey`]: Self::InternalKey
pub trait ChainTableLookupInfo {
    /// Key type passed to lookups and yielded by key iteration.
    type ExternalKey;
    /// Key type decoded from the payload.
    type InternalKey;
    /// Value type decoded from the payload.
    type Data;

    /// Hashes a key. Must match the hash the table was emitted with.
    fn compute_hash(&self, key: &Self::InternalKey) -> u32;

    /// Compares two stored-form keys for equality.
    fn equal_key(&self, a: &Self::InternalKey, b: &Self::InternalKey) -> bool;

    /// Translates a lookup key into the stored representation.
    fn internal_key(&self, key: &Self::ExternalKey) -> Self::InternalKey;

    /// Translates a stored key back into the lookup representation. Only key
    /// iteration calls this.
    fn external_key(&self, key: &Self::InternalKey) -> Self::ExternalKey;

    /// Reads the length prefix written by
    /// [`ChainTableEmitInfo::emit_key_data_length`], leaving the cursor at the
    /// first key byte, and returns `(key_len, data_len)`.
    fn read_key_data_length(&self, cursor: &mut PayloadCursor<'_>) -> Result<(u32, u32)>;

    /// Decodes a key from exactly the bytes [`emit_key`] wrote for it.
    ///
    /// [`emit_key`]: ChainTableEmitInfo::emit_key
    fn read_key(&self, bytes: &[u8]) -> Result<Self::InternalKey>;

    /// Decodes a value from exactly the bytes [`emit_data`] wrote for it.
    ///
    /// [`emit_data`]: ChainTableEmitInfo::emit_data
    fn read_data(&self, key: &Self::InternalKey, bytes: &[u8]) -> Result<Self::Data>;
}
