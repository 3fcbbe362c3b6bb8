use std::io::{Error, ErrorKind, Result};

use crate::{ChainTableLookupInfo, PayloadCursor};

/// Read-only view of an emitted chained hash table.
///
/// A `ChainTable` wraps the raw bytes of the stream the table was emitted
/// into and answers point lookups without materializing the table into heap
/// structures; only the probed entry is decoded, through the supplied
/// [`ChainTableLookupInfo`]. The byte span must outlive the table and every
/// entry borrowed from it.
///
/// # Type Parameters
/// - `'a`: lifetime of the underlying byte span.
/// - `I`: lookup facet of the key/value policy; must match the policy the
///   table was emitted with.
#[derive(Debug)]
pub struct ChainTable<'a, I: ChainTableLookupInfo> {
    base: &'a [u8],
    slots_offset: usize,
    num_buckets: u32,
    num_entries: u32,
    info: I,
}

impl<'a, I: ChainTableLookupInfo> ChainTable<'a, I> {
    /// Constructs a table over `base`, the stream the table was emitted into
    /// starting at its logical offset 0. `buckets_offset` is the value
    /// returned by [`ChainTableBuilder::emit`].
    ///
    /// [`ChainTableBuilder::emit`]: crate::ChainTableBuilder::emit
    ///
    /// # Errors
    ///
    /// Returns an error when `buckets_offset` is 0 or not 4-byte aligned,
    /// when the span is too short to hold the table header and bucket index,
    /// or when the decoded bucket count is not a nonzero power of two.
    pub fn new(base: &'a [u8], buckets_offset: u32, info: I) -> Result<Self> {
        if buckets_offset == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "the bucket index cannot start at offset 0",
            ));
        }
        if buckets_offset % 4 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("bucket index offset {} is not 4-byte aligned", buckets_offset),
            ));
        }

        let mut cursor = PayloadCursor::new(base, buckets_offset as usize)?;
        let num_buckets = cursor.read_u32()?;
        let num_entries = cursor.read_u32()?;
        if num_buckets == 0 || !num_buckets.is_power_of_two() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("bucket count {} is not a nonzero power of two", num_buckets),
            ));
        }

        let slots_offset = cursor.position();
        let needed = slots_offset as u64 + u64::from(num_buckets) * 4;
        if needed > base.len() as u64 {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "span of {} bytes is too short for a bucket index of {} slots",
                    base.len(),
                    num_buckets
                ),
            ));
        }

        Ok(Self {
            base,
            slots_offset,
            num_buckets,
            num_entries,
            info,
        })
    }

    /// Number of buckets; always a power of two.
    pub fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    /// Number of entries stored in the table.
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Returns the lookup info the table was constructed with.
    pub fn info(&self) -> &I {
        &self.info
    }

    /// Looks up `key` and returns its entry, or `Ok(None)` when absent.
    ///
    /// The probe walks only the chain of the key's bucket and compares the
    /// stored 32-bit hash before decoding any candidate key, so hash
    /// collisions within a bucket are the only case where a non-matching key
    /// is decoded. If the same key was inserted more than once, the most
    /// recently inserted entry is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the chain bytes are truncated or a decoded
    /// length runs past the end of the span.
    pub fn find(&self, key: &I::ExternalKey) -> Result<Option<ChainTableEntry<'_, I>>> {
        let probe = self.info.internal_key(key);
        let hash = self.info.compute_hash(&probe);
        let slot = (hash & (self.num_buckets - 1)) as usize;

        let mut slot_cursor = PayloadCursor::at(self.base, self.slots_offset + slot * 4);
        let offset = slot_cursor.read_u32()?;
        if offset == 0 {
            return Ok(None);
        }

        let mut items = PayloadCursor::new(self.base, offset as usize)?;
        let count = items.read_u16()?;
        for _ in 0..count {
            let item_hash = items.read_u32()?;
            let (key_len, data_len) = self.info.read_key_data_length(&mut items)?;

            // Mismatching hashes skip the entry without decoding the key.
            if item_hash != hash {
                items.skip(key_len as usize)?;
                items.skip(data_len as usize)?;
                continue;
            }

            let candidate = self.info.read_key(items.take(key_len as usize)?)?;
            if !self.info.equal_key(&candidate, &probe) {
                items.skip(data_len as usize)?;
                continue;
            }

            let data = items.take(data_len as usize)?;
            return Ok(Some(ChainTableEntry {
                info: &self.info,
                key: candidate,
                data,
            }));
        }
        Ok(None)
    }
}

/// A found entry, as returned by [`ChainTable::find`].
///
/// Holds the decoded key and the entry's raw data bytes; decoding the value
/// is deferred until [`data`](Self::data) is called.
#[derive(Debug)]
pub struct ChainTableEntry<'t, I: ChainTableLookupInfo> {
    info: &'t I,
    key: I::InternalKey,
    data: &'t [u8],
}

impl<'t, I: ChainTableLookupInfo> ChainTableEntry<'t, I> {
    /// The stored key, in its decoded form.
    pub fn key(&self) -> &I::InternalKey {
        &self.key
    }

    /// The entry's value bytes, exactly as emitted.
    pub fn data_bytes(&self) -> &'t [u8] {
        self.data
    }

    /// Decodes and returns the entry's value.
    pub fn data(&self) -> Result<I::Data> {
        self.info.read_data(&self.key, self.data)
    }

    /// Consumes the entry, returning the decoded key.
    pub fn into_key(self) -> I::InternalKey {
        self.key
    }
}

/// A [`ChainTable`] that also knows where its payload begins, enabling full
/// iteration over keys and values.
///
/// The payload offset is the position the emitting stream was at just before
/// [`ChainTableBuilder::emit`] was called. Iteration visits entries in
/// payload order, which is unspecified but deterministic for a given
/// insertion sequence.
///
/// [`ChainTableBuilder::emit`]: crate::ChainTableBuilder::emit
#[derive(Debug)]
pub struct IterableChainTable<'a, I: ChainTableLookupInfo> {
    table: ChainTable<'a, I>,
    payload_offset: u32,
}

impl<'a, I: ChainTableLookupInfo> IterableChainTable<'a, I> {
    /// Constructs an iterable table. See [`ChainTable::new`] for the meaning
    /// of `base` and `buckets_offset`; `payload_offset` is where the emitted
    /// payload begins within `base`.
    ///
    /// # Errors
    ///
    /// Returns the [`ChainTable::new`] errors, or an error when
    /// `payload_offset` is 0 or outside the span.
    pub fn new(base: &'a [u8], buckets_offset: u32, payload_offset: u32, info: I) -> Result<Self> {
        let table = ChainTable::new(base, buckets_offset, info)?;
        if payload_offset == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "the payload cannot start at offset 0",
            ));
        }
        if payload_offset as usize > base.len() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "payload offset {} is beyond the {} byte span",
                    payload_offset,
                    base.len()
                ),
            ));
        }
        Ok(Self {
            table,
            payload_offset,
        })
    }

    /// The wrapped lookup table.
    pub fn table(&self) -> &ChainTable<'a, I> {
        &self.table
    }

    /// See [`ChainTable::num_buckets`].
    pub fn num_buckets(&self) -> u32 {
        self.table.num_buckets()
    }

    /// See [`ChainTable::num_entries`].
    pub fn num_entries(&self) -> u32 {
        self.table.num_entries()
    }

    /// See [`ChainTable::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// See [`ChainTable::info`].
    pub fn info(&self) -> &I {
        self.table.info()
    }

    /// See [`ChainTable::find`].
    pub fn find(&self, key: &I::ExternalKey) -> Result<Option<ChainTableEntry<'_, I>>> {
        self.table.find(key)
    }

    /// Iterates over all keys, in payload order.
    pub fn keys(&self) -> ChainTableKeys<'_, I> {
        ChainTableKeys {
            walk: self.payload_walk(),
        }
    }

    /// Iterates over all values, in payload order.
    pub fn data(&self) -> ChainTableData<'_, I> {
        ChainTableData {
            walk: self.payload_walk(),
        }
    }

    fn payload_walk(&self) -> PayloadWalk<'_, I> {
        PayloadWalk {
            info: self.table.info(),
            cursor: PayloadCursor::at(self.table.base, self.payload_offset as usize),
            entries_left: self.table.num_entries(),
            items_left_in_bucket: 0,
        }
    }
}

/// Linear traversal over the payload region.
///
/// The payload is a concatenation of bucket blocks with no gaps: a `u16`
/// item count, then that many entries. Empty buckets contribute no bytes, so
/// the walk is driven by the remaining entry count rather than the bucket
/// array.
struct PayloadWalk<'t, I: ChainTableLookupInfo> {
    info: &'t I,
    cursor: PayloadCursor<'t>,
    entries_left: u32,
    items_left_in_bucket: u32,
}

impl<'t, I: ChainTableLookupInfo> PayloadWalk<'t, I> {
    fn step(&mut self) -> Result<(I::InternalKey, &'t [u8])> {
        if self.items_left_in_bucket == 0 {
            self.items_left_in_bucket = u32::from(self.cursor.read_u16()?);
        }
        self.cursor.skip(4)?; // item hash
        let (key_len, data_len) = self.info.read_key_data_length(&mut self.cursor)?;
        let key = self.info.read_key(self.cursor.take(key_len as usize)?)?;
        let data = self.cursor.take(data_len as usize)?;
        self.items_left_in_bucket = self.items_left_in_bucket.saturating_sub(1);
        self.entries_left -= 1;
        Ok((key, data))
    }
}

/// Lazy key sequence over an [`IterableChainTable`].
///
/// Yields each stored key translated to its external form. Stops after the
/// first error.
pub struct ChainTableKeys<'t, I: ChainTableLookupInfo> {
    walk: PayloadWalk<'t, I>,
}

impl<'t, I: ChainTableLookupInfo> Iterator for ChainTableKeys<'t, I> {
    type Item = Result<I::ExternalKey>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.walk.entries_left == 0 {
            return None;
        }
        match self.walk.step() {
            Ok((key, _)) => Some(Ok(self.walk.info.external_key(&key))),
            Err(e) => {
                self.walk.entries_left = 0;
                Some(Err(e))
            }
        }
    }
}

/// Lazy value sequence over an [`IterableChainTable`].
///
/// Yields each stored value, decoded. Stops after the first error.
pub struct ChainTableData<'t, I: ChainTableLookupInfo> {
    walk: PayloadWalk<'t, I>,
}

impl<'t, I: ChainTableLookupInfo> Iterator for ChainTableData<'t, I> {
    type Item = Result<I::Data>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.walk.entries_left == 0 {
            return None;
        }
        let decoded = self
            .walk
            .step()
            .and_then(|(key, data)| self.walk.info.read_data(&key, data));
        match decoded {
            Ok(data) => Some(Ok(data)),
            Err(e) => {
                self.walk.entries_left = 0;
                Some(Err(e))
            }
        }
    }
}
