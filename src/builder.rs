use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Error, ErrorKind, Result, Seek, Write};

use crate::ChainTableEmitInfo;

const INITIAL_BUCKETS: usize = 64;

/// Accumulates key/value entries in memory and emits them as an on-disk
/// chained hash table.
///
/// Entries are kept in an arena and chained into buckets by
/// `hash & (num_buckets - 1)`; the bucket count starts at 64 and doubles
/// whenever the load factor would reach 3/4. A single call to
/// [`emit`](Self::emit) consumes the builder and writes the payload followed
/// by the bucket index, returning the offset a reader needs.
///
/// Within a bucket, chains hold the most recently inserted entry first.
/// Iteration order over an emitted table is therefore unspecified, but it is
/// deterministic for a given insertion sequence.
pub struct ChainTableBuilder<I: ChainTableEmitInfo> {
    info: I,
    items: Vec<Item<I::Key, I::Data>>,
    buckets: Vec<Bucket>,
    num_entries: u32,
}

/// A single arena entry; `next` is an index link to the rest of its chain.
struct Item<K, D> {
    key: K,
    data: D,
    hash: u32,
    next: Option<u32>,
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    head: Option<u32>,
    len: u32,
}

impl<I: ChainTableEmitInfo> ChainTableBuilder<I> {
    /// Creates an empty builder that hashes and serializes entries through
    /// `info`.
    pub fn new(info: I) -> Self {
        Self {
            info,
            items: Vec::new(),
            buckets: vec![Bucket::default(); INITIAL_BUCKETS],
            num_entries: 0,
        }
    }

    /// Number of entries inserted so far.
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// Current bucket count; always a power of two.
    pub fn num_buckets(&self) -> u32 {
        self.buckets.len() as u32
    }

    /// Returns the info the builder was created with.
    pub fn info(&self) -> &I {
        &self.info
    }

    /// Appends an entry.
    ///
    /// Inserting the same key twice stores two entries; lookups on the
    /// emitted table return the most recently inserted one.
    pub fn insert(&mut self, key: I::Key, data: I::Data) {
        let hash = self.info.compute_hash(&key);
        self.num_entries += 1;
        if 4 * u64::from(self.num_entries) >= 3 * self.buckets.len() as u64 {
            self.resize(self.buckets.len() * 2);
        }

        let index = self.items.len() as u32;
        self.items.push(Item {
            key,
            data,
            hash,
            next: None,
        });
        self.link(index);
    }

    /// Doubles the bucket array and relinks every item. Walking the arena in
    /// insertion order rebuilds each chain with the newest entry at its head,
    /// so duplicate-key recency survives resizes.
    fn resize(&mut self, new_len: usize) {
        self.buckets = vec![Bucket::default(); new_len];
        for index in 0..self.items.len() as u32 {
            self.link(index);
        }
    }

    /// Pushes an item at the head of its bucket chain.
    fn link(&mut self, index: u32) {
        let hash = self.items[index as usize].hash;
        let slot = (hash & (self.buckets.len() as u32 - 1)) as usize;
        self.items[index as usize].next = self.buckets[slot].head;
        self.buckets[slot].head = Some(index);
        self.buckets[slot].len += 1;
    }

    /// Writes the table to `sink` and returns the offset at which the bucket
    /// index begins, measured in the sink's own coordinate system. That
    /// offset, together with the stream's start, is what a reader needs.
    ///
    /// The payload is written first: for each non-empty bucket in ascending
    /// index order, a little-endian `u16` item count followed by each chained
    /// entry (`u32` hash, then the bytes the info emits). Zero padding aligns
    /// the sink to a 4-byte boundary before the index (`u32` bucket count,
    /// `u32` entry count, one `u32` offset per bucket, 0 marking an empty
    /// bucket).
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is positioned at offset 0 (a zero offset
    /// marks an empty bucket, so the stream must carry at least one byte of
    /// header before the table), if any bucket holds more than `u16::MAX`
    /// items, if an offset would exceed `u32::MAX`, or if the sink or the
    /// info reports a write failure.
    pub fn emit<W: Write + Seek>(self, sink: &mut W) -> Result<u32> {
        let Self {
            info,
            items,
            buckets,
            num_entries,
        } = self;

        if sink.stream_position()? == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "the table payload cannot start at stream offset 0; write a header byte first",
            ));
        }

        // Payload pass.
        let mut offsets = vec![0u32; buckets.len()];
        for (slot, bucket) in buckets.iter().enumerate() {
            let Some(head) = bucket.head else { continue };
            offsets[slot] = bucket_offset(sink.stream_position()?)?;

            let count = u16::try_from(bucket.len).map_err(|_| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("bucket with {} items exceeds the u16 item count", bucket.len),
                )
            })?;
            sink.write_u16::<LittleEndian>(count)?;

            let mut next = Some(head);
            while let Some(index) = next {
                let item = &items[index as usize];
                sink.write_u32::<LittleEndian>(item.hash)?;
                let (key_len, data_len) = info.emit_key_data_length(sink, &item.key, &item.data)?;
                info.emit_key(sink, &item.key, key_len)?;
                info.emit_data(sink, &item.key, &item.data, data_len)?;
                next = item.next;
            }
        }

        // Index pass: pad to a 4-byte boundary, then the bucket index.
        let end = sink.stream_position()?;
        let padding = end.wrapping_neg() % 4;
        for _ in 0..padding {
            sink.write_u8(0)?;
        }
        let table_offset = bucket_offset(end + padding)?;

        sink.write_u32::<LittleEndian>(buckets.len() as u32)?;
        sink.write_u32::<LittleEndian>(num_entries)?;
        for offset in offsets {
            sink.write_u32::<LittleEndian>(offset)?;
        }
        Ok(table_offset)
    }
}

impl<I: ChainTableEmitInfo + Default> Default for ChainTableBuilder<I> {
    fn default() -> Self {
        Self::new(I::default())
    }
}

fn bucket_offset(position: u64) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        Error::new(
            ErrorKind::InvalidData,
            format!("offset {} exceeds the 4 GiB addressable by u32 offsets", position),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChainTableBytesInfo;
    use std::io::Cursor;

    fn key(i: u32) -> Vec<u8> {
        format!("key-{}", i).into_bytes()
    }

    #[test]
    fn test_load_factor_invariant() {
        let mut builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        assert_eq!(builder.num_buckets(), 64);
        assert_eq!(builder.num_entries(), 0);

        for i in 0..10_000 {
            builder.insert(key(i), b"v".to_vec());
            let entries = u64::from(builder.num_entries());
            let buckets = u64::from(builder.num_buckets());
            assert!(4 * entries < 3 * buckets, "load factor broken at {}", i);
            assert!(builder.num_buckets().is_power_of_two());
        }
        assert_eq!(builder.num_entries(), 10_000);
    }

    #[test]
    fn test_resize_transition() {
        let mut builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        for i in 0..47 {
            builder.insert(key(i), b"v".to_vec());
        }
        assert_eq!(builder.num_buckets(), 64);

        // 4 * 48 == 3 * 64, so the 48th insert doubles the bucket count.
        builder.insert(key(47), b"v".to_vec());
        assert_eq!(builder.num_buckets(), 128);
    }

    #[test]
    fn test_emit_at_offset_zero_is_refused() {
        let builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        let mut sink = Cursor::new(Vec::new());
        let err = builder.emit(&mut sink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let mut builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        builder.insert(b"a".to_vec(), b"1".to_vec());
        let mut sink = Cursor::new(Vec::new());
        builder.emit(&mut sink).unwrap_err();
    }

    #[test]
    fn test_emit_pads_index_to_four_bytes() {
        let mut builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        builder.insert(b"a".to_vec(), b"b".to_vec());

        let mut sink = Cursor::new(Vec::new());
        sink.write_all(&[0u8]).unwrap();
        // 1 header byte + 2 count + 4 hash + 4 prefix + 1 key + 1 data = 13.
        let table_offset = builder.emit(&mut sink).unwrap();
        assert_eq!(table_offset, 16);

        let bytes = sink.into_inner();
        assert_eq!(&bytes[13..16], &[0, 0, 0]);
        assert_eq!(bytes.len(), 16 + 4 + 4 + 64 * 4);
    }

    #[test]
    fn test_empty_emit_writes_only_the_index() {
        let builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
        let mut sink = Cursor::new(Vec::new());
        sink.write_all(&[0u8; 8]).unwrap();
        let table_offset = builder.emit(&mut sink).unwrap();
        assert_eq!(table_offset, 8);

        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 8 + 4 + 4 + 64 * 4);
        assert_eq!(&bytes[8..12], &64u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0u32.to_le_bytes());
        assert!(bytes[16..].iter().all(|byte| *byte == 0));
    }
}
