//! Build and read on-disk chained hash tables.
//!
//! The `chaintable` crate produces persistent, position-independent key-value
//! maps meant to be embedded inside a larger binary artifact (serialized
//! module formats, indexed archives) and consumed directly from memory-mapped
//! bytes. A [`ChainTableBuilder`] collects entries in memory and emits a
//! self-describing byte layout; a [`ChainTable`] wraps the emitted span and
//! answers point lookups in expected constant time without loading the table
//! into heap structures, while [`IterableChainTable`] adds lazy iteration
//! over all keys and values.
//!
//! How keys are hashed and how keys and values are serialized is delegated to
//! a user-supplied policy, split into an emit facet ([`ChainTableEmitInfo`])
//! and a lookup facet ([`ChainTableLookupInfo`]). Two policies ship with the
//! crate: [`ChainTableBytesInfo`] for raw byte strings and
//! [`ChainTableMsgpackInfo`] for serde-encodable types.
//!
//! All integers on disk are little-endian, the bucket index is 4-byte
//! aligned, and the offset 0 is reserved to mark empty buckets, so the table
//! must be emitted after at least one byte of caller-written header.
//!
//! ```
//! use chaintable::{ChainTable, ChainTableBuilder, ChainTableBytesInfo};
//! use std::io::{Cursor, Write};
//!
//! # fn main() -> std::io::Result<()> {
//! let mut builder = ChainTableBuilder::new(ChainTableBytesInfo::default());
//! builder.insert(b"apple".to_vec(), b"1".to_vec());
//! builder.insert(b"banana".to_vec(), b"2".to_vec());
//!
//! let mut sink = Cursor::new(Vec::new());
//! sink.write_all(&[0u8; 4])?; // reserve a header; the payload must not start at offset 0
//! let table_offset = builder.emit(&mut sink)?;
//!
//! let bytes = sink.into_inner();
//! let table = ChainTable::new(&bytes, table_offset, ChainTableBytesInfo::default())?;
//! let entry = table.find(&b"banana".to_vec())?.expect("inserted above");
//! assert_eq!(entry.data()?, b"2");
//! assert!(table.find(&b"cherry".to_vec())?.is_none());
//! # Ok(())
//! # }
//! ```

mod cursor;
pub use cursor::PayloadCursor;

mod info;
pub use info::{ChainTableEmitInfo, ChainTableLookupInfo};

mod bytes;
pub use bytes::ChainTableBytesInfo;

mod msgpack;
pub use msgpack::ChainTableMsgpackInfo;

mod builder;
pub use builder::ChainTableBuilder;

mod table;
pub use table::{
    ChainTable, ChainTableData, ChainTableEntry, ChainTableKeys, IterableChainTable,
};
