//! StreamDB streaming-payload archives
//!
//! Archives are rebuilt from scratch on every patch run from mod-supplied
//! streaming files. Layout:
//!
//! ```text
//! [32-byte header]
//! [16-byte records sorted by file id]
//! [zero padding to 16]
//! [payloads, each starting on a 16-byte boundary]
//! ```
//!
//! # Example
//!
//! ```
//! use resforge_formats::streamdb::StreamDbContainer;
//!
//! let mut db = StreamDbContainer::new();
//! db.add(5, vec![0; 10]);
//! db.add(3, vec![0; 37]);
//! let layout = db.layout().unwrap();
//! assert_eq!(layout.records[0].file_id, 3);
//! assert_eq!(layout.records[1].data_offset(), 112);
//! ```

pub mod container;
pub mod error;
pub mod header;
pub mod lod;

pub use container::{StreamDbContainer, StreamDbEntry, StreamDbLayout};
pub use error::{Result, StreamDbError};
pub use header::{STREAMDB_MAGIC, StreamDbHeader, StreamDbRecord, align16};
pub use lod::{
    STREAM_ID_TOKEN, STREAM_MOD_MAGIC, StreamLod, StreamModFile, build_stream_mod, parse_stream_id,
};
