//! Mod-supplied streaming payload files
//!
//! ```text
//! [8 bytes "IDSTRMOD"][u32 LE lod count][u32 LE reserved]
//! repeated: [u64 LE file id][u32 LE offset][u32 LE length]
//! ```
//!
//! Offsets are from the start of the mod file.

use crate::streamdb::error::{Result, StreamDbError};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Magic at the start of a mod-side streaming file
pub const STREAM_MOD_MAGIC: [u8; 8] = *b"IDSTRMOD";

/// Token that introduces the numeric id in a streaming file name
pub const STREAM_ID_TOKEN: &str = "_id#";

#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
struct StreamModHeader {
    magic: [u8; 8],
    lod_count: u32,
    reserved: u32,
}

/// One level-of-detail payload inside a mod streaming file
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct StreamLod {
    /// Target streaming file id
    pub file_id: u64,
    /// Byte offset inside the mod file
    pub offset: u32,
    /// Byte length
    pub length: u32,
}

/// Parsed mod streaming file borrowing its payload bytes
#[derive(Debug, Clone)]
pub struct StreamModFile<'a> {
    data: &'a [u8],
    lods: Vec<StreamLod>,
}

impl<'a> StreamModFile<'a> {
    /// Validate the header and every LOD range
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        if data.len() < 16 {
            return Err(StreamDbError::Truncated {
                needed: 16,
                actual: data.len() as u64,
            });
        }
        let header = StreamModHeader::read(&mut cursor)?;
        if header.magic != STREAM_MOD_MAGIC {
            return Err(StreamDbError::InvalidModMagic(header.magic));
        }

        let table_end = 16 + u64::from(header.lod_count) * 16;
        if table_end > data.len() as u64 {
            return Err(StreamDbError::Truncated {
                needed: table_end,
                actual: data.len() as u64,
            });
        }

        let mut lods = Vec::with_capacity(header.lod_count as usize);
        for _ in 0..header.lod_count {
            let lod = StreamLod::read(&mut cursor)?;
            let end = u64::from(lod.offset) + u64::from(lod.length);
            if end > data.len() as u64 {
                return Err(StreamDbError::LodOutOfRange {
                    file_id: lod.file_id,
                    offset: lod.offset,
                    length: lod.length,
                    size: data.len(),
                });
            }
            lods.push(lod);
        }

        Ok(Self { data, lods })
    }

    /// LOD table entries in file order
    pub fn lods(&self) -> &[StreamLod] {
        &self.lods
    }

    /// `(file_id, payload)` for every LOD
    pub fn payloads(&self) -> impl Iterator<Item = (u64, &'a [u8])> + '_ {
        let data = self.data;
        self.lods.iter().map(move |lod| {
            let start = lod.offset as usize;
            (lod.file_id, &data[start..start + lod.length as usize])
        })
    }
}

/// Build a mod streaming file from `(file_id, payload)` pairs
pub fn build_stream_mod(lods: &[(u64, &[u8])]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let lod_count = u32::try_from(lods.len()).map_err(|_| StreamDbError::TooLarge(lods.len() as u64))?;
    StreamModHeader {
        magic: STREAM_MOD_MAGIC,
        lod_count,
        reserved: 0,
    }
    .write(&mut cursor)?;

    let mut offset = 16 + 16 * u64::from(lod_count);
    for (file_id, payload) in lods {
        let length =
            u32::try_from(payload.len()).map_err(|_| StreamDbError::TooLarge(payload.len() as u64))?;
        StreamLod {
            file_id: *file_id,
            offset: u32::try_from(offset).map_err(|_| StreamDbError::TooLarge(offset))?,
            length,
        }
        .write(&mut cursor)?;
        offset += u64::from(length);
    }

    let mut out = cursor.into_inner();
    for (_, payload) in lods {
        out.extend_from_slice(payload);
    }
    Ok(out)
}

/// Numeric id from a name carrying an `_id#<N>` token
///
/// ```
/// use resforge_formats::streamdb::parse_stream_id;
///
/// assert_eq!(parse_stream_id("models/rock_id#4210.streamdb"), Some(4210));
/// assert_eq!(parse_stream_id("models/rock.streamdb"), None);
/// ```
pub fn parse_stream_id(name: &str) -> Option<u64> {
    let (_, tail) = name.rsplit_once(STREAM_ID_TOKEN)?;
    let digits: &str = tail
        .find(|c: char| !c.is_ascii_digit())
        .map_or(tail, |end| &tail[..end]);
    digits.parse().ok()
}
