//! Test-side zip reader: walks the end-of-central-directory record and
//! central directory of an archive produced by the server, inflating
//! entry bodies for comparison.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{Cursor, Read};

/// A central directory entry parsed out of archive bytes.
#[allow(dead_code)]
pub struct ZipEntry {
    pub name: String,
    pub crc: u32,
    pub compressed: u64,
    pub uncompressed: u64,
    pub lfh_offset: u64,
}

/// Parse the central directory of a zip archive without a comment.
#[allow(dead_code)]
pub fn parse_entries(data: &[u8]) -> Vec<ZipEntry> {
    assert!(data.len() >= 22, "archive shorter than an EOCD record");
    let eocd = &data[data.len() - 22..];
    assert_eq!(&eocd[0..4], b"PK\x05\x06", "missing EOCD signature");

    let mut cursor = Cursor::new(&eocd[10..]);
    let total_entries = cursor.read_u16::<LittleEndian>().unwrap();
    let cd_size = cursor.read_u32::<LittleEndian>().unwrap() as usize;
    let cd_offset = cursor.read_u32::<LittleEndian>().unwrap() as usize;
    assert_eq!(cd_offset + cd_size + 22, data.len());

    let mut entries = Vec::new();
    let mut pos = cd_offset;
    for _ in 0..total_entries {
        assert_eq!(&data[pos..pos + 4], b"PK\x01\x02", "missing CDFH signature");
        let mut fields = Cursor::new(&data[pos + 16..]);
        let crc = fields.read_u32::<LittleEndian>().unwrap();
        let compressed = fields.read_u32::<LittleEndian>().unwrap() as u64;
        let uncompressed = fields.read_u32::<LittleEndian>().unwrap() as u64;
        let name_len = fields.read_u16::<LittleEndian>().unwrap() as usize;
        let extra_len = fields.read_u16::<LittleEndian>().unwrap() as usize;
        let comment_len = fields.read_u16::<LittleEndian>().unwrap() as usize;
        let mut offset_field = Cursor::new(&data[pos + 42..]);
        let lfh_offset = offset_field.read_u32::<LittleEndian>().unwrap() as u64;
        let name = String::from_utf8(data[pos + 46..pos + 46 + name_len].to_vec()).unwrap();

        entries.push(ZipEntry {
            name,
            crc,
            compressed,
            uncompressed,
            lfh_offset,
        });
        pos += 46 + name_len + extra_len + comment_len;
    }

    entries
}

/// Inflate one entry's body and verify its size and CRC against the
/// central directory record.
#[allow(dead_code)]
pub fn read_entry(data: &[u8], entry: &ZipEntry) -> Vec<u8> {
    let lfh = entry.lfh_offset as usize;
    assert_eq!(&data[lfh..lfh + 4], b"PK\x03\x04", "missing LFH signature");
    let mut fields = Cursor::new(&data[lfh + 26..]);
    let name_len = fields.read_u16::<LittleEndian>().unwrap() as usize;
    let extra_len = fields.read_u16::<LittleEndian>().unwrap() as usize;

    let body_start = lfh + 30 + name_len + extra_len;
    let body = &data[body_start..body_start + entry.compressed as usize];

    let mut out = Vec::new();
    DeflateDecoder::new(body).read_to_end(&mut out).unwrap();
    assert_eq!(out.len() as u64, entry.uncompressed, "size mismatch");

    let mut crc = Crc::new();
    crc.update(&out);
    assert_eq!(crc.sum(), entry.crc, "crc mismatch");

    out
}

/// Parse an archive into (entry name, inflated contents) pairs in
/// directory order.
#[allow(dead_code)]
pub fn unpack(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    parse_entries(data)
        .iter()
        .map(|entry| (entry.name.clone(), read_entry(data, entry)))
        .collect()
}
