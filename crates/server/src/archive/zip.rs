//! Streaming zip writer.
//!
//! Writes a zip archive to an async sink one entry at a time, without
//! buffering entry bodies or knowing their sizes up front: each local
//! file header carries zeroed size/CRC fields and the real values follow
//! the entry body in a data descriptor (general-purpose flag bit 3).
//! Entry bodies are raw-deflate at the fastest setting.
//!
//! Classic 32/16-bit fields only, no zip64: add-in payloads are megabytes,
//! far below the 4 GiB field limit.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::{self, Write};
use time::OffsetDateTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const LFH_SIGNATURE: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const CDFH_SIGNATURE: u32 = 0x0201_4b50;
const EOCD_SIGNATURE: u32 = 0x0605_4b50;

/// Version 2.0: deflate plus data descriptors.
const VERSION_NEEDED: u16 = 20;
/// Upper byte 3 = Unix host, lower byte = version 2.0.
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
/// Bit 3: sizes/CRC follow the body in a data descriptor. Bit 11: UTF-8 names.
const FLAGS: u16 = 0x0808;
const METHOD_DEFLATE: u16 = 8;
/// rw-r--r-- regular file in the Unix half of the external attributes.
const EXTERNAL_ATTRS: u32 = 0o100644 << 16;

/// A finished entry awaiting its central directory record.
struct CentralRecord {
    name: String,
    crc: u32,
    compressed: u64,
    uncompressed: u64,
    dos_time: u16,
    dos_date: u16,
    lfh_offset: u64,
}

/// An entry whose body is currently being written.
struct OpenEntry {
    name: String,
    lfh_offset: u64,
    dos_time: u16,
    dos_date: u16,
    encoder: DeflateEncoder<Vec<u8>>,
    crc: Crc,
    compressed: u64,
    uncompressed: u64,
}

/// Streaming zip writer over an async byte sink.
///
/// Usage: `start_entry` / `write_data`* / `finish_entry` per entry, then
/// `finish` once. `abandon_entry` closes out an entry whose source failed
/// mid-copy: the local record is finalized so the byte stream stays
/// well-formed, but the entry is omitted from the central directory and
/// therefore invisible to directory-driven readers.
pub struct ZipStreamWriter<W> {
    inner: W,
    offset: u64,
    central: Vec<CentralRecord>,
    current: Option<OpenEntry>,
}

/// Pack a timestamp into DOS date/time fields (2-second resolution,
/// epoch 1980).
fn dos_date_time(dt: OffsetDateTime) -> (u16, u16) {
    let year = dt.year().clamp(1980, 2107) as u16;
    let date = ((year - 1980) << 9) | (u16::from(u8::from(dt.month())) << 5) | u16::from(dt.day());
    let time = (u16::from(dt.hour()) << 11)
        | (u16::from(dt.minute()) << 5)
        | (u16::from(dt.second()) / 2);
    (time, date)
}

fn no_open_entry() -> io::Error {
    io::Error::other("no zip entry is open")
}

impl<W: AsyncWrite + Unpin> ZipStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            central: Vec::new(),
            current: None,
        }
    }

    /// Number of entries recorded for the central directory so far.
    pub fn entry_count(&self) -> usize {
        self.central.len()
    }

    async fn write_raw(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Begin a new entry. The previous entry must have been closed with
    /// `finish_entry` or `abandon_entry`.
    pub async fn start_entry(&mut self, name: &str) -> io::Result<()> {
        if self.current.is_some() {
            return Err(io::Error::other("zip entry already open"));
        }
        if name.is_empty() {
            return Err(io::Error::other("zip entry name must not be empty"));
        }

        let (dos_time, dos_date) = dos_date_time(OffsetDateTime::now_utc());
        let lfh_offset = self.offset;

        let mut buf = Vec::with_capacity(30 + name.len());
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, LFH_SIGNATURE)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, VERSION_NEEDED)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, FLAGS)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, METHOD_DEFLATE)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, dos_time)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, dos_date)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // crc32, in the descriptor
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // compressed size, in the descriptor
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // uncompressed size, in the descriptor
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, name.len() as u16)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // extra field length
        buf.extend_from_slice(name.as_bytes());
        self.write_raw(&buf).await?;

        self.current = Some(OpenEntry {
            name: name.to_string(),
            lfh_offset,
            dos_time,
            dos_date,
            encoder: DeflateEncoder::new(Vec::new(), Compression::fast()),
            crc: Crc::new(),
            compressed: 0,
            uncompressed: 0,
        });

        Ok(())
    }

    /// Feed entry bytes through the deflate encoder, draining compressed
    /// output to the sink as it becomes available.
    pub async fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        let chunk = {
            let entry = self.current.as_mut().ok_or_else(no_open_entry)?;
            entry.crc.update(data);
            entry.uncompressed += data.len() as u64;
            entry.encoder.write_all(data)?;
            std::mem::take(entry.encoder.get_mut())
        };

        if !chunk.is_empty() {
            if let Some(entry) = self.current.as_mut() {
                entry.compressed += chunk.len() as u64;
            }
            self.write_raw(&chunk).await?;
        }

        Ok(())
    }

    /// Finalize the open entry and record it for the central directory.
    pub async fn finish_entry(&mut self) -> io::Result<()> {
        self.close_current(true).await
    }

    /// Finalize the open entry but leave it out of the central directory.
    pub async fn abandon_entry(&mut self) -> io::Result<()> {
        self.close_current(false).await
    }

    async fn close_current(&mut self, keep: bool) -> io::Result<()> {
        let entry = self.current.take().ok_or_else(no_open_entry)?;
        let OpenEntry {
            name,
            lfh_offset,
            dos_time,
            dos_date,
            encoder,
            crc,
            mut compressed,
            uncompressed,
        } = entry;

        let tail = encoder.finish()?;
        if !tail.is_empty() {
            compressed += tail.len() as u64;
            self.write_raw(&tail).await?;
        }

        let crc = crc.sum();
        let mut buf = Vec::with_capacity(16);
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, DATA_DESCRIPTOR_SIGNATURE)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, crc)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, compressed as u32)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, uncompressed as u32)?;
        self.write_raw(&buf).await?;

        if keep {
            self.central.push(CentralRecord {
                name,
                crc,
                compressed,
                uncompressed,
                dos_time,
                dos_date,
                lfh_offset,
            });
        }

        Ok(())
    }

    /// Write the central directory and end-of-central-directory record,
    /// flush, and return the sink.
    pub async fn finish(mut self) -> io::Result<W> {
        if self.current.is_some() {
            return Err(io::Error::other("zip entry still open"));
        }

        let cd_offset = self.offset;
        let mut buf = Vec::new();

        for record in &self.central {
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, CDFH_SIGNATURE)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, VERSION_MADE_BY)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, VERSION_NEEDED)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, FLAGS)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, METHOD_DEFLATE)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, record.dos_time)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, record.dos_date)?;
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, record.crc)?;
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, record.compressed as u32)?;
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, record.uncompressed as u32)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, record.name.len() as u16)?;
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // extra field length
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // comment length
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // disk number start
            WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // internal attributes
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, EXTERNAL_ATTRS)?;
            WriteBytesExt::write_u32::<LittleEndian>(&mut buf, record.lfh_offset as u32)?;
            buf.extend_from_slice(record.name.as_bytes());
        }

        let cd_size = buf.len() as u64;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, EOCD_SIGNATURE)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // disk number
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // disk with central directory
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, self.central.len() as u16)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, self.central.len() as u16)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, cd_size as u32)?;
        WriteBytesExt::write_u32::<LittleEndian>(&mut buf, cd_offset as u32)?;
        WriteBytesExt::write_u16::<LittleEndian>(&mut buf, 0)?; // comment length

        self.write_raw(&buf).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use flate2::read::DeflateDecoder;
    use std::io::{Cursor, Read};

    /// A central directory entry as parsed back out of produced bytes.
    struct ParsedEntry {
        name: String,
        crc: u32,
        compressed: u64,
        uncompressed: u64,
        lfh_offset: u64,
    }

    /// Minimal reader for archives produced by this writer: walks the
    /// end-of-central-directory record and the central directory.
    fn parse_central_directory(data: &[u8]) -> Vec<ParsedEntry> {
        assert!(data.len() >= 22, "archive shorter than an EOCD record");
        let eocd = &data[data.len() - 22..];
        assert_eq!(&eocd[0..4], b"PK\x05\x06", "missing EOCD signature");

        let mut cursor = Cursor::new(&eocd[8..]);
        let disk_entries = cursor.read_u16::<LittleEndian>().unwrap();
        let total_entries = cursor.read_u16::<LittleEndian>().unwrap();
        assert_eq!(disk_entries, total_entries);
        let cd_size = cursor.read_u32::<LittleEndian>().unwrap() as usize;
        let cd_offset = cursor.read_u32::<LittleEndian>().unwrap() as usize;
        assert_eq!(cd_offset + cd_size + 22, data.len());

        let mut entries = Vec::new();
        let mut pos = cd_offset;
        for _ in 0..total_entries {
            assert_eq!(&data[pos..pos + 4], b"PK\x01\x02", "missing CDFH signature");
            let mut cursor = Cursor::new(&data[pos + 16..]);
            let crc = cursor.read_u32::<LittleEndian>().unwrap();
            let compressed = cursor.read_u32::<LittleEndian>().unwrap() as u64;
            let uncompressed = cursor.read_u32::<LittleEndian>().unwrap() as u64;
            let name_len = cursor.read_u16::<LittleEndian>().unwrap() as usize;
            let extra_len = cursor.read_u16::<LittleEndian>().unwrap() as usize;
            let comment_len = cursor.read_u16::<LittleEndian>().unwrap() as usize;
            let mut cursor = Cursor::new(&data[pos + 42..]);
            let lfh_offset = cursor.read_u32::<LittleEndian>().unwrap() as u64;
            let name =
                String::from_utf8(data[pos + 46..pos + 46 + name_len].to_vec()).unwrap();

            entries.push(ParsedEntry {
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

    /// Inflate one entry's body out of the raw archive bytes.
    fn read_entry(data: &[u8], entry: &ParsedEntry) -> Vec<u8> {
        let lfh = entry.lfh_offset as usize;
        assert_eq!(&data[lfh..lfh + 4], b"PK\x03\x04", "missing LFH signature");
        let mut cursor = Cursor::new(&data[lfh + 26..]);
        let name_len = cursor.read_u16::<LittleEndian>().unwrap() as usize;
        let extra_len = cursor.read_u16::<LittleEndian>().unwrap() as usize;

        let body_start = lfh + 30 + name_len + extra_len;
        let body = &data[body_start..body_start + entry.compressed as usize];

        let mut out = Vec::new();
        DeflateDecoder::new(body).read_to_end(&mut out).unwrap();
        assert_eq!(out.len() as u64, entry.uncompressed);

        let mut crc = Crc::new();
        crc.update(&out);
        assert_eq!(crc.sum(), entry.crc);

        out
    }

    #[tokio::test]
    async fn empty_archive_is_a_bare_eocd() {
        let writer = ZipStreamWriter::new(Vec::new());
        let data = writer.finish().await.unwrap();

        assert_eq!(data.len(), 22);
        assert!(parse_central_directory(&data).is_empty());
    }

    #[tokio::test]
    async fn single_entry_roundtrips() {
        let payload = b"update manifest contents, repeated: update manifest contents";

        let mut writer = ZipStreamWriter::new(Vec::new());
        writer.start_entry("manifest.json").await.unwrap();
        writer.write_data(payload).await.unwrap();
        writer.finish_entry().await.unwrap();
        let data = writer.finish().await.unwrap();

        assert_eq!(&data[0..4], b"PK\x03\x04");

        let entries = parse_central_directory(&data);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "manifest.json");
        assert_eq!(read_entry(&data, &entries[0]), payload);
    }

    #[tokio::test]
    async fn data_descriptor_matches_central_directory() {
        let payload = b"abcabcabcabcabcabc";

        let mut writer = ZipStreamWriter::new(Vec::new());
        writer.start_entry("a.dll").await.unwrap();
        writer.write_data(payload).await.unwrap();
        writer.finish_entry().await.unwrap();
        let data = writer.finish().await.unwrap();

        let entries = parse_central_directory(&data);
        let body_start = 30 + "a.dll".len();
        let descriptor_start = body_start + entries[0].compressed as usize;
        let descriptor = &data[descriptor_start..descriptor_start + 16];

        let mut cursor = Cursor::new(descriptor);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0x0807_4b50);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), entries[0].crc);
        assert_eq!(
            cursor.read_u32::<LittleEndian>().unwrap() as u64,
            entries[0].compressed
        );
        assert_eq!(
            cursor.read_u32::<LittleEndian>().unwrap() as u64,
            entries[0].uncompressed
        );
    }

    #[tokio::test]
    async fn entries_written_in_chunks_roundtrip() {
        let payload: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();

        let mut writer = ZipStreamWriter::new(Vec::new());
        writer.start_entry("addin.dll").await.unwrap();
        for chunk in payload.chunks(777) {
            writer.write_data(chunk).await.unwrap();
        }
        writer.finish_entry().await.unwrap();
        let data = writer.finish().await.unwrap();

        let entries = parse_central_directory(&data);
        assert_eq!(read_entry(&data, &entries[0]), payload);
    }

    #[tokio::test]
    async fn abandoned_entries_are_left_out_of_the_directory() {
        let mut writer = ZipStreamWriter::new(Vec::new());

        writer.start_entry("a.json").await.unwrap();
        writer.write_data(b"first").await.unwrap();
        writer.finish_entry().await.unwrap();

        writer.start_entry("broken.dll").await.unwrap();
        writer.write_data(b"partial").await.unwrap();
        writer.abandon_entry().await.unwrap();

        writer.start_entry("c.json").await.unwrap();
        writer.write_data(b"third").await.unwrap();
        writer.finish_entry().await.unwrap();

        assert_eq!(writer.entry_count(), 2);
        let data = writer.finish().await.unwrap();

        let entries = parse_central_directory(&data);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.json", "c.json"]);
        assert_eq!(read_entry(&data, &entries[0]), b"first");
        assert_eq!(read_entry(&data, &entries[1]), b"third");
    }

    #[tokio::test]
    async fn zero_byte_entries_are_valid() {
        let mut writer = ZipStreamWriter::new(Vec::new());
        writer.start_entry("empty.json").await.unwrap();
        writer.finish_entry().await.unwrap();
        let data = writer.finish().await.unwrap();

        let entries = parse_central_directory(&data);
        assert_eq!(entries[0].uncompressed, 0);
        assert!(read_entry(&data, &entries[0]).is_empty());
    }

    #[tokio::test]
    async fn start_entry_rejects_open_or_empty() {
        let mut writer = ZipStreamWriter::new(Vec::new());
        assert!(writer.start_entry("").await.is_err());

        writer.start_entry("a.json").await.unwrap();
        assert!(writer.start_entry("b.json").await.is_err());
    }

    #[test]
    fn dos_date_time_packs_fields() {
        use time::macros::datetime;

        let (time, date) = dos_date_time(datetime!(2024-03-15 13:45:30 UTC));
        assert_eq!(date >> 9, 2024 - 1980);
        assert_eq!((date >> 5) & 0x0F, 3);
        assert_eq!(date & 0x1F, 15);
        assert_eq!(time >> 11, 13);
        assert_eq!((time >> 5) & 0x3F, 45);
        assert_eq!((time & 0x1F) * 2, 30);

        // Pre-epoch timestamps clamp to 1980.
        let (_, date) = dos_date_time(datetime!(1970-01-01 0:00 UTC));
        assert_eq!(date >> 9, 0);
    }
}
