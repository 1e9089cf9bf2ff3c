//! Fixed-record binary catalog segments.
//!
//! Each segment holds the stars of one download box as 28-byte little-endian
//! records: `f64` RA, `f64` Dec (degrees), then `f32` G magnitude and `f32`
//! proper motions in RA and Dec (mas/yr). Segments are immutable once
//! written; integrity is checked against the manifest digest, not in-band.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::catalog::StarRecord;
use crate::{MaskError, Result};

/// Bytes per record: two f64 coordinates plus three f32 fields.
pub const RECORD_LEN: usize = 28;

/// Streaming reader over one segment file.
pub struct SegmentReader {
    inner: BufReader<File>,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len % RECORD_LEN as u64 != 0 {
            return Err(MaskError::Catalog(format!(
                "segment {} length {} is not a whole number of records",
                path.display(),
                len
            )));
        }
        Ok(Self {
            inner: BufReader::new(file),
        })
    }

    /// Next record, or `None` at end of segment.
    pub fn read_record(&mut self) -> Result<Option<StarRecord>> {
        let mut buf = [0u8; RECORD_LEN];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(Some(decode_record(&buf))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Iterator for SegmentReader {
    type Item = Result<StarRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Buffered writer producing one segment file.
pub struct SegmentWriter {
    inner: BufWriter<File>,
    records: u64,
}

impl SegmentWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            inner: BufWriter::new(File::create(path)?),
            records: 0,
        })
    }

    pub fn write_record(&mut self, star: &StarRecord) -> Result<()> {
        self.inner.write_all(&encode_record(star))?;
        self.records += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.inner.flush()?;
        Ok(self.records)
    }
}

fn encode_record(star: &StarRecord) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[0..8].copy_from_slice(&star.ra_deg.to_le_bytes());
    buf[8..16].copy_from_slice(&star.dec_deg.to_le_bytes());
    buf[16..20].copy_from_slice(&star.g_mag.to_le_bytes());
    buf[20..24].copy_from_slice(&star.pm_ra.to_le_bytes());
    buf[24..28].copy_from_slice(&star.pm_dec.to_le_bytes());
    buf
}

fn decode_record(buf: &[u8; RECORD_LEN]) -> StarRecord {
    StarRecord {
        ra_deg: f64::from_le_bytes(buf[0..8].try_into().unwrap()),
        dec_deg: f64::from_le_bytes(buf[8..16].try_into().unwrap()),
        g_mag: f32::from_le_bytes(buf[16..20].try_into().unwrap()),
        pm_ra: f32::from_le_bytes(buf[20..24].try_into().unwrap()),
        pm_dec: f32::from_le_bytes(buf[24..28].try_into().unwrap()),
    }
}
