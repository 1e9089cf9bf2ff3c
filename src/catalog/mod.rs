//! Cached star catalog extracts: records, segments and the JSON manifest.
//!
//! A field's catalog data lives in a data directory as a set of binary
//! segment files (one per download box, plus the bright-star supplement)
//! described by a JSON manifest named from the field center. The manifest
//! records a blake3 digest per segment; on load, segments are re-hashed and
//! any mismatch marks the segment for re-download rather than failing the
//! run.

pub mod binary;
pub mod bright;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::epoch::apply_proper_motion;
use crate::equatorial::Equatorial;
use crate::{MaskError, Result};

pub use binary::{SegmentReader, SegmentWriter};

/// One catalog star: J2000 position, Gaia G magnitude, proper motion in
/// mas/yr. Stars without a catalog proper motion carry zeros and are still
/// painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarRecord {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub g_mag: f32,
    pub pm_ra: f32,
    pub pm_dec: f32,
}

impl StarRecord {
    /// Position advanced to `years` after J2000 by proper motion.
    pub fn position_at(&self, years: f64) -> Equatorial {
        let (ra, dec) = apply_proper_motion(
            self.ra_deg,
            self.dec_deg,
            self.pm_ra as f64,
            self.pm_dec as f64,
            years,
        );
        Equatorial { ra_deg: ra, dec_deg: dec }
    }
}

/// Manifest entry for one segment file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Segment file name within the data directory.
    pub file: String,
    /// Catalog source label, e.g. `I/345/gaia2` or `BSC`.
    pub source: String,
    /// False until downloaded and converted; falsified again when the file
    /// is missing or its digest no longer matches.
    pub valid: bool,
    /// Hex blake3 digest of the segment file.
    pub digest: String,
    pub min_mag: f32,
    pub max_mag: f32,
    pub records: u64,
    /// Query center.
    pub center: Equatorial,
    /// Cone radius in degrees; zero for box queries.
    pub radius_deg: f64,
    /// Box extent (RA arc, Dec) in degrees; zeros for cone queries.
    pub box_deg: [f64; 2],
}

/// On-disk manifest: aggregate stats plus the segment list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Object identifier, informational only.
    pub id: String,
    pub center: Equatorial,
    /// Field radius the segments were gathered for, degrees.
    pub radius_deg: f64,
    pub min_mag: f32,
    pub max_mag: f32,
    pub records: u64,
    pub segments: Vec<SegmentDescriptor>,
}

impl Manifest {
    fn new(id: &str, center: Equatorial, radius_deg: f64) -> Self {
        Self {
            id: id.to_string(),
            center,
            radius_deg,
            min_mag: f32::MAX,
            max_mag: f32::MIN,
            records: 0,
            segments: Vec::new(),
        }
    }

    /// Recompute aggregate magnitude range and record count from the
    /// non-empty segments.
    fn refresh_aggregates(&mut self) {
        self.min_mag = f32::MAX;
        self.max_mag = f32::MIN;
        self.records = 0;
        for seg in self.segments.iter().filter(|s| s.valid && s.records > 0) {
            self.min_mag = self.min_mag.min(seg.min_mag);
            self.max_mag = self.max_mag.max(seg.max_mag);
            self.records += seg.records;
        }
        if self.records == 0 {
            self.min_mag = 0.0;
            self.max_mag = 0.0;
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(|s| s.valid)
    }
}

/// File-name stem for a field center: RA and signed Dec, six decimals.
pub fn field_stem(center: &Equatorial) -> String {
    if center.dec_deg < 0.0 {
        format!("{:.6}{:.6}", center.ra_deg, center.dec_deg)
    } else {
        format!("{:.6}+{:.6}", center.ra_deg, center.dec_deg)
    }
}

/// Hex blake3 digest of a file's contents.
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// A manifest bound to its data directory.
pub struct CatalogStore {
    dir: PathBuf,
    manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl CatalogStore {
    /// Load the manifest for `center` from `dir`, verifying segment digests,
    /// or start a fresh one. The directory is created if needed.
    pub fn open(dir: &Path, id: &str, center: Equatorial, radius_deg: f64) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let stem = field_stem(&center);
        let manifest_path = dir.join(format!("{stem}.json"));

        let manifest = if manifest_path.exists() {
            let text = fs::read_to_string(&manifest_path)?;
            let mut manifest: Manifest =
                serde_json::from_str(&text).map_err(|e| MaskError::Manifest {
                    path: manifest_path.clone(),
                    reason: e.to_string(),
                })?;
            verify_segments(dir, &mut manifest);
            manifest
        } else {
            Manifest::new(id, center, radius_deg)
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest_path,
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stem shared by the manifest and its segment files.
    pub fn stem(&self) -> String {
        field_stem(&self.manifest.center)
    }

    pub fn segment_path(&self, descriptor: &SegmentDescriptor) -> PathBuf {
        self.dir.join(&descriptor.file)
    }

    /// Append an unfilled descriptor and persist. Returns its index.
    pub fn add_descriptor(&mut self, mut descriptor: SegmentDescriptor) -> Result<usize> {
        let index = self.manifest.segments.len();
        descriptor.file = format!("{}[{}].bin", self.stem(), index);
        self.manifest.segments.push(descriptor);
        self.save()?;
        Ok(index)
    }

    /// Mark a descriptor filled after its segment file has been written:
    /// digest the file, store the stats, refresh aggregates, persist.
    pub fn commit_segment(
        &mut self,
        index: usize,
        min_mag: f32,
        max_mag: f32,
        records: u64,
    ) -> Result<()> {
        let path = {
            let seg = &self.manifest.segments[index];
            self.dir.join(&seg.file)
        };
        let digest = file_digest(&path)?;
        let seg = &mut self.manifest.segments[index];
        seg.digest = digest;
        seg.min_mag = min_mag;
        seg.max_mag = max_mag;
        seg.records = records;
        seg.valid = true;
        self.manifest.refresh_aggregates();
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.manifest).map_err(|e| {
            MaskError::Manifest {
                path: self.manifest_path.clone(),
                reason: e.to_string(),
            }
        })?;
        fs::write(&self.manifest_path, text)?;
        Ok(())
    }

    /// Stream reader over all valid segments, in manifest order.
    pub fn reader(&self) -> CatalogReader<'_> {
        CatalogReader {
            store: self,
            next_segment: 0,
            current: None,
        }
    }
}

fn verify_segments(dir: &Path, manifest: &mut Manifest) {
    for seg in &mut manifest.segments {
        if !seg.valid {
            continue;
        }
        let path = dir.join(&seg.file);
        match file_digest(&path) {
            Ok(digest) if digest == seg.digest => {
                debug!(file = %seg.file, records = seg.records, "segment verified");
            }
            Ok(_) => {
                warn!(file = %seg.file, "segment digest mismatch, will re-download");
                seg.valid = false;
            }
            Err(_) => {
                warn!(file = %seg.file, "segment missing, will re-download");
                seg.valid = false;
            }
        }
    }
    manifest.refresh_aggregates();
}

/// Iterator over the records of every valid segment of a store.
pub struct CatalogReader<'a> {
    store: &'a CatalogStore,
    next_segment: usize,
    current: Option<SegmentReader>,
}

impl CatalogReader<'_> {
    fn advance_segment(&mut self) -> Result<bool> {
        while self.next_segment < self.store.manifest.segments.len() {
            let seg = &self.store.manifest.segments[self.next_segment];
            self.next_segment += 1;
            if !seg.valid {
                continue;
            }
            self.current = Some(SegmentReader::open(&self.store.segment_path(seg))?);
            return Ok(true);
        }
        self.current = None;
        Ok(false)
    }
}

impl Iterator for CatalogReader<'_> {
    type Item = Result<StarRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                match self.advance_segment() {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            match self.current.as_mut()?.read_record() {
                Ok(Some(star)) => return Some(Ok(star)),
                Ok(None) => self.current = None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn descriptor(source: &str, center: Equatorial) -> SegmentDescriptor {
        SegmentDescriptor {
            file: String::new(),
            source: source.to_string(),
            valid: false,
            digest: String::new(),
            min_mag: 0.0,
            max_mag: 0.0,
            records: 0,
            center,
            radius_deg: 0.0,
            box_deg: [1.0, 1.0],
        }
    }

    fn write_segment(store: &CatalogStore, index: usize, stars: &[StarRecord]) {
        let path = store.segment_path(&store.manifest.segments[index]);
        let mut writer = SegmentWriter::create(&path).unwrap();
        for s in stars {
            writer.write_record(s).unwrap();
        }
        writer.finish().unwrap();
    }

    fn star(ra: f64, mag: f32) -> StarRecord {
        StarRecord {
            ra_deg: ra,
            dec_deg: 10.0,
            g_mag: mag,
            pm_ra: 0.0,
            pm_dec: 0.0,
        }
    }

    #[test]
    fn field_stem_sign_convention() {
        assert_eq!(
            field_stem(&Equatorial::from_degrees(229.969808, 2.330356)),
            "229.969808+2.330356"
        );
        assert_eq!(
            field_stem(&Equatorial::from_degrees(10.5, -0.25)),
            "10.500000-0.250000"
        );
    }

    #[test]
    fn store_round_trip_and_aggregates() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(100.0, 20.0);

        let mut store = CatalogStore::open(dir.path(), "m42", center, 1.5).unwrap();
        let i0 = store.add_descriptor(descriptor("gaia", center)).unwrap();
        let i1 = store.add_descriptor(descriptor("gaia", center)).unwrap();
        assert_eq!((i0, i1), (0, 1));

        write_segment(&store, 0, &[star(100.0, 9.5), star(100.1, 12.0)]);
        store.commit_segment(0, 9.5, 12.0, 2).unwrap();
        write_segment(&store, 1, &[star(100.2, 8.0)]);
        store.commit_segment(1, 8.0, 8.0, 1).unwrap();

        assert!(store.manifest.is_complete());
        assert_eq!(store.manifest.records, 3);
        assert_relative_eq!(store.manifest.min_mag, 8.0);
        assert_relative_eq!(store.manifest.max_mag, 12.0);

        // Reopen: digests verify, everything stays valid.
        let reopened = CatalogStore::open(dir.path(), "m42", center, 1.5).unwrap();
        assert!(reopened.manifest.is_complete());
        assert_eq!(reopened.manifest.records, 3);

        let stars: Vec<StarRecord> = reopened.reader().collect::<Result<_>>().unwrap();
        assert_eq!(stars.len(), 3);
        assert_relative_eq!(stars[2].ra_deg, 100.2);
    }

    #[test]
    fn tampered_segment_invalidated_on_open() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(50.0, -30.0);

        let mut store = CatalogStore::open(dir.path(), "field", center, 1.0).unwrap();
        store.add_descriptor(descriptor("gaia", center)).unwrap();
        write_segment(&store, 0, &[star(50.0, 10.0)]);
        store.commit_segment(0, 10.0, 10.0, 1).unwrap();

        // Corrupt the segment behind the manifest's back.
        let seg_path = store.segment_path(&store.manifest.segments[0]);
        let mut bytes = std::fs::read(&seg_path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&seg_path, bytes).unwrap();

        let reopened = CatalogStore::open(dir.path(), "field", center, 1.0).unwrap();
        assert!(!reopened.manifest.segments[0].valid);
        assert!(!reopened.manifest.is_complete());
        // The stale segment must not leak into the aggregates either.
        assert_eq!(reopened.manifest.records, 0);
        assert_relative_eq!(reopened.manifest.min_mag, 0.0);
        assert_relative_eq!(reopened.manifest.max_mag, 0.0);
    }

    #[test]
    fn missing_segment_invalidated_on_open() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(50.0, -30.0);

        let mut store = CatalogStore::open(dir.path(), "field", center, 1.0).unwrap();
        store.add_descriptor(descriptor("gaia", center)).unwrap();
        write_segment(&store, 0, &[star(50.0, 10.0)]);
        store.commit_segment(0, 10.0, 10.0, 1).unwrap();

        std::fs::remove_file(store.segment_path(&store.manifest.segments[0])).unwrap();

        let reopened = CatalogStore::open(dir.path(), "field", center, 1.0).unwrap();
        assert!(!reopened.manifest.segments[0].valid);
    }

    #[test]
    fn reader_skips_invalid_segments() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(0.0, 0.0);

        let mut store = CatalogStore::open(dir.path(), "field", center, 1.0).unwrap();
        store.add_descriptor(descriptor("gaia", center)).unwrap();
        store.add_descriptor(descriptor("gaia", center)).unwrap();
        write_segment(&store, 1, &[star(1.0, 11.0), star(2.0, 11.5)]);
        store.commit_segment(1, 11.0, 11.5, 2).unwrap();

        // Segment 0 was never filled and must be skipped, not opened.
        let stars: Vec<StarRecord> = store.reader().collect::<Result<_>>().unwrap();
        assert_eq!(stars.len(), 2);
    }

    #[test]
    fn record_epoch_propagation() {
        let s = StarRecord {
            ra_deg: 180.0,
            dec_deg: 0.0,
            g_mag: 5.0,
            pm_ra: 360.0,
            pm_dec: -720.0,
        };
        // 360 mas/yr over 10 yr = 3.6 arcsec = 0.001 deg.
        let pos = s.position_at(10.0);
        assert_relative_eq!(pos.ra_deg, 180.0 + 1.0 / 1000.0, epsilon = 1e-9);
        assert_relative_eq!(pos.dec_deg, -2.0 / 1000.0, epsilon = 1e-9);
    }
}
