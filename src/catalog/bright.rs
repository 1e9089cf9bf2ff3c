//! Built-in bright-star supplement.
//!
//! The survey extract caps out around first magnitude, so the very brightest
//! stars never appear in downloaded segments. This table carries the naked-eye
//! brightest stars (J2000, V magnitude standing in for G, proper motion in
//! mas/yr) so a field containing Sirius still masks it.

use crate::catalog::{CatalogStore, SegmentDescriptor, SegmentWriter, StarRecord};
use crate::equatorial::Equatorial;
use crate::Result;

/// (name, ra_deg, dec_deg, v_mag, pm_ra, pm_dec)
const BRIGHT_STARS: &[(&str, f64, f64, f32, f32, f32)] = &[
    ("Sirius", 101.2875, -16.7161, -1.46, -546.0, -1223.1),
    ("Canopus", 95.9880, -52.6957, -0.74, 19.9, 23.2),
    ("Rigil Kentaurus", 219.9021, -60.8340, -0.27, -3679.3, 473.7),
    ("Arcturus", 213.9153, 19.1824, -0.05, -1093.4, -1999.4),
    ("Vega", 279.2347, 38.7837, 0.03, 200.9, 286.2),
    ("Capella", 79.1723, 45.9980, 0.08, 75.5, -427.1),
    ("Rigel", 78.6345, -8.2016, 0.13, 1.3, 0.5),
    ("Procyon", 114.8255, 5.2250, 0.34, -714.6, -1036.8),
    ("Betelgeuse", 88.7929, 7.4071, 0.42, 27.5, 11.0),
    ("Achernar", 24.4286, -57.2368, 0.46, 87.0, -38.2),
    ("Hadar", 210.9559, -60.3730, 0.61, -33.3, -23.2),
    ("Altair", 297.6959, 8.8683, 0.77, 536.2, 385.3),
    ("Acrux", 186.6496, -63.0991, 0.76, -35.4, -14.9),
    ("Aldebaran", 68.9802, 16.5093, 0.85, 63.5, -188.9),
    ("Antares", 247.3519, -26.4320, 0.96, -12.1, -23.2),
    ("Spica", 201.2983, -11.1613, 0.97, -42.4, -31.7),
    ("Pollux", 116.3289, 28.0262, 1.14, -625.7, -45.8),
    ("Fomalhaut", 344.4127, -29.6222, 1.16, 329.2, -164.2),
    ("Deneb", 310.3580, 45.2803, 1.25, 1.6, 1.9),
    ("Regulus", 152.0930, 11.9672, 1.35, -249.4, 4.9),
];

/// Bright stars within `radius_deg` of `center`, brightest first.
pub fn stars_within(center: Equatorial, radius_deg: f64) -> Vec<StarRecord> {
    let mut stars: Vec<StarRecord> = BRIGHT_STARS
        .iter()
        .filter(|&&(_, ra, dec, ..)| {
            center.separation_deg(&Equatorial::from_degrees(ra, dec)) <= radius_deg
        })
        .map(|&(_, ra, dec, mag, pm_ra, pm_dec)| StarRecord {
            ra_deg: ra,
            dec_deg: dec,
            g_mag: mag,
            pm_ra,
            pm_dec,
        })
        .collect();
    stars.sort_by(|a, b| a.g_mag.total_cmp(&b.g_mag));
    stars
}

/// Write the supplement as a `BSC` segment of `store`, even when empty, so
/// the manifest records that the field was checked.
pub fn append_segment(store: &mut CatalogStore) -> Result<()> {
    let center = store.manifest.center;
    let radius = store.manifest.radius_deg;
    let stars = stars_within(center, radius);

    let index = store.add_descriptor(SegmentDescriptor {
        file: String::new(),
        source: "BSC".to_string(),
        valid: false,
        digest: String::new(),
        min_mag: 0.0,
        max_mag: 0.0,
        records: 0,
        center,
        radius_deg: radius,
        box_deg: [0.0, 0.0],
    })?;

    let path = store.segment_path(&store.manifest.segments[index]);
    let mut writer = SegmentWriter::create(&path)?;
    let mut min_mag = f32::MAX;
    let mut max_mag = f32::MIN;
    for star in &stars {
        min_mag = min_mag.min(star.g_mag);
        max_mag = max_mag.max(star.g_mag);
        writer.write_record(star)?;
    }
    let records = writer.finish()?;
    if records == 0 {
        min_mag = 0.0;
        max_mag = 0.0;
    }
    store.commit_segment(index, min_mag, max_mag, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn sirius_field_contains_sirius() {
        let center = Equatorial::from_degrees(101.0, -16.5);
        let stars = stars_within(center, 1.0);
        assert_eq!(stars.len(), 1);
        assert_relative_eq!(stars[0].g_mag, -1.46);
    }

    #[test]
    fn empty_field_has_no_bright_stars() {
        // A quiet patch near the north galactic pole.
        let center = Equatorial::from_degrees(192.85, 27.13);
        assert!(stars_within(center, 2.0).is_empty());
    }

    #[test]
    fn wide_cone_sorted_brightest_first() {
        let center = Equatorial::from_degrees(90.0, 0.0);
        let stars = stars_within(center, 60.0);
        assert!(stars.len() >= 5);
        for pair in stars.windows(2) {
            assert!(pair[0].g_mag <= pair[1].g_mag);
        }
    }

    #[test]
    fn segment_written_and_counted() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(101.2875, -16.7161);
        let mut store = CatalogStore::open(dir.path(), "sirius", center, 2.0).unwrap();
        append_segment(&mut store).unwrap();

        let seg = &store.manifest.segments[0];
        assert_eq!(seg.source, "BSC");
        assert!(seg.valid);
        assert_eq!(seg.records, 1);
        assert_relative_eq!(store.manifest.min_mag, -1.46);
    }

    #[test]
    fn empty_segment_still_valid() {
        let dir = tempdir().unwrap();
        let center = Equatorial::from_degrees(192.85, 27.13);
        let mut store = CatalogStore::open(dir.path(), "ngp", center, 1.0).unwrap();
        append_segment(&mut store).unwrap();
        assert!(store.manifest.segments[0].valid);
        assert_eq!(store.manifest.segments[0].records, 0);
    }
}
