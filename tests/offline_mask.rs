//! End-to-end run against a locally built catalog cache: segments are
//! written by hand, then the store is reopened cold and rendered to both
//! output formats, the way an offline `maskgen` run works.

use tempfile::tempdir;

use starmask::catalog::{CatalogStore, SegmentDescriptor, SegmentWriter, StarRecord};
use starmask::equatorial::Equatorial;
use starmask::mask::{MaskParams, MaskRenderer};
use starmask::output::write_mask;
use starmask::TangentPlane;

fn seed_segment(store: &mut CatalogStore, stars: &[StarRecord]) {
    let center = store.manifest.center;
    let index = store
        .add_descriptor(SegmentDescriptor {
            file: String::new(),
            source: "I/345/gaia2".to_string(),
            valid: false,
            digest: String::new(),
            min_mag: 0.0,
            max_mag: 0.0,
            records: 0,
            center,
            radius_deg: 0.0,
            box_deg: [1.0, 1.0],
        })
        .unwrap();

    let path = store.segment_path(&store.manifest.segments[index]);
    let mut writer = SegmentWriter::create(&path).unwrap();
    let mut min_mag = f32::MAX;
    let mut max_mag = f32::MIN;
    for star in stars {
        min_mag = min_mag.min(star.g_mag);
        max_mag = max_mag.max(star.g_mag);
        writer.write_record(star).unwrap();
    }
    let records = writer.finish().unwrap();
    store.commit_segment(index, min_mag, max_mag, records).unwrap();
}

#[test]
fn cached_field_renders_offline() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let center = Equatorial::from_degrees(83.822, -5.391); // Orion Nebula

    // A tiny field: 256 px at 2 arcsec/px.
    let plane = TangentPlane::new(center, 2.0 / 3600.0, 256, 256);

    {
        let mut store = CatalogStore::open(cache.path(), "m42", center, 1.0).unwrap();
        let stars = [
            StarRecord {
                ra_deg: 83.822,
                dec_deg: -5.391,
                g_mag: 5.0,
                pm_ra: 1.4,
                pm_dec: -0.6,
            },
            StarRecord {
                ra_deg: 83.850,
                dec_deg: -5.380,
                g_mag: 9.2,
                pm_ra: 0.0,
                pm_dec: 0.0,
            },
            // Far outside the frame, counted but never painted.
            StarRecord {
                ra_deg: 85.0,
                dec_deg: -4.0,
                g_mag: 7.0,
                pm_ra: 0.0,
                pm_dec: 0.0,
            },
        ];
        seed_segment(&mut store, &stars);
        assert!(store.manifest.is_complete());
    }

    // Cold reopen, as a second invocation would see it.
    let store = CatalogStore::open(cache.path(), "m42", center, 1.0).unwrap();
    assert!(store.manifest.is_complete());
    assert_eq!(store.manifest.records, 3);

    let stars: Vec<StarRecord> = store
        .reader()
        .collect::<starmask::Result<_>>()
        .unwrap();
    assert_eq!(stars.len(), 3);

    let renderer = MaskRenderer::new(plane, MaskParams::default(), 24.5);
    let (mask, stats) = renderer.render(&stars);
    assert_eq!(stats.stars_in_range, 3);
    assert_eq!(stats.stars_painted, 2);

    // Center star lands mid-frame.
    assert!(mask[(128, 128)] > 0.99);

    let fits_path = out.path().join("m42.fits");
    let png_path = out.path().join("m42.png");
    write_mask(&fits_path, &mask, renderer.params(), &stats).unwrap();
    write_mask(&png_path, &mask, renderer.params(), &stats).unwrap();
    assert!(fits_path.metadata().unwrap().len() > 0);

    let img = image::open(&png_path).unwrap().into_luma16();
    assert_eq!(img.dimensions(), (256, 256));
    assert!(img.get_pixel(128, 128).0[0] > 60000);
}
