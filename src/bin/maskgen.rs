//! Generate a star mask for a sky field from the Gaia DR2 catalog.
//!
//! Catalog extracts are cached under the data directory as binary segments
//! with a JSON manifest per field, so repeated runs on the same field work
//! offline.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use starmask::catalog::{bright, CatalogStore, SegmentDescriptor, StarRecord};
use starmask::epoch::years_since_j2000;
use starmask::footprint::field_boxes;
use starmask::mask::{Elongation, MaskParams, MaskRenderer, RingSide};
use starmask::output::write_mask;
use starmask::vizier::{self, GAIA_DR2, MIRRORS};
use starmask::{Equatorial, TangentPlane};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RingArg {
    Inner,
    Outer,
}

impl From<RingArg> for RingSide {
    fn from(arg: RingArg) -> Self {
        match arg {
            RingArg::Inner => RingSide::Inner,
            RingArg::Outer => RingSide::Outer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Star mask generator for deep-sky images")]
struct Args {
    /// Field center right ascension, degrees
    #[arg(long)]
    ra: f64,

    /// Field center declination, degrees
    #[arg(long, allow_negative_numbers = true)]
    dec: f64,

    /// Image width in pixels
    #[arg(long, default_value_t = 2048)]
    width: usize,

    /// Image height in pixels
    #[arg(long, default_value_t = 2048)]
    height: usize,

    /// Image scale, arcseconds per pixel
    #[arg(long, default_value_t = 1.0)]
    resolution: f64,

    /// Observation date (YYYY-MM-DD) for proper-motion advance
    #[arg(long)]
    date_obs: Option<NaiveDate>,

    /// Object identifier recorded in the catalog manifest
    #[arg(long, default_value = "field")]
    id: String,

    /// Catalog cache directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Preferred VizieR mirror
    #[arg(long)]
    mirror: Option<String>,

    /// Faint limit of the catalog download
    #[arg(long, default_value_t = 12.0)]
    cat_max_mag: f32,

    /// Bright limit of the catalog download
    #[arg(long, default_value_t = -2.0, allow_negative_numbers = true)]
    cat_min_mag: f32,

    /// Download without any magnitude constraint
    #[arg(long)]
    all_stars: bool,

    /// Never contact VizieR, use cached segments only
    #[arg(long)]
    offline: bool,

    /// Bright limit of the painted range
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    min_mag: f32,

    /// Faint limit of the painted range
    #[arg(long, default_value_t = 12.0)]
    max_mag: f32,

    /// Disk radius of the faintest painted star, pixels
    #[arg(long, default_value_t = 1.5)]
    min_radius: f64,

    /// Disk radius of the brightest painted star, pixels
    #[arg(long, default_value_t = 25.0)]
    max_radius: f64,

    /// Paint hard 0/1 edges instead of coverage-weighted ones
    #[arg(long)]
    binary_edges: bool,

    /// Produce a ring mask on the given side of the star radius
    #[arg(long, value_enum)]
    ring: Option<RingArg>,

    /// Ring width in pixels
    #[arg(long, default_value_t = 10.0)]
    ring_width: f64,

    /// Logarithmic shrink of ring width with magnitude
    #[arg(long, default_value_t = 0.0)]
    ring_width_scale: f64,

    /// Star elongation ratio (long axis over short axis)
    #[arg(long)]
    elongation: Option<f64>,

    /// Elongation position angle, degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    elongation_angle: f64,

    /// Output mask path (.fits or .png)
    #[arg(long, short)]
    output: PathBuf,
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".cache").join("starmask"),
        None => PathBuf::from("starmask-cache"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if args.resolution <= 0.0 {
        bail!("resolution must be positive");
    }
    if args.width == 0 || args.height == 0 {
        bail!("image dimensions must be positive");
    }

    let center = Equatorial::from_degrees(args.ra, args.dec);
    let plane = TangentPlane::new(center, args.resolution / 3600.0, args.width, args.height);
    info!(
        center = %center,
        field_radius_deg = plane.field_radius_deg(),
        "field geometry"
    );

    let date = args.date_obs.unwrap_or_else(|| Utc::now().date_naive());
    let years = years_since_j2000(date);
    info!(%date, years, "epoch");

    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut store = CatalogStore::open(&data_dir, &args.id, center, plane.field_radius_deg())
        .context("opening catalog store")?;

    if store.manifest.segments.is_empty() {
        plan_segments(&mut store, &plane)?;
    }

    if !store.manifest.is_complete() {
        if args.offline {
            warn!("catalog incomplete and offline requested, using cached segments only");
        } else {
            let mag_range = if args.all_stars {
                None
            } else {
                Some((args.cat_min_mag, args.cat_max_mag))
            };
            let mirror = args.mirror.as_deref().unwrap_or(MIRRORS[0]);
            vizier::download_missing(&mut store, mirror, mag_range)
                .context("downloading catalog segments")?;
        }
    }

    let stars: Vec<StarRecord> = store
        .reader()
        .collect::<starmask::Result<_>>()
        .context("reading catalog segments")?;
    if stars.is_empty() {
        bail!("no catalog stars available for this field");
    }
    info!(
        records = stars.len(),
        mag_min = store.manifest.min_mag,
        mag_max = store.manifest.max_mag,
        "catalog loaded"
    );

    let params = MaskParams {
        min_mag: args.min_mag,
        max_mag: args.max_mag,
        min_radius: args.min_radius,
        max_radius: args.max_radius,
        soft_edges: !args.binary_edges,
        ring: args.ring.map(Into::into),
        max_ring_width: args.ring_width,
        ring_width_scale: args.ring_width_scale,
        elongation: args.elongation.map(|aspect| Elongation {
            aspect,
            angle_deg: args.elongation_angle,
        }),
    };

    let renderer = MaskRenderer::new(plane, params, years);
    let (mask, stats) = renderer.render(&stars);
    info!(
        in_range = stats.stars_in_range,
        painted = stats.stars_painted,
        "mask rendered"
    );

    write_mask(&args.output, &mask, renderer.params(), &stats)?;
    Ok(())
}

/// Lay out the field's segments on a fresh manifest: the bright-star
/// supplement plus one download box per tile of the footprint.
fn plan_segments(store: &mut CatalogStore, plane: &TangentPlane) -> anyhow::Result<()> {
    bright::append_segment(store).context("writing bright-star segment")?;

    let boxes = field_boxes(plane);
    info!(boxes = boxes.len(), "planned catalog download");
    for sky_box in boxes {
        store.add_descriptor(SegmentDescriptor {
            file: String::new(),
            source: GAIA_DR2.to_string(),
            valid: false,
            digest: String::new(),
            min_mag: 0.0,
            max_mag: 0.0,
            records: 0,
            center: sky_box.center,
            radius_deg: 0.0,
            box_deg: [sky_box.width_deg, sky_box.height_deg],
        })?;
    }
    Ok(())
}
