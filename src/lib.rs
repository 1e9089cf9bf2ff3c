//! Star mask generation from astrometric catalogs.
//!
//! This crate builds anti-aliased star masks for astronomical images: it
//! fetches (and caches) a Gaia extract covering the image footprint from a
//! VizieR mirror, advances catalog positions to the observation epoch with a
//! proper-motion model, projects the stars through a tangent-plane WCS, and
//! paints each one as a disk whose per-pixel intensity is the exact
//! circle/pixel overlap area.
//!
//! The crate is a library plus the `maskgen` binary. The typical flow:
//!
//! 1. [`wcs::TangentPlane`] describes the image field.
//! 2. [`footprint`] turns the field into download boxes on the sky.
//! 3. [`catalog::CatalogStore`] tracks the cached binary segments;
//!    [`vizier`] downloads the ones that are missing or stale.
//! 4. [`mask::MaskRenderer`] streams the records and paints the raster.
//! 5. [`output`] writes the result as FITS or PNG.

pub mod catalog;
pub mod coverage;
pub mod epoch;
pub mod equatorial;
pub mod footprint;
pub mod mask;
pub mod output;
pub mod vizier;
pub mod wcs;

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by mask generation.
#[derive(Error, Debug)]
pub enum MaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog data error: {0}")]
    Catalog(String),

    #[error("malformed VizieR table: {0}")]
    Table(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("manifest error in {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("output error: {0}")]
    Output(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MaskError>;

pub use equatorial::Equatorial;
pub use mask::{MaskParams, MaskRenderer};
pub use wcs::TangentPlane;
