//! Sky footprint of an image field, tiled into catalog download boxes.
//!
//! VizieR box queries degrade on large requests, so the footprint is split
//! into boxes of at most one degree on a side. The split also keeps each
//! downloaded segment individually cacheable: re-runs only fetch boxes whose
//! segment files are missing or stale.

use crate::equatorial::{ra_span, reduce_ra, Equatorial};
use crate::wcs::TangentPlane;

/// Pixels of margin added outside the image edge before unprojecting the
/// corners, so stars whose disks straddle the border are still fetched.
const BORDER_PX: f64 = 16.0;

/// One arcsecond in degrees; slivers thinner than this are dropped.
const ARCSEC: f64 = 1.0 / 3600.0;

/// A rectangular sky region for one catalog box query.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyBox {
    /// Box center.
    pub center: Equatorial,
    /// Extent in RA, degrees of arc (not coordinate degrees).
    pub width_deg: f64,
    /// Extent in declination, degrees.
    pub height_deg: f64,
}

impl SkyBox {
    pub fn area_deg2(&self) -> f64 {
        self.width_deg * self.height_deg
    }
}

/// Dec/RA extremes of a set of sky positions, RA-wraparound aware.
#[derive(Debug, Clone, Copy)]
pub struct SkyBounds {
    pub min_ra: f64,
    pub max_ra: f64,
    pub min_dec: f64,
    pub max_dec: f64,
}

impl SkyBounds {
    /// Bounding extremes of the four image corners. When the raw RA span
    /// exceeds 180 degrees the field straddles RA 0h and the western corners
    /// are re-expressed as negative RA.
    pub fn enclosing(corners: &[Equatorial; 4]) -> Self {
        let mut min_ra = f64::MAX;
        let mut max_ra = f64::MIN;
        let mut min_dec = f64::MAX;
        let mut max_dec = f64::MIN;
        for c in corners {
            min_ra = min_ra.min(c.ra_deg);
            max_ra = max_ra.max(c.ra_deg);
            min_dec = min_dec.min(c.dec_deg);
            max_dec = max_dec.max(c.dec_deg);
        }
        if max_ra - min_ra > 180.0 {
            (min_ra, max_ra) = (max_ra - 360.0, min_ra);
        }
        Self {
            min_ra,
            max_ra,
            min_dec,
            max_dec,
        }
    }
}

/// Unproject the image corners (plus border) and return the sky bounds of
/// the field.
pub fn field_bounds(plane: &TangentPlane) -> SkyBounds {
    let w = plane.width() as f64;
    let h = plane.height() as f64;
    let corners = [
        plane.unproject(-BORDER_PX, -BORDER_PX),
        plane.unproject(w + BORDER_PX, -BORDER_PX),
        plane.unproject(-BORDER_PX, h + BORDER_PX),
        plane.unproject(w + BORDER_PX, h + BORDER_PX),
    ];
    SkyBounds::enclosing(&corners)
}

/// Tile sky bounds into download boxes no larger than one degree on a side.
///
/// The bounds are padded by one arcsecond, the declination range is clamped
/// to the poles, and both axes are subdivided equally until each box fits in
/// a degree. Degenerate slivers below one arcsecond are dropped rather than
/// emitted as infinitely thin boxes.
pub fn split_bounds(bounds: &SkyBounds) -> Vec<SkyBox> {
    let min_dec = (bounds.min_dec - ARCSEC).max(-90.0);
    let max_dec = (bounds.max_dec + ARCSEC).min(90.0);
    let min_ra = bounds.min_ra - ARCSEC;
    let max_ra = bounds.max_ra + ARCSEC;

    let mut delta_dec = max_dec - min_dec;
    if delta_dec > 1.0 {
        delta_dec /= delta_dec.ceil();
    }

    let mut delta_ra = ra_span(max_ra, min_ra);
    if delta_ra > 1.0 {
        delta_ra /= delta_ra.ceil();
    }

    let mut boxes = Vec::new();
    let mut dec = min_dec;
    while dec < max_dec - ARCSEC {
        let dec_hi = dec + delta_dec;
        let height = dec_hi - dec;
        if height < ARCSEC {
            break;
        }
        let mut ra = min_ra;
        while ra < max_ra - ARCSEC {
            let ra_hi = ra + delta_ra;
            let width = ra_span(ra_hi, ra);
            if width < ARCSEC {
                break;
            }
            boxes.push(SkyBox {
                center: Equatorial {
                    ra_deg: reduce_ra(ra + width / 2.0),
                    dec_deg: dec + height / 2.0,
                },
                width_deg: width,
                height_deg: height,
            });
            ra = ra_hi;
        }
        dec = dec_hi;
    }
    boxes
}

/// Download boxes covering the image field.
pub fn field_boxes(plane: &TangentPlane) -> Vec<SkyBox> {
    split_bounds(&field_bounds(plane))
}
