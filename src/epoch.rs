//! Observation epoch handling and proper-motion propagation.
//!
//! Catalog positions are J2000.0; the observation date (usually the FITS
//! `DATE-OBS` value) moves each star by its proper motion before projection.

use chrono::{Datelike, NaiveDate};

use crate::equatorial::reduce_ra;

/// Julian day of the J2000.0 reference epoch.
pub const JD_J2000: f64 = 2_451_545.0;

/// Julian day number at 0h UT of a calendar date (Meeus, ch. 7).
pub fn julian_day(date: NaiveDate) -> f64 {
    let (mut y, mut m) = (date.year() as f64, date.month() as f64);
    let d = date.day() as f64;
    if m <= 2.0 {
        y -= 1.0;
        m += 12.0;
    }
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + d + b - 1524.5
}

/// Julian years elapsed between J2000.0 and the given date.
pub fn years_since_j2000(date: NaiveDate) -> f64 {
    (julian_day(date) - JD_J2000) / 365.25
}

/// Advance a J2000 position by proper motion.
///
/// `pm_ra` and `pm_dec` are in mas/yr (`pm_ra` as a coordinate rate, so it is
/// divided by `cos(dec)` to become a great-circle offset in RA). Returns the
/// propagated `(ra, dec)` in degrees with RA wrapped into `[0, 360)`.
pub fn apply_proper_motion(
    ra_deg: f64,
    dec_deg: f64,
    pm_ra: f64,
    pm_dec: f64,
    years: f64,
) -> (f64, f64) {
    let cos_dec = dec_deg.to_radians().cos();
    // Within ~4' of the pole the coordinate rate blows up; hold RA fixed.
    let delta_ra = if cos_dec.abs() > 1e-6 {
        pm_ra / cos_dec * years / 3_600_000.0
    } else {
        0.0
    };
    let delta_dec = pm_dec * years / 3_600_000.0;
    (reduce_ra(ra_deg + delta_ra), dec_deg + delta_dec)
}
