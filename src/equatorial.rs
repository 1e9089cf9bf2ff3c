//! Equatorial sky coordinates and angle arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position on the celestial sphere, ICRS right ascension and declination
/// in degrees. RA is kept in `[0, 360)`, declination in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equatorial {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl Equatorial {
    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra_deg: reduce_ra(ra_deg),
            dec_deg,
        }
    }

    pub fn ra_rad(&self) -> f64 {
        self.ra_deg.to_radians()
    }

    pub fn dec_rad(&self) -> f64 {
        self.dec_deg.to_radians()
    }

    /// Angular separation to `other` in degrees, spherical law of cosines.
    pub fn separation_deg(&self, other: &Equatorial) -> f64 {
        let (a1, d1) = (self.ra_rad(), self.dec_rad());
        let (a2, d2) = (other.ra_rad(), other.dec_rad());
        let cos_z = d1.sin() * d2.sin() + d1.cos() * d2.cos() * (a1 - a2).cos();
        cos_z.clamp(-1.0, 1.0).acos().to_degrees()
    }
}

impl fmt::Display for Equatorial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            Dms::from_degrees(self.ra_deg / 15.0),
            Dms::from_degrees(self.dec_deg)
        )
    }
}

/// Wrap a right ascension into `[0, 360)` degrees.
pub fn reduce_ra(mut deg: f64) -> f64 {
    deg %= 360.0;
    if deg < 0.0 {
        deg += 360.0;
    }
    deg
}

/// Eastward arc from `b` to `a` in degrees, wraparound-aware, in `[0, 360)`.
pub fn ra_span(a: f64, b: f64) -> f64 {
    let z = a - b;
    let mut z = z - ((z + 180.0) / 360.0).floor() * 360.0;
    if z < 0.0 {
        z += 360.0;
    }
    z
}

/// Sexagesimal angle, used for human-readable log output.
#[derive(Debug, Clone, Copy)]
pub struct Dms {
    pub sign: i8,
    pub deg: u32,
    pub min: u32,
    pub sec: f64,
}

impl Dms {
    pub fn from_degrees(angle: f64) -> Self {
        let sign = if angle < 0.0 { -1 } else { 1 };
        let angle = angle.abs();
        let deg = angle.floor();
        let min = ((angle - deg) * 60.0).floor();
        let mut sec = (angle - deg - min / 60.0) * 3600.0;
        let mut deg = deg as u32;
        let mut min = min as u32;
        // 59.9995 rounds up through the minute and degree fields.
        if sec > 59.999 {
            sec = 0.0;
            min += 1;
            if min == 60 {
                min = 0;
                deg += 1;
            }
        }
        Self {
            sign,
            deg,
            min,
            sec,
        }
    }
}

impl fmt::Display for Dms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.sign < 0 { "-" } else { "+" };
        write!(f, "{sign}{:02} {:02} {:06.3}", self.deg, self.min, self.sec)
    }
}
