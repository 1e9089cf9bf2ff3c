//! Star mask rendering.
//!
//! Stars are painted as anti-aliased disks whose radius falls off
//! logarithmically with magnitude. Ring masks are built from two passes,
//! one at the nominal radius and one offset by the ring width, combined
//! per pixel so only the annulus survives.

use ndarray::{Array2, Zip};

use crate::catalog::StarRecord;
use crate::coverage::pixel_coverage;
use crate::wcs::TangentPlane;

/// Edge-of-range slack so a star sitting exactly on a bound is kept despite
/// f32 magnitude rounding.
const MAG_EPSILON: f32 = 0.0005;

/// Which side of the star radius a ring mask occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingSide {
    /// Annulus just inside the star radius.
    Inner,
    /// Annulus just outside the star radius.
    Outer,
}

/// Elongated stars, e.g. from field rotation or guiding error: `aspect` is
/// the x/y semi-axis ratio, `angle_deg` the position angle of the long axis.
#[derive(Debug, Clone, Copy)]
pub struct Elongation {
    pub aspect: f64,
    pub angle_deg: f64,
}

#[derive(Debug, Clone)]
pub struct MaskParams {
    /// Painted magnitude range.
    pub min_mag: f32,
    pub max_mag: f32,
    /// Radius in pixels of the faintest painted star.
    pub min_radius: f64,
    /// Radius in pixels of the brightest painted star.
    pub max_radius: f64,
    /// Anti-aliased coverage values vs. a 0/1 threshold at half coverage.
    pub soft_edges: bool,
    pub ring: Option<RingSide>,
    /// Ring width in pixels at magnitude -1.
    pub max_ring_width: f64,
    /// Logarithmic shrink of the ring width with magnitude.
    pub ring_width_scale: f64,
    pub elongation: Option<Elongation>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            min_mag: 0.0,
            max_mag: 12.0,
            min_radius: 1.5,
            max_radius: 25.0,
            soft_edges: true,
            ring: None,
            max_ring_width: 10.0,
            ring_width_scale: 0.0,
            elongation: None,
        }
    }
}

impl MaskParams {
    /// Disk radius in pixels for a star of magnitude `mag`, falling off
    /// with the log of the distance above `min_mag`, never below one pixel.
    pub fn radius_for_magnitude(&self, mag: f32) -> f64 {
        let span = (1.0 + (self.max_mag - self.min_mag) as f64).ln();
        if span <= 0.0 {
            return self.max_radius;
        }
        let above = (1.0 + (mag - self.min_mag) as f64).max(1.0);
        let radius = self.max_radius - above.ln() * (self.max_radius - self.min_radius) / span;
        radius.max(1.0)
    }

    /// Ring width in pixels for a star of magnitude `mag`.
    pub fn ring_width_for_magnitude(&self, mag: f32) -> f64 {
        self.max_ring_width - (mag as f64 + 1.0).max(f64::MIN_POSITIVE).ln() * self.ring_width_scale
    }

    fn in_range(&self, mag: f32) -> bool {
        mag >= self.min_mag - MAG_EPSILON && mag <= self.max_mag + MAG_EPSILON
    }
}

/// Painting statistics reported to the user and written to the output
/// header.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskStats {
    /// Records inside the painted magnitude range.
    pub stars_in_range: u64,
    /// Records whose disk intersected the frame.
    pub stars_painted: u64,
}

pub struct MaskRenderer {
    plane: TangentPlane,
    params: MaskParams,
    /// Years since J2000, for proper-motion advance.
    years: f64,
}

impl MaskRenderer {
    pub fn new(plane: TangentPlane, params: MaskParams, years: f64) -> Self {
        Self {
            plane,
            params,
            years,
        }
    }

    pub fn params(&self) -> &MaskParams {
        &self.params
    }

    /// Render the mask for `stars`. For ring masks this paints twice and
    /// keeps only the annulus.
    pub fn render(&self, stars: &[StarRecord]) -> (Array2<f32>, MaskStats) {
        let (mut mask, stats) = self.paint_pass(stars, false);
        if let Some(side) = self.params.ring {
            let (offset, _) = self.paint_pass(stars, true);
            match side {
                RingSide::Inner => {
                    Zip::from(&mut mask)
                        .and(&offset)
                        .for_each(|d, &t| *d *= 1.0 - t);
                }
                RingSide::Outer => {
                    Zip::from(&mut mask)
                        .and(&offset)
                        .for_each(|d, &t| *d = (1.0 - *d) * t);
                }
            }
        }
        (mask, stats)
    }

    fn paint_pass(&self, stars: &[StarRecord], offset_pass: bool) -> (Array2<f32>, MaskStats) {
        let mut mask = Array2::zeros((self.plane.height(), self.plane.width()));
        let mut stats = MaskStats::default();

        for star in stars {
            if !self.params.in_range(star.g_mag) {
                continue;
            }
            stats.stars_in_range += 1;

            let pos = star.position_at(self.years);
            let Some((px, py)) = self.plane.project_unbounded(&pos) else {
                continue;
            };

            let mut radius = self.params.radius_for_magnitude(star.g_mag);
            let ring_width = if offset_pass {
                match self.params.ring {
                    Some(RingSide::Inner) => -self.params.ring_width_for_magnitude(star.g_mag),
                    Some(RingSide::Outer) => self.params.ring_width_for_magnitude(star.g_mag),
                    None => 0.0,
                }
            } else {
                0.0
            };

            let painted = match self.params.elongation {
                Some(elong) => {
                    self.paint_ellipse(&mut mask, px, py, radius, ring_width, &elong)
                }
                None => {
                    radius += ring_width;
                    if radius <= 0.0 {
                        // An inner ring wider than the star leaves nothing
                        // on this pass.
                        continue;
                    }
                    self.paint_disk(&mut mask, px, py, radius)
                }
            };
            if painted {
                stats.stars_painted += 1;
            }
        }
        (mask, stats)
    }

    /// Clip a star's bounding box to the frame. None when fully outside.
    fn clip(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Option<(usize, usize, usize, usize)> {
        let x0 = (x0.floor().max(0.0)) as i64;
        let y0 = (y0.floor().max(0.0)) as i64;
        let x1 = (x1.ceil()) as i64;
        let y1 = (y1.ceil()) as i64;
        let w = self.plane.width() as i64;
        let h = self.plane.height() as i64;
        if x0 >= w || y0 >= h || x1 <= 0 || y1 <= 0 {
            return None;
        }
        Some((
            x0 as usize,
            y0 as usize,
            x1.min(w) as usize,
            y1.min(h) as usize,
        ))
    }

    fn paint_disk(&self, mask: &mut Array2<f32>, px: f64, py: f64, r: f64) -> bool {
        // Pixel (x, y) is the unit square centered on the integer point, so
        // squares half a pixel beyond the radius still intersect the rim.
        let reach = r + 0.5;
        let Some((x0, y0, x1, y1)) =
            self.clip(px - reach, py - reach, px + reach, py + reach)
        else {
            return false;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let a = pixel_coverage(px, py, r, x as i64, y as i64) as f32;
                let v = &mut mask[(y, x)];
                if self.params.soft_edges {
                    *v = (*v + a).min(1.0);
                } else if a >= 0.5 {
                    *v = 1.0;
                }
            }
        }
        true
    }

    fn paint_ellipse(
        &self,
        mask: &mut Array2<f32>,
        px: f64,
        py: f64,
        radius: f64,
        ring_width: f64,
        elong: &Elongation,
    ) -> bool {
        let a = radius * elong.aspect + ring_width;
        let b = radius + ring_width;
        if a <= 0.0 || b <= 0.0 {
            return false;
        }
        // The corner test samples the square [x, x+1] x [y, y+1], so a pixel
        // a full index below or above the semi-axis can still touch the edge.
        let reach = a.max(b) + 1.0;
        let Some((x0, y0, x1, y1)) = self.clip(px - reach, py - reach, px + reach, py + reach)
        else {
            return false;
        };

        // Corner-count anti-aliasing: each of a pixel's four corners
        // inside the ellipse contributes a quarter of full intensity.
        let soft = self.params.soft_edges && self.params.ring.is_none();
        let theta = elong.angle_deg.to_radians();
        let (sin, cos) = theta.sin_cos();
        let inside = |x: f64, y: f64| {
            let dx = x - px;
            let dy = y - py;
            let rx = dx * cos - dy * sin;
            let ry = dx * sin + dy * cos;
            (rx / a).powi(2) + (ry / b).powi(2) < 1.0
        };

        for y in y0..y1 {
            for x in x0..x1 {
                let (xf, yf) = (x as f64, y as f64);
                let corners = [
                    (xf, yf),
                    (xf + 1.0, yf),
                    (xf, yf + 1.0),
                    (xf + 1.0, yf + 1.0),
                ];
                let count = corners.iter().filter(|&&(cx, cy)| inside(cx, cy)).count();
                let intensity = if soft {
                    count as f32 * 0.25
                } else if count > 0 {
                    1.0
                } else {
                    0.0
                };
                let v = &mut mask[(y, x)];
                *v = (*v + intensity).min(1.0);
            }
        }
        true
    }
}
