//! Gnomonic (tangent-plane) projection between sky and pixel coordinates.
//!
//! The mask generator needs both directions: catalog stars project onto the
//! raster, and the image corners unproject onto the sky to bound the catalog
//! download. The forward transform rotates celestial unit vectors into a
//! camera frame whose Z axis points at the field center, then divides by Z;
//! the inverse runs the same rotation backwards.

use nalgebra::{Matrix3, Vector3};

use crate::equatorial::Equatorial;

/// Tangent-plane projection for one image field.
///
/// The field center maps to the image center, north is up, and distortion
/// stays below a percent for fields under ~10 degrees across. Immutable
/// after construction.
#[derive(Debug, Clone)]
pub struct TangentPlane {
    center: Equatorial,
    degrees_per_pixel: f64,
    width: usize,
    height: usize,
    /// Columns are the camera basis (east-ish, north, boresight) expressed
    /// in celestial coordinates.
    rotation: Matrix3<f64>,
}

impl TangentPlane {
    /// Build a projection for a field centered at `center` with a square
    /// pixel scale of `degrees_per_pixel` and a `width` x `height` raster.
    pub fn new(center: Equatorial, degrees_per_pixel: f64, width: usize, height: usize) -> Self {
        let ra = center.ra_rad();
        let dec = center.dec_rad();

        // Boresight.
        let z = Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin());

        // Up on the detector points at the celestial pole. At the pole
        // itself the cross product degenerates; fall back to the RA=0
        // direction, which is as good as any there.
        let north = Vector3::new(0.0, 0.0, 1.0);
        let mut east = north.cross(&z);
        if east.norm() < 1e-12 {
            east = Vector3::new(0.0, -z.z, 0.0);
        }
        let east = east.normalize();
        let y = z.cross(&east).normalize();
        let x = y.cross(&z).normalize();

        Self {
            center,
            degrees_per_pixel,
            width,
            height,
            rotation: Matrix3::from_columns(&[x, y, z]),
        }
    }

    pub fn center(&self) -> Equatorial {
        self.center
    }

    pub fn degrees_per_pixel(&self) -> f64 {
        self.degrees_per_pixel
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Angular radius of the field in degrees (half-diagonal), the cone a
    /// catalog query must cover.
    pub fn field_radius_deg(&self) -> f64 {
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        (half_w * half_w + half_h * half_h).sqrt() * self.degrees_per_pixel
    }

    /// Project to pixel coordinates without bounds checking.
    ///
    /// Returns `None` for positions on the far hemisphere.
    pub fn project_unbounded(&self, eq: &Equatorial) -> Option<(f64, f64)> {
        let ra = eq.ra_rad();
        let dec = eq.dec_rad();
        let v = Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin());

        let cam = self.rotation.transpose() * v;
        if cam.z <= 0.0 {
            return None;
        }

        let rad_per_pixel = self.degrees_per_pixel.to_radians();
        let x = (self.width as f64 / 2.0) + (cam.x / cam.z) / rad_per_pixel;
        let y = (self.height as f64 / 2.0) - (cam.y / cam.z) / rad_per_pixel;
        Some((x, y))
    }

    /// Project to pixel coordinates, `None` if outside the raster.
    pub fn project(&self, eq: &Equatorial) -> Option<(f64, f64)> {
        let (x, y) = self.project_unbounded(eq)?;
        if x >= 0.0 && x < self.width as f64 && y >= 0.0 && y < self.height as f64 {
            Some((x, y))
        } else {
            None
        }
    }

    /// Sky position of a pixel coordinate (which may lie outside the
    /// raster, as the footprint border pixels do).
    pub fn unproject(&self, x: f64, y: f64) -> Equatorial {
        let rad_per_pixel = self.degrees_per_pixel.to_radians();
        let tan_x = (x - self.width as f64 / 2.0) * rad_per_pixel;
        let tan_y = (self.height as f64 / 2.0 - y) * rad_per_pixel;

        let cam = Vector3::new(tan_x, tan_y, 1.0).normalize();
        let v = self.rotation * cam;

        let dec = v.z.clamp(-1.0, 1.0).asin();
        let ra = v.y.atan2(v.x);
        Equatorial::from_degrees(ra.to_degrees(), dec.to_degrees())
    }
}
