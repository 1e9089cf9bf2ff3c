//! Exact circle/pixel overlap areas for anti-aliased disk rendering.
//!
//! Each painted star is a circle in continuous pixel coordinates; a pixel's
//! intensity contribution is the area of its unit square that falls inside
//! the circle, not a binary in/out test. The overlap is computed in closed
//! form by decomposing the rectangle boundary into four origin-anchored
//! triangle fans and summing signed circular-wedge and chord areas.

/// Results below this are floating-point noise from the trigonometric
/// decomposition and clamp to exactly zero.
const AREA_FLOOR: f64 = 1e-8;

/// Fraction of the unit pixel centered at `(x, y)` that lies inside the
/// circle of radius `r` centered at `(xc, yc)`.
///
/// Returns a value in `[0, 1]`: 0 for pixels entirely outside the circle,
/// 1 for pixels entirely inside.
pub fn pixel_coverage(xc: f64, yc: f64, r: f64, x: i64, y: i64) -> f64 {
    let x = x as f64;
    let y = y as f64;
    let area = rect_coverage(xc, yc, r, x - 0.5, x + 0.5, y - 0.5, y + 0.5);
    if area < AREA_FLOOR {
        0.0
    } else {
        area.min(1.0)
    }
}

/// Area of overlap between the circle of radius `r` centered at `(xc, yc)`
/// and the axis-aligned rectangle `[x0, x1] x [y0, y1]`.
///
/// The rectangle is shifted so the circle sits at the origin, then the four
/// edges are traversed counter-clockwise; each contributes a signed fan area
/// via [`one_side_area`]. The sign convention makes the total positive.
pub fn rect_coverage(xc: f64, yc: f64, r: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let x0 = x0 - xc;
    let y0 = y0 - yc;
    let x1 = x1 - xc;
    let y1 = y1 - yc;

    one_side_area(x1, y0, y1, r)
        + one_side_area(y1, -x1, -x0, r)
        + one_side_area(-x0, -y1, -y0, r)
        + one_side_area(-y0, x0, x1, r)
}

/// Signed area of intersection between the circle (radius `r`, centered at
/// the origin) and the triangle with vertices at the origin, `(x, y0)` and
/// `(x, y1)`.
///
/// The edge is traversed from `y0` to `y1`; a clockwise traversal yields a
/// negative area. The edge is split where it crosses the circle's vertical
/// extent `+-sqrt(r^2 - x^2)` at this x-offset, composing wedge and chord
/// pieces.
fn one_side_area(x: f64, y0: f64, y1: f64, r: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    if x.abs() >= r {
        return arc_area(x, y0, y1, r);
    }
    let yh = (r * r - x * x).sqrt();

    if y0 <= -yh {
        if y1 <= -yh {
            arc_area(x, y0, y1, r)
        } else if y1 <= yh {
            arc_area(x, y0, -yh, r) + chord_area(x, -yh, y1)
        } else {
            arc_area(x, y0, -yh, r) + chord_area(x, -yh, yh) + arc_area(x, yh, y1, r)
        }
    } else if y0 < yh {
        if y1 <= -yh {
            chord_area(x, y0, -yh) + arc_area(x, -yh, y1, r)
        } else if y1 <= yh {
            chord_area(x, y0, y1)
        } else {
            chord_area(x, y0, yh) + arc_area(x, yh, y1, r)
        }
    } else if y1 <= -yh {
        arc_area(x, y0, yh, r) + chord_area(x, yh, -yh) + arc_area(x, -yh, y1, r)
    } else if y1 <= yh {
        arc_area(x, y0, yh, r) + chord_area(x, yh, y1)
    } else {
        arc_area(x, y0, y1, r)
    }
}

/// Signed area of the circular wedge between the radii through `(x, y0)` and
/// `(x, y1)` on the circle of radius `r` centered at the origin.
///
/// Valid only for `x != 0`. Clockwise traversal yields a negative area.
fn arc_area(x: f64, y0: f64, y1: f64, r: f64) -> f64 {
    0.5 * r * r * ((y1 / x).atan() - (y0 / x).atan())
}

/// Signed area of the triangle with vertices at the origin, `(x, y0)` and
/// `(x, y1)`. Positive when `y1 > y0`.
fn chord_area(x: f64, y0: f64, y1: f64) -> f64 {
    0.5 * x * (y1 - y0)
}
