// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry normalization — corner ordering, the four-point projective transform,
// and the bilinear unwarp that produces the upright card.

use cardscan_core::{CandidateError, CardSize, OrderedQuad, Point};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use tracing::{debug, instrument};

/// Smallest enclosed area (px²) an ordered quad may have.
const MIN_QUAD_AREA: f32 = 1.0;

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest. Top-right has
/// the smallest `y - x`, bottom-left the largest. Exact ties (a card turned by
/// 45°) go to the vertex that keeps the roles clockwise: top-left takes the
/// smaller `y`, top-right the larger `x`, bottom-right the larger `y`, and
/// bottom-left the smaller `x`.
pub fn order_corners(points: &[Point; 4]) -> Result<OrderedQuad, CandidateError> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(CandidateError::DegenerateGeometry(
            "corner coordinates are not finite".into(),
        ));
    }

    let tl = arg_min_by(points, |p| (p.x + p.y, p.y));
    let br = arg_min_by(points, |p| (-(p.x + p.y), -p.y));
    let tr = arg_min_by(points, |p| (p.y - p.x, -p.x));
    let bl = arg_min_by(points, |p| (p.x - p.y, p.x));

    let picked = [tl, tr, br, bl];
    let distinct = (0..4).all(|i| (i + 1..4).all(|j| picked[i] != picked[j]));
    if !distinct {
        return Err(CandidateError::DegenerateGeometry(format!(
            "corner roles collapse onto the same vertex (tl={tl}, tr={tr}, br={br}, bl={bl})"
        )));
    }

    let quad = OrderedQuad {
        top_left: points[tl],
        top_right: points[tr],
        bottom_right: points[br],
        bottom_left: points[bl],
    };

    let area = polygon_area(&quad.corners()).abs();
    if area < MIN_QUAD_AREA {
        return Err(CandidateError::DegenerateGeometry(format!(
            "enclosed area {area:.2}px² is too small"
        )));
    }

    Ok(quad)
}

/// Index of the first point with the lexicographically smallest key.
fn arg_min_by(points: &[Point; 4], key: impl Fn(&Point) -> (f32, f32)) -> usize {
    let mut best = 0;
    for i in 1..points.len() {
        if key(&points[i]) < key(&points[best]) {
            best = i;
        }
    }
    best
}

fn polygon_area(corners: &[Point; 4]) -> f32 {
    let mut twice = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        twice += a.x * b.y - b.x * a.y;
    }
    twice / 2.0
}

/// Unwarped size: the longer of each pair of opposite edges, truncated.
pub fn target_size(quad: &OrderedQuad) -> Result<(u32, u32), CandidateError> {
    let width_bottom = quad.bottom_right.distance(&quad.bottom_left).trunc();
    let width_top = quad.top_right.distance(&quad.top_left).trunc();
    let height_right = quad.top_right.distance(&quad.bottom_right).trunc();
    let height_left = quad.top_left.distance(&quad.bottom_left).trunc();

    let width = width_bottom.max(width_top);
    let height = height_right.max(height_left);

    if !(width >= 2.0 && height >= 2.0) || width > u32::MAX as f32 || height > u32::MAX as f32 {
        return Err(CandidateError::DegenerateGeometry(format!(
            "unwarped size {width}x{height} is unusable"
        )));
    }
    Ok((width as u32, height as u32))
}

/// 3×3 projective transform in homogeneous pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    /// Solve `dst ~ H · src` from four correspondences.
    ///
    /// Both point sets are Hartley-normalized before the 8×8 solve. Returns
    /// `None` when the system is singular.
    pub fn from_4pt(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let (src_n, t_src) = hartley_normalize(src);
        let (dst_n, t_dst) = hartley_normalize(dst);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let (x, y) = src_n[k];
            let (u, v) = dst_n[k];

            let r0 = 2 * k;
            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            let r1 = 2 * k + 1;
            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let x = a.lu().solve(&b)?;
        let hn = Matrix3::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );

        let h = t_dst.try_inverse()? * hn * t_src;
        Self::normalized(h)
    }

    fn normalized(h: Matrix3<f64>) -> Option<Self> {
        let s = h[(2, 2)];
        if s.abs() < 1e-12 || h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self { h: h / s })
    }

    pub fn inverse(&self) -> Option<Self> {
        Self::normalized(self.h.try_inverse()?)
    }

    /// Map a point. The result may be non-finite at the line at infinity.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.h * Vector3::new(x, y, 1.0);
        (v[0] / v[2], v[1] / v[2])
    }
}

/// Translate to the centroid and scale so the mean distance is √2.
fn hartley_normalize(points: &[Point; 4]) -> ([(f64, f64); 4], Matrix3<f64>) {
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / 4.0;
    let mean_dist = points
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / 4.0;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let mut out = [(0.0, 0.0); 4];
    for (slot, p) in out.iter_mut().zip(points) {
        *slot = (s * (p.x as f64 - cx), s * (p.y as f64 - cy));
    }
    (out, t)
}

/// Unwarp the region bounded by `quad` into a `width` × `height` rectangle.
///
/// Destination pixel `(x, y)` is sampled from the source at `H⁻¹ · (x, y)`
/// with bilinear interpolation; coordinates outside the source are clamped to
/// its edge.
pub fn warp_quad(
    source: &RgbImage,
    quad: &OrderedQuad,
    width: u32,
    height: u32,
) -> Result<RgbImage, CandidateError> {
    if width < 2 || height < 2 || source.width() == 0 || source.height() == 0 {
        return Err(CandidateError::DegenerateGeometry(format!(
            "cannot unwarp a {}x{} source into {width}x{height}",
            source.width(),
            source.height()
        )));
    }
    let right = (width - 1) as f32;
    let bottom = (height - 1) as f32;
    let destination = [
        Point::new(0.0, 0.0),
        Point::new(right, 0.0),
        Point::new(right, bottom),
        Point::new(0.0, bottom),
    ];

    let forward =
        Homography::from_4pt(&quad.corners(), &destination).ok_or(CandidateError::Transform)?;
    let backward = forward.inverse().ok_or(CandidateError::Transform)?;

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = backward.apply(x as f64, y as f64);
        *pixel = sample_bilinear_clamped(source, sx as f32, sy as f32);
    }
    Ok(out)
}

/// Bilinear sample with edge replication.
fn sample_bilinear_clamped(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
    let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// A candidate that survived geometry normalization.
#[derive(Debug, Clone)]
pub struct NormalizedCandidate {
    /// Ordered corners in source-image pixels.
    pub quad: OrderedQuad,
    /// Upright card at the published output size.
    pub card: RgbImage,
}

/// Orders, rescales, and unwarps quadrilateral candidates.
#[derive(Debug, Clone, Copy)]
pub struct GeometryNormalizer {
    output_size: CardSize,
}

impl GeometryNormalizer {
    pub fn new(output_size: CardSize) -> Self {
        Self { output_size }
    }

    /// Normalize working-frame `points` against the full-resolution `source`.
    #[instrument(skip_all, fields(scale = scale))]
    pub fn normalize(
        &self,
        source: &RgbImage,
        points: &[Point; 4],
        scale: f32,
    ) -> Result<NormalizedCandidate, CandidateError> {
        let quad = order_corners(points)?.scaled(scale);
        let (width, height) = target_size(&quad)?;
        debug!(width, height, "Unwarping candidate");

        let warped = warp_quad(source, &quad, width, height)?;
        let card = if (width, height) == (self.output_size.width, self.output_size.height) {
            warped
        } else {
            imageops::resize(
                &warped,
                self.output_size.width,
                self.output_size.height,
                FilterType::Triangle,
            )
        };

        Ok(NormalizedCandidate { quad, card })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: [(f32, f32); 4]) -> [Point; 4] {
        raw.map(|(x, y)| Point::new(x, y))
    }

    #[test]
    fn orders_shuffled_rectangle() {
        let quad = order_corners(&pts([(10.0, 5.0), (0.0, 5.0), (10.0, 0.0), (0.0, 0.0)])).unwrap();
        assert_eq!(quad.top_left, Point::new(0.0, 0.0));
        assert_eq!(quad.top_right, Point::new(10.0, 0.0));
        assert_eq!(quad.bottom_right, Point::new(10.0, 5.0));
        assert_eq!(quad.bottom_left, Point::new(0.0, 5.0));
    }

    #[test]
    fn ordering_is_idempotent() {
        let skewed = pts([(430.0, 310.0), (30.0, 40.0), (20.0, 290.0), (410.0, 60.0)]);
        let once = order_corners(&skewed).unwrap();
        let twice = order_corners(&once.corners()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn orders_card_turned_by_45_degrees() {
        let diamond = pts([(0.0, 50.0), (50.0, 100.0), (100.0, 50.0), (50.0, 0.0)]);
        let quad = order_corners(&diamond).unwrap();
        assert_eq!(quad.top_left, Point::new(50.0, 0.0));
        assert_eq!(quad.top_right, Point::new(100.0, 50.0));
        assert_eq!(quad.bottom_right, Point::new(50.0, 100.0));
        assert_eq!(quad.bottom_left, Point::new(0.0, 50.0));
        assert_eq!(order_corners(&quad.corners()).unwrap(), quad);
    }

    #[test]
    fn ordering_rejects_collinear_points() {
        let err = order_corners(&pts([(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])).unwrap_err();
        assert!(matches!(err, CandidateError::DegenerateGeometry(_)), "{err}");
    }

    #[test]
    fn ordering_rejects_duplicate_points() {
        let err = order_corners(&pts([(5.0, 5.0), (5.0, 5.0), (5.0, 5.0), (5.0, 5.0)])).unwrap_err();
        assert!(matches!(err, CandidateError::DegenerateGeometry(_)));
    }

    #[test]
    fn ordering_rejects_non_finite() {
        let err =
            order_corners(&pts([(f32::NAN, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)])).unwrap_err();
        assert!(matches!(err, CandidateError::DegenerateGeometry(_)));
    }

    #[test]
    fn target_size_uses_longer_edges() {
        let quad = order_corners(&pts([(0.0, 0.0), (100.0, 10.0), (90.0, 60.0), (5.0, 50.0)])).unwrap();
        let (w, h) = target_size(&quad).unwrap();
        let expect_w = quad
            .bottom_right
            .distance(&quad.bottom_left)
            .max(quad.top_right.distance(&quad.top_left));
        let expect_h = quad
            .top_right
            .distance(&quad.bottom_right)
            .max(quad.top_left.distance(&quad.bottom_left));
        assert!((w as f32 - expect_w).abs() <= 1.0);
        assert!((h as f32 - expect_h).abs() <= 1.0);
    }

    #[test]
    fn target_size_rejects_slivers() {
        let quad = OrderedQuad {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(50.0, 0.0),
            bottom_right: Point::new(50.0, 1.5),
            bottom_left: Point::new(0.0, 1.5),
        };
        assert!(matches!(
            target_size(&quad),
            Err(CandidateError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn homography_maps_correspondences() {
        let src = pts([(12.0, 7.0), (230.0, 20.0), (250.0, 160.0), (5.0, 140.0)]);
        let dst = pts([(0.0, 0.0), (199.0, 0.0), (199.0, 119.0), (0.0, 119.0)]);
        let h = Homography::from_4pt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let (u, v) = h.apply(s.x as f64, s.y as f64);
            assert!((u - d.x as f64).abs() < 1e-6 && (v - d.y as f64).abs() < 1e-6);
        }
        let inv = h.inverse().unwrap();
        let (x, y) = inv.apply(0.0, 0.0);
        assert!((x - 12.0).abs() < 1e-6 && (y - 7.0).abs() < 1e-6);
    }

    #[test]
    fn identity_warp_reproduces_pixels() {
        let source = RgbImage::from_fn(100, 50, |x, y| Rgb([(x * 2) as u8, (y * 4) as u8, 77]));
        let quad = OrderedQuad {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(99.0, 0.0),
            bottom_right: Point::new(99.0, 49.0),
            bottom_left: Point::new(0.0, 49.0),
        };
        let out = warp_quad(&source, &quad, 100, 50).unwrap();
        for (x, y, pixel) in out.enumerate_pixels() {
            let expected = source.get_pixel(x, y);
            for c in 0..3 {
                assert!(pixel.0[c].abs_diff(expected.0[c]) <= 1, "({x},{y}) {pixel:?} vs {expected:?}");
            }
        }
    }

    #[test]
    fn warp_of_inner_rectangle_crops() {
        let source = RgbImage::from_fn(60, 40, |x, y| Rgb([x as u8, y as u8, 0]));
        let quad = OrderedQuad {
            top_left: Point::new(10.0, 5.0),
            top_right: Point::new(49.0, 5.0),
            bottom_right: Point::new(49.0, 34.0),
            bottom_left: Point::new(10.0, 34.0),
        };
        let out = warp_quad(&source, &quad, 40, 30).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [10, 5, 0]);
        assert_eq!(out.get_pixel(39, 29).0, [49, 34, 0]);
    }

    #[test]
    fn samples_outside_source_replicate_edges() {
        let source = RgbImage::from_fn(4, 4, |x, _| Rgb([x as u8 * 50, 0, 0]));
        assert_eq!(sample_bilinear_clamped(&source, -10.0, 1.0).0, [0, 0, 0]);
        assert_eq!(sample_bilinear_clamped(&source, 99.0, 1.0).0, [150, 0, 0]);
        assert_eq!(sample_bilinear_clamped(&source, f32::NAN, 1.0).0, [0, 0, 0]);
    }

    #[test]
    fn normalizer_scales_and_resizes() {
        let source = RgbImage::from_pixel(400, 300, Rgb([200, 200, 200]));
        let normalizer = GeometryNormalizer::new(CardSize {
            width: 100,
            height: 63,
        });
        let out = normalizer
            .normalize(&source, &pts([(10.0, 10.0), (150.0, 10.0), (150.0, 100.0), (10.0, 100.0)]), 2.0)
            .unwrap();
        assert_eq!(out.card.dimensions(), (100, 63));
        assert_eq!(out.quad.top_left, Point::new(20.0, 20.0));
        assert_eq!(out.quad.bottom_right, Point::new(300.0, 200.0));
    }
}
