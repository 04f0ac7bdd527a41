// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate extraction — contours of the edge map, ranked by area and reduced
// with Douglas-Peucker to find four-cornered outlines.

use cardscan_core::{Point, ScanConfig};
use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point as PixelPoint;
use tracing::{debug, info, instrument};

/// A closed contour from the edge map.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCandidate {
    pub points: Vec<PixelPoint<i32>>,
    /// Absolute shoelace area.
    pub area: f64,
    pub perimeter: f64,
}

/// A contour that reduced to exactly four vertices, in working-frame
/// coordinates and in the order the approximation produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrilateral {
    /// Zero-based position among the area-ranked contours.
    pub rank: usize,
    pub area: f64,
    pub points: [Point; 4],
}

/// Finds card-shaped outlines in an edge map.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    max_candidates: usize,
    epsilon_fraction: f64,
}

impl CandidateExtractor {
    pub fn new(max_candidates: usize, epsilon_fraction: f64) -> Self {
        Self {
            max_candidates,
            epsilon_fraction,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.max_candidates, config.approx_epsilon_fraction)
    }

    /// All contours sorted by descending area, truncated to the candidate cap.
    pub fn ranked_contours(&self, edges: &GrayImage) -> Vec<PolygonCandidate> {
        let mut polygons: Vec<PolygonCandidate> = find_contours::<i32>(edges)
            .into_iter()
            .map(|contour| {
                let area = shoelace_area(&contour.points).abs();
                let perimeter = if contour.points.len() > 1 {
                    arc_length(&contour.points, true)
                } else {
                    0.0
                };
                PolygonCandidate {
                    points: contour.points,
                    area,
                    perimeter,
                }
            })
            .collect();

        debug!(contours = polygons.len(), "Contours found");
        polygons.sort_by(|a, b| b.area.total_cmp(&a.area));
        polygons.truncate(self.max_candidates);
        polygons
    }

    /// Quadrilateral candidates in area-descending order. May be empty.
    #[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
    pub fn extract(&self, edges: &GrayImage) -> Vec<Quadrilateral> {
        let quads: Vec<Quadrilateral> = self
            .ranked_contours(edges)
            .iter()
            .enumerate()
            .filter_map(|(rank, polygon)| {
                let points = self.approximate_quad(polygon)?;
                Some(Quadrilateral {
                    rank,
                    area: polygon.area,
                    points,
                })
            })
            .collect();

        info!(quadrilaterals = quads.len(), "Candidate extraction complete");
        quads
    }

    /// Reduce a contour to four vertices, or `None` if it reduces to any other count.
    fn approximate_quad(&self, polygon: &PolygonCandidate) -> Option<[Point; 4]> {
        if polygon.points.len() < 4 || polygon.perimeter <= 0.0 {
            return None;
        }

        let epsilon = self.epsilon_fraction * polygon.perimeter;
        let mut vertices = approximate_closed_curve(&polygon.points, epsilon);
        vertices.dedup();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        debug!(
            points = polygon.points.len(),
            vertices = vertices.len(),
            area = polygon.area,
            "Contour approximated"
        );

        match vertices.as_slice() {
            [a, b, c, d] => Some([to_point(a), to_point(b), to_point(c), to_point(d)]),
            _ => None,
        }
    }
}

/// Rounds used to refine the far-apart pair that seeds [`approximate_closed_curve`].
const FARTHEST_PAIR_ROUNDS: usize = 3;

/// Douglas-Peucker over a closed curve.
///
/// The curve is split at an approximately farthest-apart pair of points and
/// each half is simplified as an open chain. Both split points lie on the
/// convex hull, so a polygon's corners are kept at their true positions
/// instead of wherever the contour trace happened to start.
pub fn approximate_closed_curve(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    let n = points.len();
    if n < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let (start, end) = farthest_pair(points);
    if start == end {
        return vec![points[start]];
    }

    let rotated: Vec<PixelPoint<i32>> = points[start..]
        .iter()
        .chain(&points[..start])
        .copied()
        .collect();
    let split = (end + n - start) % n;

    let mut there = approximate_polygon_dp(&rotated[..=split], epsilon, false);
    let mut back: Vec<PixelPoint<i32>> = rotated[split..].to_vec();
    back.push(rotated[0]);
    let back = approximate_polygon_dp(&back, epsilon, false);

    // `back` runs from the split point round to the start; both are already in `there`.
    if back.len() > 2 {
        there.extend_from_slice(&back[1..back.len() - 1]);
    }
    there
}

/// Indices of two contour points that are (approximately) farthest apart.
fn farthest_pair(points: &[PixelPoint<i32>]) -> (usize, usize) {
    let mut start = 0;
    let mut end = farthest_from(points, start);
    for _ in 0..FARTHEST_PAIR_ROUNDS {
        let next = farthest_from(points, end);
        if next == start {
            break;
        }
        start = end;
        end = next;
    }
    (start, end)
}

fn farthest_from(points: &[PixelPoint<i32>], from: usize) -> usize {
    let origin = points[from];
    let mut best = from;
    let mut best_distance = 0i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let distance = dx * dx + dy * dy;
        if distance > best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

fn to_point(p: &PixelPoint<i32>) -> Point {
    Point::new(p.x as f32, p.y as f32)
}

/// Signed area of a closed polygon (shoelace formula).
pub fn shoelace_area(points: &[PixelPoint<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x as f64 * points[j].y as f64;
        twice_area -= points[j].x as f64 * points[i].y as f64;
    }
    twice_area / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use crate::test_support::{synthetic_card, synthetic_disc};

    fn edges_of(frame: &image::RgbImage) -> GrayImage {
        preprocess(frame, &ScanConfig::default()).unwrap().edges
    }

    #[test]
    fn shoelace_area_rectangle() {
        let square = [
            PixelPoint::new(0, 0),
            PixelPoint::new(10, 0),
            PixelPoint::new(10, 5),
            PixelPoint::new(0, 5),
        ];
        assert!((shoelace_area(&square) - 50.0).abs() < 1e-9);
        let reversed: Vec<_> = square.iter().rev().copied().collect();
        assert!((shoelace_area(&reversed) + 50.0).abs() < 1e-9);
        assert_eq!(shoelace_area(&square[..2]), 0.0);
    }

    #[test]
    fn blank_edge_map_yields_nothing() {
        let edges = GrayImage::new(50, 40);
        let extractor = CandidateExtractor::from_config(&ScanConfig::default());
        assert!(extractor.extract(&edges).is_empty());
    }

    #[test]
    fn drawn_rectangle_outline_is_one_quad_family() {
        let mut edges = GrayImage::new(120, 100);
        for x in 10..=110 {
            edges.put_pixel(x, 20, image::Luma([255]));
            edges.put_pixel(x, 80, image::Luma([255]));
        }
        for y in 20..=80 {
            edges.put_pixel(10, y, image::Luma([255]));
            edges.put_pixel(110, y, image::Luma([255]));
        }
        let quads = CandidateExtractor::new(5, 0.02).extract(&edges);
        assert!(!quads.is_empty());
        let mut xs: Vec<f32> = quads[0].points.iter().map(|p| p.x).collect();
        xs.sort_by(f32::total_cmp);
        assert!((xs[0] - 10.0).abs() <= 1.0 && (xs[3] - 110.0).abs() <= 1.0, "{xs:?}");
    }

    #[test]
    fn finds_synthetic_card_corners() {
        let corners = [(200.0, 120.0), (600.0, 120.0), (600.0, 380.0), (200.0, 380.0)];
        let frame = synthetic_card(800, 500, &corners);
        let quads = CandidateExtractor::from_config(&ScanConfig::default()).extract(&edges_of(&frame));
        assert!(!quads.is_empty(), "expected at least one quadrilateral");

        let best = &quads[0];
        for (cx, cy) in corners {
            let nearest = best
                .points
                .iter()
                .map(|p| (p.x - cx).hypot(p.y - cy))
                .fold(f32::MAX, f32::min);
            assert!(nearest <= 4.0, "corner ({cx}, {cy}) missed by {nearest}px");
        }
    }

    #[test]
    fn closed_curve_keeps_true_corners_whatever_the_trace_start() {
        let corners: [(i32, i32); 4] = [(0, 0), (40, 0), (40, 20), (0, 20)];
        let mut outline = Vec::new();
        for w in 0..4 {
            let (x0, y0) = corners[w];
            let (x1, y1) = corners[(w + 1) % 4];
            let steps = (x1 - x0).abs().max((y1 - y0).abs());
            for t in 0..steps {
                outline.push(PixelPoint::new(
                    x0 + (x1 - x0) * t / steps,
                    y0 + (y1 - y0) * t / steps,
                ));
            }
        }
        // Start the trace midway along the top edge.
        outline.rotate_left(13);

        let mut vertices = approximate_closed_curve(&outline, 2.4);
        vertices.sort_by_key(|p| (p.x, p.y));
        let expected: Vec<_> = [(0, 0), (0, 20), (40, 0), (40, 20)]
            .iter()
            .map(|&(x, y)| PixelPoint::new(x, y))
            .collect();
        assert_eq!(vertices, expected);
    }

    #[test]
    fn skewed_card_corners_survive_approximation() {
        let corners = [(300.0, 200.0), (1300.0, 240.0), (1260.0, 860.0), (340.0, 820.0)];
        let frame = synthetic_card(1600, 1000, &corners);
        let pre = preprocess(&frame, &ScanConfig::default()).unwrap();
        let quads = CandidateExtractor::from_config(&ScanConfig::default()).extract(&pre.edges);
        assert!(!quads.is_empty(), "expected a quadrilateral");

        let best = &quads[0];
        for (cx, cy) in corners {
            let (wx, wy) = (cx / pre.scale, cy / pre.scale);
            let nearest = best
                .points
                .iter()
                .map(|p| (p.x - wx).hypot(p.y - wy))
                .fold(f32::MAX, f32::min);
            assert!(nearest <= 2.0, "corner ({wx}, {wy}) missed by {nearest} working px: {:?}", best.points);
        }
    }

    #[test]
    fn candidates_are_area_ordered() {
        let frame = synthetic_card(800, 500, &[(100.0, 100.0), (700.0, 100.0), (700.0, 400.0), (100.0, 400.0)]);
        let quads = CandidateExtractor::from_config(&ScanConfig::default()).extract(&edges_of(&frame));
        assert!(quads.windows(2).all(|w| w[0].area >= w[1].area));
        assert!(quads.windows(2).all(|w| w[0].rank < w[1].rank));
    }

    #[test]
    fn round_shapes_do_not_reduce_to_four_corners() {
        let frame = synthetic_disc(600, 500, (300, 250), 150);
        let quads = CandidateExtractor::from_config(&ScanConfig::default()).extract(&edges_of(&frame));
        assert!(quads.is_empty(), "{quads:?}");
    }

    #[test]
    fn cap_limits_contours_considered() {
        let frame = synthetic_card(800, 500, &[(200.0, 120.0), (600.0, 120.0), (600.0, 380.0), (200.0, 380.0)]);
        let edges = edges_of(&frame);
        assert!(CandidateExtractor::new(1, 0.02).ranked_contours(&edges).len() <= 1);
    }
}
