//! Impedance-locus boundary calculation.
//!
//! Summarises a scatter of per-band (R, X) samples as an outer polygon:
//! optional centroid-distance outlier exclusion, a convex hull, and a
//! vertex-count cap enforced by repeatedly removing the vertex whose
//! removal changes the enclosed area the least. Pure and deterministic:
//! the input point *set* decides the result, not its order.

use tracing::warn;

/// One (R, X) sample in the impedance plane.
pub type Point = (f64, f64);

/// Minimum vertex count the simplifier will not go below.
pub const MIN_VERTICES: usize = 4;

/// Compute the closed boundary polygon of a point cloud.
///
/// The returned polygon repeats its first vertex at the end. Degenerate
/// inputs are not errors: zero points give an empty polygon, one or two
/// points give exactly those points (closed). A fully collinear set falls
/// back to its bounding rectangle rather than failing.
pub fn boundary(points: &[Point], max_vertices: usize, exclude_fraction: f64) -> Vec<Point> {
    let kept = if exclude_fraction > 0.0 {
        exclude_outliers(points, exclude_fraction)
    } else {
        points.to_vec()
    };

    if kept.is_empty() {
        return Vec::new();
    }
    if kept.len() <= 2 {
        let mut few = kept;
        few.sort_by(cmp_points);
        few.dedup();
        let first = few[0];
        few.push(first);
        return few;
    }

    let mut hull = convex_hull(&kept);
    if hull.len() < 3 {
        warn!(
            points = kept.len(),
            "degenerate/collinear point set; using bounding-rectangle fallback"
        );
        hull = bounding_rectangle(&kept);
    }

    let cap = max_vertices.max(MIN_VERTICES);
    while hull.len() > cap && hull.len() > MIN_VERTICES {
        remove_cheapest_vertex(&mut hull);
    }

    let first = hull[0];
    hull.push(first);
    hull
}

/// Drop the top `fraction` of points ranked by distance from the centroid,
/// farthest first. Always keeps at least one point.
fn exclude_outliers(points: &[Point], fraction: f64) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let n = points.len();
    let mut drop_count = (n as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
    if drop_count >= n {
        drop_count = n - 1;
    }
    if drop_count == 0 {
        return points.to_vec();
    }
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let mut ranked: Vec<Point> = points.to_vec();
    // distance descending; coordinate order breaks ties independent of
    // input order
    ranked.sort_by(|a, b| {
        let da = (a.0 - cx).powi(2) + (a.1 - cy).powi(2);
        let db = (b.0 - cx).powi(2) + (b.1 - cy).powi(2);
        db.total_cmp(&da).then_with(|| cmp_points(a, b))
    });
    ranked.split_off(drop_count)
}

/// Andrew monotone chain, counter-clockwise output without the closing
/// repeat.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by(cmp_points);
    sorted.dedup();
    let n = sorted.len();
    if n < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(2 * n);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev() {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop(); // last point equals the first
    hull
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn cmp_points(a: &Point, b: &Point) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

fn bounding_rectangle(points: &[Point]) -> Vec<Point> {
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    vec![
        (min_x, min_y),
        (max_x, min_y),
        (max_x, max_y),
        (min_x, max_y),
    ]
}

/// Remove the vertex whose removal shrinks the enclosed area least,
/// lowest index on ties. Removing a convex-polygon vertex can only shrink
/// the area, so simplification is monotone.
fn remove_cheapest_vertex(hull: &mut Vec<Point>) {
    let n = hull.len();
    let mut best_idx = 0;
    let mut best_cost = f64::INFINITY;
    for i in 0..n {
        let prev = hull[(i + n - 1) % n];
        let here = hull[i];
        let next = hull[(i + 1) % n];
        let cost = cross(prev, here, next).abs() / 2.0;
        if cost < best_cost {
            best_cost = cost;
            best_idx = i;
        }
    }
    hull.remove(best_idx);
}

/// Shoelace area of an open (non-repeating) vertex list.
pub fn polygon_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = vertices[i];
        let (x2, y2) = vertices[(i + 1) % n];
        sum += x1 * y2 - x2 * y1;
    }
    sum.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(polygon: &[Point], p: Point) -> bool {
        // winding test over the closed polygon; boundary points count as in
        let verts = &polygon[..polygon.len() - 1];
        let n = verts.len();
        for i in 0..n {
            let a = verts[i];
            let b = verts[(i + 1) % n];
            if cross(a, b, p) < -1e-9 {
                return false;
            }
        }
        true
    }

    #[test]
    fn square_with_interior_point() {
        let points = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)];
        let polygon = boundary(&points, 10, 0.0);
        assert_eq!(
            polygon,
            vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn degenerate_inputs_are_not_errors() {
        assert!(boundary(&[], 10, 0.0).is_empty());
        assert_eq!(boundary(&[(1.0, 2.0)], 10, 0.0), vec![(1.0, 2.0), (1.0, 2.0)]);
        let two = boundary(&[(3.0, 4.0), (1.0, 2.0)], 10, 0.0);
        assert_eq!(two, vec![(1.0, 2.0), (3.0, 4.0), (1.0, 2.0)]);
    }

    #[test]
    fn collinear_set_falls_back_to_bounding_rectangle() {
        let points: Vec<Point> = (0..5).map(|i| (i as f64, 2.0 * i as f64)).collect();
        let polygon = boundary(&points, 10, 0.0);
        // closed quadrilateral spanning the extremes
        assert_eq!(polygon.len(), 5);
        assert_eq!(polygon.first(), polygon.last());
        for p in &points {
            assert!(contains(&polygon, *p));
        }
    }

    #[test]
    fn containment_without_exclusion() {
        let points: Vec<Point> = (0..40)
            .map(|i| {
                let a = i as f64 * 0.37;
                (7.0 * a.cos() + 0.3 * a, 5.0 * a.sin() - 0.2 * a)
            })
            .collect();
        let polygon = boundary(&points, 100, 0.0);
        for p in &points {
            assert!(contains(&polygon, *p), "{:?} outside boundary", p);
        }
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let points = vec![(0.0, 0.0), (4.0, 1.0), (2.0, 5.0), (-1.0, 3.0), (1.0, 1.0)];
        let mut reversed = points.clone();
        reversed.reverse();
        assert_eq!(boundary(&points, 10, 0.0), boundary(&reversed, 10, 0.0));
        assert_eq!(boundary(&points, 10, 0.2), boundary(&reversed, 10, 0.2));
    }

    #[test]
    fn simplification_is_monotone_in_vertex_count_and_area() {
        let points: Vec<Point> = (0..24)
            .map(|i| {
                let theta = i as f64 * std::f64::consts::TAU / 24.0;
                (10.0 * theta.cos(), 10.0 * theta.sin())
            })
            .collect();
        let full = boundary(&points, 100, 0.0);
        let full_area = polygon_area(&full[..full.len() - 1]);
        let mut previous_area = full_area;
        let mut previous_len = full.len();
        for cap in [16, 10, 6, 4] {
            let simplified = boundary(&points, cap, 0.0);
            let area = polygon_area(&simplified[..simplified.len() - 1]);
            assert!(simplified.len() <= previous_len);
            assert!(simplified.len() - 1 <= cap.max(MIN_VERTICES));
            assert!(area <= previous_area + 1e-9, "area grew at cap {cap}");
            previous_area = area;
            previous_len = simplified.len();
        }
        // the floor holds even for absurd caps
        let floored = boundary(&points, 1, 0.0);
        assert_eq!(floored.len() - 1, MIN_VERTICES);
    }

    #[test]
    fn outlier_exclusion_trims_farthest_points_first() {
        let mut points: Vec<Point> = (0..20)
            .map(|i| {
                let theta = i as f64 * std::f64::consts::TAU / 20.0;
                (theta.cos(), theta.sin())
            })
            .collect();
        points.push((100.0, 100.0)); // extreme outlier
        let polygon = boundary(&points, 100, 0.05);
        for &(x, y) in &polygon {
            assert!(x < 50.0 && y < 50.0, "outlier survived exclusion");
        }
    }
}
