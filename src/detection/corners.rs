use imageproc::point::Point;

use crate::models::CornerSet;
use crate::{DetectionError, Result};

/// Index of the first point minimizing (or maximizing) `key`; ties keep input order.
fn extreme_index(points: &[Point<f32>], key: impl Fn(&Point<f32>) -> f32, maximize: bool) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let (candidate, current) = (key(p), key(&points[best]));
        let better = if maximize { candidate > current } else { candidate < current };
        if better {
            best = i;
        }
    }
    best
}

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest, top-right the
/// smallest `y - x` and bottom-left the largest. Near 45° two extremes can
/// land on the same point; such input is returned uncorrected.
///
/// Fails with [`DetectionError::InvalidInputShape`] unless exactly four points are given.
pub fn order_corners(points: &[Point<f32>]) -> Result<CornerSet> {
    if points.len() != 4 {
        return Err(DetectionError::InvalidInputShape {
            count: points.len(),
        });
    }

    let sum = |p: &Point<f32>| p.x + p.y;
    let diff = |p: &Point<f32>| p.y - p.x;

    let top_left = points[extreme_index(points, sum, false)];
    let bottom_right = points[extreme_index(points, sum, true)];
    let top_right = points[extreme_index(points, diff, false)];
    let bottom_left = points[extreme_index(points, diff, true)];

    Ok(CornerSet::from_ordered([top_left, top_right, bottom_right, bottom_left]))
}
