//! Drawn strokes and their comparison
//!
//! A stroke is stored as a fixed number of points, evenly spaced along the
//! drawn path, centered on their centroid and scaled so that the larger side
//! of the bounding box is 1. Two strokes are compared point by point.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Points per normalized stroke
pub const STROKE_POINTS: usize = 32;

/// Lowest score at which two strokes are considered the same
pub const MIN_MATCHING_SCORE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    /// Build a stroke from an absolute point path
    pub fn from_path(path: &[Point]) -> Self {
        Self {
            points: normalize(&resample(path, STROKE_POINTS)),
        }
    }

    /// Build a stroke from consecutive motion deltas
    pub fn from_deltas(deltas: &[Point]) -> Self {
        let mut position = Point::default();
        let mut path = Vec::with_capacity(deltas.len() + 1);
        path.push(position);
        for delta in deltas {
            position += *delta;
            path.push(position);
        }
        Self::from_path(&path)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Similarity in `[0, 1]`, 1 meaning identical
    pub fn compare(&self, other: &Stroke) -> f64 {
        if self.points.is_empty() || self.points.len() != other.points.len() {
            return 0.0;
        }
        let total: f64 = self
            .points
            .iter()
            .zip(&other.points)
            .map(|(a, b)| a.distance(*b))
            .sum();
        // a mean distance of 0.5 (half the normalized size) scores 0
        let mean = total / self.points.len() as f64;
        (1.0 - 2.0 * mean).clamp(0.0, 1.0)
    }

    pub fn matches(&self, other: &Stroke) -> bool {
        self.compare(other) >= MIN_MATCHING_SCORE
    }
}

fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|w| w[0].distance(w[1])).sum()
}

fn resample(path: &[Point], count: usize) -> Vec<Point> {
    let Some(first) = path.first().copied() else {
        return Vec::new();
    };
    let length = path_length(path);
    if length == 0.0 {
        return vec![first; count];
    }

    let step = length / (count - 1) as f64;
    let mut result = vec![first];
    let mut carried = 0.0;
    let mut previous = first;
    for &point in &path[1..] {
        let mut segment = previous.distance(point);
        while carried + segment >= step && result.len() < count {
            let t = (step - carried) / segment;
            let sample = previous + (point - previous) * t;
            result.push(sample);
            segment = sample.distance(point);
            previous = sample;
            carried = 0.0;
        }
        carried += segment;
        previous = point;
    }
    while result.len() < count {
        result.push(*path.last().unwrap_or(&first));
    }
    result
}

fn normalize(points: &[Point]) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let centroid = points.iter().fold(Point::default(), |acc, p| acc + *p) / points.len() as f64;

    let (mut min, mut max) = (points[0], points[0]);
    for p in points {
        min = Point::new(min.x.min(p.x), min.y.min(p.y));
        max = Point::new(max.x.max(p.x), max.y.max(p.y));
    }
    let size = (max.x - min.x).max(max.y - min.y);
    let scale = if size == 0.0 { 1.0 } else { size };
    points.iter().map(|p| (*p - centroid) / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(dx: f64, dy: f64, steps: usize) -> Vec<Point> {
        vec![Point::new(dx, dy); steps]
    }

    #[test]
    fn test_resample_count() {
        let stroke = Stroke::from_deltas(&line(3.0, 0.0, 7));
        assert_eq!(stroke.points().len(), STROKE_POINTS);
    }

    #[test]
    fn test_same_shape_different_scale_matches() {
        let small = Stroke::from_deltas(&line(1.0, 1.0, 10));
        let large = Stroke::from_deltas(&line(5.0, 5.0, 40));
        assert!(small.compare(&large) > 0.99);
        assert!(small.matches(&large));
    }

    #[test]
    fn test_opposite_directions_do_not_match() {
        let right = Stroke::from_deltas(&line(1.0, 0.0, 10));
        let left = Stroke::from_deltas(&line(-1.0, 0.0, 10));
        assert!(!right.matches(&left));
    }

    #[test]
    fn test_l_shape_differs_from_line() {
        let mut l_shape = line(0.0, 1.0, 10);
        l_shape.extend(line(1.0, 0.0, 10));
        let down = Stroke::from_deltas(&line(0.0, 1.0, 20));
        assert!(!Stroke::from_deltas(&l_shape).matches(&down));
    }
}
