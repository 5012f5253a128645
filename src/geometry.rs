//! Points and motion deltas

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A 2D point or vector in device or logical units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_null(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn hypot(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Angle in degrees in `[0, 360)`, measured counterclockwise with the
    /// y axis pointing down (screen coordinates), so that upward motion is 90°.
    pub fn angle(&self) -> f64 {
        let angle = (-self.y).atan2(self.x).to_degrees();
        if angle < 0.0 {
            angle + 360.0
        } else {
            angle
        }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).hypot()
    }

    /// Component-wise division, used to turn device units into fractions of the device size
    pub fn scale_down(&self, size: Point) -> Point {
        Point::new(
            if size.x == 0.0 { 0.0 } else { self.x / size.x },
            if size.y == 0.0 { 0.0 } else { self.y / size.y },
        )
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Point;

    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// A scalar delta with and without pointer acceleration applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Delta {
    pub accelerated: f64,
    pub unaccelerated: f64,
}

impl Delta {
    pub const fn new(accelerated: f64, unaccelerated: f64) -> Self {
        Self {
            accelerated,
            unaccelerated,
        }
    }

    pub fn negated(self) -> Self {
        Self::new(-self.accelerated, -self.unaccelerated)
    }
}

impl From<f64> for Delta {
    fn from(delta: f64) -> Self {
        Self::new(delta, delta)
    }
}

/// A 2D delta with and without pointer acceleration applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointDelta {
    pub accelerated: Point,
    pub unaccelerated: Point,
}

impl PointDelta {
    pub const fn new(accelerated: Point, unaccelerated: Point) -> Self {
        Self {
            accelerated,
            unaccelerated,
        }
    }

    pub fn is_null(&self) -> bool {
        self.accelerated.is_null() && self.unaccelerated.is_null()
    }

    pub fn accelerated_hypot(&self) -> f64 {
        self.accelerated.hypot()
    }

    pub fn unaccelerated_hypot(&self) -> f64 {
        self.unaccelerated.hypot()
    }
}

impl From<Point> for PointDelta {
    fn from(delta: Point) -> Self {
        Self::new(delta, delta)
    }
}

impl Add for PointDelta {
    type Output = PointDelta;

    fn add(self, rhs: PointDelta) -> PointDelta {
        PointDelta::new(
            self.accelerated + rhs.accelerated,
            self.unaccelerated + rhs.unaccelerated,
        )
    }
}

impl Mul<f64> for PointDelta {
    type Output = PointDelta;

    fn mul(self, rhs: f64) -> PointDelta {
        PointDelta::new(self.accelerated * rhs, self.unaccelerated * rhs)
    }
}

/// Inclusive range, unbounded on any side left unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Range {
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub const fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub const fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_screen_coordinates() {
        assert!((Point::new(1.0, 0.0).angle() - 0.0).abs() < 1e-9);
        assert!((Point::new(0.0, -1.0).angle() - 90.0).abs() < 1e-9);
        assert!((Point::new(-1.0, 0.0).angle() - 180.0).abs() < 1e-9);
        assert!((Point::new(0.0, 1.0).angle() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_unbounded_sides() {
        assert!(Range::at_least(5.0).contains(1e9));
        assert!(!Range::at_least(5.0).contains(4.9));
        assert!(Range::between(1.0, 2.0).contains(2.0));
        assert!(!Range::between(1.0, 2.0).contains(2.1));
        assert!(Range::default().contains(-1.0));
    }

    #[test]
    fn test_scale_down_handles_zero_size() {
        let p = Point::new(50.0, 25.0).scale_down(Point::new(100.0, 0.0));
        assert_eq!(p, Point::new(0.5, 0.0));
    }
}
