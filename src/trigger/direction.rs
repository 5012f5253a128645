//! Trigger directions

use serde::{Deserialize, Serialize};

/// Angle tolerance for left, up, right and down. Diagonals get the rest.
const ANGLE_TOLERANCE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
    LeftRight,
    UpDown,
    LeftUpRightDown,
    LeftDownRightUp,
    Any,
}

impl SwipeDirection {
    /// `(min angle, max angle, bidirectional)`
    pub fn angles(self) -> (f64, f64, bool) {
        use SwipeDirection::*;
        const T: f64 = ANGLE_TOLERANCE;
        match self {
            Left => (180.0 - T, 180.0 + T, false),
            Right => (360.0 - T, T, false),
            Up => (90.0 - T, 90.0 + T, false),
            Down => (270.0 - T, 270.0 + T, false),
            LeftUp => (90.0 + T, 180.0 - T, false),
            LeftDown => (180.0 + T, 270.0 - T, false),
            RightUp => (T, 90.0 - T, false),
            RightDown => (270.0 + T, 360.0 - T, false),
            LeftRight => (360.0 - T, T, true),
            UpDown => (270.0 - T, 270.0 + T, true),
            LeftUpRightDown => (270.0 + T, 360.0 - T, true),
            LeftDownRightUp => (T, 90.0 - T, true),
            Any => (0.0, 360.0, false),
        }
    }
}

/// Angular window in degrees. Wraps around 0 when `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub bidirectional: bool,
}

impl AngleRange {
    pub const fn new(min: f64, max: f64, bidirectional: bool) -> Self {
        Self {
            min,
            max,
            bidirectional,
        }
    }

    pub fn matches(&self, angle: f64) -> bool {
        in_window(angle, self.min, self.max)
    }

    /// The same window rotated by 180°
    pub fn matches_opposite(&self, angle: f64) -> bool {
        let flip = |a: f64| if a - 180.0 < 0.0 { a + 180.0 } else { a - 180.0 };
        in_window(angle, flip(self.min), flip(self.max))
    }

    /// Whether the angle fits this window or, for bidirectional windows, the opposite one
    pub fn accepts(&self, angle: f64) -> bool {
        self.matches(angle) || (self.bidirectional && self.matches_opposite(angle))
    }
}

impl From<SwipeDirection> for AngleRange {
    fn from(direction: SwipeDirection) -> Self {
        let (min, max, bidirectional) = direction.angles();
        Self::new(min, max, bidirectional)
    }
}

fn in_window(angle: f64, min: f64, max: f64) -> bool {
    if min <= max {
        angle >= min && angle <= max
    } else {
        angle >= min || angle <= max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinchDirection {
    In,
    Out,
    Any,
}

impl PinchDirection {
    pub fn accepts(self, other: PinchDirection) -> bool {
        self == PinchDirection::Any || self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateDirection {
    Clockwise,
    Counterclockwise,
    Any,
}

impl RotateDirection {
    pub fn accepts(self, other: RotateDirection) -> bool {
        self == RotateDirection::Any || self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelDirection {
    Left,
    Right,
    Up,
    Down,
    Any,
}

impl WheelDirection {
    pub fn accepts(self, other: WheelDirection) -> bool {
        self == WheelDirection::Any || self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_window() {
        let right = AngleRange::from(SwipeDirection::Right);
        assert!(right.matches(350.0));
        assert!(right.matches(10.0));
        assert!(!right.matches(180.0));
        assert!(right.matches_opposite(180.0));
    }

    #[test]
    fn test_bidirectional_accepts_opposite() {
        let up_down = AngleRange::from(SwipeDirection::UpDown);
        assert!(up_down.accepts(270.0));
        assert!(up_down.accepts(90.0));
        assert!(!up_down.accepts(0.0));

        let down = AngleRange::from(SwipeDirection::Down);
        assert!(!down.accepts(90.0));
    }

    #[test]
    fn test_any_matches_everything() {
        let any = AngleRange::from(SwipeDirection::Any);
        for angle in [0.0, 90.0, 180.0, 359.9] {
            assert!(any.matches(angle));
        }
    }
}
