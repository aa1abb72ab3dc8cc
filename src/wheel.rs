//! Wheel geometry: pointer position to angle, angle to photo index.
//!
//! Angles are degrees in `[0, 360)`, measured with `atan2` in screen
//! coordinates (y grows downwards, so positive angles run clockwise).

use rand::Rng;

pub const FULL_TURN: f64 = 360.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fold any finite angle into `[0, 360)`. Non-finite input maps to 0.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= FULL_TURN {
        0.0
    } else {
        wrapped
    }
}

/// Angle of the vector from `center` to `pointer`.
pub fn angle_from_drag(pointer: Point, center: Point) -> f64 {
    let radians = (pointer.y - center.y).atan2(pointer.x - center.x);
    let mut angle = radians.to_degrees();
    if angle < 0.0 {
        angle += FULL_TURN;
    }
    normalize_angle(angle)
}

/// Index of the equal-width section of the circle containing `angle`.
///
/// Returns `None` only when there are no sections.
pub fn index_from_angle(angle: f64, buckets: usize) -> Option<usize> {
    if buckets == 0 {
        return None;
    }
    let section = FULL_TURN / buckets as f64;
    let index = (normalize_angle(angle) / section).floor() as usize;
    Some(index.min(buckets - 1))
}

/// Uniformly random angle for a spin.
pub fn random_angle<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0.0..FULL_TURN)
}

/// The wheel's current position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Wheel {
    angle: f64,
}

impl Wheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Fraction of a full turn, for drawing the wheel's arc.
    pub fn progress(&self) -> f64 {
        self.angle / FULL_TURN
    }

    pub fn set_angle(&mut self, angle: f64) -> f64 {
        self.angle = normalize_angle(angle);
        self.angle
    }

    pub fn spin<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.set_angle(random_angle(rng))
    }

    pub fn drag(&mut self, pointer: Point, center: Point) -> f64 {
        self.set_angle(angle_from_drag(pointer, center))
    }

    pub fn index(&self, buckets: usize) -> Option<usize> {
        index_from_angle(self.angle, buckets)
    }

    /// The item under the wheel's current position. The circle is split
    /// into as many sections as there are items.
    pub fn select<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).and_then(|i| items.get(i))
    }
}
