//! Bounded Volume
//!
//! The room every entity lives in. Positions are clamped into the room
//! minus a half-extent margin so blocks never penetrate the walls.

use serde::{Serialize, Deserialize};

use super::vec3::{Axis, Vec3};

/// One of the six walls of the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Wall {
    /// Lower X bound
    MinX,
    /// Upper X bound
    MaxX,
    /// Lower Y bound
    MinY,
    /// Upper Y bound
    MaxY,
    /// Lower Z bound
    MinZ,
    /// Upper Z bound
    MaxZ,
}

impl Wall {
    /// The wall on the low or high side of an axis.
    pub fn of(axis: Axis, high: bool) -> Self {
        match (axis, high) {
            (Axis::X, false) => Wall::MinX,
            (Axis::X, true) => Wall::MaxX,
            (Axis::Y, false) => Wall::MinY,
            (Axis::Y, true) => Wall::MaxY,
            (Axis::Z, false) => Wall::MinZ,
            (Axis::Z, true) => Wall::MaxZ,
        }
    }
}

/// Axis-aligned room bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Default for Room {
    fn default() -> Self {
        Self {
            min: Vec3::new(-10.0, -2.0, -25.0),
            max: Vec3::new(10.0, 10.0, 25.0),
        }
    }
}

impl Room {
    /// Create a room from its two corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Center point of the room.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Clamp a position so a box of `half_extent` stays inside the room.
    ///
    /// If the room is narrower than the box on some axis the position is
    /// pinned to the room's center on that axis.
    pub fn clamp(&self, position: Vec3, half_extent: f32) -> Vec3 {
        let mut out = position;
        for axis in Axis::ALL {
            let lo = self.min.get(axis) + half_extent;
            let hi = self.max.get(axis) - half_extent;
            let value = if lo > hi {
                (self.min.get(axis) + self.max.get(axis)) * 0.5
            } else {
                position.get(axis).clamp(lo, hi)
            };
            out.set(axis, value);
        }
        out
    }

    /// Number of walls a box of `half_extent` at `position` is pressed against.
    pub fn walls_touching(&self, position: Vec3, half_extent: f32) -> usize {
        const EPS: f32 = 1e-4;
        Axis::ALL
            .iter()
            .map(|&axis| {
                let v = position.get(axis);
                let lo = (v - half_extent - self.min.get(axis)).abs() <= EPS;
                let hi = (self.max.get(axis) - (v + half_extent)).abs() <= EPS;
                lo as usize + hi as usize
            })
            .sum()
    }

    /// Which wall along `axis` the point has crossed, if any.
    pub fn crossed_wall(&self, position: Vec3, axis: Axis) -> Option<Wall> {
        let v = position.get(axis);
        if v < self.min.get(axis) {
            Some(Wall::of(axis, false))
        } else if v > self.max.get(axis) {
            Some(Wall::of(axis, true))
        } else {
            None
        }
    }

    /// Check if a point is inside the room (inclusive).
    pub fn contains(&self, position: Vec3) -> bool {
        Axis::ALL.iter().all(|&axis| {
            let v = position.get(axis);
            v >= self.min.get(axis) && v <= self.max.get(axis)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_keeps_box_inside() {
        let room = Room::default();
        let clamped = room.clamp(Vec3::new(100.0, -100.0, 0.0), 0.5);
        assert_eq!(clamped, Vec3::new(9.5, -1.5, 0.0));
    }

    #[test]
    fn test_clamp_narrow_room_pins_to_center() {
        let room = Room::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.6, 10.0, 10.0));
        let clamped = room.clamp(Vec3::new(5.0, 5.0, 5.0), 0.5);
        assert!((clamped.x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_crossed_wall() {
        let room = Room::default();
        assert_eq!(room.crossed_wall(Vec3::new(0.0, 0.0, -26.0), Axis::Z), Some(Wall::MinZ));
        assert_eq!(room.crossed_wall(Vec3::new(0.0, 0.0, 26.0), Axis::Z), Some(Wall::MaxZ));
        assert_eq!(room.crossed_wall(Vec3::new(0.0, 0.0, 0.0), Axis::Z), None);
    }

    #[test]
    fn test_walls_touching() {
        let room = Room::default();
        assert_eq!(room.walls_touching(Vec3::new(0.0, 0.0, 0.0), 0.5), 0);
        assert_eq!(room.walls_touching(Vec3::new(9.5, 0.0, 0.0), 0.5), 1);
        assert_eq!(room.walls_touching(Vec3::new(9.5, -1.5, 24.5), 0.5), 3);
    }
}
