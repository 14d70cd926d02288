//! Grid coordinates, headings and the static walkability map.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A cell on the world grid. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Euclidean distance between cell centers.
    pub fn distance_to(self, other: GridPos) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// True when the two cells share an edge.
    pub fn is_adjacent(self, other: GridPos) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Raw `{x, y}` vector as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
}

/// Which way an entity is looking: one of the four unit vectors, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vector", into = "Vector")]
pub enum Facing {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    pub fn vector(self) -> Vector {
        let (x, y) = match self {
            Facing::None => (0, 0),
            Facing::Up => (0, -1),
            Facing::Down => (0, 1),
            Facing::Left => (-1, 0),
            Facing::Right => (1, 0),
        };
        Vector { x, y }
    }
}

impl TryFrom<Vector> for Facing {
    type Error = DomainError;

    fn try_from(v: Vector) -> Result<Self, Self::Error> {
        match (v.x, v.y) {
            (0, 0) => Ok(Facing::None),
            (0, -1) => Ok(Facing::Up),
            (0, 1) => Ok(Facing::Down),
            (-1, 0) => Ok(Facing::Left),
            (1, 0) => Ok(Facing::Right),
            (x, y) => Err(DomainError::InvalidFacing { x, y }),
        }
    }
}

impl From<Facing> for Vector {
    fn from(value: Facing) -> Self {
        value.vector()
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::None => write!(f, "none"),
            Facing::Up => write!(f, "up"),
            Facing::Down => write!(f, "down"),
            Facing::Left => write!(f, "left"),
            Facing::Right => write!(f, "right"),
        }
    }
}

/// A movement intent; each component is -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Direction {
    dx: i8,
    dy: i8,
}

impl Direction {
    pub const STOP: Direction = Direction { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Result<Self, DomainError> {
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
            return Err(DomainError::InvalidDirection { dx, dy });
        }
        Ok(Self {
            dx: dx as i8,
            dy: dy as i8,
        })
    }

    /// Single-step heading from `from` towards `to` (diagonal when both axes differ).
    pub fn toward(from: GridPos, to: GridPos) -> Self {
        Self {
            dx: (to.x - from.x).signum() as i8,
            dy: (to.y - from.y).signum() as i8,
        }
    }

    pub fn dx(self) -> i8 {
        self.dx
    }

    pub fn dy(self) -> i8 {
        self.dy
    }

    pub fn is_stop(self) -> bool {
        self == Self::STOP
    }
}

/// Largest grid accepted, in cells (2048 x 2048).
pub const MAX_GRID_CELLS: u64 = 1 << 22;

/// Immutable static walkability grid.
///
/// Row-major; `blocked[y * width + x]` marks cells nothing can ever enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMap {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
}

impl GridMap {
    pub fn new(width: u32, height: u32) -> Result<Self, DomainError> {
        let cells = u64::from(width) * u64::from(height);
        if cells == 0 || cells > MAX_GRID_CELLS {
            return Err(DomainError::InvalidGridSize { width, height });
        }
        Ok(Self {
            width,
            height,
            blocked: vec![false; width as usize * height as usize],
        })
    }

    /// Builder: mark the given cells as statically blocked. Out-of-bounds cells are ignored.
    pub fn with_blocked(mut self, cells: impl IntoIterator<Item = GridPos>) -> Self {
        for cell in cells {
            if let Some(index) = self.index(cell) {
                self.blocked[index] = true;
            }
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Statically blocked. Out-of-bounds cells report `true`.
    pub fn is_blocked(&self, pos: GridPos) -> bool {
        self.index(pos).map_or(true, |i| self.blocked[i])
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        !self.is_blocked(pos)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_round_trips_through_wire_vector() {
        let json = serde_json::to_string(&Facing::Left).expect("serialize");
        assert_eq!(json, r#"{"x":-1,"y":0}"#);
        let back: Facing = serde_json::from_str(r#"{"x":0,"y":1}"#).expect("deserialize");
        assert_eq!(back, Facing::Down);
    }

    #[test]
    fn diagonal_facing_is_rejected() {
        let result: Result<Facing, _> = serde_json::from_str(r#"{"x":1,"y":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn direction_components_are_bounded() {
        assert!(Direction::new(1, -1).is_ok());
        assert_eq!(
            Direction::new(2, 0),
            Err(DomainError::InvalidDirection { dx: 2, dy: 0 })
        );
    }

    #[test]
    fn direction_toward_uses_signum() {
        let d = Direction::toward(GridPos::new(5, 5), GridPos::new(9, 5));
        assert_eq!((d.dx(), d.dy()), (1, 0));
        assert!(Direction::toward(GridPos::new(1, 1), GridPos::new(1, 1)).is_stop());
    }

    #[test]
    fn grid_bounds_and_blocking() {
        let grid = GridMap::new(4, 3)
            .expect("grid")
            .with_blocked([GridPos::new(1, 1), GridPos::new(10, 10)]);

        assert_eq!(grid.blocked_count(), 1);
        assert!(grid.is_walkable(GridPos::new(0, 0)));
        assert!(grid.is_blocked(GridPos::new(1, 1)));
        assert!(grid.is_blocked(GridPos::new(4, 0)));
        assert!(grid.is_blocked(GridPos::new(-1, 0)));
        assert!(!grid.in_bounds(GridPos::new(0, 3)));
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        assert!(GridMap::new(0, 5).is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        assert_eq!(
            GridMap::new(4_000_000_000, 4_000_000_000),
            Err(DomainError::InvalidGridSize {
                width: 4_000_000_000,
                height: 4_000_000_000
            })
        );
        assert!(GridMap::new(4_097, 1_024).is_err());
        assert!(GridMap::new(2_048, 2_048).is_ok());
    }

    #[test]
    fn distance_between_cell_centers() {
        assert_eq!(GridPos::new(5, 5).distance_to(GridPos::new(6, 5)), 1.0);
        assert_eq!(GridPos::new(0, 0).distance_to(GridPos::new(3, 4)), 5.0);
    }
}
