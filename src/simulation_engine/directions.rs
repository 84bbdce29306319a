use serde::{Deserialize, Serialize};
use std::fmt;

/// A compass direction: the lane a vehicle arrives from or the lane it leaves by.
///
/// The declaration order (North, South, East, West) is significant. It is
/// the order used to index per-direction tables and to break ties when
/// choosing which direction to wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All directions in enumeration order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Position of this direction in [`Direction::ALL`].
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// The direction on the far side of the intersection.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The three directions a vehicle arriving from `self` may leave by.
    pub fn exits(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| *d != self)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        };
        f.write_str(name)
    }
}
