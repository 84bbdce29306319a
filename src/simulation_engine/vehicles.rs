use crate::simulation_engine::directions::Direction;
use serde::{Deserialize, Serialize};

/// The path a vehicle takes through the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Maneuver {
    Straight,
    Left,
    Right,
}

/// A vehicle as seen by the intersection: where it comes from and where it goes.
///
/// Two vehicles with the same origin and destination are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vehicle {
    pub origin: Direction,
    pub destination: Direction,
}

impl Vehicle {
    pub fn new(origin: Direction, destination: Direction) -> Self {
        debug_assert_ne!(origin, destination, "a vehicle cannot exit where it entered");
        Self {
            origin,
            destination,
        }
    }

    /// Right turns are exactly West->South, South->East, East->North and North->West.
    pub fn is_right_turn(&self) -> bool {
        matches!(
            (self.origin, self.destination),
            (Direction::West, Direction::South)
                | (Direction::South, Direction::East)
                | (Direction::East, Direction::North)
                | (Direction::North, Direction::West)
        )
    }

    pub fn maneuver(&self) -> Maneuver {
        if self.destination == self.origin.opposite() {
            Maneuver::Straight
        } else if self.is_right_turn() {
            Maneuver::Right
        } else {
            Maneuver::Left
        }
    }

    /// Every legal vehicle (12 origin/destination pairs).
    pub fn all() -> impl Iterator<Item = Vehicle> {
        Direction::ALL
            .into_iter()
            .flat_map(|origin| origin.exits().map(move |destination| Vehicle::new(origin, destination)))
    }
}

/// Returns true if `a` and `b` may be inside the intersection at the same time.
///
/// Vehicles may share the intersection when:
/// 1. they arrive from the same direction,
/// 2. one travels from the other's destination back to its origin, or
/// 3. they are heading to different destinations and at least one of them
///    is turning right.
///
/// Any other pair has crossing paths.
pub fn may_coexist(a: &Vehicle, b: &Vehicle) -> bool {
    a.origin == b.origin
        || (a.origin == b.destination && a.destination == b.origin)
        || (a.destination != b.destination && (a.is_right_turn() || b.is_right_turn()))
}
