// simulation_engine/mod.rs
pub mod directions;
pub mod intersection;
pub mod simulation;
pub mod vehicles;
