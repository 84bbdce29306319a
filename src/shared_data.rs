// src/shared_data.rs

use crate::simulation_engine::directions::Direction;
use crate::simulation_engine::vehicles::Maneuver;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One crossing made by a vehicle thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_thread: usize,
    pub iteration: usize,
    pub origin: Direction,
    pub destination: Direction,
    pub maneuver: Maneuver,
    /// Time spent inside `before_entry`, in microseconds.
    pub wait_micros: u64,
    /// Milliseconds since the Unix epoch at which the vehicle was admitted.
    pub admitted_at: u64,
}

/// Wait statistics for vehicles arriving from one direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionStats {
    pub direction: Direction,
    pub vehicles: usize,
    pub mean_wait_micros: f64,
    pub max_wait_micros: u64,
}

/// Summary of a whole simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub total_vehicles: usize,
    pub safety_violations: usize,
    pub elapsed_millis: u64,
    pub per_direction: Vec<DirectionStats>,
    pub timestamp: u64,
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
