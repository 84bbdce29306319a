// simulation.rs
use crate::global_variables::{
    DEFAULT_CONCURRENT_VEHICLES, DEFAULT_CROSSING_TIME_MS, DEFAULT_ITERATIONS_PER_VEHICLE,
    DEFAULT_MAX_ARRIVAL_DELAY_MS, DEFAULT_ORIGIN_WEIGHTS,
};
use crate::shared_data::{current_timestamp, VehicleRecord};
use crate::simulation_engine::directions::Direction;
use crate::simulation_engine::intersection::{IntersectionManager, Occupancy};
use crate::simulation_engine::vehicles::Vehicle;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::task;

/// Parameters of a simulation run. Missing fields in a JSON file fall back
/// to the defaults in `global_variables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of vehicle threads running at once.
    pub concurrent_vehicles: usize,
    /// Crossings made by each vehicle thread.
    pub iterations_per_vehicle: usize,
    /// Upper bound of the random pause before each arrival.
    pub max_arrival_delay_ms: u64,
    /// Time a vehicle spends inside the intersection.
    pub crossing_time_ms: u64,
    /// Seed for reproducible arrival patterns; random when absent.
    pub seed: Option<u64>,
    /// Relative arrival weights, North, South, East, West.
    pub origin_weights: [u32; 4],
    pub records_csv: Option<String>,
    pub summary_json: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            concurrent_vehicles: DEFAULT_CONCURRENT_VEHICLES,
            iterations_per_vehicle: DEFAULT_ITERATIONS_PER_VEHICLE,
            max_arrival_delay_ms: DEFAULT_MAX_ARRIVAL_DELAY_MS,
            crossing_time_ms: DEFAULT_CROSSING_TIME_MS,
            seed: None,
            origin_weights: DEFAULT_ORIGIN_WEIGHTS,
            records_csv: None,
            summary_json: None,
        }
    }
}

impl SimulationConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn from_json_file(path: &str) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path)?;
        let config: SimulationConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.concurrent_vehicles == 0 {
            return Err("concurrent_vehicles must be at least 1".into());
        }
        if self.iterations_per_vehicle == 0 {
            return Err("iterations_per_vehicle must be at least 1".into());
        }
        if self.origin_weights.iter().all(|w| *w == 0) {
            return Err("origin_weights must give at least one direction a non-zero weight".into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    inside: Occupancy,
    violations: usize,
}

/// Independent record of who is inside, used to catch unsafe admissions.
///
/// Vehicles register only after `before_entry` returns and deregister before
/// calling `after_exit`, so the monitor never sees more than the manager
/// actually admitted.
#[derive(Debug, Default)]
pub struct SafetyMonitor {
    state: Mutex<MonitorState>,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, vehicle: Vehicle) {
        let mut state = self.state.lock().expect("safety monitor mutex poisoned");
        if !state.inside.admits(&vehicle) {
            state.violations += 1;
            log::error!(
                "Safety violation: {} -> {} admitted alongside {:?}",
                vehicle.origin,
                vehicle.destination,
                state.inside.vehicles()
            );
        }
        state.inside.insert(vehicle);
    }

    pub fn leave(&self, vehicle: &Vehicle) {
        let mut state = self.state.lock().expect("safety monitor mutex poisoned");
        state.inside.remove_first(vehicle);
    }

    pub fn violations(&self) -> usize {
        self.state.lock().expect("safety monitor mutex poisoned").violations
    }
}

/// Result of a finished run.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub records: Vec<VehicleRecord>,
    pub safety_violations: usize,
    pub elapsed: Duration,
}

/// Picks an origin with probability proportional to its weight.
fn pick_origin(rng: &mut StdRng, weights: &[u32; 4]) -> Direction {
    let total: u32 = weights.iter().sum();
    let mut roll = rng.random_range(0..total);
    for direction in Direction::ALL {
        let weight = weights[direction.index()];
        if roll < weight {
            return direction;
        }
        roll -= weight;
    }
    Direction::West
}

fn pick_destination(rng: &mut StdRng, origin: Direction) -> Direction {
    let exits: Vec<Direction> = origin.exits().collect();
    exits[rng.random_range(0..exits.len())]
}

/// Body of one vehicle thread: repeatedly arrive, cross and leave.
fn drive_vehicle(
    id: usize,
    config: &SimulationConfig,
    manager: &IntersectionManager,
    monitor: &SafetyMonitor,
) -> Vec<VehicleRecord> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
        None => StdRng::from_os_rng(),
    };
    let mut records = Vec::with_capacity(config.iterations_per_vehicle);

    for iteration in 0..config.iterations_per_vehicle {
        if config.max_arrival_delay_ms > 0 {
            let delay = rng.random_range(0..=config.max_arrival_delay_ms);
            thread::sleep(Duration::from_millis(delay));
        }

        let origin = pick_origin(&mut rng, &config.origin_weights);
        let destination = pick_destination(&mut rng, origin);
        let vehicle = Vehicle::new(origin, destination);

        let arrived = Instant::now();
        manager.before_entry(origin, destination);
        let waited = arrived.elapsed();
        let admitted_at = current_timestamp();

        monitor.enter(vehicle);
        if config.crossing_time_ms > 0 {
            thread::sleep(Duration::from_millis(config.crossing_time_ms));
        }
        monitor.leave(&vehicle);
        manager.after_exit(origin, destination);

        log::debug!(
            "Vehicle {} crossing {}: {} -> {} after waiting {:?}",
            id,
            iteration,
            origin,
            destination,
            waited
        );
        records.push(VehicleRecord {
            vehicle_thread: id,
            iteration,
            origin,
            destination,
            maneuver: vehicle.maneuver(),
            wait_micros: waited.as_micros() as u64,
            admitted_at,
        });
    }

    records
}

/// Runs every vehicle thread to completion against one intersection.
///
/// Vehicle threads block on condition variables, so each one runs as a
/// blocking task rather than on the async workers.
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationOutcome, Box<dyn Error>> {
    config.validate()?;
    log::info!(
        "Starting simulation: {} vehicles x {} crossings",
        config.concurrent_vehicles,
        config.iterations_per_vehicle
    );

    let config = Arc::new(config);
    let manager = Arc::new(IntersectionManager::initialize());
    let monitor = Arc::new(SafetyMonitor::new());
    let started = Instant::now();

    let mut handles = Vec::with_capacity(config.concurrent_vehicles);
    for id in 0..config.concurrent_vehicles {
        let config = Arc::clone(&config);
        let manager = Arc::clone(&manager);
        let monitor = Arc::clone(&monitor);
        handles.push(task::spawn_blocking(move || {
            drive_vehicle(id, &config, &manager, &monitor)
        }));
    }

    let mut records = Vec::with_capacity(config.concurrent_vehicles * config.iterations_per_vehicle);
    for handle in handles {
        records.extend(handle.await?);
    }
    let elapsed = started.elapsed();

    let manager = Arc::try_unwrap(manager)
        .map_err(|_| "intersection manager still shared after all vehicles finished")?;
    manager.cleanup();

    let safety_violations = monitor.violations();
    log::info!(
        "Simulation finished: {} crossings in {:?}, {} safety violations",
        records.len(),
        elapsed,
        safety_violations
    );

    Ok(SimulationOutcome {
        records,
        safety_violations,
        elapsed,
    })
}
