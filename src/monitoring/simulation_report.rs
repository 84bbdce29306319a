use crate::shared_data::{current_timestamp, DirectionStats, SimulationReport, VehicleRecord};
use crate::simulation_engine::directions::Direction;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::time::Duration;

/// Builds per-direction wait statistics from the crossings of a run.
pub fn summarize(
    records: &[VehicleRecord],
    safety_violations: usize,
    elapsed: Duration,
) -> SimulationReport {
    let per_direction = Direction::ALL
        .iter()
        .map(|&direction| {
            let waits: Vec<u64> = records
                .iter()
                .filter(|r| r.origin == direction)
                .map(|r| r.wait_micros)
                .collect();
            let mean_wait_micros = if waits.is_empty() {
                0.0
            } else {
                waits.iter().sum::<u64>() as f64 / waits.len() as f64
            };
            DirectionStats {
                direction,
                vehicles: waits.len(),
                mean_wait_micros,
                max_wait_micros: waits.iter().copied().max().unwrap_or(0),
            }
        })
        .collect();

    SimulationReport {
        total_vehicles: records.len(),
        safety_violations,
        elapsed_millis: elapsed.as_millis() as u64,
        per_direction,
        timestamp: current_timestamp(),
    }
}

/// Writes one CSV row per crossing, replacing any existing file.
pub fn write_vehicle_records(path: &str, records: &[VehicleRecord]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &str, report: &SimulationReport) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

/// Prints the report as a small per-direction table.
pub fn print_report(report: &SimulationReport) {
    println!("Simulation Summary:");
    println!(
        "Vehicles: {}  Elapsed: {} ms  Safety violations: {}",
        report.total_vehicles, report.elapsed_millis, report.safety_violations
    );
    println!("{:<8}{:>10}{:>16}{:>16}", "Origin", "Vehicles", "Mean wait (us)", "Max wait (us)");
    for stats in &report.per_direction {
        println!(
            "{:<8}{:>10}{:>16.1}{:>16}",
            stats.direction.to_string(),
            stats.vehicles,
            stats.mean_wait_micros,
            stats.max_wait_micros
        );
    }
}
