// simulation_main.rs
use intersection_sync::global_variables::{RECORDS_CSV, SUMMARY_JSON};
use intersection_sync::monitoring::simulation_report::{
    print_report, summarize, write_summary_json, write_vehicle_records,
};
use intersection_sync::simulation_engine::simulation::{run_simulation, SimulationConfig};
use std::error::Error;
use std::process::ExitCode;

async fn run() -> Result<bool, Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_json_file(&path)?,
        None => SimulationConfig::default(),
    };
    let records_csv = config
        .records_csv
        .clone()
        .unwrap_or_else(|| RECORDS_CSV.to_string());
    let summary_json = config
        .summary_json
        .clone()
        .unwrap_or_else(|| SUMMARY_JSON.to_string());

    let outcome = run_simulation(config).await?;
    let report = summarize(&outcome.records, outcome.safety_violations, outcome.elapsed);

    write_vehicle_records(&records_csv, &outcome.records)?;
    write_summary_json(&summary_json, &report)?;
    print_report(&report);
    println!("Records written to {}, summary to {}", records_csv, summary_json);

    Ok(report.safety_violations == 0)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("Simulation finished with safety violations");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Simulation error: {}", e);
            ExitCode::FAILURE
        }
    }
}
