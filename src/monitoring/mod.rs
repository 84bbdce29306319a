pub mod simulation_report;
