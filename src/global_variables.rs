// Default simulation parameters
pub const DEFAULT_CONCURRENT_VEHICLES: usize = 10;
pub const DEFAULT_ITERATIONS_PER_VEHICLE: usize = 20;
pub const DEFAULT_MAX_ARRIVAL_DELAY_MS: u64 = 5;
pub const DEFAULT_CROSSING_TIME_MS: u64 = 2;

// Relative arrival weights, indexed North, South, East, West
pub const DEFAULT_ORIGIN_WEIGHTS: [u32; 4] = [1, 1, 1, 1];

// Output files
pub const RECORDS_CSV: &str = "vehicle_records.csv";
pub const SUMMARY_JSON: &str = "simulation_summary.json";
