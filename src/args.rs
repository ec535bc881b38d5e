use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-axis gimbal stabilizer running against simulated hardware", long_about = None)]
pub struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config/system_config.toml")]
    pub config: PathBuf,

    /// How long to run before printing the report (seconds)
    #[arg(short, long, default_value_t = 10)]
    pub duration_secs: u64,

    /// Seed for the simulated IMU noise
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fail on a missing or invalid config instead of using defaults
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Exit with an error on a fatal boot fault instead of halting
    #[arg(long, default_value_t = false)]
    pub no_halt: bool,
}
