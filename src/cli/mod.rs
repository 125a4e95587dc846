use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    #[arg(short, long, default_value_t = String::from("/etc/action-supervisor/config.yml"))]
    config: String,
}

impl Cli {
    /// Parses command line arguments
    pub fn init() -> Self {
        Self::parse()
    }

    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(&self.config)
    }
}
