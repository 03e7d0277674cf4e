use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "groupcheckd",
    version,
    about = "Minimal PolicyKit authority answering from OS group membership"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/groupcheck/config.yaml")]
    pub config: PathBuf,

    /// Policy file or directory (overrides config file setting)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Unix socket to listen on (overrides config file setting)
    #[arg(long)]
    pub socket: Option<PathBuf>,
}
