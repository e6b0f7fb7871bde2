//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// Per-user admission-control scheduler for rate-limited API calls
#[derive(Parser, Debug)]
#[command(
    name = "sd",
    about = "Per-user admission-control scheduler for rate-limited API calls",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/scheduler/logs/scheduler.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long, help = "Print the effective configuration as YAML and exit")]
    pub dump: bool,

    /// Intake socket path, overrides the config file
    #[arg(value_name = "PATH", help = "Intake socket path [default: /tmp/scheduler.sock]")]
    pub path: Option<PathBuf>,
}

/// Location of the daemon log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scheduler")
        .join("logs")
        .join("scheduler.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["sd"]);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(!cli.dump);
        assert!(cli.path.is_none());
    }

    #[test]
    fn test_cli_parse_path_and_flags() {
        let cli = Cli::parse_from(["sd", "-v", "--dump", "/run/sd.sock"]);
        assert!(cli.verbose);
        assert!(cli.dump);
        assert_eq!(cli.path, Some(PathBuf::from("/run/sd.sock")));
    }

    #[test]
    fn test_cli_parse_config() {
        let cli = Cli::parse_from(["sd", "-c", "custom.yml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yml")));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["sd", "--bogus"]).is_err());
    }

    #[test]
    fn test_log_path_ends_with_scheduler_log() {
        assert!(get_log_path().ends_with("scheduler/logs/scheduler.log"));
    }
}
