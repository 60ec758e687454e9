use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use desk_gateway::PortalServerConfig;

const SECONDS_PER_HOUR: u64 = 60 * 60;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "desk-portal",
    about = "Office portal server with cached report payloads",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "DESK_BIND",
        default_value = "0.0.0.0:8080",
        help = "Socket address the portal server listens on"
    )]
    pub bind: String,

    #[arg(
        long = "upload-dir",
        env = "DESK_UPLOAD_DIR",
        default_value = "uploads",
        help = "Directory that receives uploaded files"
    )]
    pub upload_dir: PathBuf,

    #[arg(
        long = "report-cache-ttl-hours",
        env = "DESK_REPORT_CACHE_TTL_HOURS",
        default_value_t = 24,
        value_parser = parse_positive_u64,
        help = "Lifetime of report payload cache entries in hours"
    )]
    pub report_cache_ttl_hours: u64,

    #[arg(
        long = "session-ttl-seconds",
        env = "DESK_SESSION_TTL_SECONDS",
        default_value_t = 3_600,
        value_parser = parse_positive_u64,
        help = "Lifetime of login sessions in seconds"
    )]
    pub session_ttl_seconds: u64,

    #[arg(
        long = "max-upload-bytes",
        env = "DESK_MAX_UPLOAD_BYTES",
        default_value_t = 10 * 1024 * 1024,
        value_parser = parse_positive_usize,
        help = "Largest accepted upload in bytes"
    )]
    pub max_upload_bytes: usize,

    #[arg(
        long = "log-level",
        env = "DESK_LOG_LEVEL",
        default_value = "info",
        help = "Default tracing directive when RUST_LOG is unset"
    )]
    pub log_level: String,

    #[arg(
        long = "dry-run-commands",
        env = "DESK_DRY_RUN_COMMANDS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Log report template commands instead of executing them"
    )]
    pub dry_run_commands: bool,
}

impl Cli {
    pub fn into_config(self) -> PortalServerConfig {
        PortalServerConfig {
            bind: self.bind,
            upload_dir: self.upload_dir,
            report_cache_ttl: Duration::from_secs(
                self.report_cache_ttl_hours.saturating_mul(SECONDS_PER_HOUR),
            ),
            session_ttl: Duration::from_secs(self.session_ttl_seconds),
            max_upload_bytes: self.max_upload_bytes,
            dry_run_commands: self.dry_run_commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_positive_u64, Cli};
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn unit_parse_positive_u64_rejects_zero_and_garbage() {
        assert_eq!(parse_positive_u64("24"), Ok(24));
        assert!(parse_positive_u64("0").is_err());
        assert!(parse_positive_u64("-1").is_err());
        assert!(parse_positive_u64("abc").is_err());
    }

    #[test]
    fn functional_defaults_match_portal_server_defaults() {
        let config = Cli::parse_from(["desk-portal"]).into_config();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.report_cache_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.session_ttl, Duration::from_secs(3_600));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(!config.dry_run_commands);
    }

    #[test]
    fn functional_flags_override_defaults() {
        let cli = Cli::parse_from([
            "desk-portal",
            "--bind",
            "127.0.0.1:9000",
            "--upload-dir",
            "/tmp/desk",
            "--report-cache-ttl-hours",
            "2",
            "--session-ttl-seconds",
            "90",
            "--dry-run-commands",
        ]);
        let config = cli.into_config();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/desk"));
        assert_eq!(config.report_cache_ttl, Duration::from_secs(7_200));
        assert_eq!(config.session_ttl, Duration::from_secs(90));
        assert!(config.dry_run_commands);
    }

    #[test]
    fn regression_zero_ttl_is_rejected() {
        assert!(Cli::try_parse_from(["desk-portal", "--report-cache-ttl-hours", "0"]).is_err());
        assert!(Cli::try_parse_from(["desk-portal", "--session-ttl-seconds=0"]).is_err());
    }
}
