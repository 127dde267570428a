use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Seconds between heartbeat events sent to every connected stream client
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_interval_secs: u64,

    /// Seconds a single write to a stream client may take before that client
    /// is disconnected. 0 disables the timeout.
    #[arg(long, env, default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Number of frames buffered per stream client before writes start waiting
    #[arg(long, env, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
    pub stream_channel_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        match self.write_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn stream_channel_capacity(&self) -> usize {
        usize::try_from(self.stream_channel_capacity).unwrap_or(usize::MAX)
    }

    /// Settings for the streaming hub derived from this configuration.
    pub fn stream_settings(&self) -> sse::Settings {
        sse::Settings {
            heartbeat_interval: self.heartbeat_interval(),
            write_timeout: self.write_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["mcp_stream_hub"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert_eq!(
            config.stream_settings(),
            sse::Settings {
                heartbeat_interval: Duration::from_secs(30),
                write_timeout: Some(Duration::from_secs(10)),
            }
        );
        assert_eq!(config.stream_channel_capacity(), 64);
    }

    #[test]
    fn test_zero_write_timeout_disables_timeout() {
        let config = parse(&["--write-timeout-secs", "0"]);
        assert_eq!(config.write_timeout(), None);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--port",
            "8080",
            "--heartbeat-interval-secs",
            "5",
            "--log-level-filter",
            "DEBUG",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }

    #[test]
    fn test_zero_heartbeat_interval_is_rejected() {
        let result =
            Config::try_parse_from(["mcp_stream_hub", "--heartbeat-interval-secs", "0"]);
        assert!(result.is_err());
    }
}
