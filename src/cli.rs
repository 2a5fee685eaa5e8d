//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::units::{parse_interval, parse_rate, parse_size};
use crate::config::PipeConfig;

/// Pipe standard input to an HTTP collector as paced POST requests.
#[derive(Debug, Default, Parser)]
#[command(name = "http-pipe", disable_version_flag = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Print program version and exit
    #[arg(short = 'v', long = "version")]
    pub show_version: bool,

    /// Close the connection after every transaction
    #[arg(short = 'S', long = "short")]
    pub short_transaction: bool,

    /// Pipe destination URL
    #[arg(short = 'd', long, value_name = "DEST")]
    pub destination: Option<String>,

    /// zlib compression level (1-9, 0 disables)
    #[arg(short = 'c', long = "compress", value_name = "LEVEL")]
    pub compression_level: Option<u32>,

    /// Buffer size, with optional k/m suffix (default 1m)
    #[arg(short = 's', long = "buffer-size", value_name = "BUFSIZ", value_parser = parse_size)]
    pub buffer_size: Option<usize>,

    /// Transfer rate in bits per second, with optional k/m suffix (default 100k)
    #[arg(short = 'r', long, value_name = "RATE", value_parser = parse_rate)]
    pub rate: Option<u64>,

    /// Failed connect attempts before a transaction is abandoned (default 3)
    #[arg(short = 'n', long = "retries", value_name = "TRY")]
    pub connect_retry: Option<u32>,

    /// Admission interval, with optional s/m/h suffix (default 5m)
    #[arg(short = 'i', long, value_name = "INTERVAL", value_parser = parse_interval)]
    pub interval: Option<u64>,

    /// Transactions per interval when idle (default 1)
    #[arg(short = 'l', long = "idle-limit", value_name = "LIMIT")]
    pub idle_limit: Option<u32>,

    /// Transactions per interval when busy (default 3)
    #[arg(short = 'L', long = "busy-limit", value_name = "LIMIT")]
    pub busy_limit: Option<u32>,

    /// TOML configuration file; flags override its values
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Device identifier sent with every request
    #[arg(long = "device-id", value_name = "ID")]
    pub device_id: Option<String>,
}

impl Cli {
    /// Overlay every flag that was given onto `config`.
    pub fn apply(&self, config: &mut PipeConfig) {
        if self.verbose {
            config.observability.verbose = true;
        }
        if self.short_transaction {
            config.connection.persistent = false;
        }
        if let Some(destination) = &self.destination {
            config.destination = destination.clone();
        }
        if let Some(level) = self.compression_level {
            config.compression.level = level;
        }
        if let Some(size) = self.buffer_size {
            config.buffer.capacity = size;
        }
        if let Some(rate) = self.rate {
            config.transfer.rate = rate;
        }
        if let Some(retries) = self.connect_retry {
            config.retries.max_attempts = retries;
        }
        if let Some(interval) = self.interval {
            config.admission.interval_secs = interval;
        }
        if let Some(limit) = self.idle_limit {
            config.admission.idle_limit = limit;
        }
        if let Some(limit) = self.busy_limit {
            config.admission.busy_limit = limit;
        }
        if let Some(device_id) = &self.device_id {
            config.device_id = Some(device_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "http-pipe", "-V", "-S", "-d", "http://collector/in", "-c", "6", "-s", "64k", "-r",
            "1m", "-n", "5", "-i", "2m", "-l", "2", "-L", "4",
        ])
        .unwrap();

        let mut config = PipeConfig::default();
        cli.apply(&mut config);

        assert!(config.observability.verbose);
        assert!(!config.connection.persistent);
        assert_eq!(config.destination, "http://collector/in");
        assert_eq!(config.compression.level, 6);
        assert_eq!(config.buffer.capacity, 64 * 1024);
        assert_eq!(config.transfer.rate, 125_000);
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.admission.interval_secs, 120);
        assert_eq!(config.admission.idle_limit, 2);
        assert_eq!(config.admission.busy_limit, 4);
    }

    #[test]
    fn lowercase_v_is_version_not_verbose() {
        let cli = Cli::try_parse_from(["http-pipe", "-v"]).unwrap();
        assert!(cli.show_version);
        assert!(!cli.verbose);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let cli = Cli::try_parse_from(["http-pipe"]).unwrap();
        let mut config = PipeConfig {
            destination: "http://from-file/".into(),
            ..PipeConfig::default()
        };
        config.transfer.rate = 0;
        cli.apply(&mut config);

        assert_eq!(config.destination, "http://from-file/");
        assert_eq!(config.transfer.rate, 0);
        assert!(config.connection.persistent);
    }

    #[test]
    fn bad_units_are_rejected() {
        assert!(Cli::try_parse_from(["http-pipe", "-s", "12q"]).is_err());
        assert!(Cli::try_parse_from(["http-pipe", "-i", "5d"]).is_err());
    }
}
