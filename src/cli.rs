//! Command-line surface: flags, and the post-parse validation that turns
//! "a parseable combination of flags" into "a runnable configuration".

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;
use crate::geometry::Geometry;

/// Which coherence protocol to run. `Msi` parses fine but is rejected in
/// `Args::validate`, so the CLI can tell "not implemented" apart from "not
/// a recognized value".
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Protocol {
    Mesi,
    Msi,
}

/// Trace-driven simulator of a shared, inclusive MESI last-level cache.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Trace file to read commands from.
    #[arg(short = 'f', long = "file", default_value = "data/trace.txt")]
    pub file: PathBuf,

    /// Cache capacity, in mebibytes.
    #[arg(long = "capacity", default_value_t = 16)]
    pub capacity_mib: u64,

    /// Line size, in bytes.
    #[arg(long = "line_size", default_value_t = 64)]
    pub line_size: u64,

    /// Associativity, in ways.
    #[arg(long = "associativity", default_value_t = 16)]
    pub associativity: u64,

    /// Coherence protocol. Only MESI is implemented.
    #[arg(long = "protocol", value_enum, default_value_t = Protocol::Mesi)]
    pub protocol: Protocol,

    /// Suppress bus/message traffic on the verbose stream.
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Emit per-command entry/exit traces in addition to normal output.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

/// A validated configuration, derived from [`Args`]: the geometry it
/// describes is known to be legal and its verbosity flags are unambiguous.
pub struct Config {
    pub file: PathBuf,
    pub geometry: Geometry,
    pub silent: bool,
    pub debug: bool,
}

impl Args {
    /// Validate this set of flags, producing a runnable [`Config`] or the
    /// `ConfigError` that explains why the combination is rejected.
    pub fn validate(&self) -> Result<Config, ConfigError> {
        if self.silent && self.debug {
            return Err(ConfigError::ConflictingVerbosity);
        }
        if self.protocol == Protocol::Msi {
            return Err(ConfigError::ProtocolNotImplemented);
        }

        let capacity_bytes = self.capacity_mib * 1024 * 1024;
        let geometry = Geometry::new(capacity_bytes, self.line_size, self.associativity)?;

        Ok(Config {
            file: self.file.clone(),
            geometry,
            silent: self.silent,
            debug: self.debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            file: PathBuf::from("data/trace.txt"),
            capacity_mib: 16,
            line_size: 64,
            associativity: 16,
            protocol: Protocol::Mesi,
            silent: false,
            debug: false,
        }
    }

    #[test]
    fn default_args_validate_successfully() {
        let cfg = base_args().validate().unwrap();
        assert_eq!(cfg.geometry.num_sets, 16384);
    }

    #[test]
    fn silent_and_debug_together_is_rejected() {
        let mut args = base_args();
        args.silent = true;
        args.debug = true;
        assert!(matches!(args.validate(), Err(ConfigError::ConflictingVerbosity)));
    }

    #[test]
    fn msi_protocol_is_rejected() {
        let mut args = base_args();
        args.protocol = Protocol::Msi;
        assert!(matches!(args.validate(), Err(ConfigError::ProtocolNotImplemented)));
    }

    #[test]
    fn bad_geometry_surfaces_config_error() {
        let mut args = base_args();
        args.line_size = 48;
        assert!(matches!(args.validate(), Err(ConfigError::UnsupportedLineSize(48))));
    }
}
