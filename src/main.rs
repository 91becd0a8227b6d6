//! Entry point: parse and validate the CLI, open the trace file, and drive
//! the MESI controller over it to completion.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{error, warn, LevelFilter};

use llc_sim::cli::Args;
use llc_sim::controller::Controller;
use llc_sim::error::{ConfigError, EngineError, IoError};
use llc_sim::sinks::Sinks;
use llc_sim::trace::TraceReader;

fn main() -> ExitCode {
    let args = Args::parse();

    match args.validate() {
        Ok(config) => {
            init_logging(config.debug, config.silent);

            let mut sinks = if config.silent {
                Sinks::stdout_silent()
            } else {
                Sinks::stdout_verbose()
            };

            let result = run(&args.file, config, &mut sinks);
            let _ = sinks.flush();

            match result {
                Ok(()) => ExitCode::from(0),
                Err(EngineError::Io(_)) => ExitCode::from(1),
                Err(EngineError::Internal(_)) => ExitCode::from(1),
                Err(EngineError::Config(_)) => unreachable!("validated already"),
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(exit_code_for_config_error(&err))
        }
    }
}

fn exit_code_for_config_error(_err: &ConfigError) -> u8 {
    2
}

fn init_logging(debug: bool, silent: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else if silent {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn run(path: &Path, config: llc_sim::cli::Config, sinks: &mut Sinks) -> Result<(), EngineError> {
    let file = File::open(path).map_err(|source| IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut trace = TraceReader::with_address_bits(BufReader::new(file), config.geometry.address_bits);
    let mut controller = Controller::new(config.geometry);
    let mut folded_parse_errors = trace.parse_errors();

    loop {
        let record = trace
            .next_record()
            .map_err(|source| IoError {
                path: path.to_path_buf(),
                source,
            })?;

        // `next_record` may have skipped any number of malformed lines
        // before returning; fold those into the controller's statistics
        // right away so a command-9 dump handled below reflects them.
        let seen_parse_errors = trace.parse_errors();
        for _ in folded_parse_errors..seen_parse_errors {
            controller.record_parse_error();
        }
        folded_parse_errors = seen_parse_errors;

        let Some(record) = record else { break };

        if !Controller::<llc_sim::bus::AddressBitOracle>::is_known_command(record.code) {
            warn!("skipping unrecognized command code {}", record.code);
            controller.record_unknown_command();
            continue;
        }

        controller.handle(record, sinks).map_err(|err| match err {
            llc_sim::controller::ControllerError::Internal(inner) => EngineError::from(inner),
            llc_sim::controller::ControllerError::Io(source) => EngineError::from(IoError {
                path: PathBuf::from("<output sink>"),
                source,
            }),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn end_to_end_trace_reports_expected_statistics() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "8 0").unwrap();
        writeln!(file, "0 0x1000").unwrap();
        writeln!(file, "1 0x1000").unwrap();
        writeln!(file, "9 0").unwrap();

        let args = Args {
            file: file.path().to_path_buf(),
            capacity_mib: 16,
            line_size: 64,
            associativity: 16,
            protocol: llc_sim::cli::Protocol::Mesi,
            silent: true,
            debug: false,
        };
        let config = args.validate().unwrap();
        let mut sinks = Sinks::new(Box::new(Vec::new()), None);
        let result = run(file.path(), config, &mut sinks);
        assert!(result.is_ok());
    }
}
