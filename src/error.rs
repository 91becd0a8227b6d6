//! The error taxonomy used across the engine.
//!
//! `ConfigError` and `IoError` and `InternalInvariant` compose into
//! [`EngineError`], the error type `main` matches on to choose an exit code.
//! `TraceParseError` deliberately does not join that enum: it is recovered
//! from inside the trace dispatcher's own loop and never propagates past it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or inconsistent cache geometry, an unsupported protocol choice,
/// or a contradictory combination of CLI flags.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `capacity / (line_size * associativity)` is not a positive power of two.
    #[error(
        "invalid geometry: capacity={capacity} line_size={line_size} associativity={associativity} \
         implies num_sets={num_sets}, which is not a positive power of two"
    )]
    NotPowerOfTwoSets {
        capacity: u64,
        line_size: u64,
        associativity: u64,
        num_sets: u64,
    },

    /// `line_size` is not one of the enumerated legal values.
    #[error("unsupported line_size {0}, must be one of 4, 16, 32, 64, 128")]
    UnsupportedLineSize(u64),

    /// `associativity` is not one of the enumerated legal values.
    #[error("unsupported associativity {0}, must be one of 1, 2, 4, 8, 16, 32")]
    UnsupportedAssociativity(u64),

    /// `--protocol MSI` was requested.
    #[error("protocol MSI is declared but not implemented")]
    ProtocolNotImplemented,

    /// Both `--silent` and `--debug` were passed.
    #[error("--silent and --debug are mutually exclusive")]
    ConflictingVerbosity,
}

/// The trace file could not be opened or read.
#[derive(Debug, Error)]
#[error("could not read trace file {path}: {source}")]
pub struct IoError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A single trace record failed to parse. Recoverable: the caller logs this
/// and skips the line, it never escapes the trace dispatcher's loop.
#[derive(Debug, Error)]
pub enum TraceParseError {
    #[error("line {line}: expected \"<code> <address>\", got {text:?}")]
    MalformedRecord { line: usize, text: String },

    #[error("line {line}: command code {text:?} is not an integer")]
    BadCommandCode { line: usize, text: String },

    #[error("line {line}: address {text:?} is not a valid decimal or 0x-prefixed hex integer")]
    BadAddress { line: usize, text: String },

    #[error("line {line}: address 0x{value:x} does not fit in {width} bits")]
    AddressOutOfRange { line: usize, value: u64, width: u32 },
}

/// A violated internal invariant: lookup uniqueness, PLRU tree arity, or
/// MESI legality. Fatal; the run aborts after flushing sinks.
#[derive(Debug, Error)]
pub enum InternalInvariant {
    #[error("set {set_index} has two valid ways ({way_a} and {way_b}) sharing tag 0x{tag:x}")]
    DuplicateTag {
        set_index: usize,
        way_a: usize,
        way_b: usize,
        tag: u64,
    },

    #[error("set {set_index} has {actual} PLRU bits, expected {expected}")]
    PlruArityMismatch {
        set_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("set {set_index} way {way} is in an illegal MESI state for this transition: {detail}")]
    IllegalMesiTransition {
        set_index: usize,
        way: usize,
        detail: String,
    },
}

/// The top-level error `main` matches on. `TraceParseError` is intentionally
/// absent: it is handled entirely inside the trace dispatcher.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Internal(#[from] InternalInvariant),
}
