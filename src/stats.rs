//! Protocol statistics plus the ambient parse/dispatch diagnostics that ride
//! alongside them.

use std::io::{self, Write};

/// Read/write/hit/miss counters, plus trace-hygiene diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
    /// Malformed trace records skipped (see `TraceParseError`).
    pub parse_errors: u64,
    /// Unrecognized command codes skipped.
    pub unknown_commands: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `hits / (hits + misses)`, or `None` if there have been no accesses.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }

    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Print the final statistics block to `sink`.
    pub fn print(&self, sink: &mut dyn Write) -> io::Result<()> {
        writeln!(sink, "reads: {}", self.reads)?;
        writeln!(sink, "writes: {}", self.writes)?;
        writeln!(sink, "hits: {}", self.hits)?;
        writeln!(sink, "misses: {}", self.misses)?;
        match self.hit_ratio() {
            Some(ratio) => writeln!(sink, "hit_ratio: {ratio:.5}")?,
            None => writeln!(sink, "hit_ratio: n/a")?,
        }
        writeln!(sink, "parse_errors: {}", self.parse_errors)?;
        writeln!(sink, "unknown_commands: {}", self.unknown_commands)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_have_no_hit_ratio() {
        assert_eq!(Statistics::new().hit_ratio(), None);
    }

    #[test]
    fn hit_ratio_is_hits_over_hits_plus_misses() {
        let mut s = Statistics::new();
        s.record_hit();
        s.record_hit();
        s.record_miss();
        assert_eq!(s.hit_ratio(), Some(2.0 / 3.0));
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut s = Statistics::new();
        s.record_read();
        s.record_hit();
        s.parse_errors = 3;
        s.reset();
        assert_eq!(s.reads, 0);
        assert_eq!(s.hits, 0);
        assert_eq!(s.parse_errors, 0);
    }

    #[test]
    fn reads_plus_writes_equals_hits_plus_misses_after_balanced_updates() {
        let mut s = Statistics::new();
        s.record_read();
        s.record_hit();
        s.record_write();
        s.record_miss();
        assert_eq!(s.reads + s.writes, s.hits + s.misses);
    }
}
