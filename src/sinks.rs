//! The two output streams a run writes to: `normal`, which always carries
//! the command-9 dump and final statistics, and `verbose`, which carries
//! bus operations, snoop responses, and L1 messages and is absent under
//! `--silent`.

use std::io::{self, Write};

pub struct Sinks {
    normal: Box<dyn Write>,
    verbose: Option<Box<dyn Write>>,
}

impl Sinks {
    pub fn new(normal: Box<dyn Write>, verbose: Option<Box<dyn Write>>) -> Self {
        Sinks { normal, verbose }
    }

    /// The normal stdout-backed sink, with bus/message traffic on stderr so
    /// the final dump and statistics stay easy to redirect on their own.
    pub fn stdout_verbose() -> Self {
        Sinks::new(Box::new(io::stdout()), Some(Box::new(io::stderr())))
    }

    /// The normal stdout-backed sink with verbose tracing suppressed
    /// (`--silent`).
    pub fn stdout_silent() -> Self {
        Sinks::new(Box::new(io::stdout()), None)
    }

    pub fn normal(&mut self) -> &mut dyn Write {
        &mut self.normal
    }

    /// `Some` unless running under `--silent`.
    pub fn verbose(&mut self) -> Option<&mut dyn Write> {
        self.verbose.as_mut().map(|w| w.as_mut() as &mut dyn Write)
    }

    /// Flush both streams. Called on every exit path, success or failure.
    pub fn flush(&mut self) -> io::Result<()> {
        self.normal.flush()?;
        if let Some(verbose) = &mut self.verbose {
            verbose.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_is_none_when_constructed_without_one() {
        let mut sinks = Sinks::new(Box::new(Vec::new()), None);
        assert!(sinks.verbose().is_none());
    }

    #[test]
    fn verbose_is_some_when_constructed_with_one() {
        let mut sinks = Sinks::new(Box::new(Vec::new()), Some(Box::new(Vec::new())));
        assert!(sinks.verbose().is_some());
    }
}
