//! The trace dispatcher: tokenizes `<code> <address>` records out of a
//! trace file, skipping comments, blank lines, and malformed records without
//! aborting the run.

use std::io::{self, BufRead};

use log::warn;

use crate::error::TraceParseError;

/// One parsed trace record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    pub code: u64,
    pub address: u64,
}

/// Reads `Record`s lazily out of a `BufRead`, one line read per record, so a
/// malformed line near the end of a large trace never requires buffering
/// the whole file.
pub struct TraceReader<R> {
    reader: R,
    line_no: usize,
    address_bits: u32,
    parse_errors: u64,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_address_bits(reader, 32)
    }

    pub fn with_address_bits(reader: R, address_bits: u32) -> Self {
        TraceReader {
            reader,
            line_no: 0,
            address_bits,
            parse_errors: 0,
        }
    }

    /// Number of malformed records skipped so far.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    /// Read the next well-formed record, skipping (and logging) comments,
    /// blank lines, and malformed records along the way. Returns `Ok(None)`
    /// at end of file.
    pub fn next_record(&mut self) -> io::Result<Option<Record>> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match parse_record(trimmed, self.line_no, self.address_bits) {
                Ok(record) => return Ok(Some(record)),
                Err(err) => {
                    warn!("skipping malformed trace record: {err}");
                    self.parse_errors += 1;
                }
            }
        }
    }
}

fn parse_record(text: &str, line_no: usize, address_bits: u32) -> Result<Record, TraceParseError> {
    let mut fields = text.split_whitespace();
    let code_text = fields.next().ok_or_else(|| TraceParseError::MalformedRecord {
        line: line_no,
        text: text.to_string(),
    })?;
    let address_text = fields.next().ok_or_else(|| TraceParseError::MalformedRecord {
        line: line_no,
        text: text.to_string(),
    })?;
    if fields.next().is_some() {
        return Err(TraceParseError::MalformedRecord {
            line: line_no,
            text: text.to_string(),
        });
    }

    let code = code_text.parse::<u64>().map_err(|_| TraceParseError::BadCommandCode {
        line: line_no,
        text: code_text.to_string(),
    })?;

    let address = parse_address(address_text).ok_or_else(|| TraceParseError::BadAddress {
        line: line_no,
        text: address_text.to_string(),
    })?;

    let limit = 1u128 << address_bits;
    if (address as u128) >= limit {
        return Err(TraceParseError::AddressOutOfRange {
            line: line_no,
            value: address,
            width: address_bits,
        });
    }

    Ok(Record { code, address })
}

fn parse_address(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u64>().ok()
    }
}
