//! The bus/message bridge: the controller's only window onto the outside
//! world. Three outbound operations and one inbound query, all synchronous
//! and payload-free — this simulator tracks coherence metadata, not data.

use std::io::{self, Write};

/// A bus transaction the controller issues outward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusOp {
    Read,
    Write,
    Invalidate,
    Rwim,
}

impl BusOp {
    fn name(&self) -> &'static str {
        match self {
            BusOp::Read => "READ",
            BusOp::Write => "WRITE",
            BusOp::Invalidate => "INVALIDATE",
            BusOp::Rwim => "RWIM",
        }
    }
}

/// A peer cache's response to a snooped bus transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnoopResult {
    NoHit,
    Hit,
    HitM,
}

impl SnoopResult {
    fn name(&self) -> &'static str {
        match self {
            SnoopResult::NoHit => "NOHIT",
            SnoopResult::Hit => "HIT",
            SnoopResult::HitM => "HITM",
        }
    }
}

/// An inclusivity message forwarded to L1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMessage {
    GetLine,
    SendLine,
    EvictLine,
    InvalidateLine,
}

impl CacheMessage {
    fn name(&self) -> &'static str {
        match self {
            CacheMessage::GetLine => "GETLINE",
            CacheMessage::SendLine => "SENDLINE",
            CacheMessage::EvictLine => "EVICTLINE",
            CacheMessage::InvalidateLine => "INVALIDATELINE",
        }
    }
}

/// Produces a [`SnoopResult`] for a given address. Isolated behind a trait
/// so the deterministic address-bit stub used here can later be swapped for
/// a recorded oracle without touching the controller.
pub trait SnoopOracle {
    fn get_snoop_result(&self, address: u64) -> SnoopResult;
}

/// The stub oracle mandated by the trace format: the two least-significant
/// bits of the address determine the response. `00` -> HIT, `01` -> HITM,
/// anything else -> NOHIT.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressBitOracle;

impl SnoopOracle for AddressBitOracle {
    fn get_snoop_result(&self, address: u64) -> SnoopResult {
        match address & 0b11 {
            0b00 => SnoopResult::Hit,
            0b01 => SnoopResult::HitM,
            _ => SnoopResult::NoHit,
        }
    }
}

/// The bus/message bridge. Owns the oracle queried for `GetSnoopResult` and
/// writes every outbound operation, snoop response, and L1 message to the
/// verbose sink, when one is present.
pub struct Bus<O: SnoopOracle = AddressBitOracle> {
    oracle: O,
}

impl Bus<AddressBitOracle> {
    pub fn new() -> Self {
        Bus {
            oracle: AddressBitOracle,
        }
    }
}

impl Default for Bus<AddressBitOracle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: SnoopOracle> Bus<O> {
    pub fn with_oracle(oracle: O) -> Self {
        Bus { oracle }
    }

    pub fn bus_operation(&self, op: BusOp, address: u64, verbose: Option<&mut dyn Write>) -> io::Result<()> {
        if let Some(sink) = verbose {
            writeln!(sink, "BusOp {} addr=0x{:x}", op.name(), address)?;
        }
        Ok(())
    }

    pub fn get_snoop_result(&self, address: u64) -> SnoopResult {
        self.oracle.get_snoop_result(address)
    }

    pub fn put_snoop_result(
        &self,
        address: u64,
        result: SnoopResult,
        verbose: Option<&mut dyn Write>,
    ) -> io::Result<()> {
        if let Some(sink) = verbose {
            writeln!(sink, "PutSnoopResult {} addr=0x{:x}", result.name(), address)?;
        }
        Ok(())
    }

    pub fn message_to_cache(
        &self,
        msg: CacheMessage,
        address: u64,
        verbose: Option<&mut dyn Write>,
    ) -> io::Result<()> {
        if let Some(sink) = verbose {
            writeln!(sink, "MessageToCache {} addr=0x{:x}", msg.name(), address)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bit_oracle_matches_spec_table() {
        let oracle = AddressBitOracle;
        assert_eq!(oracle.get_snoop_result(0x1000), SnoopResult::Hit); // ..00
        assert_eq!(oracle.get_snoop_result(0x1001), SnoopResult::HitM); // ..01
        assert_eq!(oracle.get_snoop_result(0x1002), SnoopResult::NoHit); // ..10
        assert_eq!(oracle.get_snoop_result(0x1003), SnoopResult::NoHit); // ..11
    }

    #[test]
    fn bus_operation_writes_to_verbose_sink_when_present() {
        let bus = Bus::new();
        let mut out = Vec::new();
        bus.bus_operation(BusOp::Read, 0x10, Some(&mut out)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("READ"));
        assert!(text.contains("0x10"));
    }

    #[test]
    fn bus_operation_is_silent_without_a_sink() {
        let bus = Bus::new();
        bus.bus_operation(BusOp::Read, 0x10, None).unwrap();
    }
}
