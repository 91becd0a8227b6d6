//! The MESI controller: turns one command at a time into cache array
//! mutations, bus/message traffic, and statistics updates.

use std::io;

use log::debug;

use crate::bus::{Bus, BusOp, CacheMessage, SnoopOracle, SnoopResult};
use crate::cache_array::CacheArray;
use crate::cache_line::MesiState;
use crate::error::InternalInvariant;
use crate::geometry::Geometry;
use crate::sinks::Sinks;
use crate::stats::Statistics;
use crate::trace::Record;

/// Local processor commands, from L1.
const CMD_DATA_READ: u64 = 0;
const CMD_DATA_WRITE: u64 = 1;
const CMD_INSTRUCTION_READ: u64 = 2;
/// Bus-side snoops, from peer caches.
const CMD_SNOOP_READ: u64 = 3;
const CMD_SNOOP_WRITE: u64 = 4;
const CMD_SNOOP_RWIM: u64 = 5;
const CMD_SNOOP_INVALIDATE: u64 = 6;
/// Control commands.
const CMD_RESET: u64 = 8;
const CMD_DUMP: u64 = 9;

/// The MESI controller. Owns the cache array, statistics, and the bus
/// bridge, and is the only thing that mutates any of them.
pub struct Controller<O: SnoopOracle = crate::bus::AddressBitOracle> {
    array: CacheArray,
    stats: Statistics,
    bus: Bus<O>,
}

impl Controller<crate::bus::AddressBitOracle> {
    pub fn new(geometry: Geometry) -> Self {
        Controller {
            array: CacheArray::new(geometry),
            stats: Statistics::new(),
            bus: Bus::new(),
        }
    }
}

impl<O: SnoopOracle> Controller<O> {
    pub fn with_oracle(geometry: Geometry, oracle: O) -> Self {
        Controller {
            array: CacheArray::new(geometry),
            stats: Statistics::new(),
            bus: Bus::with_oracle(oracle),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Record a trace line that failed to parse. Called by the trace
    /// dispatcher's driver loop, not by `handle`, since a malformed record
    /// never becomes a `Record` in the first place.
    pub fn record_parse_error(&mut self) {
        self.stats.parse_errors += 1;
    }

    /// Record a well-formed record whose command code isn't recognized.
    pub fn record_unknown_command(&mut self) {
        self.stats.unknown_commands += 1;
    }

    pub fn array(&self) -> &CacheArray {
        &self.array
    }

    /// Handle one trace record, unrecognized command codes aside (the
    /// caller is expected to have already screened those out so it can
    /// count them as `unknown_commands`).
    pub fn handle(&mut self, record: Record, sinks: &mut Sinks) -> Result<(), ControllerError> {
        debug!("command {} addr=0x{:x}: enter", record.code, record.address);

        match record.code {
            CMD_DATA_READ | CMD_INSTRUCTION_READ => self.handle_read(record.address, sinks)?,
            CMD_DATA_WRITE => self.handle_write(record.address, sinks)?,
            CMD_SNOOP_READ => self.handle_snoop_read(record.address, sinks)?,
            CMD_SNOOP_WRITE => { /* no-op: see §4.5 command 4 */ }
            CMD_SNOOP_RWIM => self.handle_snoop_rwim(record.address, sinks)?,
            CMD_SNOOP_INVALIDATE => self.handle_snoop_invalidate(record.address, sinks)?,
            CMD_RESET => self.handle_reset(),
            CMD_DUMP => self.handle_dump(sinks)?,
            other => unreachable!("unrecognized command code {other} should have been filtered upstream"),
        }

        debug!("command {} addr=0x{:x}: exit", record.code, record.address);
        Ok(())
    }

    /// Whether `code` names a command this controller understands.
    pub fn is_known_command(code: u64) -> bool {
        matches!(
            code,
            CMD_DATA_READ
                | CMD_DATA_WRITE
                | CMD_INSTRUCTION_READ
                | CMD_SNOOP_READ
                | CMD_SNOOP_WRITE
                | CMD_SNOOP_RWIM
                | CMD_SNOOP_INVALIDATE
                | CMD_RESET
                | CMD_DUMP
        )
    }

    fn handle_read(&mut self, addr: u64, sinks: &mut Sinks) -> Result<(), ControllerError> {
        self.stats.record_read();
        let decoded = self.array.decode(addr);

        if let Some(way) = self.array.set(decoded.index).lookup(decoded.tag) {
            self.stats.record_hit();
            self.array.set_mut(decoded.index).touch(way);
            self.emit_message(CacheMessage::SendLine, addr, sinks);
            return Ok(());
        }

        self.stats.record_miss();
        self.emit_bus_op(BusOp::Read, addr, sinks);
        let snoop = self.bus.get_snoop_result(addr);
        let install_state = match snoop {
            SnoopResult::NoHit => MesiState::Exclusive,
            SnoopResult::Hit => MesiState::Shared,
            SnoopResult::HitM => MesiState::Exclusive,
        };

        let (_, victim) = self.array.set_mut(decoded.index).allocate(decoded.tag, install_state);
        self.handle_victim(victim, decoded.index, sinks);
        self.emit_message(CacheMessage::SendLine, addr, sinks);
        Ok(())
    }

    fn handle_write(&mut self, addr: u64, sinks: &mut Sinks) -> Result<(), ControllerError> {
        self.stats.record_write();
        let decoded = self.array.decode(addr);

        if let Some(way) = self.array.set(decoded.index).lookup(decoded.tag) {
            self.stats.record_hit();
            let current_state = self.array.set(decoded.index).line(way).state;
            match current_state {
                MesiState::Modified => {}
                MesiState::Exclusive => self.promote(decoded.index, way, MesiState::Modified),
                MesiState::Shared => {
                    self.emit_bus_op(BusOp::Invalidate, addr, sinks);
                    self.promote(decoded.index, way, MesiState::Modified);
                }
                MesiState::Invalid => {
                    return Err(InternalInvariant::IllegalMesiTransition {
                        set_index: decoded.index as usize,
                        way,
                        detail: "lookup returned a way holding an Invalid line".to_string(),
                    }
                    .into())
                }
            }
            self.array.set_mut(decoded.index).touch(way);
            self.emit_message(CacheMessage::SendLine, addr, sinks);
            return Ok(());
        }

        self.stats.record_miss();
        self.emit_bus_op(BusOp::Rwim, addr, sinks);
        let _ = self.bus.get_snoop_result(addr);

        let (_, victim) = self
            .array
            .set_mut(decoded.index)
            .allocate(decoded.tag, MesiState::Modified);
        self.handle_victim(victim, decoded.index, sinks);
        self.emit_message(CacheMessage::SendLine, addr, sinks);
        Ok(())
    }

    fn handle_snoop_read(&mut self, addr: u64, sinks: &mut Sinks) -> Result<(), ControllerError> {
        let decoded = self.array.decode(addr);
        let Some(way) = self.array.set(decoded.index).lookup(decoded.tag) else {
            self.emit_snoop_result(addr, SnoopResult::NoHit, sinks);
            return Ok(());
        };

        let state = self.array.set(decoded.index).line(way).state;
        match state {
            MesiState::Modified => {
                self.emit_snoop_result(addr, SnoopResult::HitM, sinks);
                self.emit_bus_op(BusOp::Write, addr, sinks);
                self.set_state(decoded.index, way, MesiState::Shared);
            }
            MesiState::Exclusive => {
                self.emit_snoop_result(addr, SnoopResult::Hit, sinks);
                self.set_state(decoded.index, way, MesiState::Shared);
            }
            MesiState::Shared => {
                self.emit_snoop_result(addr, SnoopResult::Hit, sinks);
            }
            MesiState::Invalid => {
                return Err(InternalInvariant::IllegalMesiTransition {
                    set_index: decoded.index as usize,
                    way,
                    detail: "lookup returned a way holding an Invalid line".to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    fn handle_snoop_rwim(&mut self, addr: u64, sinks: &mut Sinks) -> Result<(), ControllerError> {
        let decoded = self.array.decode(addr);
        let Some(way) = self.array.set(decoded.index).lookup(decoded.tag) else {
            return Ok(());
        };

        let state = self.array.set(decoded.index).line(way).state;
        match state {
            MesiState::Modified => {
                self.emit_bus_op(BusOp::Write, addr, sinks);
                self.emit_message(CacheMessage::InvalidateLine, addr, sinks);
                self.array.set_mut(decoded.index).invalidate(way);
            }
            MesiState::Exclusive | MesiState::Shared => {
                self.emit_message(CacheMessage::InvalidateLine, addr, sinks);
                self.array.set_mut(decoded.index).invalidate(way);
            }
            MesiState::Invalid => {
                return Err(InternalInvariant::IllegalMesiTransition {
                    set_index: decoded.index as usize,
                    way,
                    detail: "lookup returned a way holding an Invalid line".to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    fn handle_snoop_invalidate(&mut self, addr: u64, sinks: &mut Sinks) -> Result<(), ControllerError> {
        let decoded = self.array.decode(addr);
        let Some(way) = self.array.set(decoded.index).lookup(decoded.tag) else {
            return Ok(());
        };

        let state = self.array.set(decoded.index).line(way).state;
        match state {
            MesiState::Shared => {
                self.emit_message(CacheMessage::InvalidateLine, addr, sinks);
                self.array.set_mut(decoded.index).invalidate(way);
            }
            // Source behavior preserved deliberately: a stale external
            // Invalidate does not downgrade an authoritative M/E line. See
            // SPEC_FULL.md §9.
            MesiState::Modified | MesiState::Exclusive => {}
            MesiState::Invalid => {
                return Err(InternalInvariant::IllegalMesiTransition {
                    set_index: decoded.index as usize,
                    way,
                    detail: "lookup returned a way holding an Invalid line".to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    fn handle_reset(&mut self) {
        self.array.reset();
        self.stats.reset();
    }

    fn handle_dump(&self, sinks: &mut Sinks) -> Result<(), ControllerError> {
        self.array.check_invariants()?;
        self.array.dump(sinks.normal())?;
        self.stats.print(sinks.normal())?;
        Ok(())
    }

    fn promote(&mut self, set_index: u64, way: usize, state: MesiState) {
        self.array.set_mut(set_index).set_state(way, state);
    }

    fn set_state(&mut self, set_index: u64, way: usize, state: MesiState) {
        self.array.set_mut(set_index).set_state(way, state);
    }

    /// Act on a victim evicted by `allocate`: always tell L1 to evict it
    /// (inclusivity), then, if it was dirty, write it back.
    fn handle_victim(&mut self, victim: Option<crate::cache_set::Victim>, set_index: u64, sinks: &mut Sinks) {
        let Some(victim) = victim else { return };
        let victim_addr = self.array.geometry().reconstruct(victim.tag, set_index);
        self.emit_message(CacheMessage::EvictLine, victim_addr, sinks);
        if victim.state == MesiState::Modified {
            self.emit_bus_op(BusOp::Write, victim_addr, sinks);
        }
    }

    fn emit_bus_op(&self, op: BusOp, addr: u64, sinks: &mut Sinks) {
        let _ = self.bus.bus_operation(op, addr, sinks.verbose());
    }

    fn emit_snoop_result(&self, addr: u64, result: SnoopResult, sinks: &mut Sinks) {
        let _ = self.bus.put_snoop_result(addr, result, sinks.verbose());
    }

    fn emit_message(&self, msg: CacheMessage, addr: u64, sinks: &mut Sinks) {
        let _ = self.bus.message_to_cache(msg, addr, sinks.verbose());
    }
}

/// Either a violated engine invariant or an I/O failure while writing to a
/// sink. Both are fatal: the run aborts after flushing sinks.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Internal(#[from] InternalInvariant),

    #[error("I/O failure writing to an output sink: {0}")]
    Io(#[from] io::Error),
}
