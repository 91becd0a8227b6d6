//! One set of a set-associative cache: `associativity` ways plus their
//! shared PLRU replacement state.

use std::io::{self, Write};

use crate::cache_line::{CacheLine, MesiState};
use crate::plru::PlruTree;

/// An evicted line, returned by [`CacheSet::allocate`] when no Invalid way
/// was available and a real victim had to be chosen.
#[derive(Clone, Copy, Debug)]
pub struct Victim {
    pub tag: u64,
    pub state: MesiState,
}

/// A single cache set: a fixed array of ways plus a [`PlruTree`].
#[derive(Clone, Debug)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
    plru: PlruTree,
}

impl CacheSet {
    pub fn new(associativity: usize) -> Self {
        CacheSet {
            lines: vec![CacheLine::invalid(); associativity],
            plru: PlruTree::new(associativity),
        }
    }

    /// Re-initialize this set: all lines Invalid, all PLRU bits 0.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            *line = CacheLine::invalid();
        }
        self.plru.reset();
    }

    /// Find the way holding `tag`, if any non-Invalid line matches it.
    pub fn lookup(&self, tag: u64) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.is_valid() && line.tag == tag)
    }

    /// Install `(tag, state)` into this set, evicting a line if necessary.
    /// Updates the PLRU state as if `way` had just been accessed. Returns
    /// the way the line was installed into, and the victim that was
    /// displaced, if any.
    pub fn allocate(&mut self, tag: u64, state: MesiState) -> (usize, Option<Victim>) {
        if let Some(way) = self.lines.iter().position(|line| !line.is_valid()) {
            self.lines[way] = CacheLine { tag, state };
            self.plru.touch(way);
            return (way, None);
        }

        let way = self.plru.find_victim();
        let evicted = self.lines[way];
        self.lines[way] = CacheLine { tag, state };
        self.plru.touch(way);
        (way, Some(Victim {
            tag: evicted.tag,
            state: evicted.state,
        }))
    }

    /// Update PLRU bits as if `way` were just accessed, without changing
    /// its line. Used for read/write hits.
    pub fn touch(&mut self, way: usize) {
        self.plru.touch(way);
    }

    /// Change the MESI state of an already-valid way in place, keeping its
    /// tag and leaving PLRU untouched. Used for in-place state transitions
    /// (e.g. Exclusive -> Modified on a write hit) that are not themselves
    /// accesses distinct from the access that is already being handled.
    pub fn set_state(&mut self, way: usize, state: MesiState) {
        self.lines[way].state = state;
    }

    /// Set `way` to Invalid. Does not touch the PLRU state: invalidation is
    /// not an access.
    pub fn invalidate(&mut self, way: usize) {
        self.lines[way] = CacheLine::invalid();
    }

    /// The way the PLRU tree would currently choose as a victim.
    pub fn find_victim(&self) -> usize {
        self.plru.find_victim()
    }

    pub fn line(&self, way: usize) -> &CacheLine {
        &self.lines[way]
    }

    pub fn associativity(&self) -> usize {
        self.lines.len()
    }

    pub fn plru(&self) -> &PlruTree {
        &self.plru
    }

    /// Emit every non-Invalid way as `(way_index, line)`.
    pub fn valid_lines(&self) -> impl Iterator<Item = (usize, &CacheLine)> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_valid())
    }

    /// Write every non-Invalid way to `sink`, one per line.
    pub fn print_valid(&self, sink: &mut dyn Write) -> io::Result<()> {
        for (way, line) in self.valid_lines() {
            writeln!(sink, "way {way}: tag=0x{:x} state={}", line.tag, line.state.short_name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_misses_on_fresh_set() {
        let set = CacheSet::new(4);
        assert_eq!(set.lookup(0x42), None);
    }

    #[test]
    fn allocate_into_invalid_set_picks_lowest_way_no_victim() {
        let mut set = CacheSet::new(4);
        let (way, victim) = set.allocate(0xAA, MesiState::Exclusive);
        assert_eq!(way, 0);
        assert!(victim.is_none());
        assert_eq!(set.lookup(0xAA), Some(0));
    }

    #[test]
    fn allocate_fills_lowest_invalid_way_each_time() {
        let mut set = CacheSet::new(4);
        for (i, tag) in [0xA, 0xB, 0xC, 0xD].into_iter().enumerate() {
            let (way, victim) = set.allocate(tag, MesiState::Shared);
            assert_eq!(way, i);
            assert!(victim.is_none());
        }
    }

    #[test]
    fn allocate_into_full_set_evicts_plru_victim() {
        let mut set = CacheSet::new(2);
        set.allocate(1, MesiState::Shared);
        set.allocate(2, MesiState::Shared);
        // Both ways full; PLRU should point at way 0 having just filled way 1 last.
        let expected_victim_way = set.find_victim();
        let (way, victim) = set.allocate(3, MesiState::Exclusive);
        assert_eq!(way, expected_victim_way);
        let victim = victim.expect("must evict when set is full");
        assert_eq!(victim.tag, if expected_victim_way == 0 { 1 } else { 2 });
    }

    #[test]
    fn invalidate_does_not_move_plru() {
        let mut set = CacheSet::new(4);
        set.allocate(1, MesiState::Shared);
        let bits_before = set.plru().bits_msb_first();
        set.invalidate(0);
        assert_eq!(set.plru().bits_msb_first(), bits_before);
        assert!(!set.line(0).is_valid());
    }

    #[test]
    fn reset_clears_lines_and_plru() {
        let mut set = CacheSet::new(4);
        set.allocate(1, MesiState::Modified);
        set.reset();
        assert_eq!(set.valid_lines().count(), 0);
        assert!(set.plru().bits_msb_first().iter().all(|b| !b));
    }

    #[test]
    fn uniqueness_invariant_one_tag_per_set() {
        let mut set = CacheSet::new(4);
        set.allocate(0x1, MesiState::Shared);
        set.allocate(0x2, MesiState::Shared);
        let matches: Vec<_> = set
            .valid_lines()
            .filter(|(_, line)| line.tag == 0x1)
            .collect();
        assert_eq!(matches.len(), 1);
    }
}
