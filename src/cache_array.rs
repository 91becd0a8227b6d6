//! The cache array: an ordered sequence of sets, dispatched by address
//! index. Thin wrapper; all interesting logic lives in [`CacheSet`].

use std::io::{self, Write};

use crate::cache_set::CacheSet;
use crate::error::InternalInvariant;
use crate::geometry::{DecodedAddress, Geometry};

pub struct CacheArray {
    geometry: Geometry,
    sets: Vec<CacheSet>,
}

impl CacheArray {
    pub fn new(geometry: Geometry) -> Self {
        let associativity = geometry.associativity as usize;
        let sets = (0..geometry.num_sets)
            .map(|_| CacheSet::new(associativity))
            .collect();
        CacheArray { geometry, sets }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Decode `addr` into `(tag, index)` under this array's geometry.
    pub fn decode(&self, addr: u64) -> DecodedAddress {
        self.geometry.decode(addr)
    }

    pub fn set(&self, index: u64) -> &CacheSet {
        &self.sets[index as usize]
    }

    pub fn set_mut(&mut self, index: u64) -> &mut CacheSet {
        &mut self.sets[index as usize]
    }

    /// Re-initialize every set: all lines Invalid, all PLRU bits 0.
    /// Statistics are reset separately, by the controller, as part of
    /// handling command 8.
    pub fn reset(&mut self) {
        for set in &mut self.sets {
            set.reset();
        }
    }

    /// Write every non-Invalid line, across every set, in set-index then
    /// way-index order: `(set_index, way_index, tag, plru_bits, state)`.
    pub fn dump(&self, sink: &mut dyn Write) -> io::Result<()> {
        let plru_width = self.geometry.plru_bits();
        for (set_index, set) in self.sets.iter().enumerate() {
            let plru_bits: String = set
                .plru()
                .bits_msb_first()
                .iter()
                .map(|b| if *b { '1' } else { '0' })
                .collect();
            for (way, line) in set.valid_lines() {
                writeln!(
                    sink,
                    "set={set_index:>6} way={way:>2} tag=0x{:<08x} plru={plru_bits:0>width$} state={}",
                    line.tag,
                    line.state.short_name(),
                    width = plru_width,
                )?;
            }
        }
        Ok(())
    }

    /// Check invariants 1 and 2 of §8: every set has exactly
    /// `associativity - 1` PLRU bits, and no set holds two valid lines
    /// sharing a tag. Called before a command-9 dump so a violated
    /// invariant is caught before it's reported as if it were sane state.
    pub fn check_invariants(&self) -> Result<(), InternalInvariant> {
        let expected_plru_bits = self.geometry.plru_bits();
        for (set_index, set) in self.sets.iter().enumerate() {
            let actual_plru_bits = set.plru().len();
            if actual_plru_bits != expected_plru_bits {
                return Err(InternalInvariant::PlruArityMismatch {
                    set_index,
                    expected: expected_plru_bits,
                    actual: actual_plru_bits,
                });
            }

            let valid: Vec<_> = set.valid_lines().collect();
            for (i, (way_a, line_a)) in valid.iter().enumerate() {
                for (way_b, line_b) in &valid[i + 1..] {
                    if line_a.tag == line_b.tag {
                        return Err(InternalInvariant::DuplicateTag {
                            set_index,
                            way_a: *way_a,
                            way_b: *way_b,
                            tag: line_a.tag,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_line::MesiState;

    fn geometry() -> Geometry {
        Geometry::new(1024, 64, 4).unwrap() // 4 sets, 4-way
    }

    #[test]
    fn fresh_array_dumps_nothing() {
        let array = CacheArray::new(geometry());
        let mut out = Vec::new();
        array.dump(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reset_clears_allocated_lines() {
        let mut array = CacheArray::new(geometry());
        let d = array.decode(0x40);
        array.set_mut(d.index).allocate(d.tag, MesiState::Exclusive);
        array.reset();
        let mut out = Vec::new();
        array.dump(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn dump_reports_installed_line() {
        let mut array = CacheArray::new(geometry());
        let d = array.decode(0x40);
        array.set_mut(d.index).allocate(d.tag, MesiState::Modified);
        let mut out = Vec::new();
        array.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("state=M"));
    }

    #[test]
    fn check_invariants_passes_on_fresh_array() {
        let array = CacheArray::new(geometry());
        assert!(array.check_invariants().is_ok());
    }

    #[test]
    fn check_invariants_catches_duplicate_tag() {
        let mut array = CacheArray::new(geometry());
        let d = array.decode(0x40);
        array.set_mut(d.index).allocate(d.tag, MesiState::Shared);
        array.set_mut(d.index).allocate(d.tag, MesiState::Shared);
        assert!(matches!(
            array.check_invariants(),
            Err(InternalInvariant::DuplicateTag { .. })
        ));
    }
}
