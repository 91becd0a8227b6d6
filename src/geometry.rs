//! Address geometry: splits an address into `(tag, index, offset)` under a
//! fixed `capacity` / `line_size` / `associativity` configuration.

use crate::error::ConfigError;

const LEGAL_LINE_SIZES: [u64; 5] = [4, 16, 32, 64, 128];
const LEGAL_ASSOCIATIVITIES: [u64; 6] = [1, 2, 4, 8, 16, 32];

/// The set-associative geometry of the cache, plus the address width it
/// decodes against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub capacity: u64,
    pub line_size: u64,
    pub associativity: u64,
    pub num_sets: u64,
    /// Address width in bits. Defaults to 32 (see `Geometry::new`).
    pub address_bits: u32,
    offset_bits: u32,
    index_bits: u32,
}

/// The decomposition of one address under a [`Geometry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddress {
    pub tag: u64,
    pub index: u64,
    pub offset: u64,
}

impl Geometry {
    /// Build a geometry from `capacity` (bytes), `line_size` (bytes), and
    /// `associativity` (ways), with the default 32-bit address width.
    pub fn new(capacity: u64, line_size: u64, associativity: u64) -> Result<Self, ConfigError> {
        Self::with_address_bits(capacity, line_size, associativity, 32)
    }

    /// As [`Geometry::new`], but with an explicit address width.
    pub fn with_address_bits(
        capacity: u64,
        line_size: u64,
        associativity: u64,
        address_bits: u32,
    ) -> Result<Self, ConfigError> {
        if !LEGAL_LINE_SIZES.contains(&line_size) {
            return Err(ConfigError::UnsupportedLineSize(line_size));
        }
        if !LEGAL_ASSOCIATIVITIES.contains(&associativity) {
            return Err(ConfigError::UnsupportedAssociativity(associativity));
        }

        let denom = line_size * associativity;
        if denom == 0 || capacity % denom != 0 {
            return Err(ConfigError::NotPowerOfTwoSets {
                capacity,
                line_size,
                associativity,
                num_sets: 0,
            });
        }
        let num_sets = capacity / denom;
        if !is_power_of_two(num_sets) || !is_power_of_two(capacity) {
            return Err(ConfigError::NotPowerOfTwoSets {
                capacity,
                line_size,
                associativity,
                num_sets,
            });
        }

        let offset_bits = line_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();

        Ok(Geometry {
            capacity,
            line_size,
            associativity,
            num_sets,
            address_bits,
            offset_bits,
            index_bits,
        })
    }

    /// Number of PLRU routing bits per set: `associativity - 1`.
    pub fn plru_bits(&self) -> usize {
        (self.associativity - 1) as usize
    }

    /// Decode `addr` into its tag/index/offset parts.
    pub fn decode(&self, addr: u64) -> DecodedAddress {
        let offset_mask = (1u64 << self.offset_bits) - 1;
        let index_mask = (1u64 << self.index_bits) - 1;

        let offset = addr & offset_mask;
        let index = (addr >> self.offset_bits) & index_mask;
        let tag = addr >> (self.offset_bits + self.index_bits);

        DecodedAddress { tag, index, offset }
    }

    /// Reconstruct an address from a tag and set index, for use when
    /// reporting an evicted line's address back out to the bus/L1.
    pub fn reconstruct(&self, tag: u64, index: u64) -> u64 {
        (tag << (self.offset_bits + self.index_bits)) | (index << self.offset_bits)
    }
}

fn is_power_of_two(n: u64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_16mib_64b_16way() {
        let g = Geometry::new(16 * 1024 * 1024, 64, 16).unwrap();
        assert_eq!(g.num_sets, 16384);
        assert_eq!(g.plru_bits(), 15);
    }

    #[test]
    fn decode_matches_offset_index_tag_split() {
        let g = Geometry::new(16 * 1024 * 1024, 64, 16).unwrap();
        // offset_bits=6, index_bits=14
        let addr = 0x1234_5678u64;
        let d = g.decode(addr);
        assert_eq!(d.offset, addr & 0x3f);
        assert_eq!(d.index, (addr >> 6) & 0x3fff);
        assert_eq!(d.tag, addr >> 20);
    }

    #[test]
    fn reconstruct_is_inverse_of_decode_modulo_offset() {
        let g = Geometry::new(16 * 1024 * 1024, 64, 16).unwrap();
        let addr = 0x1000u64;
        let d = g.decode(addr);
        let back = g.reconstruct(d.tag, d.index);
        assert_eq!(back, addr - d.offset);
    }

    #[test]
    fn rejects_non_power_of_two_sets() {
        // capacity not a multiple of line_size*associativity
        let err = Geometry::new(100, 64, 16).unwrap_err();
        assert!(matches!(err, ConfigError::NotPowerOfTwoSets { .. }));
    }

    #[test]
    fn rejects_unsupported_line_size() {
        let err = Geometry::new(1024, 48, 4).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedLineSize(48)));
    }

    #[test]
    fn rejects_unsupported_associativity() {
        let err = Geometry::new(1024, 64, 3).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedAssociativity(3)));
    }

    #[test]
    fn single_set_single_way_is_legal() {
        let g = Geometry::new(64, 64, 1).unwrap();
        assert_eq!(g.num_sets, 1);
        assert_eq!(g.plru_bits(), 0);
    }
}
