use crate::readpair::{Classification, OrientationClass};
use crate::types::{HashMap, HashMapExt, HashSet};

/// Canonical outer key of the deduplication map: the unordered chromosome
/// pair, ordered lexicographically, plus the orientation class when
/// orientation-aware deduplication is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChromPairKey {
    first: String,
    second: String,
    orientation: Option<OrientationClass>,
}

/// Detects read pairs whose 5' coordinates have been observed before.
///
/// Two-level structure: the outer map goes from a canonical chromosome pair
/// to an inner map from the smaller-side 5' coordinate to the set of
/// larger-side 5' coordinates. Canonical ordering guarantees that swapping
/// which read was labeled forward never changes the key. The map retains
/// every distinct key for the lifetime of a run; memory is bounded by the
/// number of distinct coordinate pairs, not by total reads.
#[derive(Debug)]
pub struct DedupMap {
    map: HashMap<ChromPairKey, HashMap<i64, HashSet<i64>>>,
    use_orientation: bool,
    queries: u64,
    insertions: u64,
    first_coords: u64,
    second_coords: u64,
}

impl DedupMap {
    /// With `use_orientation`, two pairs at identical coordinates but with
    /// different relative orientation classes are not duplicates.
    pub fn new(use_orientation: bool) -> Self {
        Self {
            map: HashMap::new(),
            use_orientation,
            queries: 0,
            insertions: 0,
            first_coords: 0,
            second_coords: 0,
        }
    }

    /// True if an equal key was seen before; inserts on first sight.
    pub fn has_seen(&mut self, pair: &Classification) -> bool {
        self.queries += 1;

        let chrom_forward = &pair.fragments.forward.chromosome;
        let chrom_reverse = &pair.fragments.reverse.chromosome;
        let p_forward = pair.five_prime_forward;
        let p_reverse = pair.five_prime_reverse;

        // Different chromosomes: the lexicographically smaller name comes
        // first. Same chromosome: the smaller coordinate comes first.
        let (first, second, coord_first, coord_second) = if chrom_forward != chrom_reverse {
            if chrom_forward < chrom_reverse {
                (chrom_forward, chrom_reverse, p_forward, p_reverse)
            } else {
                (chrom_reverse, chrom_forward, p_reverse, p_forward)
            }
        } else if p_forward < p_reverse {
            (chrom_forward, chrom_reverse, p_forward, p_reverse)
        } else {
            (chrom_forward, chrom_reverse, p_reverse, p_forward)
        };

        let key = ChromPairKey {
            first: first.clone(),
            second: second.clone(),
            orientation: self
                .use_orientation
                .then(|| pair.orientation.class()),
        };

        let inner = self.map.entry(key).or_default();
        let first_is_new = !inner.contains_key(&coord_first);
        let coords = inner.entry(coord_first).or_default();
        if !coords.insert(coord_second) {
            return true;
        }

        if first_is_new {
            self.first_coords += 1;
        }
        self.second_coords += 1;
        self.insertions += 1;
        false
    }

    /// Total number of queries made against this map.
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Number of insertions, i.e. the number of unique pairs seen.
    pub fn insertions(&self) -> u64 {
        self.insertions
    }

    /// Cardinality of the outer chromosome-pair map.
    pub fn chromosome_pair_keys(&self) -> usize {
        self.map.len()
    }

    pub fn first_coords(&self) -> u64 {
        self.first_coords
    }

    pub fn second_coords(&self) -> u64 {
        self.second_coords
    }
}
