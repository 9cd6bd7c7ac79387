use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A restriction fragment from the in-silico digest of a reference genome.
///
/// Coordinates are 1-based and inclusive, matching the digest table.
/// Fragments are created once at index-build time and never mutated.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    /// 1-based ordinal within the chromosome; adjacent fragments differ by 1.
    pub ordinal: u32,
    pub five_prime_site: String,
    pub three_prime_site: String,
    /// True if this fragment was selected for enrichment by a capture probe.
    pub active: bool,
}

impl Fragment {
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

// By construction there cannot be two fragments with the same coordinates
// but different annotations, so equality over (chromosome, start, end) is
// sufficient.
impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.chromosome == other.chromosome && self.start == other.start && self.end == other.end
    }
}

impl Eq for Fragment {}

impl Hash for Fragment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chromosome.hash(state);
        self.start.hash(state);
        self.end.hash(state);
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{} [frag. {}; {}/{}]",
            self.chromosome,
            self.start,
            self.end,
            self.ordinal,
            self.five_prime_site,
            self.three_prime_site
        )
    }
}

/// The two fragments resolved for one read pair. If both reads land in the
/// same fragment, `forward` and `reverse` point to the same `Fragment`.
#[derive(Debug, Clone)]
pub struct FragmentPair {
    pub forward: Arc<Fragment>,
    pub reverse: Arc<Fragment>,
}

impl FragmentPair {
    /// Upper bound on the insert size of a ligation product of these two
    /// fragments.
    pub fn max_insert_size(&self) -> i64 {
        self.forward.len() + self.reverse.len()
    }

    pub fn is_same_fragment(&self) -> bool {
        self.forward == self.reverse
    }

    /// True if the two fragments are direct neighbors on one chromosome.
    pub fn is_adjacent(&self) -> bool {
        if self.forward.chromosome != self.reverse.chromosome {
            return false;
        }
        self.forward.ordinal.abs_diff(self.reverse.ordinal) == 1
    }

    /// Exactly one of the two fragments was selected by a capture probe.
    pub fn is_hybrid_active(&self) -> bool {
        self.forward.active != self.reverse.active
    }
}
