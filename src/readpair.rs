use crate::digest::FragmentIndex;
use crate::error::HicError;
use crate::fragment::FragmentPair;

/// Minimum mapping quality for a read with a secondary alignment to still
/// count as uniquely mapped in lenient mode.
const MIN_UNIQUE_MAPQ: u8 = 30;

/// Minimum gap between the primary (`AS`) and secondary (`XS`) alignment
/// scores for a read to count as uniquely mapped in lenient mode.
const MIN_SCORE_GAP: i64 = 10;

/// A read whose 5' end lies within this many bases of a restriction
/// fragment boundary overlaps a cutting site (dangling end).
const DANGLING_WINDOW: i64 = 7;

/// One single-end-aligned record, reduced to the fields the classifier
/// needs. Coordinates are 1-based and inclusive.
#[derive(Debug, Clone)]
pub struct SingleEndRecord {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub reverse: bool,
    pub mapped: bool,
    pub mapq: u8,
    /// Primary alignment score (`AS` tag), if reported by the aligner.
    pub alignment_score: Option<i64>,
    /// Best secondary alignment score (`XS` tag). Present only when the
    /// aligner found more than one alignment.
    pub secondary_score: Option<i64>,
}

impl SingleEndRecord {
    /// The genomic position of the read's 5' end: the alignment start on
    /// the forward strand, the alignment end on the reverse strand. This is
    /// the position nearest the ligation junction.
    pub fn five_prime_pos(&self) -> i64 {
        if self.reverse {
            self.end
        } else {
            self.start
        }
    }
}

/// Size thresholds and the uniqueness policy, supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct PairingConfig {
    /// Smallest allowable chimeric fragment size (sonication size selection).
    pub lower_size: i64,
    /// Largest allowable chimeric fragment size. Also bounds the 5'-to-5'
    /// distance of inward-facing pairs that can be explained by an
    /// un-ligated fragment.
    pub upper_size: i64,
    /// Upper bound on the reconstructed size of a self-ligated
    /// (circularized) fragment.
    pub self_ligation_size: i64,
    /// In stringent mode any read with a secondary alignment score is
    /// multi-mapped; in lenient mode it survives with mapping quality >= 30
    /// and a primary-to-secondary score gap >= 10.
    pub stringent: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            lower_size: 150,
            upper_size: 800,
            self_ligation_size: 2500,
            stringent: false,
        }
    }
}

/// Relative orientation of a read pair, named after strand and 5'-position
/// order: `F1R2` means R1 on the forward strand upstream of R2 on the
/// reverse strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    F1F2,
    F2F1,
    R1R2,
    R2R1,
    F1R2,
    R2F1,
    R1F2,
    F2R1,
}

/// Orientation reduced to the four classes that survive swapping which read
/// was labeled forward. Used for orientation-aware deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrientationClass {
    Inward,
    Outward,
    ForwardForward,
    ReverseReverse,
}

impl Orientation {
    fn of(forward: &SingleEndRecord, reverse: &SingleEndRecord) -> Self {
        let p1 = forward.five_prime_pos();
        let p2 = reverse.five_prime_pos();
        match (forward.reverse, reverse.reverse) {
            (false, false) => {
                if p1 <= p2 {
                    Orientation::F1F2
                } else {
                    Orientation::F2F1
                }
            }
            (true, true) => {
                if p1 <= p2 {
                    Orientation::R1R2
                } else {
                    Orientation::R2R1
                }
            }
            (false, true) => {
                if p1 <= p2 {
                    Orientation::F1R2
                } else {
                    Orientation::R2F1
                }
            }
            (true, false) => {
                if p1 <= p2 {
                    Orientation::R1F2
                } else {
                    Orientation::F2R1
                }
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Orientation::F1F2 => "F1F2",
            Orientation::F2F1 => "F2F1",
            Orientation::R1R2 => "R1R2",
            Orientation::R2R1 => "R2R1",
            Orientation::F1R2 => "F1R2",
            Orientation::R2F1 => "R2F1",
            Orientation::R1F2 => "R1F2",
            Orientation::F2R1 => "F2R1",
        }
    }

    /// Reads point towards one another (-> <-).
    pub fn is_inward(&self) -> bool {
        matches!(self, Orientation::F1R2 | Orientation::F2R1)
    }

    /// Reads point away from one another (<- ->).
    pub fn is_outward(&self) -> bool {
        matches!(self, Orientation::R2F1 | Orientation::R1F2)
    }

    /// Same-direction pairs; these arise from twisted loops, whereas inward
    /// and outward pairs are "simple".
    pub fn is_twisted(&self) -> bool {
        !self.is_inward() && !self.is_outward()
    }

    pub fn class(&self) -> OrientationClass {
        match self {
            Orientation::F1R2 | Orientation::F2R1 => OrientationClass::Inward,
            Orientation::R2F1 | Orientation::R1F2 => OrientationClass::Outward,
            Orientation::F1F2 | Orientation::F2F1 => OrientationClass::ForwardForward,
            Orientation::R1R2 | Orientation::R2R1 => OrientationClass::ReverseReverse,
        }
    }
}

/// The disjoint artifact categories of a uniquely mapped read pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    UnLigated,
    UnLigatedSameInternal,
    SelfLigated,
    SelfLigatedSameInternal,
    ValidPair,
    ValidTooShort,
    ValidTooLong,
    StrangeInternal,
}

impl Category {
    pub fn tag(&self) -> &'static str {
        match self {
            Category::UnLigated => "UL",
            Category::UnLigatedSameInternal => "ULSI",
            Category::SelfLigated => "SL",
            Category::SelfLigatedSameInternal => "SLSI",
            Category::ValidPair => "VP",
            Category::ValidTooShort => "TS",
            Category::ValidTooLong => "TL",
            Category::StrangeInternal => "SI",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Category::ValidPair)
    }

    /// Categories decided by the chimeric fragment size; these feed the
    /// fragment-size histogram.
    pub fn is_chimeric_sized(&self) -> bool {
        matches!(
            self,
            Category::ValidPair | Category::ValidTooShort | Category::ValidTooLong
        )
    }
}

/// Per-side mapping outcomes recorded for every input pair, whether or not
/// it could be paired.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingFlags {
    pub unmapped_forward: bool,
    pub unmapped_reverse: bool,
    pub multimapped_forward: bool,
    pub multimapped_reverse: bool,
    /// Either read aligned to a random/unplaced contig or a viral decoy.
    pub disqualified_reference: bool,
}

impl MappingFlags {
    pub fn is_paired(&self) -> bool {
        !self.unmapped_forward
            && !self.unmapped_reverse
            && !self.multimapped_forward
            && !self.multimapped_reverse
            && !self.disqualified_reference
    }
}

/// The classification of one uniquely mapped pair.
#[derive(Debug, Clone)]
pub struct Classification {
    pub fragments: FragmentPair,
    pub orientation: Orientation,
    pub category: Category,
    /// Reconstructed size of the chimeric fragment spanning both 5' ends.
    pub chimeric_size: i64,
    pub five_prime_forward: i64,
    pub five_prime_reverse: i64,
    /// At least one 5' end lies within 7 bp of a fragment boundary.
    pub dangling_end: bool,
    /// Reads map to different chromosomes.
    pub trans: bool,
}

/// The immutable result of classifying one input pair. Pairs that fail the
/// mapping gate carry flags only; fragment resolution and categorization
/// are skipped for them.
#[derive(Debug, Clone)]
pub struct ReadPair {
    pub flags: MappingFlags,
    pub classification: Option<Classification>,
}

impl ReadPair {
    pub fn is_paired(&self) -> bool {
        self.flags.is_paired()
    }
}

/// Random or unplaced contigs and viral decoy sequences cannot support a
/// unique pairing.
fn is_disqualified_reference(name: &str) -> bool {
    name.contains('_') || name == "chrEBV" || name == "EBV"
}

fn is_multimapped(record: &SingleEndRecord, config: &PairingConfig) -> bool {
    let Some(secondary) = record.secondary_score else {
        return false;
    };
    if config.stringent {
        return true;
    }
    if record.mapq < MIN_UNIQUE_MAPQ {
        return true;
    }
    match record.alignment_score {
        Some(primary) => primary - secondary < MIN_SCORE_GAP,
        None => true,
    }
}

fn mapping_flags(
    forward: &SingleEndRecord,
    reverse: &SingleEndRecord,
    config: &PairingConfig,
) -> MappingFlags {
    MappingFlags {
        unmapped_forward: !forward.mapped,
        unmapped_reverse: !reverse.mapped,
        multimapped_forward: forward.mapped && is_multimapped(forward, config),
        multimapped_reverse: reverse.mapped && is_multimapped(reverse, config),
        disqualified_reference: (forward.mapped && is_disqualified_reference(&forward.chromosome))
            || (reverse.mapped && is_disqualified_reference(&reverse.chromosome)),
    }
}

/// Size of the chimeric fragment: for each read, the distance from its 5'
/// end to the far boundary of its own fragment, summed over both reads.
/// Inward-facing pairs on a single shared fragment cannot be ligation
/// products; for them the plain 5'-to-5' distance is used instead.
fn chimeric_size(
    forward: &SingleEndRecord,
    reverse: &SingleEndRecord,
    fragments: &FragmentPair,
    orientation: Orientation,
) -> i64 {
    let p1 = forward.five_prime_pos();
    let p2 = reverse.five_prime_pos();
    if fragments.is_same_fragment() && orientation.is_inward() {
        return (p1 - p2).abs();
    }
    let d1 = if forward.reverse {
        p1 - fragments.forward.start + 1
    } else {
        fragments.forward.end - p1 + 1
    };
    let d2 = if reverse.reverse {
        p2 - fragments.reverse.start + 1
    } else {
        fragments.reverse.end - p2 + 1
    };
    d1 + d2
}

/// At least one read's 5' end overlaps a cutting site of the forward-read
/// fragment. When both reads share a fragment this is the fragment to check.
fn is_dangling_end(fragments: &FragmentPair, p1: i64, p2: i64) -> bool {
    let start = fragments.forward.start;
    let end = fragments.forward.end;
    (start - p1).abs() < DANGLING_WINDOW
        || (end - p1).abs() < DANGLING_WINDOW
        || (start - p2).abs() < DANGLING_WINDOW
        || (end - p2).abs() < DANGLING_WINDOW
}

fn size_check(chimeric: i64, config: &PairingConfig) -> Category {
    if chimeric < config.lower_size {
        Category::ValidTooShort
    } else if config.upper_size < chimeric {
        Category::ValidTooLong
    } else {
        Category::ValidPair
    }
}

/// Classify one pair of independently aligned single-end records.
///
/// Pure with respect to its inputs: the result value carries everything the
/// caller needs, and tagging the underlying alignment records is an
/// explicit, separate step in the orchestrator.
///
/// Returns `Err(UnknownReferenceSequence)` when a mapped read's 5' end
/// cannot be assigned to any fragment; callers should treat this as a
/// per-pair failure rather than aborting the run.
pub fn classify(
    forward: &SingleEndRecord,
    reverse: &SingleEndRecord,
    index: &FragmentIndex,
    config: &PairingConfig,
) -> Result<ReadPair, HicError> {
    let flags = mapping_flags(forward, reverse, config);
    if !flags.is_paired() {
        return Ok(ReadPair {
            flags,
            classification: None,
        });
    }

    let p1 = forward.five_prime_pos();
    let p2 = reverse.five_prime_pos();
    let fragments = FragmentPair {
        forward: index.lookup(&forward.chromosome, p1)?.clone(),
        reverse: index.lookup(&reverse.chromosome, p2)?.clone(),
    };

    let trans = forward.chromosome != reverse.chromosome;
    let orientation = Orientation::of(forward, reverse);
    let same_fragment = fragments.is_same_fragment();
    let chimeric = chimeric_size(forward, reverse, &fragments, orientation);
    let five_prime_distance = (p1 - p2).abs();

    let category = if !trans && (orientation.is_inward() || orientation.is_outward()) {
        if orientation.is_outward() {
            // Self-ligation: the circularized fragment spans both 5' ends
            // plus the chimeric portion.
            if same_fragment {
                Category::SelfLigatedSameInternal
            } else if chimeric + five_prime_distance < config.self_ligation_size {
                Category::SelfLigated
            } else {
                size_check(chimeric, config)
            }
        } else if same_fragment {
            Category::UnLigatedSameInternal
        } else if five_prime_distance < config.upper_size {
            Category::UnLigated
        } else {
            size_check(chimeric, config)
        }
    } else if same_fragment {
        // Trans or same-direction pairs within one fragment cannot be
        // explained by any ligation geometry.
        Category::StrangeInternal
    } else {
        size_check(chimeric, config)
    };

    let dangling_end = is_dangling_end(&fragments, p1, p2);

    Ok(ReadPair {
        flags,
        classification: Some(Classification {
            fragments,
            orientation,
            category,
            chimeric_size: chimeric,
            five_prime_forward: p1,
            five_prime_reverse: p2,
            dangling_end,
            trans,
        }),
    })
}
