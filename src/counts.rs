use crate::error::HicError;
use crate::fragment::Fragment;
use crate::readpair::Orientation;
use crate::types::{HashMap, HashMapExt};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Interactions whose fragment centers are at least this far apart are
/// long-range.
const LONG_RANGE_THRESHOLD: i64 = 10_000;

/// The identity of one fragment inside an interaction key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentCoord {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub active: bool,
}

impl FragmentCoord {
    fn center(&self) -> i64 {
        self.start + (self.end - self.start) / 2
    }

    fn activation_state(&self) -> char {
        if self.active {
            'A'
        } else {
            'I'
        }
    }
}

impl From<&Fragment> for FragmentCoord {
    fn from(fragment: &Fragment) -> Self {
        Self {
            chromosome: fragment.chromosome.clone(),
            start: fragment.start,
            end: fragment.end,
            active: fragment.active,
        }
    }
}

/// Canonical key of one fragment-pair interaction: the fragment with the
/// smaller start position always comes first (ties broken by chromosome
/// name), so incrementing with (A, B) and (B, A) updates the same bucket.
/// `simple` distinguishes inward/outward pairs from same-direction
/// ("twisted") pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteractionKey {
    pub first: FragmentCoord,
    pub second: FragmentCoord,
    pub simple: bool,
}

impl InteractionKey {
    pub fn new(a: FragmentCoord, b: FragmentCoord, orientation: Orientation) -> Self {
        let swap = match a.start.cmp(&b.start) {
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => a.chromosome > b.chromosome,
        };
        let (first, second) = if swap { (b, a) } else { (a, b) };
        Self {
            first,
            second,
            simple: !orientation.is_twisted(),
        }
    }

    fn is_trans(&self) -> bool {
        self.first.chromosome != self.second.chromosome
    }

    fn center_distance(&self) -> i64 {
        (self.second.center() - self.first.center()).abs()
    }
}

/// Breakdown of interaction multiplicities for the run summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractionBreakdown {
    pub singleton: u64,
    pub singleton_trans: u64,
    pub singleton_short_range: u64,
    pub singleton_long_range: u64,
    pub multi: u64,
    pub multi_trans: u64,
    pub multi_short_range: u64,
    pub multi_long_range: u64,
}

/// Accumulates read-pair counts per interacting fragment pair, for one or
/// more experimental conditions.
///
/// A second, fragment-level table can be derived from the accumulated pair
/// counts; derivation rebuilds that table from scratch so repeated calls
/// with no intervening increments yield identical results.
#[derive(Debug)]
pub struct InteractionMap {
    n_conditions: usize,
    interactions: HashMap<InteractionKey, Vec<u32>>,
    fragment_counts: HashMap<FragmentCoord, Vec<u64>>,
    interaction_count: Vec<u64>,
    active_active_count: Vec<u64>,
    inactive_inactive_count: Vec<u64>,
    mixed_count: Vec<u64>,
    read_count: Vec<u64>,
    active_read_count: Vec<u64>,
    interacting_fragments: Vec<u64>,
    active_interacting_fragments: Vec<u64>,
}

impl InteractionMap {
    pub fn new(n_conditions: usize) -> Self {
        Self {
            n_conditions,
            interactions: HashMap::new(),
            fragment_counts: HashMap::new(),
            interaction_count: vec![0; n_conditions],
            active_active_count: vec![0; n_conditions],
            inactive_inactive_count: vec![0; n_conditions],
            mixed_count: vec![0; n_conditions],
            read_count: vec![0; n_conditions],
            active_read_count: vec![0; n_conditions],
            interacting_fragments: vec![0; n_conditions],
            active_interacting_fragments: vec![0; n_conditions],
        }
    }

    /// Count one read pair between two fragments for the given condition.
    ///
    /// An interaction of a fragment with itself has no meaning here; such
    /// calls fail with `InternalInteractionAnomaly` without touching any
    /// counter. Callers log and move on.
    pub fn increment(
        &mut self,
        condition: usize,
        a: &Fragment,
        b: &Fragment,
        orientation: Orientation,
    ) -> Result<InteractionKey, HicError> {
        if a.chromosome == b.chromosome && a.start == b.start {
            return Err(HicError::InternalInteractionAnomaly {
                chromosome: a.chromosome.clone(),
                start: a.start,
            });
        }

        self.read_count[condition] += 2;
        if a.active {
            self.active_read_count[condition] += 1;
        }
        if b.active {
            self.active_read_count[condition] += 1;
        }

        let n = self.n_conditions;
        let key = InteractionKey::new(FragmentCoord::from(a), FragmentCoord::from(b), orientation);
        let counts = self
            .interactions
            .entry(key.clone())
            .or_insert_with(|| vec![0; n]);
        counts[condition] += 1;

        if counts[condition] == 1 {
            self.interaction_count[condition] += 1;
            match (key.first.active, key.second.active) {
                (true, true) => self.active_active_count[condition] += 1,
                (false, false) => self.inactive_inactive_count[condition] += 1,
                _ => self.mixed_count[condition] += 1,
            }
        }

        Ok(key)
    }

    /// Derive per-fragment read totals and interacting-fragment counts from
    /// the accumulated pair counts. Rebuilds from scratch on every call.
    pub fn derive_read_counts_at_interacting_fragments(&mut self) {
        let n = self.n_conditions;
        let mut fragment_counts: HashMap<FragmentCoord, Vec<u64>> = HashMap::new();
        for (key, counts) in &self.interactions {
            for coord in [&key.first, &key.second] {
                let totals = fragment_counts
                    .entry(coord.clone())
                    .or_insert_with(|| vec![0; n]);
                for (condition, &count) in counts.iter().enumerate() {
                    totals[condition] += u64::from(count);
                }
            }
        }

        self.interacting_fragments = vec![0; n];
        self.active_interacting_fragments = vec![0; n];
        for (coord, totals) in &fragment_counts {
            for condition in 0..n {
                if totals[condition] > 0 {
                    self.interacting_fragments[condition] += 1;
                    if coord.active {
                        self.active_interacting_fragments[condition] += 1;
                    }
                }
            }
        }

        self.fragment_counts = fragment_counts;
    }

    /// Classify every accumulated interaction as singleton (one read pair
    /// across all conditions) or not, split by trans / short-range /
    /// long-range.
    pub fn summarize_interactions(&self) -> InteractionBreakdown {
        let mut breakdown = InteractionBreakdown::default();
        for (key, counts) in &self.interactions {
            let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
            let singleton = total == 1;
            let (all, trans, short_range, long_range) = if singleton {
                (
                    &mut breakdown.singleton,
                    &mut breakdown.singleton_trans,
                    &mut breakdown.singleton_short_range,
                    &mut breakdown.singleton_long_range,
                )
            } else {
                (
                    &mut breakdown.multi,
                    &mut breakdown.multi_trans,
                    &mut breakdown.multi_short_range,
                    &mut breakdown.multi_long_range,
                )
            };
            *all += 1;
            if key.is_trans() {
                *trans += 1;
            } else if key.center_distance() < LONG_RANGE_THRESHOLD {
                *short_range += 1;
            } else {
                *long_range += 1;
            }
        }
        breakdown
    }

    pub fn n_conditions(&self) -> usize {
        self.n_conditions
    }

    pub fn distinct_interactions(&self) -> usize {
        self.interactions.len()
    }

    pub fn interaction_count(&self, condition: usize) -> u64 {
        self.interaction_count[condition]
    }

    pub fn active_active_count(&self, condition: usize) -> u64 {
        self.active_active_count[condition]
    }

    pub fn inactive_inactive_count(&self, condition: usize) -> u64 {
        self.inactive_inactive_count[condition]
    }

    pub fn mixed_count(&self, condition: usize) -> u64 {
        self.mixed_count[condition]
    }

    pub fn read_count(&self, condition: usize) -> u64 {
        self.read_count[condition]
    }

    pub fn active_read_count(&self, condition: usize) -> u64 {
        self.active_read_count[condition]
    }

    /// Fraction of counted reads that fell into probe-selected fragments.
    pub fn target_enrichment_coefficient(&self, condition: usize) -> f64 {
        if self.read_count[condition] == 0 {
            0.0
        } else {
            self.active_read_count[condition] as f64 / self.read_count[condition] as f64
        }
    }

    pub fn interacting_fragment_count(&self, condition: usize) -> u64 {
        self.interacting_fragments[condition]
    }

    pub fn active_interacting_fragment_count(&self, condition: usize) -> u64 {
        self.active_interacting_fragments[condition]
    }

    /// Pair count for one key and condition.
    pub fn count_for(&self, key: &InteractionKey, condition: usize) -> Option<u32> {
        self.interactions.get(key).map(|counts| counts[condition])
    }

    /// Read total for one fragment and condition, as of the last derivation.
    pub fn fragment_read_count(&self, coord: &FragmentCoord, condition: usize) -> Option<u64> {
        self.fragment_counts.get(coord).map(|totals| totals[condition])
    }

    /// One row per interacting fragment pair: both fragments' coordinates
    /// and activation state, the simple/twisted tag, and one count column
    /// per condition.
    pub fn write_interaction_table(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating interaction count table {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (key, counts) in &self.interactions {
            write!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                key.first.chromosome,
                key.first.start,
                key.first.end,
                key.first.activation_state(),
                key.second.chromosome,
                key.second.start,
                key.second.end,
                key.second.activation_state(),
                if key.simple { 'S' } else { 'T' },
            )?;
            for count in counts {
                write!(writer, "\t{count}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// One row per interacting fragment: coordinates, activation state and
    /// one read-total column per condition. Derives the fragment-level
    /// table first.
    pub fn write_fragment_table(&mut self, path: &Path) -> Result<()> {
        self.derive_read_counts_at_interacting_fragments();
        let file = File::create(path)
            .with_context(|| format!("creating fragment count table {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (coord, totals) in &self.fragment_counts {
            write!(
                writer,
                "{}\t{}\t{}\t{}",
                coord.chromosome,
                coord.start,
                coord.end,
                coord.activation_state(),
            )?;
            for total in totals {
                write!(writer, "\t{total}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Long-range cis interactions in the washU simple text format, counts
    /// summed across conditions.
    pub fn write_washu_table(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating washU interaction table {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (key, counts) in &self.interactions {
            if key.is_trans() || key.center_distance() < LONG_RANGE_THRESHOLD {
                continue;
            }
            let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
            writeln!(
                writer,
                "{}:{}-{}\t{}:{}-{}\t{}",
                key.first.chromosome,
                key.first.start,
                key.first.end,
                key.second.chromosome,
                key.second.start,
                key.second.end,
                total,
            )?;
        }
        Ok(())
    }
}
