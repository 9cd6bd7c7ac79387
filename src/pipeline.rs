use crate::bam_input::{self, PairedBamReader};
use crate::cli::Args;
use crate::counts::InteractionMap;
use crate::dedup::DedupMap;
use crate::digest::FragmentIndex;
use crate::error::HicError;
use crate::readpair::{
    classify, Category, Classification, MappingFlags, Orientation, PairingConfig, SingleEndRecord,
};
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::record::Aux;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Aux tag carrying the artifact category of rejected pairs.
const CATEGORY_TAG: &[u8] = b"YY";

/// Aux tag carrying the relative orientation of the pair.
const ORIENTATION_TAG: &[u8] = b"RO";

/// Counters accumulated over one run.
#[derive(Debug, Default)]
pub struct Stats {
    pub n_total: u64,
    pub n_unmapped_forward: u64,
    pub n_unmapped_reverse: u64,
    pub n_multimapped_forward: u64,
    pub n_multimapped_reverse: u64,
    pub n_multimapped_pair: u64,
    pub n_disqualified: u64,
    pub n_paired: u64,
    pub n_duplicate: u64,
    pub n_could_not_assign: u64,

    pub n_un_ligated: u64,
    pub n_un_ligated_same_internal: u64,
    pub n_self_ligated: u64,
    pub n_self_ligated_same_internal: u64,
    pub n_valid: u64,
    pub n_too_short: u64,
    pub n_too_long: u64,
    pub n_strange_internal: u64,

    pub n_dangling: u64,
    pub n_trans: u64,

    pub n_f1f2: u64,
    pub n_f2f1: u64,
    pub n_r1r2: u64,
    pub n_r2r1: u64,
    pub n_f1r2: u64,
    pub n_f2r1: u64,
    pub n_r2f1: u64,
    pub n_r1f2: u64,

    /// Chimeric fragment sizes of size-checked pairs, clamped at the last
    /// bucket.
    pub frag_sizes_all: Vec<u64>,
    /// Same histogram restricted to pairs with exactly one active fragment.
    pub frag_sizes_hybrid_active: Vec<u64>,
}

impl Stats {
    fn new(size_limit: usize) -> Self {
        Self {
            frag_sizes_all: vec![0; size_limit + 1],
            frag_sizes_hybrid_active: vec![0; size_limit + 1],
            ..Default::default()
        }
    }

    fn record_flags(&mut self, flags: &MappingFlags) {
        if flags.unmapped_forward {
            self.n_unmapped_forward += 1;
        }
        if flags.unmapped_reverse {
            self.n_unmapped_reverse += 1;
        }
        if flags.multimapped_forward {
            self.n_multimapped_forward += 1;
        }
        if flags.multimapped_reverse {
            self.n_multimapped_reverse += 1;
        }
        if flags.multimapped_forward || flags.multimapped_reverse {
            self.n_multimapped_pair += 1;
        }
        if flags.disqualified_reference {
            self.n_disqualified += 1;
        }
        if flags.is_paired() {
            self.n_paired += 1;
        }
    }

    fn record_classification(&mut self, pair: &Classification) {
        match pair.category {
            Category::UnLigated => self.n_un_ligated += 1,
            Category::UnLigatedSameInternal => self.n_un_ligated_same_internal += 1,
            Category::SelfLigated => self.n_self_ligated += 1,
            Category::SelfLigatedSameInternal => self.n_self_ligated_same_internal += 1,
            Category::ValidPair => self.n_valid += 1,
            Category::ValidTooShort => self.n_too_short += 1,
            Category::ValidTooLong => self.n_too_long += 1,
            Category::StrangeInternal => self.n_strange_internal += 1,
        }
        match pair.orientation {
            Orientation::F1F2 => self.n_f1f2 += 1,
            Orientation::F2F1 => self.n_f2f1 += 1,
            Orientation::R1R2 => self.n_r1r2 += 1,
            Orientation::R2R1 => self.n_r2r1 += 1,
            Orientation::F1R2 => self.n_f1r2 += 1,
            Orientation::F2R1 => self.n_f2r1 += 1,
            Orientation::R2F1 => self.n_r2f1 += 1,
            Orientation::R1F2 => self.n_r1f2 += 1,
        }
        if pair.dangling_end {
            self.n_dangling += 1;
        }
        if pair.trans {
            self.n_trans += 1;
        }
        if pair.category.is_chimeric_sized() {
            let limit = self.frag_sizes_all.len() - 1;
            let bucket = pair.chimeric_size.clamp(0, limit as i64) as usize;
            self.frag_sizes_all[bucket] += 1;
            if pair.fragments.is_hybrid_active() {
                self.frag_sizes_hybrid_active[bucket] += 1;
            }
        }
    }

    /// Number of pairs that survived the gate and deduplication.
    pub fn n_categorized(&self) -> u64 {
        self.n_un_ligated
            + self.n_un_ligated_same_internal
            + self.n_self_ligated
            + self.n_self_ligated_same_internal
            + self.n_valid
            + self.n_too_short
            + self.n_too_long
            + self.n_strange_internal
    }

    pub fn n_innies(&self) -> u64 {
        self.n_f1r2 + self.n_f2r1
    }

    pub fn n_outies(&self) -> u64 {
        self.n_r2f1 + self.n_r1f2
    }

    pub fn n_commies(&self) -> u64 {
        self.n_f1f2 + self.n_f2f1 + self.n_r1r2 + self.n_r2r1
    }

    /// Self-ligation can only produce outward-pointing pairs, whereas
    /// twisted loops produce same-direction pairs at comparable rates per
    /// orientation. The excess of the mean outie count over the mean commie
    /// count estimates how many outies stem from self-ligation; approaches
    /// zero when no self-ligation occurred.
    pub fn self_ligation_coefficient(&self) -> f64 {
        let mean_outies = self.n_outies() as f64 / 2.0;
        let mean_commies = self.n_commies() as f64 / 4.0;
        (mean_outies - mean_commies) / (mean_outies + 1.0)
    }
}

struct OutputNames {
    valid_bam: PathBuf,
    rejected_bam: PathBuf,
    interaction_counts: PathBuf,
    fragment_counts: PathBuf,
    washu_counts: PathBuf,
    frag_sizes: PathBuf,
    stats: PathBuf,
}

impl OutputNames {
    fn new(prefix: &str) -> Self {
        Self {
            valid_bam: PathBuf::from(format!("{prefix}.valid_pairs.bam")),
            rejected_bam: PathBuf::from(format!("{prefix}.rejected_pairs.bam")),
            interaction_counts: PathBuf::from(format!("{prefix}.interaction.counts.table.tsv")),
            fragment_counts: PathBuf::from(format!(
                "{prefix}.interacting.fragments.counts.table.tsv"
            )),
            washu_counts: PathBuf::from(format!("{prefix}.interaction.counts.washU.simple.tsv")),
            frag_sizes: PathBuf::from(format!("{prefix}.frag.sizes.counts.tsv")),
            stats: PathBuf::from(format!("{prefix}.align.stats.txt")),
        }
    }
}

fn aux_int(record: &bam::Record, tag: &[u8]) -> Option<i64> {
    match record.aux(tag) {
        Ok(Aux::I8(v)) => Some(i64::from(v)),
        Ok(Aux::U8(v)) => Some(i64::from(v)),
        Ok(Aux::I16(v)) => Some(i64::from(v)),
        Ok(Aux::U16(v)) => Some(i64::from(v)),
        Ok(Aux::I32(v)) => Some(i64::from(v)),
        Ok(Aux::U32(v)) => Some(i64::from(v)),
        _ => None,
    }
}

/// Reduce a BAM record to the fields the classifier needs. Positions are
/// converted to 1-based inclusive coordinates.
fn extract_single_end(record: &bam::Record, names: &[String]) -> SingleEndRecord {
    let mapped = !record.is_unmapped() && record.tid() >= 0;
    let chromosome = if mapped {
        names
            .get(record.tid() as usize)
            .cloned()
            .unwrap_or_default()
    } else {
        String::new()
    };
    SingleEndRecord {
        chromosome,
        start: record.pos() + 1,
        end: record.cigar().end_pos(),
        reverse: record.is_reverse(),
        mapped,
        mapq: record.mapq(),
        alignment_score: aux_int(record, b"AS"),
        secondary_score: aux_int(record, b"XS"),
    }
}

/// Serialize the classification onto the two records before writing: aux
/// tags for category and orientation, and the SAM flag/mate fix-up turning
/// two single-end alignments into a proper pair.
fn tag_pair(
    forward: &mut bam::Record,
    reverse: &mut bam::Record,
    pair: &Classification,
) -> Result<()> {
    if !pair.category.is_valid() {
        forward.push_aux(CATEGORY_TAG, Aux::String(pair.category.tag()))?;
        reverse.push_aux(CATEGORY_TAG, Aux::String(pair.category.tag()))?;
    }
    forward.push_aux(ORIENTATION_TAG, Aux::String(pair.orientation.tag()))?;
    reverse.push_aux(ORIENTATION_TAG, Aux::String(pair.orientation.tag()))?;

    forward.set_paired();
    reverse.set_paired();
    forward.set_proper_pair();
    reverse.set_proper_pair();
    forward.set_first_in_template();
    reverse.set_last_in_template();
    if reverse.is_reverse() {
        forward.set_mate_reverse();
    } else {
        forward.unset_mate_reverse();
    }
    if forward.is_reverse() {
        reverse.set_mate_reverse();
    } else {
        reverse.unset_mate_reverse();
    }
    forward.set_mtid(reverse.tid());
    forward.set_mpos(reverse.pos());
    reverse.set_mtid(forward.tid());
    reverse.set_mpos(forward.pos());
    Ok(())
}

fn make_output_header(bam_pair: &PairedBamReader) -> bam::Header {
    let mut header = bam::Header::from_template(bam_pair.header());
    let mut program = bam::header::HeaderRecord::new(b"PG");
    program.push_tag(b"ID", &"hicpair");
    program.push_tag(b"PN", &"hicpair");
    program.push_tag(b"VN", &env!("CARGO_PKG_VERSION"));
    header.push_record(&program);
    header
}

/// Drive the full run: stream pairs, classify, deduplicate, count and write
/// all outputs.
pub fn run(args: &Args, index: &FragmentIndex) -> Result<Stats> {
    let config = PairingConfig {
        lower_size: args.lower_size,
        upper_size: args.upper_size,
        self_ligation_size: args.self_ligation_size,
        stringent: args.stringent,
    };
    let out = OutputNames::new(&args.out_prefix);

    let mut bam_pair = bam_input::open_pair(&args.forward_bam, &args.reverse_bam)?;
    let header = make_output_header(&bam_pair);
    let mut valid_writer = bam::Writer::from_path(&out.valid_bam, &header, bam::Format::Bam)
        .with_context(|| format!("creating {}", out.valid_bam.display()))?;
    let mut rejected_writer = if args.output_rejected {
        Some(
            bam::Writer::from_path(&out.rejected_bam, &header, bam::Format::Bam)
                .with_context(|| format!("creating {}", out.rejected_bam.display()))?,
        )
    } else {
        None
    };

    let mut stats = Stats::new(args.size_limit);
    let mut dedup = DedupMap::new(args.dedup_orientation);
    let mut interactions = InteractionMap::new(1);

    while let Some((mut record_forward, mut record_reverse)) = bam_pair.next_pair()? {
        stats.n_total += 1;

        let forward = extract_single_end(&record_forward, &bam_pair.forward_names);
        let reverse = extract_single_end(&record_reverse, &bam_pair.reverse_names);

        let pair = match classify(&forward, &reverse, index, &config) {
            Ok(pair) => pair,
            Err(err @ HicError::UnknownReferenceSequence { .. }) => {
                stats.n_could_not_assign += 1;
                tracing::warn!(%err, "could not assign read pair to a fragment");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        stats.record_flags(&pair.flags);
        let Some(classification) = pair.classification else {
            continue;
        };

        if dedup.has_seen(&classification) {
            stats.n_duplicate += 1;
            continue;
        }

        stats.record_classification(&classification);

        tag_pair(&mut record_forward, &mut record_reverse, &classification)?;
        if classification.category.is_valid() {
            valid_writer.write(&record_forward)?;
            valid_writer.write(&record_reverse)?;
            match interactions.increment(
                0,
                &classification.fragments.forward,
                &classification.fragments.reverse,
                classification.orientation,
            ) {
                Ok(_) => {}
                Err(err @ HicError::InternalInteractionAnomaly { .. }) => {
                    tracing::warn!(%err, "skipping interaction within one fragment");
                }
                Err(err) => return Err(err.into()),
            }
        } else if let Some(writer) = rejected_writer.as_mut() {
            writer.write(&record_forward)?;
            writer.write(&record_reverse)?;
        }
    }

    interactions.write_interaction_table(&out.interaction_counts)?;
    interactions.write_washu_table(&out.washu_counts)?;
    interactions.write_fragment_table(&out.fragment_counts)?;
    write_size_histogram(&out.frag_sizes, &stats)?;
    write_stats(&out.stats, &stats, &dedup, &interactions)?;

    Ok(stats)
}

fn write_size_histogram(path: &Path, stats: &Stats) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating fragment size histogram {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "size\tall_pairs\thybrid_active_pairs")?;
    for (size, (all, hybrid)) in stats
        .frag_sizes_all
        .iter()
        .zip(&stats.frag_sizes_hybrid_active)
        .enumerate()
    {
        writeln!(writer, "{size}\t{all}\t{hybrid}")?;
    }
    Ok(())
}

fn pct(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * n as f64 / total as f64
    }
}

fn write_stats(
    path: &Path,
    stats: &Stats,
    dedup: &DedupMap,
    interactions: &InteractionMap,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating summary statistics {}", path.display()))?;
    let mut w = BufWriter::new(file);
    let total = stats.n_total;
    let categorized = stats.n_categorized();

    writeln!(w, "#Align statistics")?;
    writeln!(w, "==================")?;
    writeln!(w)?;
    writeln!(w, "total_read_pairs_processed:{total}")?;
    writeln!(w, "unmapped_R1:{}", stats.n_unmapped_forward)?;
    writeln!(w, "unmapped_R2:{}", stats.n_unmapped_reverse)?;
    writeln!(w, "multimapped_R1:{}", stats.n_multimapped_forward)?;
    writeln!(w, "multimapped_R2:{}", stats.n_multimapped_reverse)?;
    writeln!(w, "multimapped_read_pairs:{}", stats.n_multimapped_pair)?;
    writeln!(w, "disqualified_reference_pairs:{}", stats.n_disqualified)?;
    writeln!(
        w,
        "unique_paired_read_pairs:{} ({:.2}%)",
        stats.n_paired,
        pct(stats.n_paired, total)
    )?;
    writeln!(
        w,
        "duplicated_pairs:{} ({:.2}%)",
        stats.n_duplicate,
        pct(stats.n_duplicate, total)
    )?;
    writeln!(
        w,
        "unassignable_pairs:{} ({:.2}%)",
        stats.n_could_not_assign,
        pct(stats.n_could_not_assign, total)
    )?;
    writeln!(w)?;
    writeln!(w, "#Pair categories")?;
    for (key, count) in [
        ("un_ligated", stats.n_un_ligated),
        ("un_ligated_same_internal", stats.n_un_ligated_same_internal),
        ("self_ligated", stats.n_self_ligated),
        (
            "self_ligated_same_internal",
            stats.n_self_ligated_same_internal,
        ),
        ("too_short", stats.n_too_short),
        ("too_long", stats.n_too_long),
        ("strange_internal", stats.n_strange_internal),
        ("valid_pairs", stats.n_valid),
    ] {
        writeln!(w, "{key}:{count} ({:.2}%)", pct(count, total))?;
    }
    writeln!(w, "total_categorized:{categorized}")?;
    writeln!(
        w,
        "dangling_end_pairs:{} ({:.2}%)",
        stats.n_dangling,
        pct(stats.n_dangling, total)
    )?;
    writeln!(
        w,
        "trans_pairs:{} ({:.2}%)",
        stats.n_trans,
        pct(stats.n_trans, total)
    )?;
    writeln!(w)?;
    writeln!(w, "#Pair orientations")?;
    for (key, count) in [
        ("F1F2_commie", stats.n_f1f2),
        ("F2F1_commie", stats.n_f2f1),
        ("R1R2_commie", stats.n_r1r2),
        ("R2R1_commie", stats.n_r2r1),
        ("F1R2_innie", stats.n_f1r2),
        ("F2R1_innie", stats.n_f2r1),
        ("R2F1_outie", stats.n_r2f1),
        ("R1F2_outie", stats.n_r1f2),
    ] {
        writeln!(w, "{key}:{count} ({:.2}%)", pct(count, categorized))?;
    }
    writeln!(w, "innies:{}", stats.n_innies())?;
    writeln!(w, "outies:{}", stats.n_outies())?;
    writeln!(w, "commies:{}", stats.n_commies())?;
    writeln!(w)?;
    writeln!(w, "#Deduplication")?;
    writeln!(w, "dedup_queries:{}", dedup.queries())?;
    writeln!(w, "dedup_insertions:{}", dedup.insertions())?;
    writeln!(
        w,
        "dedup_chromosome_pair_keys:{}",
        dedup.chromosome_pair_keys()
    )?;
    writeln!(w, "dedup_first_coordinates:{}", dedup.first_coords())?;
    writeln!(w, "dedup_second_coordinates:{}", dedup.second_coords())?;
    writeln!(w)?;
    writeln!(w, "#Interactions")?;
    writeln!(
        w,
        "total_interaction_count:{}",
        interactions.interaction_count(0)
    )?;
    writeln!(
        w,
        "interactions_between_selected_fragments:{}",
        interactions.active_active_count(0)
    )?;
    writeln!(
        w,
        "interactions_between_unselected_fragments:{}",
        interactions.inactive_inactive_count(0)
    )?;
    writeln!(
        w,
        "interactions_between_selected_and_unselected_fragments:{}",
        interactions.mixed_count(0)
    )?;
    writeln!(
        w,
        "total_interacting_fragments:{}",
        interactions.interacting_fragment_count(0)
    )?;
    writeln!(
        w,
        "selected_interacting_fragments:{}",
        interactions.active_interacting_fragment_count(0)
    )?;
    let breakdown = interactions.summarize_interactions();
    writeln!(w, "n_singleton_interactions:{}", breakdown.singleton)?;
    writeln!(
        w,
        "n_singleton_interactions_trans:{}",
        breakdown.singleton_trans
    )?;
    writeln!(
        w,
        "n_singleton_interactions_short_range:{}",
        breakdown.singleton_short_range
    )?;
    writeln!(
        w,
        "n_singleton_interactions_long_range:{}",
        breakdown.singleton_long_range
    )?;
    writeln!(w, "n_gt1_interactions:{}", breakdown.multi)?;
    writeln!(w, "n_gt1_interactions_trans:{}", breakdown.multi_trans)?;
    writeln!(
        w,
        "n_gt1_interactions_short_range:{}",
        breakdown.multi_short_range
    )?;
    writeln!(
        w,
        "n_gt1_interactions_long_range:{}",
        breakdown.multi_long_range
    )?;
    writeln!(w)?;
    writeln!(w, "#Quality metrics")?;
    writeln!(
        w,
        "target_enrichment_coefficient:{:.2}%",
        100.0 * interactions.target_enrichment_coefficient(0)
    )?;
    writeln!(
        w,
        "cross_ligation_coefficient:{:.2}%",
        pct(stats.n_trans, categorized)
    )?;
    writeln!(
        w,
        "valid_interaction_enrichment_coefficient:{:.2}%",
        pct(stats.n_valid, categorized)
    )?;
    writeln!(
        w,
        "self_ligation_coefficient:{:.2}",
        stats.self_ligation_coefficient()
    )?;
    Ok(())
}
