/// End-to-end tests running the hicpair binary over small synthetic inputs.
///
/// The BAM fixtures are written with rust-htslib and the valid-pair output
/// is read back with noodles, so the round trip crosses two independent BAM
/// implementations.
use noodles::bam as noodles_bam;
use rust_htslib::bam;
use rust_htslib::bam::record::{Cigar, CigarString};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

// ── helpers ──────────────────────────────────────────────────────────────────

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hicpair_e2e_{}_{name}", std::process::id()))
}

const HEADER: &str = "Chromosome\tFragment_Start_Position\tFragment_End_Position\tFragment_Number\t5'_Restriction_Site\t3'_Restriction_Site\tLength\t5'_GC_Content\t3'_GC_Content\t5'_Repeat_Content\t3'_Repeat_Content\tSelected\t5'_Probes\t3'_Probes";

fn digest_row(chrom: &str, start: i64, end: i64, ordinal: u32, selected: char) -> String {
    format!(
        "{chrom}\t{start}\t{end}\t{ordinal}\tDpnII\tDpnII\t{}\t0.50\t0.50\t0.10\t0.10\t{selected}\t0\t0",
        end - start + 1
    )
}

fn write_digest(path: &Path) {
    let mut file = std::fs::File::create(path).expect("create digest file");
    for line in [
        HEADER.to_string(),
        digest_row("chr1", 1, 1000, 1, 'F'),
        digest_row("chr1", 1001, 4000, 2, 'T'),
        digest_row("chr1", 4001, 8701, 3, 'F'),
        digest_row("chr1", 8702, 20000, 4, 'F'),
        digest_row("chr1", 20001, 30000, 5, 'F'),
        digest_row("chr2", 1, 5000, 1, 'F'),
        digest_row("chr2", 5001, 15000, 2, 'F'),
    ] {
        writeln!(file, "{line}").expect("write digest line");
    }
}

fn bam_header() -> bam::Header {
    let mut header = bam::Header::new();
    for (name, length) in [("chr1", 30000u32), ("chr2", 15000u32)] {
        let mut sq = bam::header::HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &name);
        sq.push_tag(b"LN", &length);
        header.push_record(&sq);
    }
    header
}

/// A uniquely mapped 40 bp record starting at `pos0` (0-based).
fn mapped_record(name: &[u8], tid: i32, pos0: i64, reverse: bool) -> bam::Record {
    let mut record = bam::Record::new();
    let cigar = CigarString(vec![Cigar::Match(40)]);
    let seq = vec![b'A'; 40];
    let qual = vec![30u8; 40];
    record.set(name, Some(&cigar), &seq, &qual);
    record.set_tid(tid);
    record.set_pos(pos0);
    record.set_mapq(60);
    if reverse {
        record.set_reverse();
    }
    record
}

fn unmapped_record(name: &[u8]) -> bam::Record {
    let mut record = bam::Record::new();
    let seq = vec![b'A'; 40];
    let qual = vec![30u8; 40];
    record.set(name, None, &seq, &qual);
    record.set_unmapped();
    record.set_tid(-1);
    record.set_pos(-1);
    record
}

fn write_bam(path: &Path, records: &[bam::Record]) {
    let header = bam_header();
    let mut writer =
        bam::Writer::from_path(path, &header, bam::Format::Bam).expect("create BAM writer");
    for record in records {
        writer.write(record).expect("write BAM record");
    }
}

fn hicpair_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hicpair"))
}

fn count_bam_records(path: &Path) -> usize {
    let mut reader = noodles_bam::io::reader::Builder
        .build_from_path(path)
        .expect("open BAM");
    reader.read_header().expect("read header");
    let mut count = 0usize;
    let mut record = noodles_bam::Record::default();
    loop {
        match reader.read_record(&mut record) {
            Ok(0) => break,
            Ok(_) => count += 1,
            Err(e) => panic!("read_record error: {e}"),
        }
    }
    count
}

/// Parse `key:value` lines from the stats file; the value may be followed by
/// a percentage in parentheses.
fn stat_value(contents: &str, key: &str) -> u64 {
    let prefix = format!("{key}:");
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix(&prefix) {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            return digits.parse().expect("numeric stat value");
        }
    }
    panic!("stat key '{key}' not found");
}

// ── tests ─────────────────────────────────────────────────────────────────────

/// Four input pairs: one valid, one exact duplicate of it, one with an
/// unmapped mate, one un-ligated. The run must keep exactly the valid pair,
/// drop the duplicate, and account for everything in the stats file.
#[test]
fn end_to_end_classifies_deduplicates_and_counts() {
    let digest = temp_file("run_digest.tsv");
    write_digest(&digest);

    let forward_bam = temp_file("run_R1.bam");
    let reverse_bam = temp_file("run_R2.bam");
    write_bam(
        &forward_bam,
        &[
            // 5' end 3950 in fragment chr1:1001-4000
            mapped_record(b"pair1", 0, 3949, false),
            mapped_record(b"pair2", 0, 3949, false),
            mapped_record(b"pair3", 0, 1499, false),
            mapped_record(b"pair4", 0, 3949, false),
        ],
    );
    write_bam(
        &reverse_bam,
        &[
            // 5' end 8950 in fragment chr1:8702-20000: a valid pair
            mapped_record(b"pair1", 0, 8910, true),
            mapped_record(b"pair2", 0, 8910, true),
            unmapped_record(b"pair3"),
            // 5' end 4070, distance 120 from its mate: un-ligated
            mapped_record(b"pair4", 0, 4030, true),
        ],
    );

    let prefix = temp_file("run_out").to_str().expect("utf8 path").to_string();
    let status = Command::new(hicpair_bin())
        .arg(&forward_bam)
        .arg(&reverse_bam)
        .args(["-d", digest.to_str().expect("utf8 path")])
        .args(["-o", &prefix, "-q"])
        .status()
        .expect("failed to spawn hicpair");
    assert!(status.success(), "hicpair exited with status {status}");

    let valid_bam = PathBuf::from(format!("{prefix}.valid_pairs.bam"));
    assert_eq!(count_bam_records(&valid_bam), 2);

    let stats =
        std::fs::read_to_string(format!("{prefix}.align.stats.txt")).expect("read stats file");
    assert_eq!(stat_value(&stats, "total_read_pairs_processed"), 4);
    assert_eq!(stat_value(&stats, "unmapped_R2"), 1);
    assert_eq!(stat_value(&stats, "unique_paired_read_pairs"), 3);
    assert_eq!(stat_value(&stats, "duplicated_pairs"), 1);
    assert_eq!(stat_value(&stats, "valid_pairs"), 1);
    assert_eq!(stat_value(&stats, "un_ligated"), 1);
    assert_eq!(stat_value(&stats, "total_interaction_count"), 1);
    assert_eq!(stat_value(&stats, "n_singleton_interactions"), 1);

    // One interacting fragment pair, count 1, mixed activation (T/F).
    let table = std::fs::read_to_string(format!("{prefix}.interaction.counts.table.tsv"))
        .expect("read interaction table");
    let rows: Vec<&str> = table.lines().collect();
    assert_eq!(rows.len(), 1);
    let fields: Vec<&str> = rows[0].split('\t').collect();
    assert_eq!(
        &fields[..9],
        &["chr1", "1001", "4000", "A", "chr1", "8702", "20000", "I", "S"]
    );
    assert_eq!(fields[9], "1");

    // Two rows in the fragment table, one per interacting fragment.
    let fragments =
        std::fs::read_to_string(format!("{prefix}.interacting.fragments.counts.table.tsv"))
            .expect("read fragment table");
    assert_eq!(fragments.lines().count(), 2);

    for path in [
        digest,
        forward_bam,
        reverse_bam,
        valid_bam,
        PathBuf::from(format!("{prefix}.align.stats.txt")),
        PathBuf::from(format!("{prefix}.interaction.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interacting.fragments.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interaction.counts.washU.simple.tsv")),
        PathBuf::from(format!("{prefix}.frag.sizes.counts.tsv")),
    ] {
        let _ = std::fs::remove_file(path);
    }
}

/// The written valid pairs carry proper paired-end flags.
#[test]
fn valid_output_records_are_flagged_as_pairs() {
    let digest = temp_file("flags_digest.tsv");
    write_digest(&digest);

    let forward_bam = temp_file("flags_R1.bam");
    let reverse_bam = temp_file("flags_R2.bam");
    write_bam(&forward_bam, &[mapped_record(b"pair1", 0, 3949, false)]);
    write_bam(&reverse_bam, &[mapped_record(b"pair1", 0, 8910, true)]);

    let prefix = temp_file("flags_out")
        .to_str()
        .expect("utf8 path")
        .to_string();
    let status = Command::new(hicpair_bin())
        .arg(&forward_bam)
        .arg(&reverse_bam)
        .args(["-d", digest.to_str().expect("utf8 path")])
        .args(["-o", &prefix, "-q"])
        .status()
        .expect("failed to spawn hicpair");
    assert!(status.success());

    let valid_bam = PathBuf::from(format!("{prefix}.valid_pairs.bam"));
    let mut reader = noodles_bam::io::reader::Builder
        .build_from_path(&valid_bam)
        .expect("open BAM");
    reader.read_header().expect("read header");
    let mut record = noodles_bam::Record::default();
    let mut seen = 0;
    while reader.read_record(&mut record).expect("read record") > 0 {
        let flags = record.flags();
        assert!(flags.is_segmented());
        assert!(flags.is_properly_segmented());
        seen += 1;
    }
    assert_eq!(seen, 2);

    for path in [
        digest,
        forward_bam,
        reverse_bam,
        valid_bam,
        PathBuf::from(format!("{prefix}.align.stats.txt")),
        PathBuf::from(format!("{prefix}.interaction.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interacting.fragments.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interaction.counts.washU.simple.tsv")),
        PathBuf::from(format!("{prefix}.frag.sizes.counts.tsv")),
    ] {
        let _ = std::fs::remove_file(path);
    }
}

/// With --output-rejected, artifact pairs go to their own BAM instead of
/// being dropped silently.
#[test]
fn rejected_pairs_are_written_when_requested() {
    let digest = temp_file("rejected_digest.tsv");
    write_digest(&digest);

    let forward_bam = temp_file("rejected_R1.bam");
    let reverse_bam = temp_file("rejected_R2.bam");
    // 5' ends 3950 and 4070: inward, 120 bp apart, un-ligated.
    write_bam(&forward_bam, &[mapped_record(b"pair1", 0, 3949, false)]);
    write_bam(&reverse_bam, &[mapped_record(b"pair1", 0, 4030, true)]);

    let prefix = temp_file("rejected_out")
        .to_str()
        .expect("utf8 path")
        .to_string();
    let status = Command::new(hicpair_bin())
        .arg(&forward_bam)
        .arg(&reverse_bam)
        .args(["-d", digest.to_str().expect("utf8 path")])
        .args(["-o", &prefix, "-q", "--output-rejected"])
        .status()
        .expect("failed to spawn hicpair");
    assert!(status.success());

    let valid_bam = PathBuf::from(format!("{prefix}.valid_pairs.bam"));
    let rejected_bam = PathBuf::from(format!("{prefix}.rejected_pairs.bam"));
    assert_eq!(count_bam_records(&valid_bam), 0);
    assert_eq!(count_bam_records(&rejected_bam), 2);

    for path in [
        digest,
        forward_bam,
        reverse_bam,
        valid_bam,
        rejected_bam,
        PathBuf::from(format!("{prefix}.align.stats.txt")),
        PathBuf::from(format!("{prefix}.interaction.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interacting.fragments.counts.table.tsv")),
        PathBuf::from(format!("{prefix}.interaction.counts.washU.simple.tsv")),
        PathBuf::from(format!("{prefix}.frag.sizes.counts.tsv")),
    ] {
        let _ = std::fs::remove_file(path);
    }
}

/// Streams of unequal length are a fatal error.
#[test]
fn desynchronized_streams_abort_the_run() {
    let digest = temp_file("desync_digest.tsv");
    write_digest(&digest);

    let forward_bam = temp_file("desync_R1.bam");
    let reverse_bam = temp_file("desync_R2.bam");
    write_bam(
        &forward_bam,
        &[
            mapped_record(b"pair1", 0, 3949, false),
            mapped_record(b"pair2", 0, 1499, false),
        ],
    );
    write_bam(&reverse_bam, &[mapped_record(b"pair1", 0, 8910, true)]);

    let prefix = temp_file("desync_out")
        .to_str()
        .expect("utf8 path")
        .to_string();
    let output = Command::new(hicpair_bin())
        .arg(&forward_bam)
        .arg(&reverse_bam)
        .args(["-d", digest.to_str().expect("utf8 path")])
        .args(["-o", &prefix, "-q"])
        .output()
        .expect("failed to spawn hicpair");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("desynchronized"),
        "unexpected stderr: {stderr}"
    );

    let _ = std::fs::remove_file(&digest);
    let _ = std::fs::remove_file(&forward_bam);
    let _ = std::fs::remove_file(&reverse_bam);
    let _ = std::fs::remove_file(format!("{prefix}.valid_pairs.bam"));
}
