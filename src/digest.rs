use crate::error::HicError;
use crate::fragment::Fragment;
use crate::types::{HashMap, HashMapExt, HashSet, HashSetExt};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Field count of a GOPHER digest-table row.
const DIGEST_FIELD_COUNT: usize = 14;

/// Alternative spellings of the mitochondrial reference.
const MITOCHONDRIAL_NAMES: [&str; 4] = ["M", "MT", "chrM", "chrMT"];

/// All fragments of one chromosome, sorted by start position. The end
/// coordinates are kept in a parallel array for binary search.
#[derive(Debug)]
struct ChromFragments {
    ends: Vec<i64>,
    fragments: Vec<Arc<Fragment>>,
}

/// Maps a genomic coordinate to its enclosing restriction fragment in
/// O(log n) time.
///
/// The index is built once from a digest table and is read-only afterwards;
/// concurrent lookups need no locking. Chromosome names are registered both
/// with and without a leading `chr` prefix, and the mitochondrial spellings
/// `M`/`MT`/`chrM`/`chrMT` all resolve to the same fragment list, so lookups
/// succeed regardless of the naming convention used by the aligner.
#[derive(Debug)]
pub struct FragmentIndex {
    by_chrom: HashMap<String, Arc<ChromFragments>>,
    chromosome_count: usize,
    fragment_count: usize,
    active_fragment_count: usize,
}

impl FragmentIndex {
    /// Build the index from a digest table and an optional active-digest
    /// overlay file (chromosome, start, end; fragments listed there are
    /// marked active in addition to the table's `Selected` column).
    pub fn from_paths(digest_path: &Path, active_path: Option<&Path>) -> Result<Self> {
        let active = match active_path {
            Some(path) => read_active_digests(path)
                .with_context(|| format!("reading active digests from {}", path.display()))?,
            None => HashSet::new(),
        };

        let file = File::open(digest_path)
            .with_context(|| format!("opening digest table {}", digest_path.display()))?;
        let reader = BufReader::new(file);

        let mut loaded: HashMap<String, Vec<Arc<Fragment>>> = HashMap::new();
        let mut fragment_count = 0usize;
        let mut active_fragment_count = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", digest_path.display()))?;
            let line_no = idx + 1;
            if line.starts_with("Chromosome") || line.is_empty() {
                continue;
            }
            let fragment = parse_digest_row(&line, digest_path, line_no, &active)?;
            fragment_count += 1;
            if fragment.active {
                active_fragment_count += 1;
            }
            loaded
                .entry(fragment.chromosome.clone())
                .or_default()
                .push(Arc::new(fragment));
        }

        let mut by_chrom: HashMap<String, Arc<ChromFragments>> = HashMap::new();
        let chromosome_count = loaded.len();
        for (chromosome, mut fragments) in loaded {
            fragments.sort_by_key(|f| f.start);
            let ends = fragments.iter().map(|f| f.end).collect();
            by_chrom.insert(chromosome, Arc::new(ChromFragments { ends, fragments }));
        }

        register_aliases(&mut by_chrom);

        tracing::info!(
            chromosomes = chromosome_count,
            fragments = fragment_count,
            active_fragments = active_fragment_count,
            "fragment index built"
        );

        Ok(Self {
            by_chrom,
            chromosome_count,
            fragment_count,
            active_fragment_count,
        })
    }

    /// Find the fragment whose interval contains `position` (1-based).
    ///
    /// An exact hit on a fragment end coordinate returns that fragment;
    /// otherwise the insertion point locates the enclosing fragment, since
    /// end coordinates are strictly increasing and intervals contiguous.
    pub fn lookup(&self, chromosome: &str, position: i64) -> Result<&Arc<Fragment>, HicError> {
        let chrom = self
            .by_chrom
            .get(chromosome)
            .ok_or_else(|| HicError::UnknownReferenceSequence {
                name: chromosome.to_string(),
                position,
            })?;
        let idx = match chrom.ends.binary_search(&position) {
            Ok(i) => i,
            Err(i) => i,
        };
        chrom
            .fragments
            .get(idx)
            .ok_or_else(|| HicError::UnknownReferenceSequence {
                name: chromosome.to_string(),
                position,
            })
    }

    pub fn chromosome_count(&self) -> usize {
        self.chromosome_count
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    pub fn active_fragment_count(&self) -> usize {
        self.active_fragment_count
    }
}

/// Register each chromosome under the opposite `chr` spelling and cross-link
/// the mitochondrial names. Aliases share the fragment storage; existing
/// keys are never overwritten.
fn register_aliases(by_chrom: &mut HashMap<String, Arc<ChromFragments>>) {
    let mut aliases: Vec<(String, Arc<ChromFragments>)> = Vec::new();
    for (name, fragments) in by_chrom.iter() {
        match name.strip_prefix("chr") {
            Some(stripped) => aliases.push((stripped.to_string(), Arc::clone(fragments))),
            None => aliases.push((format!("chr{name}"), Arc::clone(fragments))),
        }
    }
    for (alias, fragments) in aliases {
        by_chrom.entry(alias).or_insert(fragments);
    }

    let mito = MITOCHONDRIAL_NAMES
        .iter()
        .find_map(|name| by_chrom.get(*name).map(Arc::clone));
    if let Some(fragments) = mito {
        for name in MITOCHONDRIAL_NAMES {
            by_chrom
                .entry(name.to_string())
                .or_insert_with(|| Arc::clone(&fragments));
        }
    }
}

fn parse_digest_row(
    line: &str,
    path: &Path,
    line_no: usize,
    active: &HashSet<(String, i64)>,
) -> Result<Fragment, HicError> {
    let malformed = |reason: String| HicError::MalformedDigestRecord {
        path: path.to_path_buf(),
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != DIGEST_FIELD_COUNT {
        return Err(malformed(format!(
            "expected {DIGEST_FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let parse_int = |field: &str, what: &str| -> Result<i64, HicError> {
        field
            .parse::<i64>()
            .map_err(|_| malformed(format!("unparseable {what} '{field}'")))
    };

    let chromosome = fields[0].to_string();
    let start = parse_int(fields[1], "start position")?;
    let end = parse_int(fields[2], "end position")?;
    let ordinal = parse_int(fields[3], "fragment number")? as u32;
    let selected = match fields[11] {
        "T" => true,
        "F" => false,
        other => return Err(malformed(format!("unparseable selected flag '{other}'"))),
    };

    Ok(Fragment {
        active: selected || active.contains(&(chromosome.clone(), start)),
        chromosome,
        start,
        end,
        ordinal,
        five_prime_site: fields[4].to_string(),
        three_prime_site: fields[5].to_string(),
    })
}

/// Read the active-digest overlay: tab-separated rows with at least
/// chromosome, start and end. Keys are (chromosome, start).
fn read_active_digests(path: &Path) -> Result<HashSet<(String, i64)>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut keys = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(HicError::MalformedDigestRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("expected at least 3 fields, found {}", fields.len()),
            }
            .into());
        }
        let start = fields[1].parse::<i64>().map_err(|_| {
            HicError::MalformedDigestRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("unparseable start position '{}'", fields[1]),
            }
        })?;
        keys.insert((fields[0].to_string(), start));
    }
    Ok(keys)
}
