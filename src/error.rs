use std::path::PathBuf;
use thiserror::Error;

/// Domain errors for digest parsing, fragment lookup and counting.
///
/// Uniqueness and mapping-quality failures are not errors; they are
/// first-class classification outcomes (see `readpair`).
#[derive(Debug, Error)]
pub enum HicError {
    /// A digest-table row with the wrong field count or an unparseable
    /// field. Fatal: aborts index construction.
    #[error("malformed digest record at {}:{line}: {reason}", path.display())]
    MalformedDigestRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A lookup against a chromosome absent from the fragment index, or a
    /// position beyond the last fragment of a known chromosome. Fatal for
    /// the affected read pair only.
    #[error("no restriction fragment covers {name}:{position}")]
    UnknownReferenceSequence { name: String, position: i64 },

    /// One input stream ended before the other. Fatal.
    #[error(
        "input streams desynchronized: {} has more records than {}",
        longer.display(),
        shorter.display()
    )]
    StreamDesynchronization { longer: PathBuf, shorter: PathBuf },

    /// Both resolved fragments are identical and at the same starting
    /// position during aggregation. Recovered locally: logged and skipped.
    #[error("interaction between identical fragments at {chromosome}:{start}")]
    InternalInteractionAnomaly { chromosome: String, start: i64 },

    /// A restriction site without a `^` cut marker.
    #[error("restriction site '{site}' has no cut marker (^)")]
    MalformedRestrictionSite { site: String },
}
