//! hicpair: pair, classify and count capture Hi-C read pairs against an
//! in-silico restriction digest.
//!
//! # Library usage
//!
//! ```no_run
//! use hicpair::digest::FragmentIndex;
//! use hicpair::readpair::{classify, PairingConfig, SingleEndRecord};
//!
//! // Build the coordinate -> fragment index from a GOPHER digest table.
//! // let index = FragmentIndex::from_paths(path_to_digest, None)?;
//! //
//! // let config = PairingConfig::default();
//! //
//! // // Construct records from whatever source (rust-htslib, noodles, ...)
//! // let forward: SingleEndRecord = /* ... */;
//! // let reverse: SingleEndRecord = /* ... */;
//! // let pair = classify(&forward, &reverse, &index, &config)?;
//! ```

// Internal modules — not part of the public API.
pub(crate) mod types;

// The BAM I/O path, used by the binary.
pub mod bam_input;
pub mod cli;
pub mod pipeline;

// Public modules — stable API surface.
pub mod counts;
pub mod dedup;
pub mod digest;
pub mod enzyme;
pub mod error;
pub mod fragment;
pub mod readpair;

// Flat re-exports for the most commonly used public types.
pub use counts::{FragmentCoord, InteractionKey, InteractionMap};
pub use dedup::DedupMap;
pub use digest::FragmentIndex;
pub use error::HicError;
pub use fragment::{Fragment, FragmentPair};
pub use readpair::{classify, Category, Orientation, PairingConfig, ReadPair, SingleEndRecord};
