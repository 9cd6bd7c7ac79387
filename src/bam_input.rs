use crate::error::HicError;
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::path::{Path, PathBuf};

/// Two synchronized single-end BAM streams, one per mate, as produced by
/// aligning the forward and reverse reads independently. Record `i` of one
/// stream is the mate of record `i` of the other.
pub struct PairedBamReader {
    forward: bam::Reader,
    reverse: bam::Reader,
    forward_path: PathBuf,
    reverse_path: PathBuf,
    pub forward_names: Vec<String>,
    pub reverse_names: Vec<String>,
}

fn target_names(reader: &bam::Reader) -> Vec<String> {
    reader
        .header()
        .target_names()
        .iter()
        .map(|name| String::from_utf8_lossy(name).to_string())
        .collect()
}

pub fn open_pair(forward_path: &Path, reverse_path: &Path) -> Result<PairedBamReader> {
    let forward = bam::Reader::from_path(forward_path)
        .with_context(|| format!("opening forward BAM {}", forward_path.display()))?;
    let reverse = bam::Reader::from_path(reverse_path)
        .with_context(|| format!("opening reverse BAM {}", reverse_path.display()))?;
    let forward_names = target_names(&forward);
    let reverse_names = target_names(&reverse);
    Ok(PairedBamReader {
        forward,
        reverse,
        forward_path: forward_path.to_path_buf(),
        reverse_path: reverse_path.to_path_buf(),
        forward_names,
        reverse_names,
    })
}

impl PairedBamReader {
    /// Header of the forward stream, used as the template for output files.
    pub fn header(&self) -> &bam::HeaderView {
        self.forward.header()
    }

    /// The next record from each stream. Both streams must end together;
    /// one ending early is a fatal `StreamDesynchronization`.
    pub fn next_pair(&mut self) -> Result<Option<(bam::Record, bam::Record)>> {
        let mut record_forward = bam::Record::new();
        let mut record_reverse = bam::Record::new();
        let read_forward = self.forward.read(&mut record_forward);
        let read_reverse = self.reverse.read(&mut record_reverse);
        match (read_forward, read_reverse) {
            (None, None) => Ok(None),
            (Some(result_forward), Some(result_reverse)) => {
                result_forward
                    .with_context(|| format!("reading {}", self.forward_path.display()))?;
                result_reverse
                    .with_context(|| format!("reading {}", self.reverse_path.display()))?;
                Ok(Some((record_forward, record_reverse)))
            }
            (Some(_), None) => Err(HicError::StreamDesynchronization {
                longer: self.forward_path.clone(),
                shorter: self.reverse_path.clone(),
            }
            .into()),
            (None, Some(_)) => Err(HicError::StreamDesynchronization {
                longer: self.reverse_path.clone(),
                shorter: self.forward_path.clone(),
            }
            .into()),
        }
    }
}
