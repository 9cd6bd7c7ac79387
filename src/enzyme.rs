use crate::error::HicError;

/// A restriction enzyme, described by its name and cutting site.
///
/// The site notation uses `^` for the cut position, e.g. `A^AGCTT` for
/// HindIII or `^GATC` for DpnII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionEnzyme {
    name: String,
    site: String,
    plain_site: String,
    offset: usize,
}

impl RestrictionEnzyme {
    pub fn new(name: &str, site: &str) -> Result<Self, HicError> {
        let offset = site
            .find('^')
            .ok_or_else(|| HicError::MalformedRestrictionSite {
                site: site.to_string(),
            })?;
        let plain_site: String = site.chars().filter(|&c| c != '^').collect();
        Ok(Self {
            name: name.to_string(),
            site: site.to_string(),
            plain_site,
            offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// The recognition sequence without the cut marker.
    pub fn plain_site(&self) -> &str {
        &self.plain_site
    }

    /// Number of bases before the cut, e.g. 1 for `A^AGCTT`, 0 for `^GATC`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The sequence created at a ligation junction: the enzyme cuts, the
    /// sticky overhangs are filled in with biotinylated nucleotides, and
    /// the blunt ends are ligated. For HindIII (`A^AGCTT`) this gives
    /// `A + AGCT + AGCT + T = AAGCTAGCTT`.
    pub fn ligation_sequence(&self) -> String {
        let len = self.plain_site.len();
        let flank = self.offset.min(len - self.offset);
        let five_prime = &self.plain_site[..flank];
        let fill_in = &self.plain_site[flank..len - flank];
        let three_prime = &self.plain_site[len - flank..];
        format!("{five_prime}{fill_in}{fill_in}{three_prime}")
    }
}

impl std::fmt::Display for RestrictionEnzyme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.site)
    }
}
