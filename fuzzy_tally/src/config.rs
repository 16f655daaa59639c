// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// One raw vote submission, as parsed from a single input line.
///
/// Records are immutable once parsed. The timestamp is kept verbatim: it is
/// never interpreted, only carried along for diagnostics.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteRecord {
    pub id: String,
    pub timestamp: String,
    pub ip: String,
    pub candidate: String,
}

/// Line counters collected while removing duplicates.
///
/// These are observability data, not part of the voting outcome.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct DedupStats {
    pub total_lines: u64,
    /// Lines that did not match the record grammar. Not an error.
    pub malformed: u64,
    /// Well-formed lines dropped because their id or ip was already seen.
    pub duplicates: u64,
    pub retained: u64,
}

/// The records that survived duplicate removal, in first-occurrence order.
///
/// Invariant: no two records share an id and no two records share an ip.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DedupedVotes {
    pub records: Vec<VoteRecord>,
    pub stats: DedupStats,
}

/// Occurrence counts per distinct candidate name.
///
/// First-seen order is preserved and significant: it is the tie-break for
/// center selection and the iteration order for cluster building, so two runs
/// over the same input always produce the same partition.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> FrequencyTable {
        FrequencyTable::default()
    }

    /// Counts one occurrence of the name, registering it on first sight.
    pub fn record(&mut self, name: &str) {
        match self.index.get(name) {
            Some(&idx) => self.entries[idx].1 += 1,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), 1));
            }
        }
    }

    pub fn count(&self, name: &str) -> u64 {
        self.index.get(name).map(|&idx| self.entries[idx].1).unwrap_or(0)
    }

    /// All (name, count) pairs in first-seen order.
    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    /// All distinct names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ******** Output data structures *********

/// A group of candidate name strings believed to denote the same person,
/// represented by one center.
///
/// The center is always the first member. Members are listed in the order
/// they were absorbed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Cluster {
    pub center: String,
    pub members: Vec<String>,
}

impl Cluster {
    pub fn singleton(name: &str) -> Cluster {
        Cluster {
            center: name.to_string(),
            members: vec![name.to_string()],
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Number of names absorbed beside the center itself.
    pub fn absorbed(&self) -> usize {
        self.members.len() - 1
    }
}

/// The full partition of distinct candidate names into disjoint clusters.
///
/// Clusters are ordered: first one cluster per selected center, in selection
/// order, then singleton clusters for the leftover names in first-seen order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ClusterPartition {
    pub clusters: Vec<Cluster>,
    /// How many leading clusters were built around a selected center.
    pub num_center_clusters: usize,
}

impl ClusterPartition {
    /// The trailing clusters created for names no center claimed.
    pub fn leftover_clusters(&self) -> &[Cluster] {
        &self.clusters[self.num_center_clusters..]
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyEntry {
    /// The center name of the credited cluster.
    pub candidate: String,
    pub votes: u64,
}

/// The aggregated outcome: one entry per cluster, ranked by descending votes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VotingReport {
    pub tally: Vec<TallyEntry>,
    pub total_votes: u64,
    /// Votes attributed to some cluster. Equal to `total_votes` as long as
    /// the partition covers every observed name.
    pub covered_votes: u64,
}

impl VotingReport {
    /// Share of the total, in percent. Returns 0.0 on an empty election
    /// rather than dividing by zero.
    pub fn percentage(&self, votes: u64) -> f64 {
        if self.total_votes == 0 {
            0.0
        } else {
            votes as f64 / self.total_votes as f64 * 100.0
        }
    }

    pub fn coverage(&self) -> f64 {
        self.percentage(self.covered_votes)
    }
}

/// Everything the pipeline computed for one set of deduplicated records.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VotingResult {
    pub num_candidates: usize,
    pub centers: Vec<String>,
    pub partition: ClusterPartition,
    pub report: VotingReport,
}

/// Errors that prevent the pipeline from completing.
///
/// Malformed and duplicate records are not errors; the only fatal condition
/// is failing to read the input at all.
#[derive(Debug)]
pub enum VotingErrors {
    InputRead {
        path: String,
        source: std::io::Error,
    },
}

impl Error for VotingErrors {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VotingErrors::InputRead { source, .. } => Some(source),
        }
    }
}

impl Display for VotingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingErrors::InputRead { path, source } => {
                write!(f, "cannot read votes file {}: {}", path, source)
            }
        }
    }
}
