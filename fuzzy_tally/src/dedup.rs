// Primitives for reading and deduplicating raw vote lines.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use regex::Regex;

use crate::config::{DedupStats, DedupedVotes, VoteRecord, VotingErrors};

/// The record grammar: `id: <digits>, time: <text>, ip: <digits and dots>,
/// candidate: <remainder>`. The time field is non-greedy so it stops at the
/// next field marker; the ip token is deliberately permissive (any digits and
/// dots, no octet validation).
const VOTE_LINE: &str = r"id: (\d+), time: (.+?), ip: ([\d.]+), candidate: (.+)";

/// Parser for one line of raw vote data.
///
/// Lines that do not match the grammar are not an error: `parse` returns
/// `None` and the caller decides whether to count them.
pub struct LineParser {
    re: Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        LineParser::new()
    }
}

impl LineParser {
    pub fn new() -> LineParser {
        LineParser {
            re: Regex::new(VOTE_LINE).unwrap(),
        }
    }

    pub fn parse(&self, line: &str) -> Option<VoteRecord> {
        self.re.captures(line).map(|caps| VoteRecord {
            id: caps[1].to_string(),
            timestamp: caps[2].to_string(),
            ip: caps[3].to_string(),
            candidate: caps[4].to_string(),
        })
    }
}

/// Streaming duplicate remover.
///
/// Feed lines one at a time with `observe`, then take the retained records
/// with `finish`. A record is dropped when its id or its ip was already seen
/// on an earlier retained record; both keys are compared by string equality
/// only. Memory is bounded by the number of retained records, not the raw
/// input size.
pub struct Deduplicator {
    parser: LineParser,
    seen_ids: HashSet<String>,
    seen_ips: HashSet<String>,
    records: Vec<VoteRecord>,
    stats: DedupStats,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Deduplicator::new()
    }
}

impl Deduplicator {
    pub fn new() -> Deduplicator {
        Deduplicator {
            parser: LineParser::new(),
            seen_ids: HashSet::new(),
            seen_ips: HashSet::new(),
            records: Vec::new(),
            stats: DedupStats::default(),
        }
    }

    pub fn observe(&mut self, line: &str) {
        self.stats.total_lines += 1;
        let record = match self.parser.parse(line) {
            Some(r) => r,
            None => {
                debug!("observe: skipping malformed line {:?}", line);
                self.stats.malformed += 1;
                return;
            }
        };
        if self.seen_ids.contains(&record.id) || self.seen_ips.contains(&record.ip) {
            debug!(
                "observe: dropping duplicate id {:?} / ip {:?}",
                record.id, record.ip
            );
            self.stats.duplicates += 1;
            return;
        }
        self.seen_ids.insert(record.id.clone());
        self.seen_ips.insert(record.ip.clone());
        self.records.push(record);
        self.stats.retained += 1;
    }

    pub fn finish(self) -> DedupedVotes {
        info!(
            "dedup: {} lines read, {} malformed, {} duplicates dropped, {} retained",
            self.stats.total_lines, self.stats.malformed, self.stats.duplicates, self.stats.retained
        );
        DedupedVotes {
            records: self.records,
            stats: self.stats,
        }
    }
}

/// Removes duplicate submissions from in-memory lines, keeping the first
/// occurrence of every identity key.
pub fn dedupe<'a, I>(lines: I) -> DedupedVotes
where
    I: IntoIterator<Item = &'a str>,
{
    let mut dedup = Deduplicator::new();
    for line in lines {
        dedup.observe(line);
    }
    dedup.finish()
}

/// Streams the votes file line by line through the deduplicator.
///
/// The only fatal condition is an unreadable input: malformed lines and
/// duplicates are counted and skipped, never reported as errors.
pub fn load_and_dedupe<P: AsRef<Path>>(path: P) -> Result<DedupedVotes, VotingErrors> {
    let display_path = path.as_ref().display().to_string();
    info!("Attempting to read votes file {:?}", display_path);
    let file = File::open(&path).map_err(|source| VotingErrors::InputRead {
        path: display_path.clone(),
        source,
    })?;
    let mut dedup = Deduplicator::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| VotingErrors::InputRead {
            path: display_path.clone(),
            source,
        })?;
        dedup.observe(&line);
    }
    Ok(dedup.finish())
}
