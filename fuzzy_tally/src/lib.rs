mod config;
pub mod dedup;
pub mod manual;

use log::{debug, info};

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

pub use crate::config::*;
pub use crate::dedup::{dedupe, load_and_dedupe, Deduplicator, LineParser};

// **** Clustering parameters ****

/// Upper bound on the number of cluster centers picked from the frequency
/// table.
pub const MAX_CENTERS: usize = 200;
/// Inclusive edit-distance threshold for absorbing a name into a cluster.
pub const MAX_EDIT_DISTANCE: usize = 2;
/// Inclusive character-length-difference gate checked before the distance.
pub const MAX_LENGTH_DIFF: usize = 2;

/// Counts how often every distinct candidate name occurs.
///
/// No filtering happens here: implausible names are counted too and only
/// set aside later, at center selection.
pub fn count_frequencies(records: &[VoteRecord]) -> FrequencyTable {
    let mut freq = FrequencyTable::new();
    for r in records {
        freq.record(&r.candidate);
    }
    debug!("count_frequencies: {} distinct names", freq.len());
    freq
}

/// Coarse plausibility test for a personal name: at least two tokens, every
/// token starting with an ASCII uppercase letter.
///
/// This is a heuristic, not name validation. It only has to separate
/// plausible cluster centers from junk entries.
pub fn is_well_formed(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() < 2 {
        return false;
    }
    words
        .iter()
        .all(|w| w.chars().next().map_or(false, |c| c.is_ascii_uppercase()))
}

/// Picks the cluster centers: the most frequent names, capped at
/// `MAX_CENTERS`, restricted to well-formed ones.
///
/// The sort is stable, so names with equal counts keep their first-seen
/// order. The resulting order is significant: it drives the greedy
/// clustering, and two runs over the same input must produce the same
/// partition.
pub fn select_centers(freq: &FrequencyTable) -> Vec<String> {
    let mut by_count: Vec<(String, u64)> = freq.entries().to_vec();
    by_count.sort_by_key(|(_, count)| Reverse(*count));
    let centers: Vec<String> = by_count
        .into_iter()
        .take(MAX_CENTERS)
        .filter(|(name, _)| is_well_formed(name))
        .map(|(name, _)| name)
        .collect();
    info!(
        "select_centers: {} centers out of {} distinct candidates",
        centers.len(),
        freq.len()
    );
    centers
}

/// Levenshtein edit distance between two strings, measured in characters.
///
/// Rolling-row dynamic programming: O(len(a) * len(b)) time with a single
/// row of working memory.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Partitions all distinct names into disjoint clusters: one cluster per
/// center, in center order, then singleton clusters for everything left.
///
/// The assignment is greedy first-fit. A name similar to several centers is
/// claimed by the earliest one in the center order; since centers arrive
/// sorted by descending frequency, the most popular spelling wins. Centers
/// are never absorbed into another center's cluster, even when they are
/// within the similarity thresholds of each other.
pub fn build_clusters(centers: &[String], all_names: &[String]) -> ClusterPartition {
    let center_set: HashSet<&str> = centers.iter().map(String::as_str).collect();
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for center in centers {
        let mut members = vec![center.clone()];
        assigned.insert(center.as_str());
        let center_len = center.chars().count();
        for name in all_names {
            if name == center || center_set.contains(name.as_str()) {
                continue;
            }
            // Claimed by an earlier center: not reconsidered.
            if assigned.contains(name.as_str()) {
                continue;
            }
            let len_diff = center_len.abs_diff(name.chars().count());
            if len_diff <= MAX_LENGTH_DIFF && edit_distance(center, name) <= MAX_EDIT_DISTANCE {
                members.push(name.clone());
                assigned.insert(name.as_str());
            }
        }
        debug!(
            "build_clusters: {:?} absorbed {} similar names",
            center,
            members.len() - 1
        );
        clusters.push(Cluster {
            center: center.clone(),
            members,
        });
    }

    let num_center_clusters = clusters.len();
    for name in all_names {
        if !assigned.contains(name.as_str()) {
            clusters.push(Cluster::singleton(name));
        }
    }
    info!(
        "build_clusters: {} clusters ({} around centers, {} singletons)",
        clusters.len(),
        num_center_clusters,
        clusters.len() - num_center_clusters
    );
    ClusterPartition {
        clusters,
        num_center_clusters,
    }
}

/// Replays the deduplicated records against the partition and credits each
/// vote to the first cluster containing its candidate name.
///
/// The partition is a disjoint cover of every observed name by construction,
/// so every record lands in exactly one cluster; coverage is still computed
/// and reported rather than assumed.
pub fn aggregate(records: &[VoteRecord], partition: &ClusterPartition) -> VotingReport {
    // The first cluster in partition order wins a contested name, which is
    // exactly what a linear scan over the clusters would decide.
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, cluster) in partition.clusters.iter().enumerate() {
        for member in &cluster.members {
            owner.entry(member.as_str()).or_insert(idx);
        }
    }

    let mut votes: Vec<u64> = vec![0; partition.clusters.len()];
    let mut total_votes: u64 = 0;
    let mut covered_votes: u64 = 0;
    for r in records {
        total_votes += 1;
        if let Some(&idx) = owner.get(r.candidate.as_str()) {
            votes[idx] += 1;
            covered_votes += 1;
        }
    }

    let mut tally: Vec<TallyEntry> = partition
        .clusters
        .iter()
        .zip(votes)
        .map(|(cluster, votes)| TallyEntry {
            candidate: cluster.center.clone(),
            votes,
        })
        .collect();
    // Stable sort: equal counts keep partition order.
    tally.sort_by_key(|e| Reverse(e.votes));

    debug!(
        "aggregate: {} votes over {} clusters",
        total_votes,
        partition.clusters.len()
    );
    VotingReport {
        tally,
        total_votes,
        covered_votes,
    }
}

/// Runs the frequency, center-selection, clustering and aggregation stages
/// over already-deduplicated records.
///
/// Never fails: zero records produce an empty report with a total of 0, and
/// an empty center list degenerates to singleton clusters for every name.
pub fn run_pipeline(records: &[VoteRecord]) -> VotingResult {
    info!("run_pipeline: processing {} deduplicated records", records.len());
    let freq = count_frequencies(records);
    let centers = select_centers(&freq);
    let all_names: Vec<String> = freq.names().map(str::to_string).collect();
    let partition = build_clusters(&centers, &all_names);
    let report = aggregate(records, &partition);
    VotingResult {
        num_candidates: freq.len(),
        centers,
        partition,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(names: &[&str]) -> Vec<VoteRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| VoteRecord {
                id: i.to_string(),
                timestamp: format!("t{}", i),
                ip: format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256),
                candidate: name.to_string(),
            })
            .collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn edit_distance_matches_the_classic_values() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        assert_eq!(edit_distance("John Smith", "Jon Smith"), 1);
    }

    #[test]
    fn edit_distance_counts_characters_not_bytes() {
        assert_eq!(edit_distance("Léa", "Lea"), 1);
        assert_eq!(edit_distance("Зоя", "Зол"), 1);
    }

    #[test]
    fn well_formed_requires_two_capitalized_tokens() {
        assert!(is_well_formed("John Smith"));
        assert!(is_well_formed("J Smith"));
        assert!(is_well_formed("Anna Maria Van Der Berg"));
        assert!(is_well_formed("John  Smith"));
        assert!(!is_well_formed("John"));
        assert!(!is_well_formed("john Smith"));
        assert!(!is_well_formed("John smith"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("   "));
    }

    #[test]
    fn centers_are_ordered_by_frequency_then_first_seen() {
        let mut freq = FrequencyTable::new();
        for name in [
            "Bob One",
            "Bob One",
            "Cid Two",
            "Cid Two",
            "Ann Three",
        ] {
            freq.record(name);
        }
        // Bob and Cid tie at 2; Bob was seen first.
        let centers = select_centers(&freq);
        assert_eq!(centers, strings(&["Bob One", "Cid Two", "Ann Three"]));
    }

    #[test]
    fn centers_are_bounded_and_filtered_after_the_cut() {
        let mut freq = FrequencyTable::new();
        // 200 names in the top tier, the first one implausible. The filter
        // runs after the top-200 cut, so the implausible name costs a slot
        // and the 201st name does not move up.
        for i in 0..200 {
            let name = if i == 0 {
                "lowercase name".to_string()
            } else {
                format!("Candidate N{}", i)
            };
            freq.record(&name);
            freq.record(&name);
        }
        freq.record("Extra Name");
        let centers = select_centers(&freq);
        assert_eq!(centers.len(), 199);
        assert!(centers.iter().all(|c| is_well_formed(c)));
        assert!(!centers.contains(&"Extra Name".to_string()));
        assert!(!centers.contains(&"lowercase name".to_string()));
    }

    #[test]
    fn cluster_absorbs_similar_names_and_leaves_singletons() {
        let centers = strings(&["John Smith"]);
        let names = strings(&["John Smith", "Jon Smith", "Jane Doe"]);
        let partition = build_clusters(&centers, &names);
        assert_eq!(partition.num_center_clusters, 1);
        assert_eq!(partition.clusters.len(), 2);
        assert_eq!(
            partition.clusters[0].members,
            strings(&["John Smith", "Jon Smith"])
        );
        assert_eq!(partition.clusters[1].members, strings(&["Jane Doe"]));
        assert!(partition.clusters[1].is_singleton());
    }

    #[test]
    fn similarity_threshold_is_inclusive_at_two_edits() {
        let centers = strings(&["John Smith"]);
        // Two deletions away, length difference two: in.
        // Three substitutions away, same length: out.
        let names = strings(&["John Smith", "Jhn Smth", "Jahn Smjtx"]);
        assert_eq!(edit_distance("John Smith", "Jhn Smth"), 2);
        assert_eq!(edit_distance("John Smith", "Jahn Smjtx"), 3);
        let partition = build_clusters(&centers, &names);
        assert_eq!(
            partition.clusters[0].members,
            strings(&["John Smith", "Jhn Smth"])
        );
        assert_eq!(partition.leftover_clusters().len(), 1);
        assert_eq!(partition.leftover_clusters()[0].center, "Jahn Smjtx");
    }

    #[test]
    fn centers_are_never_absorbed_into_each_other() {
        // One edit apart, but both are centers.
        let centers = strings(&["John Smith", "Jon Smith"]);
        let names = strings(&["John Smith", "Jon Smith"]);
        let partition = build_clusters(&centers, &names);
        assert_eq!(partition.clusters.len(), 2);
        assert!(partition.clusters.iter().all(Cluster::is_singleton));
    }

    #[test]
    fn contested_name_goes_to_the_earlier_center() {
        // "Jon Smith" is within two edits of both centers; the first center
        // in the given order claims it.
        let centers = strings(&["John Smith", "Johnn Smith"]);
        let names = strings(&["John Smith", "Johnn Smith", "Jon Smith"]);
        let partition = build_clusters(&centers, &names);
        assert_eq!(
            partition.clusters[0].members,
            strings(&["John Smith", "Jon Smith"])
        );
        assert_eq!(partition.clusters[1].members, strings(&["Johnn Smith"]));
    }

    #[test]
    fn partition_is_a_disjoint_cover() {
        let centers = strings(&["John Smith", "Jane Doe"]);
        let names = strings(&[
            "John Smith",
            "Jon Smith",
            "Johm Smith",
            "Jane Doe",
            "Jane Does",
            "jane doe",
            "Someone Else",
        ]);
        let partition = build_clusters(&centers, &names);
        let mut seen: HashSet<&str> = HashSet::new();
        for cluster in &partition.clusters {
            assert!(cluster.members.contains(&cluster.center));
            for member in &cluster.members {
                // Disjointness: no name appears in two clusters.
                assert!(seen.insert(member.as_str()), "{} assigned twice", member);
            }
        }
        // Cover: the union of all members is the whole universe.
        let universe: HashSet<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(seen, universe);
    }

    #[test]
    fn empty_center_list_degenerates_to_singletons() {
        let names = strings(&["alpha", "beta", "gamma"]);
        let partition = build_clusters(&[], &names);
        assert_eq!(partition.num_center_clusters, 0);
        assert_eq!(partition.clusters.len(), 3);
        assert!(partition.clusters.iter().all(Cluster::is_singleton));
        // First-seen order is preserved for the leftover singletons.
        let centers: Vec<&str> = partition.clusters.iter().map(|c| c.center.as_str()).collect();
        assert_eq!(centers, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn aggregation_conserves_every_vote() {
        let _ = env_logger::builder().is_test(true).try_init();
        let recs = records(&[
            "John Smith",
            "john Smith",
            "John Smith",
            "Jane Doe",
            "Jane Doe",
            "x",
        ]);
        let result = run_pipeline(&recs);
        let credited: u64 = result.report.tally.iter().map(|e| e.votes).sum();
        assert_eq!(credited, recs.len() as u64);
        assert_eq!(result.report.total_votes, recs.len() as u64);
        assert_eq!(result.report.covered_votes, recs.len() as u64);
        assert_eq!(result.report.coverage(), 100.0);
    }

    #[test]
    fn tally_is_ranked_by_descending_votes() {
        let recs = records(&[
            "Jane Doe",
            "John Smith",
            "John Smith",
            "john Smith",
            "John Smith",
            "Jane Doe",
        ]);
        let result = run_pipeline(&recs);
        // "john Smith" is implausible, so it cannot become a center; it is
        // absorbed into the "John Smith" cluster instead.
        assert_eq!(result.centers, strings(&["John Smith", "Jane Doe"]));
        assert_eq!(result.report.tally.len(), 2);
        assert_eq!(result.report.tally[0].candidate, "John Smith");
        assert_eq!(result.report.tally[0].votes, 4);
        assert_eq!(result.report.tally[1].candidate, "Jane Doe");
        assert_eq!(result.report.tally[1].votes, 2);
        let votes: Vec<u64> = result.report.tally.iter().map(|e| e.votes).collect();
        let mut sorted = votes.clone();
        sorted.sort_by_key(|v| Reverse(*v));
        assert_eq!(votes, sorted);
    }

    #[test]
    fn zero_records_produce_an_empty_report() {
        let result = run_pipeline(&[]);
        assert_eq!(result.num_candidates, 0);
        assert!(result.centers.is_empty());
        assert!(result.partition.clusters.is_empty());
        assert_eq!(result.report.total_votes, 0);
        assert!(result.report.tally.is_empty());
        assert_eq!(result.report.coverage(), 0.0);
    }

    #[test]
    fn frequencies_count_every_record_unfiltered() {
        let recs = records(&["John Smith", "???", "???", "John Smith", "???"]);
        let freq = count_frequencies(&recs);
        assert_eq!(freq.count("John Smith"), 2);
        assert_eq!(freq.count("???"), 3);
        assert_eq!(freq.len(), 2);
    }
}
