use log::{debug, info, warn};

use fuzzy_tally::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error loading votes"))]
    LoadingVotes { source: VotingErrors },
    #[snafu(display("Error opening summary file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing summary"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type TallyResult<T> = Result<T, TallyError>;

// Sections of the JSON summary. Counts are serialized as strings, like the
// rest of the summary values.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DedupSummary {
    #[serde(rename = "totalLines")]
    pub total_lines: String,
    pub malformed: String,
    pub duplicates: String,
    pub retained: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringSummary {
    #[serde(rename = "distinctCandidates")]
    pub distinct_candidates: String,
    pub centers: String,
    pub clusters: String,
    pub singletons: String,
}

fn build_summary_js(stats: &DedupStats, result: &VotingResult) -> JSValue {
    let dedup = DedupSummary {
        total_lines: stats.total_lines.to_string(),
        malformed: stats.malformed.to_string(),
        duplicates: stats.duplicates.to_string(),
        retained: stats.retained.to_string(),
    };
    let clustering = ClusteringSummary {
        distinct_candidates: result.num_candidates.to_string(),
        centers: result.centers.len().to_string(),
        clusters: result.partition.clusters.len().to_string(),
        singletons: result.partition.leftover_clusters().len().to_string(),
    };
    let results: Vec<JSValue> = result
        .report
        .tally
        .iter()
        .map(|entry| {
            json!({
                "candidate": entry.candidate,
                "votes": entry.votes.to_string(),
                "percentage": format!("{:.2}", result.report.percentage(entry.votes)),
            })
        })
        .collect();
    json!({
        "dedup": dedup,
        "clustering": clustering,
        "results": results,
        "totalVotes": result.report.total_votes.to_string(),
        "coveragePercentage": format!("{:.2}", result.report.coverage()),
    })
}

fn read_summary(path: &str) -> TallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_summary: read {} bytes", contents.len());
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn print_report(stats: &DedupStats, result: &VotingResult) {
    println!(
        "Duplicate cleanup: {} lines read, {} malformed skipped, {} duplicates removed, {} records kept",
        stats.total_lines, stats.malformed, stats.duplicates, stats.retained
    );
    println!("Cluster centers selected: {}", result.centers.len());
    println!("Distinct candidates: {}", result.num_candidates);

    println!();
    println!("Creating clusters:");
    let center_clusters = &result.partition.clusters[..result.partition.num_center_clusters];
    for (idx, cluster) in center_clusters.iter().enumerate() {
        println!(
            "{}: {:<20} (+{} similar)",
            idx + 1,
            cluster.center,
            cluster.absorbed()
        );
    }

    let leftovers = result.partition.leftover_clusters();
    if !leftovers.is_empty() {
        println!();
        println!("Clusters for the remaining candidates:");
        for (idx, cluster) in leftovers.iter().enumerate() {
            println!(
                "{}: {}",
                result.partition.num_center_clusters + idx + 1,
                cluster.center
            );
        }
    }

    let assigned: usize = center_clusters.iter().map(|c| c.members.len()).sum();
    println!();
    println!("Summary:");
    println!("Total clusters: {}", result.partition.clusters.len());
    println!("Names assigned to centers: {}", assigned);
    println!("Standalone names: {}", leftovers.len());
    println!("{}", "_".repeat(40));

    println!();
    println!("Voting results:");
    for entry in &result.report.tally {
        println!(
            "{:<20} : {:<4} votes ({:.2}%)",
            entry.candidate,
            entry.votes,
            result.report.percentage(entry.votes)
        );
    }
    println!("{}", "_".repeat(40));
    println!("Total votes: {}", result.report.total_votes);
    println!("Clustering coverage: {:.2}%", result.report.coverage());
}

pub fn run_tally(args: &Args) -> TallyResult<()> {
    let deduped = load_and_dedupe(&args.input).context(LoadingVotesSnafu {})?;
    let stats = deduped.stats;

    let result = run_pipeline(&deduped.records);
    info!(
        "run_tally: {} centers, {} clusters, {} votes",
        result.centers.len(),
        result.partition.clusters.len(),
        result.report.total_votes
    );

    print_report(&stats, &result);

    let summary_js = build_summary_js(&stats, &result);
    let pretty_js_summary =
        serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        Some("stdout") => println!("{}", pretty_js_summary),
        Some(path) => {
            fs::write(path, &pretty_js_summary).context(WritingSummarySnafu { path })?
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let summary_ref = read_summary(reference_path)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_summary {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_summary.as_str(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
