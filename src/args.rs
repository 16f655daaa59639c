use clap::Parser;

/// This is a vote deduplication and fuzzy tabulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the raw vote records, one per line:
    /// `id: <digits>, time: <text>, ip: <digits and dots>, candidate: <name>`.
    /// Lines that do not match this format are skipped.
    #[clap(value_parser)]
    pub input: String,

    /// (file path or 'stdout') If specified, the summary of the tally will be written in JSON
    /// format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected summary in JSON format. If provided,
    /// fuzztally will check that the tabulated output matches the reference and fail on any
    /// difference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
