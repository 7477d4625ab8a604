//! Command-line parsing for `mstat`.
//!
//! Argument parsing stays separate from the pipeline: this module only turns
//! flags and environment variables into plain values.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::AmbiguousRowPolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mstat",
    version,
    about = "Finland road-transport emissions vs electricity and vehicle registrations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, merge and analyze in one pass.
    Run(RunArgs),
    /// Extract the three exports and write the intermediate and merged tables.
    Preprocess(PreprocessArgs),
    /// Analyze a merged table written by an earlier `preprocess` run.
    Analyze(AnalyzeArgs),
}

/// Where the raw StatFin exports live.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Directory holding the three StatFin CSV exports.
    #[arg(long, env = "MSTAT_DATA_DIR", default_value = "data/raw")]
    pub data_dir: PathBuf,

    /// What to do when more than one vehicles row matches the selection.
    #[arg(long, value_enum, default_value_t = AmbiguousRowPolicy::First)]
    pub ambiguous_rows: AmbiguousRowPolicy,
}

/// Output location and year range, shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Directory the output files are written to (created if missing).
    #[arg(long, env = "MSTAT_OUT_DIR", default_value = "data/processed")]
    pub out_dir: PathBuf,

    /// First year of the analysis range (inclusive).
    #[arg(long, env = "MSTAT_START_YEAR", default_value_t = 2001)]
    pub start_year: i32,

    /// Last year of the analysis range (inclusive).
    #[arg(long, env = "MSTAT_END_YEAR", default_value_t = 2024)]
    pub end_year: i32,
}

/// Statistical battery knobs.
#[derive(Debug, Args, Clone)]
pub struct AnalysisArgs {
    /// Trailing window (rows) for rolling correlations.
    #[arg(long, default_value_t = 5)]
    pub rolling_window: usize,

    /// Complete pairs a rolling window needs before r is reported.
    #[arg(long, default_value_t = 5)]
    pub rolling_min_pairs: usize,

    /// Largest lag (years) evaluated in each direction.
    #[arg(long, default_value_t = 3)]
    pub max_lag: usize,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Debug, Args, Clone)]
pub struct PreprocessArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Merged table CSV (defaults to `<out-dir>/merged_finland_<start>_<end>.csv`).
    #[arg(long, value_name = "CSV")]
    pub in_csv: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_all_options() {
        let cli = Cli::try_parse_from([
            "mstat",
            "run",
            "--data-dir",
            "raw",
            "--out-dir",
            "out",
            "--start-year",
            "2005",
            "--end-year",
            "2020",
            "--rolling-window",
            "4",
            "--rolling-min-pairs",
            "3",
            "--max-lag",
            "2",
            "--ambiguous-rows",
            "error",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source.data_dir, PathBuf::from("raw"));
        assert_eq!(args.source.ambiguous_rows, AmbiguousRowPolicy::Error);
        assert_eq!(args.common.start_year, 2005);
        assert_eq!(args.common.end_year, 2020);
        assert_eq!(args.analysis.rolling_window, 4);
        assert_eq!(args.analysis.rolling_min_pairs, 3);
        assert_eq!(args.analysis.max_lag, 2);
    }

    #[test]
    fn analyze_takes_an_input_csv() {
        let cli = Cli::try_parse_from(["mstat", "analyze", "--in-csv", "m.csv"]).unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.in_csv, Some(PathBuf::from("m.csv")));
        assert_eq!(args.analysis.max_lag, 3);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["mstat", "preprocess", "--ambiguous-rows", "last"]).is_err());
    }
}
