//! Top-level application orchestration.
//!
//! `src/main.rs` only installs logging and maps errors to exit codes; this
//! module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - turns them into a validated `PipelineConfig`
//! - runs the pipeline stages for the chosen subcommand
//! - writes the output files and prints a short summary

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{AnalysisArgs, AnalyzeArgs, Cli, Command, CommonArgs, PreprocessArgs, RunArgs, SourceArgs};
use crate::domain::{AnalysisConfig, MergedTable, PipelineConfig, YearRange};
use crate::error::AppError;
use crate::io::export::{merged_file_name, write_artifacts};

pub mod pipeline;

use self::pipeline::{Analysis, Preprocessed, RunOutput};

/// Entry point for the `mstat` binary.
pub fn run() -> Result<(), AppError> {
    // Environment defaults must be in place before clap reads them.
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded .env");
    }
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Preprocess(args) => handle_preprocess(args),
        Command::Analyze(args) => handle_analyze(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.source, &args.common, Some(&args.analysis))?;
    let output = execute_run(&config)?;

    let a = &output.analysis;
    println!(
        "{}",
        crate::report::format_run_summary(&output.preprocessed.merged, &a.summary, &a.lags, &a.regressions)
    );
    Ok(())
}

fn handle_preprocess(args: PreprocessArgs) -> Result<(), AppError> {
    let config = pipeline_config(&args.source, &args.common, None)?;
    let (_, written) = execute_preprocess(&config)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let analysis = analysis_config(&args.common, Some(&args.analysis))?;
    let in_csv = args
        .in_csv
        .clone()
        .unwrap_or_else(|| default_merged_path(&args.common.out_dir, analysis.year_range));

    let (merged, result) = execute_analyze(&in_csv, &args.common.out_dir, &analysis)?;
    println!(
        "{}",
        crate::report::format_run_summary(&merged, &result.summary, &result.lags, &result.regressions)
    );
    Ok(())
}

/// Full run; output files are written only if every stage succeeds.
pub fn execute_run(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    info!(data_dir = %config.data_dir.display(), out_dir = %config.out_dir.display(), "run");
    let output = pipeline::run_pipeline(config)?;
    let artifacts = output.artifacts()?;
    write_artifacts(&config.out_dir, &artifacts)?;
    Ok(output)
}

/// Extract and merge, then write the intermediate and merged tables.
pub fn execute_preprocess(config: &PipelineConfig) -> Result<(Preprocessed, Vec<PathBuf>), AppError> {
    info!(data_dir = %config.data_dir.display(), out_dir = %config.out_dir.display(), "preprocess");
    let preprocessed = pipeline::preprocess(config)?;
    let artifacts = preprocessed.artifacts()?;
    let written = write_artifacts(&config.out_dir, &artifacts)?;
    Ok((preprocessed, written))
}

/// Analyze a merged table file and write the statistical outputs.
pub fn execute_analyze(
    in_csv: &Path,
    out_dir: &Path,
    config: &AnalysisConfig,
) -> Result<(MergedTable, Analysis), AppError> {
    info!(in_csv = %in_csv.display(), out_dir = %out_dir.display(), "analyze");
    let merged = crate::io::read_merged_csv(in_csv, config.year_range)?;
    let result = pipeline::analyze(&merged, config)?;
    let artifacts = result.artifacts()?;
    write_artifacts(out_dir, &artifacts)?;
    Ok((merged, result))
}

/// Build and validate the configuration for a run that reads raw exports.
pub fn pipeline_config(
    source: &SourceArgs,
    common: &CommonArgs,
    analysis: Option<&AnalysisArgs>,
) -> Result<PipelineConfig, AppError> {
    Ok(PipelineConfig {
        data_dir: source.data_dir.clone(),
        out_dir: common.out_dir.clone(),
        analysis: analysis_config(common, analysis)?,
        ambiguous_rows: source.ambiguous_rows,
    })
}

/// Year range plus battery settings; `None` keeps the defaults.
pub fn analysis_config(common: &CommonArgs, analysis: Option<&AnalysisArgs>) -> Result<AnalysisConfig, AppError> {
    let year_range = YearRange::new(common.start_year, common.end_year)?;
    let defaults = AnalysisConfig::default();
    let config = match analysis {
        Some(a) => AnalysisConfig {
            year_range,
            rolling_window: a.rolling_window,
            rolling_min_pairs: a.rolling_min_pairs,
            max_lag: a.max_lag,
        },
        None => AnalysisConfig { year_range, ..defaults },
    };
    config.validate()?;
    Ok(config)
}

/// Default merged-table location for `out_dir` and `range`.
pub fn default_merged_path(out_dir: &Path, range: YearRange) -> PathBuf {
    out_dir.join(merged_file_name(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(start: i32, end: i32) -> CommonArgs {
        CommonArgs {
            out_dir: PathBuf::from("out"),
            start_year: start,
            end_year: end,
        }
    }

    #[test]
    fn analysis_config_uses_flags() {
        let args = AnalysisArgs {
            rolling_window: 4,
            rolling_min_pairs: 3,
            max_lag: 2,
        };
        let config = analysis_config(&common(2005, 2010), Some(&args)).unwrap();
        assert_eq!(config.year_range, YearRange::new(2005, 2010).unwrap());
        assert_eq!(config.rolling_window, 4);
        assert_eq!(config.rolling_min_pairs, 3);
        assert_eq!(config.max_lag, 2);
    }

    #[test]
    fn inverted_range_is_a_config_error() {
        let err = analysis_config(&common(2024, 2001), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn min_pairs_above_window_is_rejected() {
        let args = AnalysisArgs {
            rolling_window: 3,
            rolling_min_pairs: 4,
            max_lag: 3,
        };
        assert!(analysis_config(&common(2001, 2024), Some(&args)).is_err());
    }

    #[test]
    fn oversized_max_lag_is_a_config_error() {
        let args = AnalysisArgs {
            rolling_window: 5,
            rolling_min_pairs: 5,
            max_lag: 3_000_000_000,
        };
        let err = analysis_config(&common(2001, 2024), Some(&args)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{err}");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn default_merged_path_follows_range() {
        let range = YearRange::new(2001, 2024).unwrap();
        assert_eq!(
            default_merged_path(Path::new("out"), range),
            PathBuf::from("out").join("merged_finland_2001_2024.csv")
        );
    }
}
