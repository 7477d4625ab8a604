//! Render and write the run's output files.
//!
//! Every artifact is rendered into memory first; [`write_artifacts`] touches the
//! output directory only once the whole set exists. Files are staged as
//! temporaries next to their targets and renamed into place only after every
//! one of them was written, so a failed write leaves no new or truncated output.

use std::io::Write;
use std::path::{Path, PathBuf};

use csv::Writer;
use tempfile::NamedTempFile;
use tracing::info;

use crate::domain::{
    CorrelationSummary, DerivedTable, LagCorrelationTable, MergedTable, Metric, MetricSeries, RegressionResult,
    YearRange,
};
use crate::error::AppError;
use crate::report::format_ols_report;

pub const DERIVED_FILE: &str = "merged_with_derivatives.csv";
pub const CORRELATIONS_FILE: &str = "correlations_summary.csv";
pub const OLS_SUMMARY_FILE: &str = "ols_summary.txt";
pub const OLS_JSON_FILE: &str = "ols_results.json";

/// Column order of the merged table file.
pub const MERGED_COLUMNS: [&str; 4] = ["year", "emissions_ktco2e", "electricity_gwh", "vehicles_first_reg"];

/// A named output file rendered in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// `merged_finland_<start>_<end>.csv`.
pub fn merged_file_name(range: YearRange) -> String {
    format!("merged_finland_{}_{}.csv", range.start(), range.end())
}

/// `lagcorr_<source>.csv`.
pub fn lag_file_name(metric: Metric) -> String {
    format!("lagcorr_{}.csv", metric.source_name())
}

/// `year,<metric column>` for every year the source reported.
pub fn series_artifact(series: &MetricSeries) -> Result<Artifact, AppError> {
    let file_name = format!("{}.csv", series.metric.column());
    render_csv(&file_name, |w| {
        w.write_record(["year", series.metric.column()])?;
        for (year, value) in series.iter() {
            w.write_record([year.to_string(), cell(value)])?;
        }
        Ok(())
    })
}

pub fn merged_artifact(merged: &MergedTable) -> Result<Artifact, AppError> {
    render_csv(&merged_file_name(merged.range), |w| {
        w.write_record(MERGED_COLUMNS)?;
        for r in &merged.rows {
            w.write_record([
                r.year.to_string(),
                cell(r.emissions_ktco2e),
                cell(r.electricity_gwh),
                cell(r.vehicles_first_reg),
            ])?;
        }
        Ok(())
    })
}

pub fn derived_artifact(derived: &DerivedTable) -> Result<Artifact, AppError> {
    render_csv(DERIVED_FILE, |w| {
        let header = MERGED_COLUMNS.iter().copied().chain([
            "emissions_z",
            "electricity_z",
            "vehicles_z",
            "d_emissions",
            "d_electricity",
            "d_vehicles",
            "roll_corr_elec",
            "roll_corr_veh",
        ]);
        w.write_record(header)?;
        for r in &derived.rows {
            let b = &r.base;
            w.write_record([
                b.year.to_string(),
                cell(b.emissions_ktco2e),
                cell(b.electricity_gwh),
                cell(b.vehicles_first_reg),
                cell(r.emissions_z),
                cell(r.electricity_z),
                cell(r.vehicles_z),
                cell(r.d_emissions),
                cell(r.d_electricity),
                cell(r.d_vehicles),
                cell(r.roll_corr_elec),
                cell(r.roll_corr_veh),
            ])?;
        }
        Ok(())
    })
}

pub fn correlation_summary_artifact(summary: &CorrelationSummary) -> Result<Artifact, AppError> {
    render_csv(CORRELATIONS_FILE, |w| {
        w.write_record(["metric", "pearson_r"])?;
        for e in &summary.entries {
            w.write_record([e.metric.clone(), cell(e.pearson_r)])?;
        }
        Ok(())
    })
}

pub fn lag_artifact(table: &LagCorrelationTable) -> Result<Artifact, AppError> {
    render_csv(&lag_file_name(table.metric), |w| {
        w.write_record(["lag", "corr"])?;
        for r in &table.rows {
            w.write_record([r.lag.to_string(), cell(r.corr)])?;
        }
        Ok(())
    })
}

pub fn ols_summary_artifact(results: &[RegressionResult]) -> Artifact {
    Artifact {
        file_name: OLS_SUMMARY_FILE.to_string(),
        contents: format_ols_report(results).into_bytes(),
    }
}

pub fn ols_json_artifact(results: &[RegressionResult]) -> Result<Artifact, AppError> {
    let contents = serde_json::to_vec_pretty(results)
        .map_err(|e| AppError::io(format!("Failed to serialize {OLS_JSON_FILE}"), e.into()))?;
    Ok(Artifact {
        file_name: OLS_JSON_FILE.to_string(),
        contents,
    })
}

/// Create `out_dir` if needed and write every artifact into it.
pub fn write_artifacts(out_dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| AppError::io(format!("Failed to create output directory '{}'", out_dir.display()), e))?;

    // Dropping a staged file deletes it, so an early return cleans up.
    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out_dir.join(&artifact.file_name);
        let file = stage(&path, &artifact.contents)
            .map_err(|e| AppError::io(format!("Failed to write '{}'", path.display()), e))?;
        staged.push((path, file, artifact.contents.len()));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (path, file, bytes) in staged {
        file.persist(&path)
            .map_err(|e| AppError::io(format!("Failed to write '{}'", path.display()), e.error))?;
        info!(path = %path.display(), bytes, "wrote");
        written.push(path);
    }
    Ok(written)
}

fn stage(path: &Path, contents: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Empty for null, shortest round-trip text otherwise.
fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn render_csv(
    file_name: &str,
    fill: impl FnOnce(&mut Writer<Vec<u8>>) -> Result<(), csv::Error>,
) -> Result<Artifact, AppError> {
    let mut writer = Writer::from_writer(Vec::new());
    fill(&mut writer).map_err(|source| AppError::Csv {
        path: PathBuf::from(file_name),
        source,
    })?;
    let contents = writer
        .into_inner()
        .map_err(|e| AppError::io(format!("Failed to render '{file_name}'"), e.into_error()))?;
    Ok(Artifact {
        file_name: file_name.to_string(),
        contents,
    })
}
