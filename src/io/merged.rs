//! Read a previously written merged table back for `mstat analyze`.

use std::path::Path;

use tracing::{debug, info};

use crate::domain::{MergedTable, Metric, MetricSeries, YearRange};
use crate::error::AppError;
use crate::ingest::{HeaderMatch, SourceEncoding, parse_number, parse_year, read_export};
use crate::io::export::MERGED_COLUMNS;
use crate::table::merge_series;

const SOURCE_NAME: &str = "merged";

/// Load `path` and lay its rows onto `range`.
///
/// Non-numeric cells become null. Rows whose year does not parse are skipped;
/// if a year appears twice the later row wins.
pub fn read_merged_csv(path: &Path, range: YearRange) -> Result<MergedTable, AppError> {
    let table = read_export(path, SOURCE_NAME, SourceEncoding::Utf8, 0)?;

    let missing: Vec<&str> = MERGED_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.column(c, HeaderMatch::Normalized).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::schema(
            SOURCE_NAME,
            format!("missing required columns: {}.", missing.join(", ")),
        ));
    }

    let year_idx = column_index(&table, "year")?;
    let mut years = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for row in 0..table.len() {
        match parse_year(table.cell(row, year_idx)) {
            Some(year) => years.push((row, year)),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "rows without a parsable year");
    }

    let mut series = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        let idx = column_index(&table, metric.column())?;
        let values = years
            .iter()
            .map(|&(row, year)| (year, parse_number(table.cell(row, idx))));
        series.push(MetricSeries::new(metric, values, range));
    }

    let refs: Vec<&MetricSeries> = series.iter().collect();
    let merged = merge_series(&refs, range);
    info!(path = %path.display(), rows = table.len(), "loaded merged table");
    Ok(merged)
}

fn column_index(table: &crate::ingest::RawTable, name: &str) -> Result<usize, AppError> {
    table
        .column(name, HeaderMatch::Normalized)
        .ok_or_else(|| AppError::schema(SOURCE_NAME, format!("no '{name}' column.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("merged.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn round_trips_with_nulls_and_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "year,emissions_ktco2e,electricity_gwh,vehicles_first_reg\n\
             2003,105,52,\n\
             2001,100,50,10\n\
             1999,1,1,1\n",
        );
        let range = YearRange::new(2001, 2003).unwrap();
        let merged = read_merged_csv(&path, range).unwrap();

        assert_eq!(merged.rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2001, 2002, 2003]);
        assert_eq!(merged.rows[0].emissions_ktco2e, Some(100.0));
        assert_eq!(merged.rows[1].emissions_ktco2e, None);
        assert_eq!(merged.rows[2].vehicles_first_reg, None);
        assert_eq!(merged.rows[2].electricity_gwh, Some(52.0));
    }

    #[test]
    fn missing_columns_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "year,emissions_ktco2e\n2001,100\n");
        let err = read_merged_csv(&path, YearRange::default()).unwrap_err();

        match err {
            AppError::SchemaMismatch { detail, .. } => {
                assert!(detail.contains("electricity_gwh"));
                assert!(detail.contains("vehicles_first_reg"));
                assert!(!detail.contains("year,"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_merged_csv(&dir.path().join("nope.csv"), YearRange::default()).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
    }
}
