//! Generic "select rows, discover value columns, aggregate by year" routine.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::domain::{AmbiguousRowPolicy, MetricSeries, YearRange};
use crate::error::AppError;
use crate::ingest::raw::{METADATA_LINES, RawTable, read_export};
use crate::ingest::rules::{ColumnFilter, NameMatch, RowSelection, SourceRule, ValueLayout};

/// Load the export described by `rule` from `data_dir` and extract its series.
pub fn extract_source(
    rule: &SourceRule,
    data_dir: &Path,
    range: YearRange,
    policy: AmbiguousRowPolicy,
) -> Result<MetricSeries, AppError> {
    let path = data_dir.join(rule.file_name);
    let name = rule.metric.source_name();
    debug!(source = name, path = %path.display(), encoding = rule.encoding.label(), "reading export");

    let table = read_export(&path, name, rule.encoding, METADATA_LINES)?;
    let series = extract_table(rule, &table, range, policy)?;

    info!(
        source = name,
        rows = table.len(),
        years = series.len(),
        "extracted series"
    );
    Ok(series)
}

/// Apply `rule` to an already decoded table.
pub fn extract_table(
    rule: &SourceRule,
    table: &RawTable,
    range: YearRange,
    policy: AmbiguousRowPolicy,
) -> Result<MetricSeries, AppError> {
    let name = rule.metric.source_name();

    for column in rule.required_columns {
        if table.column(column, rule.header_match).is_none() {
            return Err(AppError::schema(name, format!("no '{column}' column.")));
        }
    }

    let selected = select_rows(rule, table)?;
    debug!(source = name, selected = selected.len(), of = table.len(), "row selection");

    let values = match rule.layout {
        ValueLayout::SumByYear { year_column, value } => {
            let year_idx = require_column(rule, table, year_column)?;
            let value_idx = find_value_column(rule, table, value)?;
            sum_by_year(table, &selected, year_idx, value_idx, name)
        }
        ValueLayout::YearColumns { pattern } => {
            let year_columns = find_year_columns(rule, table, pattern)?;
            let row = pick_single_row(rule, &selected, policy)?;
            read_year_columns(table, row, &year_columns, range, name)
        }
    };

    Ok(MetricSeries::new(rule.metric, values, range))
}

fn require_column(rule: &SourceRule, table: &RawTable, column: &str) -> Result<usize, AppError> {
    table
        .column(column, rule.header_match)
        .ok_or_else(|| AppError::schema(rule.metric.source_name(), format!("no '{column}' column.")))
}

fn select_rows(rule: &SourceRule, table: &RawTable) -> Result<Vec<usize>, AppError> {
    let all = 0..table.len();
    match rule.selection {
        RowSelection::Keep(filter) => {
            let matcher = compile_filter(rule, table, filter)?;
            Ok(all.filter(|&row| matcher.matches(table, row)).collect())
        }
        RowSelection::Prefer(filter) => {
            let matcher = compile_filter(rule, table, filter)?;
            let matching: Vec<usize> = all.clone().filter(|&row| matcher.matches(table, row)).collect();
            if matching.is_empty() {
                debug!(
                    source = rule.metric.source_name(),
                    column = filter.column,
                    pattern = filter.pattern.text(),
                    "no preferred rows; keeping every row"
                );
                Ok(all.collect())
            } else {
                Ok(matching)
            }
        }
        RowSelection::RequireAll(filters) => {
            let matchers = filters
                .iter()
                .map(|f| compile_filter(rule, table, *f))
                .collect::<Result<Vec<_>, _>>()?;
            let matching: Vec<usize> = all
                .filter(|&row| matchers.iter().all(|m| m.matches(table, row)))
                .collect();
            if matching.is_empty() {
                return Err(AppError::NoMatchingRows {
                    source_name: rule.metric.source_name().to_string(),
                    predicate: describe_filters(filters),
                });
            }
            Ok(matching)
        }
    }
}

struct CellMatcher {
    column: usize,
    regex: Regex,
}

impl CellMatcher {
    fn matches(&self, table: &RawTable, row: usize) -> bool {
        self.regex.is_match(table.cell(row, self.column))
    }
}

fn compile_filter(rule: &SourceRule, table: &RawTable, filter: ColumnFilter) -> Result<CellMatcher, AppError> {
    Ok(CellMatcher {
        column: require_column(rule, table, filter.column)?,
        regex: filter.pattern.compile()?,
    })
}

fn describe_filters(filters: &[ColumnFilter]) -> String {
    filters
        .iter()
        .map(|f| format!("'{}'", f.pattern.text()))
        .collect::<Vec<_>>()
        .join(" & ")
}

fn find_value_column(rule: &SourceRule, table: &RawTable, value: NameMatch) -> Result<usize, AppError> {
    table.find_normalized(|h| value.matches(h)).ok_or_else(|| {
        AppError::schema(
            rule.metric.source_name(),
            format!("cannot find a numeric value column whose name {}.", value.describe()),
        )
    })
}

fn sum_by_year(
    table: &RawTable,
    rows: &[usize],
    year_idx: usize,
    value_idx: usize,
    source_name: &str,
) -> Vec<(i32, Option<f64>)> {
    let mut groups: BTreeMap<i32, Option<f64>> = BTreeMap::new();
    let mut bad_years = 0usize;
    let mut coerced = 0usize;

    for &row in rows {
        let Some(year) = parse_year(table.cell(row, year_idx)) else {
            bad_years += 1;
            continue;
        };
        let value = parse_number(table.cell(row, value_idx));
        if value.is_none() {
            coerced += 1;
        }

        let total = groups.entry(year).or_insert(None);
        if let Some(v) = value {
            *total = Some(total.unwrap_or(0.0) + v);
        }
    }

    if bad_years > 0 || coerced > 0 {
        debug!(source = source_name, bad_years, coerced, "non-numeric cells treated as null");
    }
    groups.into_iter().collect()
}

fn find_year_columns(rule: &SourceRule, table: &RawTable, pattern: &str) -> Result<BTreeMap<i32, usize>, AppError> {
    let re = Regex::new(pattern).map_err(|e| AppError::Config(format!("bad year column pattern: {e}")))?;

    let mut columns = BTreeMap::new();
    for (idx, header) in table.headers.iter().enumerate() {
        let year = re
            .captures(header)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok());
        if let Some(year) = year {
            columns.entry(year).or_insert(idx);
        }
    }

    if columns.is_empty() {
        return Err(AppError::schema(
            rule.metric.source_name(),
            "no 'YYYY Number' columns detected; expected headers like '2001 Number'.",
        ));
    }
    Ok(columns)
}

fn pick_single_row(rule: &SourceRule, selected: &[usize], policy: AmbiguousRowPolicy) -> Result<usize, AppError> {
    let name = rule.metric.source_name();
    let predicate = match rule.selection {
        RowSelection::RequireAll(filters) => describe_filters(filters),
        RowSelection::Keep(f) | RowSelection::Prefer(f) => format!("'{}'", f.pattern.text()),
    };

    let Some(&first) = selected.first() else {
        return Err(AppError::NoMatchingRows {
            source_name: name.to_string(),
            predicate,
        });
    };

    if selected.len() > 1 {
        match policy {
            AmbiguousRowPolicy::First => {
                warn!(
                    source = name,
                    matches = selected.len(),
                    predicate = %predicate,
                    "selection matched several rows; using the first"
                );
            }
            AmbiguousRowPolicy::Error => {
                return Err(AppError::AmbiguousRows {
                    source_name: name.to_string(),
                    predicate,
                    count: selected.len(),
                });
            }
        }
    }
    Ok(first)
}

fn read_year_columns(
    table: &RawTable,
    row: usize,
    columns: &BTreeMap<i32, usize>,
    range: YearRange,
    source_name: &str,
) -> Vec<(i32, Option<f64>)> {
    let values: Vec<(i32, Option<f64>)> = columns
        .iter()
        .filter(|(year, _)| range.contains(**year))
        .map(|(&year, &col)| (year, parse_number(table.cell(row, col))))
        .collect();

    let coerced = values.iter().filter(|(_, v)| v.is_none()).count();
    if coerced > 0 {
        debug!(source = source_name, coerced, "non-numeric cells treated as null");
    }
    values
}

/// Lenient numeric parse: blanks, `..`-style markers and text become `None`.
pub fn parse_number(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Integer year, accepting integral decimals such as `2001.0`.
pub fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(year) = s.parse::<i32>() {
        return Some(year);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i32::MAX as f64 {
        Some(v as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::rules::{ELECTRICITY, EMISSIONS, VEHICLES};
    use csv::StringRecord;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            name,
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        )
    }

    fn range() -> YearRange {
        YearRange::new(2001, 2003).unwrap()
    }

    #[test]
    fn emissions_sums_road_rows_per_year() {
        let t = table(
            "emissions",
            &["Year", "Emission  Category", "Greenhouse gas", "Emission, thousand tonnes of CO2 eq. (GWP=AR5)"],
            &[
                &["2001", "1.A.3.b Road transportation", "CO2", "90"],
                &["2001", "1.A.3.b Road transportation", "CH4", "10"],
                &["2001", "1.A.3.c Railways", "CO2", "500"],
                &["2002", "Road", "CO2", ".."],
                &["2002", "Road", "CH4", "7.5"],
                &["2003", "Road", "CO2", ".."],
                &["2030", "Road", "CO2", "1"],
                &["n/a", "Road", "CO2", "1"],
            ],
        );

        let series = extract_table(&EMISSIONS, &t, range(), AmbiguousRowPolicy::First).unwrap();
        assert_eq!(series.get(2001), Some(100.0));
        assert_eq!(series.get(2002), Some(7.5));
        // All-null group stays null.
        assert!(series.contains_year(2003));
        assert_eq!(series.get(2003), None);
        assert!(!series.contains_year(2030));
    }

    #[test]
    fn emissions_without_category_column_is_schema_mismatch() {
        let t = table("emissions", &["Year", "Sector", "Emission, kt"], &[&["2001", "Road", "1"]]);
        let err = extract_table(&EMISSIONS, &t, range(), AmbiguousRowPolicy::First).unwrap_err();
        match err {
            AppError::SchemaMismatch { detail, .. } => assert!(detail.contains("emission category")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn emissions_without_value_column_is_schema_mismatch() {
        let t = table("emissions", &["Year", "Emission category", "Value"], &[&["2001", "Road", "1"]]);
        let err = extract_table(&EMISSIONS, &t, range(), AmbiguousRowPolicy::First).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("emission,"));
    }

    #[test]
    fn electricity_prefers_total_rows() {
        let t = table(
            "electricity",
            &["Year", "Electricity consumption sector", "Quantity (GWh)"],
            &[
                &["2001", "Industry", "40"],
                &["2001", "Total consumption", "80"],
                &["2002", "Industry", "41"],
                &["2002", "Total consumption", "82"],
            ],
        );
        let series = extract_table(&ELECTRICITY, &t, range(), AmbiguousRowPolicy::First).unwrap();
        assert_eq!(series.get(2001), Some(80.0));
        assert_eq!(series.get(2002), Some(82.0));
    }

    #[test]
    fn electricity_without_total_sums_all_rows() {
        let t = table(
            "electricity",
            &["Year", "Electricity consumption sector", "Quantity (GWh)"],
            &[
                &["2001", "Industry", "40"],
                &["2001", "Households", "25"],
                &["2002", "Industry", "41"],
                &["2002", "Subtotals", "1000"],
            ],
        );
        let series = extract_table(&ELECTRICITY, &t, range(), AmbiguousRowPolicy::First).unwrap();
        assert_eq!(series.get(2001), Some(65.0));
        assert_eq!(series.get(2002), Some(1041.0));
    }

    fn vehicles_table(rows: &[&[&str]]) -> RawTable {
        table(
            "vehicles",
            &["Vehicle class", "Region", "2000 Number", "2001 Number", "2002 Number", "2003 Number", "2025 Number"],
            rows,
        )
    }

    #[test]
    fn vehicles_reads_selected_row_across_year_columns() {
        let t = vehicles_table(&[
            &["Passenger cars", "MAINLAND FINLAND", "1", "2", "3", "4", "5"],
            &["All automobiles", "Åland", "9", "9", "9", "9", "9"],
            &["All automobiles", "MK01 Mainland Finland", "100", "110", "..", "130", "140"],
        ]);
        let series = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::First).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(2001), Some(110.0));
        assert!(series.contains_year(2002));
        assert_eq!(series.get(2002), None);
        assert_eq!(series.get(2003), Some(130.0));
    }

    #[test]
    fn vehicles_without_matching_row_fails() {
        let t = vehicles_table(&[&["Vans", "MAINLAND FINLAND", "1", "2", "3", "4", "5"]]);
        let err = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::First).unwrap_err();
        match err {
            AppError::NoMatchingRows { predicate, .. } => {
                assert_eq!(predicate, "'All automobiles' & 'MAINLAND FINLAND'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn vehicles_header_names_are_not_normalized() {
        let t = table(
            "vehicles",
            &["vehicle class", "Region", "2001 Number"],
            &[&["All automobiles", "MAINLAND FINLAND", "1"]],
        );
        let err = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::First).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch { .. }));
    }

    #[test]
    fn vehicles_ambiguity_policy() {
        let rows: &[&[&str]] = &[
            &["All automobiles", "MAINLAND FINLAND", "1", "2", "3", "4", "5"],
            &["All automobiles total", "Mainland Finland", "6", "7", "8", "9", "10"],
        ];
        let t = vehicles_table(rows);

        let series = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::First).unwrap();
        assert_eq!(series.get(2001), Some(2.0));

        let err = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::Error).unwrap_err();
        assert!(matches!(err, AppError::AmbiguousRows { count: 2, .. }));
    }

    #[test]
    fn vehicles_without_year_columns_is_schema_mismatch() {
        let t = table(
            "vehicles",
            &["Vehicle class", "Region", "Total"],
            &[&["All automobiles", "MAINLAND FINLAND", "1"]],
        );
        let err = extract_table(&VEHICLES, &t, range(), AmbiguousRowPolicy::First).unwrap_err();
        assert!(err.to_string().contains("YYYY Number"));
    }

    #[test]
    fn lenient_number_parsing() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number(".."), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_year("2001"), Some(2001));
        assert_eq!(parse_year("2001.0"), Some(2001));
        assert_eq!(parse_year("2001.5"), None);
    }
}
