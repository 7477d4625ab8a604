//! Declarative per-source matching rules.
//!
//! Each export is described by a [`SourceRule`]; [`crate::ingest::extract`] is the
//! single routine that interprets them.

use regex::Regex;

use crate::domain::Metric;
use crate::error::AppError;
use crate::ingest::raw::{HeaderMatch, SourceEncoding};

/// Case-insensitive text predicate over a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPattern {
    /// The word appears delimited by word boundaries.
    WholeWord(&'static str),
    /// The text appears anywhere.
    Contains(&'static str),
}

impl TextPattern {
    pub fn compile(self) -> Result<Regex, AppError> {
        let pattern = match self {
            TextPattern::WholeWord(word) => format!(r"(?i)\b{}\b", regex::escape(word)),
            TextPattern::Contains(text) => format!("(?i){}", regex::escape(text)),
        };
        Regex::new(&pattern).map_err(|e| AppError::Config(format!("bad text pattern: {e}")))
    }

    pub fn text(self) -> &'static str {
        match self {
            TextPattern::WholeWord(s) | TextPattern::Contains(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub pattern: TextPattern,
}

/// Which data rows feed the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSelection {
    /// Keep matching rows; an empty result is allowed.
    Keep(ColumnFilter),
    /// Narrow to matching rows only when at least one row matches.
    Prefer(ColumnFilter),
    /// Every filter must match; at least one row is required.
    RequireAll(&'static [ColumnFilter]),
}

/// Match on a normalized header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    StartsWith(&'static str),
    Contains(&'static str),
}

impl NameMatch {
    pub fn matches(self, name: &str) -> bool {
        match self {
            NameMatch::StartsWith(prefix) => name.starts_with(prefix),
            NameMatch::Contains(needle) => name.contains(needle),
        }
    }

    pub fn describe(self) -> String {
        match self {
            NameMatch::StartsWith(prefix) => format!("starts with '{prefix}'"),
            NameMatch::Contains(needle) => format!("contains '{needle}'"),
        }
    }
}

/// Where the numbers live and how they collapse to one value per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    /// Long layout: a year column and one value column, summed per year.
    SumByYear {
        year_column: &'static str,
        value: NameMatch,
    },
    /// Wide layout: one column per year (first regex group is the year),
    /// read from the single selected row.
    YearColumns { pattern: &'static str },
}

/// Everything needed to turn one export into a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRule {
    pub metric: Metric,
    pub file_name: &'static str,
    pub encoding: SourceEncoding,
    pub header_match: HeaderMatch,
    pub required_columns: &'static [&'static str],
    pub selection: RowSelection,
    pub layout: ValueLayout,
}

const EMISSION_CATEGORY: &str = "emission category";
const ELECTRICITY_SECTOR: &str = "electricity consumption sector";

pub const EMISSIONS: SourceRule = SourceRule {
    metric: Metric::Emissions,
    file_name: "Greenhouse_gas_emissions.csv",
    encoding: SourceEncoding::Utf8,
    header_match: HeaderMatch::Normalized,
    required_columns: &[EMISSION_CATEGORY, "year"],
    selection: RowSelection::Keep(ColumnFilter {
        column: EMISSION_CATEGORY,
        pattern: TextPattern::WholeWord("road"),
    }),
    layout: ValueLayout::SumByYear {
        year_column: "year",
        value: NameMatch::StartsWith("emission,"),
    },
};

pub const ELECTRICITY: SourceRule = SourceRule {
    metric: Metric::Electricity,
    file_name: "Electricity_consumption.csv",
    encoding: SourceEncoding::Latin1,
    header_match: HeaderMatch::Normalized,
    required_columns: &[ELECTRICITY_SECTOR, "year"],
    selection: RowSelection::Prefer(ColumnFilter {
        column: ELECTRICITY_SECTOR,
        pattern: TextPattern::WholeWord("total"),
    }),
    layout: ValueLayout::SumByYear {
        year_column: "year",
        value: NameMatch::Contains("quantity"),
    },
};

pub const VEHICLES: SourceRule = SourceRule {
    metric: Metric::Vehicles,
    file_name: "Reg_vehicles.csv",
    encoding: SourceEncoding::Latin1,
    header_match: HeaderMatch::Exact,
    required_columns: &["Vehicle class", "Region"],
    selection: RowSelection::RequireAll(&[
        ColumnFilter {
            column: "Vehicle class",
            pattern: TextPattern::Contains("All automobiles"),
        },
        ColumnFilter {
            column: "Region",
            pattern: TextPattern::Contains("MAINLAND FINLAND"),
        },
    ]),
    layout: ValueLayout::YearColumns {
        pattern: r"^\s*(\d{4})\s+Number\s*$",
    },
};

/// The rule describing the export for `metric`.
pub fn rule_for(metric: Metric) -> &'static SourceRule {
    match metric {
        Metric::Emissions => &EMISSIONS,
        Metric::Electricity => &ELECTRICITY,
        Metric::Vehicles => &VEHICLES,
    }
}
