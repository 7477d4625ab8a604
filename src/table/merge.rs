//! Merge per-metric series into the canonical year-indexed table.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::domain::{MergedTable, Metric, MetricSeries, YearRange, YearRow};

/// Outer-join `series` on year and lay the result onto `range`.
///
/// Every year of `range` gets exactly one row, ascending. A year that some
/// series do not report keeps nulls in their columns; years outside the range
/// are dropped even when every series reports them.
pub fn merge_series(series: &[&MetricSeries], range: YearRange) -> MergedTable {
    let reported: BTreeSet<i32> = series.iter().flat_map(|s| s.iter().map(|(y, _)| y)).collect();
    let outside = reported.iter().filter(|y| !range.contains(**y)).count();
    if outside > 0 {
        debug!(outside, "dropping years outside the configured range");
    }

    let rows: Vec<YearRow> = range
        .years()
        .map(|year| {
            let mut row = YearRow::empty(year);
            for s in series {
                let value = s.get(year);
                match s.metric {
                    Metric::Emissions => row.emissions_ktco2e = value,
                    Metric::Electricity => row.electricity_gwh = value,
                    Metric::Vehicles => row.vehicles_first_reg = value,
                }
            }
            row
        })
        .collect();

    let complete = rows
        .iter()
        .filter(|r| Metric::ALL.iter().all(|m| r.value(*m).is_some()))
        .count();
    info!(rows = rows.len(), complete, "merged table");

    MergedTable { range, rows }
}
