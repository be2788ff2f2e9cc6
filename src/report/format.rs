//! Plain-text tables for the one-shot commands.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::domain::{Horizon, Metadata, MultiSeries, SeriesPoint};

/// List items and regions.
pub fn format_metadata(metadata: &Metadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Items ({}):", metadata.items.len());
    let width = metadata
        .items
        .iter()
        .map(|it| it.code.to_string().len())
        .max()
        .unwrap_or(0);
    for item in &metadata.items {
        let _ = writeln!(out, "  {:>width$}  {}", item.code, item.name);
    }
    let _ = writeln!(out, "Regions ({}):", metadata.regions.len());
    for region in &metadata.regions {
        let _ = writeln!(out, "  {region}");
    }
    out
}

/// One horizon's series as a two-column table.
pub fn format_series(series: &[SeriesPoint], horizon: Horizon) -> String {
    if series.is_empty() {
        return format!("No data for horizon {horizon}.\n");
    }

    let mut sorted = series.to_vec();
    sorted.sort_by_key(|p| p.date);

    let mut out = String::new();
    let _ = writeln!(out, "Predicted variance, horizon {} ({} points)", horizon, sorted.len());
    let _ = writeln!(out, "{:<10}  {:>12}", "date", "variance");
    for p in &sorted {
        let _ = writeln!(out, "{:<10}  {:>12}", p.date, fmt_variance(Some(p.variance)));
    }
    out
}

/// All horizons joined on date; missing cells print as `-`.
pub fn format_multi(multi: &MultiSeries) -> String {
    if multi.is_empty() {
        return "No data for any horizon.\n".to_string();
    }

    let dates: BTreeSet<NaiveDate> = Horizon::ALL
        .into_iter()
        .flat_map(|h| multi.get(h).iter().map(|p| p.date))
        .collect();

    let mut out = String::new();
    let _ = write!(out, "{:<10}", "date");
    for h in Horizon::ALL {
        let _ = write!(out, "  {:>12}", format!("h={h}"));
    }
    out.push('\n');

    for date in dates {
        let _ = write!(out, "{date:<10}");
        for h in Horizon::ALL {
            let value = multi.get(h).iter().find(|p| p.date == date).map(|p| p.variance);
            let _ = write!(out, "  {:>12}", fmt_variance(value));
        }
        out.push('\n');
    }
    out
}

fn fmt_variance(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => "-".to_string(),
    }
}
