//! Shared domain types.
//!
//! These mirror the JSON payloads of the forecast API and are kept
//! serializable so the whole dashboard state can be dumped or snapshotted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A tracked commodity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub code: i64,
    pub name: String,
}

/// Response of `/api/items`.
///
/// Regions are called `states` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default, rename = "states")]
    pub regions: Vec<String>,
}

/// Forecast horizon in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, ValueEnum)]
pub enum Horizon {
    #[default]
    #[value(name = "1")]
    D1,
    #[value(name = "7")]
    D7,
    #[value(name = "30")]
    D30,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::D1, Horizon::D7, Horizon::D30];

    pub fn days(self) -> u32 {
        match self {
            Horizon::D1 => 1,
            Horizon::D7 => 7,
            Horizon::D30 => 30,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            1 => Some(Horizon::D1),
            7 => Some(Horizon::D7),
            30 => Some(Horizon::D30),
            _ => None,
        }
    }

    /// Fixed chart colour (hex) for this horizon.
    pub fn color_hex(self) -> &'static str {
        match self {
            Horizon::D1 => "#4e79a7",
            Horizon::D7 => "#59a14f",
            Horizon::D30 => "#e15759",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Horizon::D1 => "Next day (1d)",
            Horizon::D7 => "7 days ahead",
            Horizon::D30 => "30 days ahead",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Horizon::D1 => Horizon::D7,
            Horizon::D7 => Horizon::D30,
            Horizon::D30 => Horizon::D1,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Horizon::D1 => Horizon::D30,
            Horizon::D7 => Horizon::D1,
            Horizon::D30 => Horizon::D7,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

impl Serialize for Horizon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.days())
    }
}

impl<'de> Deserialize<'de> for Horizon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = u32::deserialize(deserializer)?;
        Horizon::from_days(days).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported horizon {days} (expected 1, 7 or 30)"))
        })
    }
}

/// One predicted observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(
        serialize_with = "serialize_series_date",
        deserialize_with = "deserialize_series_date"
    )]
    pub date: NaiveDate,
    pub variance: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, variance: f64) -> Self {
        Self { date, variance }
    }
}

/// All three horizon slices of a `/api/predict_multi` response.
///
/// Horizons the server did not return read back as empty slices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MultiSeries {
    slices: BTreeMap<Horizon, Vec<SeriesPoint>>,
}

impl MultiSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, horizon: Horizon, points: Vec<SeriesPoint>) {
        self.slices.insert(horizon, points);
    }

    pub fn get(&self, horizon: Horizon) -> &[SeriesPoint] {
        self.slices.get(&horizon).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.slices.values().all(Vec::is_empty)
    }
}

impl FromIterator<(Horizon, Vec<SeriesPoint>)> for MultiSeries {
    fn from_iter<I: IntoIterator<Item = (Horizon, Vec<SeriesPoint>)>>(iter: I) -> Self {
        Self {
            slices: iter.into_iter().collect(),
        }
    }
}

/// Parse a series date.
///
/// Accepts plain `YYYY-MM-DD` as well as timestamps (RFC 3339 or naive
/// `YYYY-MM-DDTHH:MM:SS`); only the calendar date is kept.
pub fn parse_series_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn deserialize_series_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_series_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid series date '{raw}'")))
}

fn serialize_series_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_colors_are_fixed() {
        assert_eq!(Horizon::D1.color_hex(), "#4e79a7");
        assert_eq!(Horizon::D7.color_hex(), "#59a14f");
        assert_eq!(Horizon::D30.color_hex(), "#e15759");
    }

    #[test]
    fn horizon_round_trips_through_days() {
        for h in Horizon::ALL {
            assert_eq!(Horizon::from_days(h.days()), Some(h));
        }
        assert_eq!(Horizon::from_days(14), None);
        assert_eq!(Horizon::D30.next(), Horizon::D1);
        assert_eq!(Horizon::D1.prev(), Horizon::D30);
    }

    #[test]
    fn horizon_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Horizon::D7).unwrap(), "7");
        let h: Horizon = serde_json::from_str("30").unwrap();
        assert_eq!(h, Horizon::D30);
        assert!(serde_json::from_str::<Horizon>("2").is_err());
    }

    #[test]
    fn series_point_accepts_dates_and_timestamps() {
        let p: SeriesPoint =
            serde_json::from_str(r#"{"date":"2024-01-01","variance":0.12}"#).unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((p.variance - 0.12).abs() < 1e-12);

        let p: SeriesPoint =
            serde_json::from_str(r#"{"date":"2024-03-05T00:00:00","variance":1.0}"#).unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

        let p: SeriesPoint =
            serde_json::from_str(r#"{"date":"2024-03-05T12:30:00Z","variance":1.0}"#).unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

        assert!(serde_json::from_str::<SeriesPoint>(r#"{"date":"yesterday","variance":1.0}"#).is_err());
    }

    #[test]
    fn series_point_serializes_plain_date() {
        let p = SeriesPoint::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 0.5);
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            r#"{"date":"2024-01-02","variance":0.5}"#
        );
    }

    #[test]
    fn metadata_reads_states_as_regions() {
        let m: Metadata = serde_json::from_str(
            r#"{"items":[{"code":101,"name":"Rice"}],"states":["CA","NY"]}"#,
        )
        .unwrap();
        assert_eq!(m.items, vec![Item { code: 101, name: "Rice".to_string() }]);
        assert_eq!(m.regions, vec!["CA".to_string(), "NY".to_string()]);

        let empty: Metadata = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty() && empty.regions.is_empty());
    }

    #[test]
    fn multi_series_missing_slices_read_empty() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let multi: MultiSeries = [(Horizon::D7, vec![SeriesPoint::new(d, 0.1)])]
            .into_iter()
            .collect();
        assert!(multi.get(Horizon::D1).is_empty());
        assert_eq!(multi.get(Horizon::D7).len(), 1);
        assert!(!multi.is_empty());
        assert!(MultiSeries::new().is_empty());
    }
}
