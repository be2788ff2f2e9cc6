//! Chart model and lifecycle.
//!
//! [`build_panel`] turns the dashboard state into what the chart area should
//! show. The drawable part ([`ChartSpec`]) is held by a [`ChartSurface`], which
//! owns at most one live [`ChartInstance`] and disposes it before every
//! rebuild and on drop.

use chrono::{Datelike, NaiveDate};

use crate::dashboard::state::{DashboardState, LoadState, ViewMode};
use crate::domain::{Horizon, SeriesPoint};

pub const NO_DATA_MESSAGE: &str = "No data for this selection yet.";

/// 24-bit colour parsed from `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl From<Horizon> for Rgb {
    fn from(horizon: Horizon) -> Self {
        // The palette constants are well-formed; grey only if one is edited badly.
        Rgb::from_hex(horizon.color_hex()).unwrap_or(Rgb(160, 160, 160))
    }
}

/// One plotted line.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub horizon: Horizon,
    pub label: String,
    pub color: Rgb,
    /// `(date, variance)` pairs in date order.
    pub points: Vec<(NaiveDate, f64)>,
}

impl Dataset {
    pub fn from_series(horizon: Horizon, series: &[SeriesPoint]) -> Self {
        let mut points: Vec<(NaiveDate, f64)> = series
            .iter()
            .filter(|p| p.variance.is_finite())
            .map(|p| (p.date, p.variance))
            .collect();
        points.sort_by_key(|(d, _)| *d);
        Self {
            horizon,
            label: format!("Predicted variance (h={}d)", horizon.days()),
            color: horizon.into(),
            points,
        }
    }
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub datasets: Vec<Dataset>,
    /// Day-granularity time axis (inclusive date range).
    pub x_range: (NaiveDate, NaiveDate),
    /// Variance axis; never forced to include zero.
    pub y_bounds: [f64; 2],
}

impl ChartSpec {
    /// Build a spec from datasets, dropping empty ones.
    ///
    /// Returns `None` when nothing is left to plot.
    pub fn new(datasets: Vec<Dataset>) -> Option<Self> {
        let datasets: Vec<Dataset> = datasets.into_iter().filter(|d| !d.points.is_empty()).collect();

        let mut dates = datasets.iter().flat_map(|d| d.points.iter().map(|(date, _)| *date));
        let first = dates.next()?;
        let (x_min, x_max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));

        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(_, y) in datasets.iter().flat_map(|d| d.points.iter()) {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        let span = y_max - y_min;
        let pad = if span > 0.0 {
            span * 0.05
        } else {
            (y_max.abs() * 0.05).max(1e-6)
        };

        Some(Self {
            datasets,
            x_range: (x_min, x_max),
            y_bounds: [y_min - pad, y_max + pad],
        })
    }

    /// X bounds as day numbers, widened to at least one day.
    pub fn x_bounds(&self) -> [f64; 2] {
        let x0 = day_number(self.x_range.0);
        let x1 = day_number(self.x_range.1);
        if x1 > x0 { [x0, x1] } else { [x0 - 0.5, x1 + 0.5] }
    }
}

/// Days since the common era, as a plot coordinate.
pub fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

/// Inverse of [`day_number`] for axis labels.
pub fn date_from_day_number(value: f64) -> Option<NaiveDate> {
    let days = value.round();
    if !days.is_finite() || days < f64::from(i32::MIN) || days > f64::from(i32::MAX) {
        return None;
    }
    NaiveDate::from_num_days_from_ce_opt(days as i32)
}

/// What the chart area shows for a given state.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Loading,
    Failed(String),
    NoData,
    Chart(ChartSpec),
}

/// Datasets the current state asks for, before empty ones are dropped.
pub fn datasets_for(state: &DashboardState) -> Vec<Dataset> {
    match state.view {
        ViewMode::Single => vec![Dataset::from_series(state.selection.horizon, &state.series)],
        ViewMode::Multi => state
            .toggles
            .enabled()
            .map(|h| Dataset::from_series(h, state.multi.get(h)))
            .collect(),
    }
}

pub fn build_panel(state: &DashboardState) -> Panel {
    match &state.load {
        LoadState::Loading { .. } => Panel::Loading,
        LoadState::Failed { message } => Panel::Failed(message.clone()),
        LoadState::Idle | LoadState::Loaded => match ChartSpec::new(datasets_for(state)) {
            Some(spec) => Panel::Chart(spec),
            None => Panel::NoData,
        },
    }
}

/// A chart bound to the surface.
#[derive(Debug)]
pub struct ChartInstance {
    pub id: u64,
    pub spec: ChartSpec,
}

/// Exclusive owner of the live chart instance.
#[derive(Debug, Default)]
pub struct ChartSurface {
    current: Option<ChartInstance>,
    created: u64,
    disposed: u64,
}

impl ChartSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispose the current instance (if any) and bind a new one.
    pub fn rebuild(&mut self, spec: ChartSpec) -> &ChartInstance {
        self.dispose();
        self.created += 1;
        tracing::trace!(id = self.created, datasets = spec.datasets.len(), "chart created");
        self.current.insert(ChartInstance {
            id: self.created,
            spec,
        })
    }

    pub fn dispose(&mut self) {
        if let Some(instance) = self.current.take() {
            self.disposed += 1;
            tracing::trace!(id = instance.id, "chart disposed");
        }
    }

    pub fn current(&self) -> Option<&ChartInstance> {
        self.current.as_ref()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn disposed(&self) -> u64 {
        self.disposed
    }

    /// Instances created but not yet disposed (0 or 1).
    pub fn live(&self) -> u64 {
        self.created - self.disposed
    }
}

impl Drop for ChartSurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Rebuild the chart for `state` and return the panel to display.
///
/// The previous instance is always released first, whether or not a new one
/// is created.
pub fn render(state: &DashboardState, surface: &mut ChartSurface) -> Panel {
    let panel = build_panel(state);
    match &panel {
        Panel::Chart(spec) => {
            surface.rebuild(spec.clone());
        }
        _ => surface.dispose(),
    }
    panel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::state::{Action, FetchFailure, RequestId, update};
    use crate::domain::{Item, Metadata, MultiSeries};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn state_with_selection(view: ViewMode) -> DashboardState {
        let mut state = DashboardState::new(view);
        update(
            &mut state,
            Action::MetadataLoaded(Ok(Metadata {
                items: vec![Item { code: 101, name: "Rice".to_string() }],
                regions: vec!["CA".to_string()],
            })),
        );
        state
    }

    fn multi_data() -> MultiSeries {
        Horizon::ALL
            .into_iter()
            .map(|h| {
                let v = f64::from(h.days()) / 100.0;
                (h, vec![SeriesPoint::new(date(1), v), SeriesPoint::new(date(2), v * 2.0)])
            })
            .collect()
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(Rgb::from_hex("#4e79a7"), Some(Rgb(0x4e, 0x79, 0xa7)));
        assert_eq!(Rgb::from(Horizon::D30).to_hex(), "#e15759");
        assert_eq!(Rgb::from_hex("4e79a7"), None);
        assert_eq!(Rgb::from_hex("#4e79"), None);
        assert_eq!(Rgb::from_hex("#zz79a7"), None);
    }

    #[test]
    fn single_series_yields_one_dataset() {
        let mut state = state_with_selection(ViewMode::Single);
        update(&mut state, Action::SelectHorizon(Horizon::D7));
        update(
            &mut state,
            Action::SeriesLoaded {
                request: RequestId(2),
                result: Ok(vec![SeriesPoint::new(date(1), 0.12), SeriesPoint::new(date(2), 0.15)]),
            },
        );

        let Panel::Chart(spec) = build_panel(&state) else {
            panic!("expected a chart");
        };
        assert_eq!(spec.datasets.len(), 1);
        let ds = &spec.datasets[0];
        assert_eq!(ds.horizon, Horizon::D7);
        assert_eq!(ds.label, "Predicted variance (h=7d)");
        assert_eq!(ds.points, vec![(date(1), 0.12), (date(2), 0.15)]);
    }

    #[test]
    fn y_axis_does_not_start_at_zero() {
        let ds = Dataset::from_series(
            Horizon::D1,
            &[SeriesPoint::new(date(1), 10.0), SeriesPoint::new(date(2), 12.0)],
        );
        let spec = ChartSpec::new(vec![ds]).unwrap();
        assert!((spec.y_bounds[0] - 9.9).abs() < 1e-9);
        assert!((spec.y_bounds[1] - 12.1).abs() < 1e-9);
        assert_eq!(spec.x_range, (date(1), date(2)));
    }

    #[test]
    fn points_are_sorted_by_date() {
        let ds = Dataset::from_series(
            Horizon::D1,
            &[SeriesPoint::new(date(3), 0.3), SeriesPoint::new(date(1), 0.1)],
        );
        assert_eq!(ds.points, vec![(date(1), 0.1), (date(3), 0.3)]);
    }

    #[test]
    fn all_toggles_on_yield_three_colored_datasets() {
        let mut state = state_with_selection(ViewMode::Multi);
        update(&mut state, Action::MultiSeriesLoaded { request: RequestId(1), result: Ok(multi_data()) });
        update(&mut state, Action::ToggleHorizon(Horizon::D7));
        update(&mut state, Action::ToggleHorizon(Horizon::D30));

        let Panel::Chart(spec) = build_panel(&state) else {
            panic!("expected a chart");
        };
        let colors: Vec<String> = spec.datasets.iter().map(|d| d.color.to_hex()).collect();
        assert_eq!(colors, vec!["#4e79a7", "#59a14f", "#e15759"]);
        assert!(spec.datasets.iter().all(|d| d.points.len() == 2));
    }

    #[test]
    fn toggling_off_removes_only_that_dataset() {
        let mut state = state_with_selection(ViewMode::Multi);
        update(&mut state, Action::MultiSeriesLoaded { request: RequestId(1), result: Ok(multi_data()) });
        update(&mut state, Action::ToggleHorizon(Horizon::D7));
        update(&mut state, Action::ToggleHorizon(Horizon::D30));
        let Panel::Chart(before) = build_panel(&state) else {
            panic!("expected a chart");
        };

        update(&mut state, Action::ToggleHorizon(Horizon::D7));
        let Panel::Chart(after) = build_panel(&state) else {
            panic!("expected a chart");
        };

        assert_eq!(after.datasets.len(), 2);
        assert_eq!(after.datasets[0], before.datasets[0]);
        assert_eq!(after.datasets[1], before.datasets[2]);
    }

    #[test]
    fn empty_series_shows_no_data() {
        let mut state = state_with_selection(ViewMode::Multi);
        update(&mut state, Action::MultiSeriesLoaded { request: RequestId(1), result: Ok(MultiSeries::new()) });
        update(&mut state, Action::ToggleHorizon(Horizon::D30));
        assert_eq!(build_panel(&state), Panel::NoData);

        let mut surface = ChartSurface::new();
        assert_eq!(render(&state, &mut surface), Panel::NoData);
        assert!(surface.current().is_none());
    }

    #[test]
    fn loading_and_failure_panels() {
        let mut state = state_with_selection(ViewMode::Single);
        assert_eq!(build_panel(&state), Panel::Loading);

        update(
            &mut state,
            Action::SeriesLoaded { request: RequestId(1), result: Err(FetchFailure::new("HTTP 503")) },
        );
        assert_eq!(build_panel(&state), Panel::Failed("HTTP 503".to_string()));
    }

    #[test]
    fn surface_keeps_at_most_one_instance() {
        let mut state = state_with_selection(ViewMode::Multi);
        update(&mut state, Action::MultiSeriesLoaded { request: RequestId(1), result: Ok(multi_data()) });

        let mut surface = ChartSurface::new();
        for _ in 0..3 {
            render(&state, &mut surface);
            assert_eq!(surface.live(), 1);
        }
        assert_eq!(surface.created(), 3);
        assert_eq!(surface.disposed(), 2);
        assert_eq!(surface.current().map(|c| c.id), Some(3));

        update(&mut state, Action::ToggleHorizon(Horizon::D1));
        assert_eq!(render(&state, &mut surface), Panel::NoData);
        assert_eq!(surface.live(), 0);
    }

    #[test]
    fn day_numbers_round_trip() {
        let d = date(15);
        assert_eq!(date_from_day_number(day_number(d)), Some(d));
        assert_eq!(date_from_day_number(f64::NAN), None);
    }
}
