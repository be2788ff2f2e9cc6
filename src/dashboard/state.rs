//! Dashboard state and its update function.
//!
//! All UI state lives in one serializable [`DashboardState`]. Every user input
//! or fetch completion is an [`Action`]; [`update`] applies it and returns the
//! [`Effect`]s the caller must run (fetches, chart rebuilds). Nothing else
//! mutates the state.

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::{Horizon, Item, Metadata, MultiSeries, SeriesPoint};

/// Monotonically increasing id attached to every series fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct RequestId(pub u64);

/// Which chart layout is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// One horizon at a time, fetched from `/api/predict`.
    #[default]
    Single,
    /// All three horizons fetched together from `/api/predict_multi`.
    Multi,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Single => ViewMode::Multi,
            ViewMode::Multi => ViewMode::Single,
        }
    }
}

/// Current user selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Selection {
    pub item_code: Option<i64>,
    pub region: Option<String>,
    pub horizon: Horizon,
}

impl Selection {
    /// Item and region, when both are chosen.
    pub fn target(&self) -> Option<(i64, &str)> {
        Some((self.item_code?, self.region.as_deref()?))
    }
}

/// Per-horizon visibility in the multi-series view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HorizonToggles {
    pub d1: bool,
    pub d7: bool,
    pub d30: bool,
}

impl Default for HorizonToggles {
    fn default() -> Self {
        Self {
            d1: true,
            d7: false,
            d30: false,
        }
    }
}

impl HorizonToggles {
    pub fn is_enabled(&self, horizon: Horizon) -> bool {
        match horizon {
            Horizon::D1 => self.d1,
            Horizon::D7 => self.d7,
            Horizon::D30 => self.d30,
        }
    }

    pub fn set(&mut self, horizon: Horizon, on: bool) {
        match horizon {
            Horizon::D1 => self.d1 = on,
            Horizon::D7 => self.d7 = on,
            Horizon::D30 => self.d30 = on,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Horizon> + '_ {
        Horizon::ALL.into_iter().filter(|h| self.is_enabled(*h))
    }
}

/// A fetch failure as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub message: String,
}

impl FetchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<E: std::error::Error> From<E> for FetchFailure {
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

/// Lifecycle of the series data behind the chart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading {
        request: RequestId,
    },
    Loaded,
    Failed {
        message: String,
    },
}

/// Lifecycle of the item/region metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MetadataState {
    #[default]
    Pending,
    Ready,
    Failed {
        message: String,
    },
}

/// Everything the dashboard knows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    pub items: Vec<Item>,
    pub regions: Vec<String>,
    pub metadata: MetadataState,
    pub selection: Selection,
    pub view: ViewMode,
    pub toggles: HorizonToggles,
    pub load: LoadState,
    pub series: Vec<SeriesPoint>,
    pub multi: MultiSeries,
    last_request: RequestId,
}

impl DashboardState {
    pub fn new(view: ViewMode) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    /// The request whose response is still awaited, if any.
    pub fn in_flight(&self) -> Option<RequestId> {
        match self.load {
            LoadState::Loading { request } => Some(request),
            _ => None,
        }
    }

    pub fn selected_item(&self) -> Option<&Item> {
        let code = self.selection.item_code?;
        self.items.iter().find(|it| it.code == code)
    }

    /// Item code `delta` positions away from the current one (wrapping).
    pub fn item_after(&self, delta: isize) -> Option<i64> {
        let codes: Vec<i64> = self.items.iter().map(|it| it.code).collect();
        let current = self.selection.item_code.and_then(|c| codes.iter().position(|&x| x == c));
        cycle(&codes, current, delta).copied()
    }

    /// Region `delta` positions away from the current one (wrapping).
    pub fn region_after(&self, delta: isize) -> Option<String> {
        let current = self
            .selection
            .region
            .as_ref()
            .and_then(|r| self.regions.iter().position(|x| x == r));
        cycle(&self.regions, current, delta).cloned()
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request = RequestId(self.last_request.0 + 1);
        self.last_request
    }

    /// Start a fetch for the current selection and view, if one is possible.
    fn start_fetch(&mut self) -> Vec<Effect> {
        let Some((item_code, region)) = self.selection.target() else {
            return vec![Effect::Render];
        };
        let region = region.to_string();
        let horizon = self.selection.horizon;
        let view = self.view;
        let request = self.next_request();
        self.load = LoadState::Loading { request };

        let fetch = match view {
            ViewMode::Single => Effect::FetchSeries {
                request,
                item_code,
                region,
                horizon,
            },
            ViewMode::Multi => Effect::FetchMultiSeries {
                request,
                item_code,
                region,
            },
        };
        tracing::debug!(request = request.0, ?view, "starting fetch");
        vec![fetch, Effect::Render]
    }

    /// Whether a response tagged `request` is the one we are waiting for.
    fn accepts(&self, request: RequestId) -> bool {
        if self.in_flight() == Some(request) {
            return true;
        }
        tracing::debug!(
            request = request.0,
            latest = self.last_request.0,
            "discarding stale response"
        );
        false
    }
}

fn cycle<T>(values: &[T], current: Option<usize>, delta: isize) -> Option<&T> {
    if values.is_empty() {
        return None;
    }
    let len = values.len() as isize;
    let idx = match current {
        Some(i) => (i as isize + delta).rem_euclid(len),
        None => 0,
    };
    values.get(idx as usize)
}

/// Inputs to [`update`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Kick off the metadata request (startup, or retry after a failure).
    LoadMetadata,
    MetadataLoaded(Result<Metadata, FetchFailure>),
    SelectItem(i64),
    SelectRegion(String),
    SelectHorizon(Horizon),
    ToggleHorizon(Horizon),
    SetView(ViewMode),
    /// Refetch for the current selection, or retry metadata if it never loaded.
    Refresh,
    SeriesLoaded {
        request: RequestId,
        result: Result<Vec<SeriesPoint>, FetchFailure>,
    },
    MultiSeriesLoaded {
        request: RequestId,
        result: Result<MultiSeries, FetchFailure>,
    },
}

/// Side effects requested by [`update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchMetadata,
    FetchSeries {
        request: RequestId,
        item_code: i64,
        region: String,
        horizon: Horizon,
    },
    FetchMultiSeries {
        request: RequestId,
        item_code: i64,
        region: String,
    },
    /// Rebuild the chart from the current state.
    Render,
}

impl Effect {
    pub fn is_fetch(&self) -> bool {
        !matches!(self, Effect::Render)
    }

    /// The sequence id of a series fetch. Metadata fetches carry none.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            Effect::FetchSeries { request, .. } | Effect::FetchMultiSeries { request, .. } => Some(*request),
            Effect::FetchMetadata | Effect::Render => None,
        }
    }
}

/// Apply `action` to `state` and return the effects to run.
pub fn update(state: &mut DashboardState, action: Action) -> Vec<Effect> {
    match action {
        Action::LoadMetadata => {
            state.metadata = MetadataState::Pending;
            vec![Effect::FetchMetadata]
        }
        Action::MetadataLoaded(Ok(metadata)) => {
            state.items = metadata.items;
            state.regions = metadata.regions;
            state.metadata = MetadataState::Ready;

            let mut changed = false;
            if state.selection.item_code.is_none() {
                if let Some(first) = state.items.first() {
                    state.selection.item_code = Some(first.code);
                    changed = true;
                }
            }
            if state.selection.region.is_none() {
                if let Some(first) = state.regions.first() {
                    state.selection.region = Some(first.clone());
                    changed = true;
                }
            }
            // A preset selection still needs its first fetch.
            if changed || state.load == LoadState::Idle {
                state.start_fetch()
            } else {
                vec![Effect::Render]
            }
        }
        Action::MetadataLoaded(Err(failure)) => {
            if state.metadata == MetadataState::Ready {
                tracing::debug!(error = %failure.message, "ignoring metadata failure after a successful load");
                return Vec::new();
            }
            tracing::warn!(error = %failure.message, "metadata request failed");
            state.metadata = MetadataState::Failed {
                message: failure.message,
            };
            vec![Effect::Render]
        }
        Action::SelectItem(code) => {
            if state.selection.item_code == Some(code) {
                return Vec::new();
            }
            state.selection.item_code = Some(code);
            state.start_fetch()
        }
        Action::SelectRegion(region) => {
            if state.selection.region.as_deref() == Some(region.as_str()) {
                return Vec::new();
            }
            state.selection.region = Some(region);
            state.start_fetch()
        }
        Action::SelectHorizon(horizon) => {
            if state.selection.horizon == horizon {
                return Vec::new();
            }
            state.selection.horizon = horizon;
            match state.view {
                ViewMode::Single => state.start_fetch(),
                // Every horizon slice is already in hand.
                ViewMode::Multi => vec![Effect::Render],
            }
        }
        Action::ToggleHorizon(horizon) => {
            let on = state.toggles.is_enabled(horizon);
            state.toggles.set(horizon, !on);
            vec![Effect::Render]
        }
        Action::SetView(view) => {
            if state.view == view {
                return Vec::new();
            }
            state.view = view;
            state.start_fetch()
        }
        Action::Refresh => match state.metadata {
            MetadataState::Ready => state.start_fetch(),
            // The request already in flight will answer.
            MetadataState::Pending => Vec::new(),
            MetadataState::Failed { .. } => {
                state.metadata = MetadataState::Pending;
                vec![Effect::FetchMetadata]
            }
        },
        Action::SeriesLoaded { request, result } => {
            if !state.accepts(request) {
                return Vec::new();
            }
            match result {
                Ok(points) => {
                    state.series = points;
                    state.load = LoadState::Loaded;
                }
                Err(failure) => {
                    tracing::warn!(request = request.0, error = %failure.message, "series request failed");
                    state.series.clear();
                    state.load = LoadState::Failed {
                        message: failure.message,
                    };
                }
            }
            vec![Effect::Render]
        }
        Action::MultiSeriesLoaded { request, result } => {
            if !state.accepts(request) {
                return Vec::new();
            }
            match result {
                Ok(multi) => {
                    state.multi = multi;
                    state.load = LoadState::Loaded;
                }
                Err(failure) => {
                    tracing::warn!(request = request.0, error = %failure.message, "multi-series request failed");
                    state.multi = MultiSeries::new();
                    state.load = LoadState::Failed {
                        message: failure.message,
                    };
                }
            }
            vec![Effect::Render]
        }
    }
}
