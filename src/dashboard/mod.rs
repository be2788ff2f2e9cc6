//! Dashboard core, independent of any terminal.
//!
//! - `state`: serializable state, actions, effects and the `update` function
//! - `chart`: dataset construction and the chart instance lifecycle
//! - `effects`: executes fetch effects against the API client, inline or on
//!   a background IO pool

pub mod chart;
pub mod effects;
pub mod state;

pub use chart::{ChartSpec, ChartSurface, Dataset, NO_DATA_MESSAGE, Panel, Rgb, build_panel, render};
pub use effects::{FETCH_THREADS, Fetcher, perform};
pub use state::{
    Action, DashboardState, Effect, FetchFailure, HorizonToggles, LoadState, MetadataState, RequestId,
    Selection, ViewMode, update,
};
