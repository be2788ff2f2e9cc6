//! Ratatui-based terminal UI.
//!
//! Key presses become dashboard [`Action`]s. Fetch effects run on the
//! [`Fetcher`]'s IO pool and come back as actions over a channel, so the event
//! loop never blocks on the network. Every `Effect::Render` rebuilds the chart through
//! the [`ChartSurface`].

use std::io;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::cli::TuiArgs;
use crate::config::Settings;
use crate::dashboard::chart::date_from_day_number;
use crate::dashboard::{
    Action, ChartSpec, ChartSurface, DashboardState, Effect, Fetcher, LoadState, MetadataState,
    NO_DATA_MESSAGE, Panel, ViewMode, render, update,
};
use crate::data::ForecastClient;
use crate::domain::Horizon;
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::VariancePlottersChart;

/// Start the TUI.
pub fn run(settings: &Settings, args: TuiArgs) -> Result<(), AppError> {
    let client = settings.client()?;
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(client, args)?;
    let result = app.event_loop(&mut terminal);
    app.surface.dispose();
    tracing::info!("dashboard closed");
    result
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// A focusable row in the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Item,
    Region,
    Horizon,
    Toggle(Horizon),
}

fn fields(view: ViewMode) -> Vec<Field> {
    match view {
        ViewMode::Single => vec![Field::Item, Field::Region, Field::Horizon],
        ViewMode::Multi => {
            let mut out = vec![Field::Item, Field::Region];
            out.extend(Horizon::ALL.into_iter().map(Field::Toggle));
            out
        }
    }
}

struct App {
    state: DashboardState,
    surface: ChartSurface,
    panel: Panel,
    fetcher: Fetcher,
    rx: Receiver<Action>,
    focus: usize,
}

impl App {
    fn new(client: ForecastClient, args: TuiArgs) -> Result<Self, AppError> {
        let mut state = DashboardState::new(args.view);
        state.selection.item_code = args.item;
        state.selection.region = args.region;
        state.selection.horizon = args.horizon;

        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            state,
            surface: ChartSurface::new(),
            panel: Panel::NoData,
            fetcher: Fetcher::new(client, tx)?,
            rx,
            focus: 0,
        };
        app.dispatch(Action::LoadMetadata);
        Ok(app)
    }

    fn dispatch(&mut self, action: Action) {
        for effect in update(&mut self.state, action) {
            match effect {
                Effect::Render => {
                    self.panel = render(&self.state, &mut self.surface);
                }
                fetch => self.fetcher.submit(fetch),
            }
        }
    }

    /// Apply every fetch result that has arrived. Returns whether any did.
    fn drain_results(&mut self) -> bool {
        let mut any = false;
        while let Ok(action) = self.rx.try_recv() {
            self.dispatch(action);
            any = true;
        }
        any
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if self.drain_results() {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let rows = fields(self.state.view);
        self.focus = self.focus.min(rows.len() - 1);

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                self.focus = self.focus.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.focus + 1 < rows.len() {
                    self.focus += 1;
                }
            }
            KeyCode::Left => self.adjust(rows[self.focus], -1),
            KeyCode::Right => self.adjust(rows[self.focus], 1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Field::Toggle(h) = rows[self.focus] {
                    self.dispatch(Action::ToggleHorizon(h));
                }
            }
            KeyCode::Char('v') => {
                let view = self.state.view.toggled();
                self.dispatch(Action::SetView(view));
                self.focus = self.focus.min(fields(view).len() - 1);
            }
            KeyCode::Char('r') => self.dispatch(Action::Refresh),
            KeyCode::Char(c @ ('1' | '7' | '3')) => {
                let h = match c {
                    '1' => Horizon::D1,
                    '7' => Horizon::D7,
                    _ => Horizon::D30,
                };
                match self.state.view {
                    ViewMode::Single => self.dispatch(Action::SelectHorizon(h)),
                    ViewMode::Multi => self.dispatch(Action::ToggleHorizon(h)),
                }
            }
            _ => {}
        }
        false
    }

    fn adjust(&mut self, field: Field, delta: isize) {
        match field {
            Field::Item => {
                if let Some(code) = self.state.item_after(delta) {
                    self.dispatch(Action::SelectItem(code));
                }
            }
            Field::Region => {
                if let Some(region) = self.state.region_after(delta) {
                    self.dispatch(Action::SelectRegion(region));
                }
            }
            Field::Horizon => {
                let cur = self.state.selection.horizon;
                let next = if delta >= 0 { cur.next() } else { cur.prev() };
                self.dispatch(Action::SelectHorizon(next));
            }
            Field::Toggle(h) => self.dispatch(Action::ToggleHorizon(h)),
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let item = self
            .state
            .selected_item()
            .map(|it| format!("{} ({})", it.name, it.code))
            .or_else(|| self.state.selection.item_code.map(|c| c.to_string()))
            .unwrap_or_else(|| "-".to_string());
        let region = self.state.selection.region.as_deref().unwrap_or("-");
        let view = match self.state.view {
            ViewMode::Single => "single",
            ViewMode::Multi => "multi",
        };
        let horizons = match self.state.view {
            ViewMode::Single => self.state.selection.horizon.to_string(),
            ViewMode::Multi => {
                let on: Vec<String> = self.state.toggles.enabled().map(|h| h.to_string()).collect();
                if on.is_empty() { "none".to_string() } else { on.join(",") }
            }
        };

        let lines = vec![
            Line::from(vec![
                Span::styled("vdash", Style::default().fg(Color::Cyan)),
                Span::raw(" | Food Price Volatility: Hybrid LSTM + GARCH"),
            ]),
            Line::from(Span::styled(
                format!("item: {item} | state: {region} | horizon: {horizons} | view: {view}"),
                Style::default().fg(Color::Gray),
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let settings_height = fields(self.state.view).len() as u16 + 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(settings_height)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_settings(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut title = vec![Span::raw("Predicted variance ")];
        if let Some(instance) = self.surface.current() {
            for ds in &instance.spec.datasets {
                title.push(Span::styled(
                    format!("■ h={}d ", ds.horizon.days()),
                    Style::default().fg(Color::Rgb(ds.color.0, ds.color.1, ds.color.2)),
                ));
            }
        }
        let block = Block::default().title(Line::from(title)).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let message = match &self.panel {
            Panel::Loading => Some(("Loading…".to_string(), Color::Yellow)),
            Panel::Failed(msg) => Some((format!("Request failed: {msg} (r to retry)"), Color::Red)),
            Panel::NoData => Some((NO_DATA_MESSAGE.to_string(), Color::Gray)),
            Panel::Chart(_) => None,
        };
        if let Some((text, color)) = message {
            frame.render_widget(Paragraph::new(text).style(Style::default().fg(color)), inner);
            return;
        }

        let Some(instance) = self.surface.current() else {
            return;
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = VariancePlottersChart {
            spec: &instance.spec,
            fmt_x: fmt_axis_date,
            fmt_y: fmt_axis_variance,
        };
        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &instance.spec);
        }
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = fields(self.state.view)
            .into_iter()
            .map(|field| ListItem::new(self.field_label(field)))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.focus));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn field_label(&self, field: Field) -> Line<'static> {
        match field {
            Field::Item => {
                let label = self
                    .state
                    .selected_item()
                    .map(|it| it.name.clone())
                    .unwrap_or_else(|| "-".to_string());
                Line::from(format!("Item: {label}  ({} available)", self.state.items.len()))
            }
            Field::Region => {
                let label = self.state.selection.region.clone().unwrap_or_else(|| "-".to_string());
                Line::from(format!("State: {label}  ({} available)", self.state.regions.len()))
            }
            Field::Horizon => Line::from(format!(
                "Forecast horizon: {}",
                self.state.selection.horizon.display_name()
            )),
            Field::Toggle(h) => {
                let mark = if self.state.toggles.is_enabled(h) { "[x]" } else { "[ ]" };
                let rgb = crate::dashboard::Rgb::from(h);
                Line::from(vec![
                    Span::raw(format!("{mark} ")),
                    Span::styled(
                        h.display_name(),
                        Style::default().fg(Color::Rgb(rgb.0, rgb.1, rgb.2)),
                    ),
                ])
            }
        }
    }

    fn status_line(&self) -> (String, Color) {
        match &self.state.metadata {
            MetadataState::Pending => return ("Loading items…".to_string(), Color::Yellow),
            MetadataState::Failed { message } => {
                return (format!("Items request failed: {message} (r to retry)"), Color::Red);
            }
            MetadataState::Ready => {}
        }
        match &self.state.load {
            LoadState::Idle => ("Pick an item and state.".to_string(), Color::Gray),
            LoadState::Loading { request } => (format!("Fetching (request #{})…", request.0), Color::Yellow),
            LoadState::Loaded => {
                let n = match self.state.view {
                    ViewMode::Single => self.state.series.len(),
                    ViewMode::Multi => Horizon::ALL.iter().map(|h| self.state.multi.get(*h).len()).sum::<usize>(),
                };
                (format!("{n} points loaded."), Color::Green)
            }
            LoadState::Failed { message } => (format!("Fetch failed: {message}"), Color::Red),
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = match self.state.view {
            ViewMode::Single => "↑/↓ select  ←/→ change  1/7/3 horizon  v multi view  r refresh  q quit",
            ViewMode::Multi => "↑/↓ select  ←/→ change  Space toggle  1/7/3 toggle  v single view  r refresh  q quit",
        };
        let (status, color) = self.status_line();
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(status, Style::default().fg(color)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn fmt_axis_date(v: f64) -> String {
    date_from_day_number(v)
        .map(|d| d.format("%m-%d").to_string())
        .unwrap_or_default()
}

fn fmt_axis_variance(v: f64) -> String {
    format!("{v:.4}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    spec: &ChartSpec,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let x_bounds = spec.x_bounds();
    let y_bounds = spec.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let Some(date) = date_from_day_number(x_val) else {
            continue;
        };
        let label = date.format("%Y-%m-%d").to_string();
        let label_len = label.len() as u16;
        let start = x
            .saturating_sub(label_len / 2)
            .clamp(inner.x, (inner.x + inner.width).saturating_sub(label_len));
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_variance(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("date")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("variance")
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ratatui::backend::TestBackend;

    use crate::dashboard::chart::day_number;
    use crate::dashboard::{Dataset, RequestId};
    use crate::domain::{Item, Metadata, SeriesPoint};

    fn app(view: ViewMode) -> App {
        let client = ForecastClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let (tx, rx) = mpsc::channel();
        App {
            state: DashboardState::new(view),
            surface: ChartSurface::new(),
            panel: Panel::NoData,
            fetcher: Fetcher::with_threads(client, tx, 1).unwrap(),
            rx,
            focus: 0,
        }
    }

    fn loaded(view: ViewMode) -> App {
        let mut app = app(view);
        // Apply updates directly so no background fetch is spawned.
        update(
            &mut app.state,
            Action::MetadataLoaded(Ok(Metadata {
                items: vec![
                    Item { code: 101, name: "Rice".to_string() },
                    Item { code: 202, name: "Maize".to_string() },
                ],
                regions: vec!["CA".to_string(), "NY".to_string()],
            })),
        );
        app
    }

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn field_lists_follow_view() {
        assert_eq!(fields(ViewMode::Single), vec![Field::Item, Field::Region, Field::Horizon]);
        assert_eq!(fields(ViewMode::Multi).len(), 5);
    }

    #[test]
    fn axis_date_labels() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(fmt_axis_date(day_number(d)), "01-02");
    }

    #[test]
    fn quit_keys() {
        let mut app = app(ViewMode::Single);
        assert!(app.handle_key(KeyCode::Char('q')));
        assert!(app.handle_key(KeyCode::Esc));
        assert!(!app.handle_key(KeyCode::Down));
        assert_eq!(app.focus, 1);
    }

    #[test]
    fn toggle_key_updates_state_without_fetching() {
        let mut app = loaded(ViewMode::Multi);
        let in_flight = app.state.in_flight();
        app.focus = 3;
        app.handle_key(KeyCode::Char(' '));
        assert!(app.state.toggles.d7);
        assert_eq!(app.state.in_flight(), in_flight);
    }

    #[test]
    fn draws_no_data_message() {
        let mut app = loaded(ViewMode::Single);
        app.dispatch(Action::SeriesLoaded { request: RequestId(1), result: Ok(Vec::new()) });
        assert_eq!(app.panel, Panel::NoData);
        let text = screen_text(&mut app);
        assert!(text.contains("No data for this selection yet."));
        assert!(text.contains("Rice"));
    }

    #[test]
    fn draws_chart_when_data_arrives() {
        let mut app = loaded(ViewMode::Single);
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        app.dispatch(Action::SeriesLoaded {
            request: RequestId(1),
            result: Ok(vec![SeriesPoint::new(d1, 0.12), SeriesPoint::new(d2, 0.15)]),
        });

        let Panel::Chart(spec) = &app.panel else {
            panic!("expected chart panel");
        };
        assert_eq!(spec.datasets, vec![Dataset::from_series(Horizon::D1, &app.state.series)]);
        assert_eq!(app.surface.live(), 1);
        assert_eq!(app.surface.current().map(|c| c.spec.datasets.len()), Some(1));
    }
}
