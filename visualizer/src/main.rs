use canvas::{CanvasEngine, MapCanvas};
use client::HttpDetectionQuery;
use config::VisualizerConfig;
use iced::{
    time,
    widget::{button, column, row, scrollable, slider, text, text_input, Canvas, Column, Container},
    Alignment, Element, Length, Subscription, Task, Theme,
};
use std::sync::Arc;
use trackcore::bridge::{
    publish_search_results, ApplicationMode, ChannelPoller, ContextReader, DashboardContexts,
    DurableChannel, FileStore, PollOutcome, PreferenceSlot,
};
use trackcore::map::{
    lantern_nodes, load_nodes, CameraAdjustment, CameraChange, MapAvailability, MapSurface,
    StaticNode,
};
use trackcore::prelude::{DashboardError, DashboardResult};
use trackcore::query::search::MAX_TIRE_IDS;
use trackcore::query::{execute_plan, Detection, HighlightSet, SearchPlan, VehicleSearch};
use trackcore::telemetry::MetricsRecorder;
use trackcore::tracking::{
    now_millis, PathAccumulator, Position, RandomWalk, TrackingUpdate, DEFAULT_PATH_CAPACITY,
};

mod canvas;
mod client;
mod config;
mod export;

fn main() -> iced::Result {
    env_logger::init();
    iced::application(Dashboard::boot, Dashboard::update, Dashboard::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(state: &Dashboard) -> String {
    match state.mode {
        Some(mode) => format!("Vehicle Tracking Dashboard - {mode}"),
        None => "Vehicle Tracking Dashboard".into(),
    }
}

/// Position ticks and durable polls run on separate timers so a slow poll
/// never delays the tracked marker.
fn application_subscription(state: &Dashboard) -> Subscription<Message> {
    if state.mode.is_none() {
        return Subscription::none();
    }
    Subscription::batch([
        time::every(state.config.emit_interval()).map(|_| Message::Tick),
        time::every(state.config.poll_interval()).map(|_| Message::Poll),
    ])
}

fn application_theme(_: &Dashboard) -> Theme {
    Theme::Dark
}

struct Dashboard {
    config: VisualizerConfig,
    availability: MapAvailability,
    surface: MapSurface<CanvasEngine>,
    walk: RandomWalk,
    accumulator: PathAccumulator,
    last_position: Position,
    contexts: DashboardContexts,
    results_reader: ContextReader<Vec<Detection>>,
    highlights_reader: ContextReader<HighlightSet>,
    channel: Option<DurableChannel<FileStore>>,
    poller: Option<ChannelPoller<FileStore>>,
    preference: Option<PreferenceSlot<FileStore>>,
    mode: Option<ApplicationMode>,
    backend: Option<Arc<HttpDetectionQuery>>,
    search: SearchForm,
    search_error: Option<String>,
    searching: bool,
    results_page: usize,
    metrics: Arc<MetricsRecorder>,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    Poll,
    Camera(CameraAdjustment),
    TogglePanel,
    SearchFieldChanged(SearchField, String),
    SubmitSearch,
    SearchCompleted(DashboardResult<Vec<Detection>>),
    ResultsPage(usize),
    ExportResults,
    SelectMode(ApplicationMode),
    ChangeApplication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchField {
    TireId(usize),
    Model,
    Plate,
}

impl Dashboard {
    fn boot() -> (Self, Task<Message>) {
        (Self::new(VisualizerConfig::from_env()), Task::none())
    }

    fn new(config: VisualizerConfig) -> Self {
        let mut history = Vec::new();
        for warning in &config.warnings {
            log::warn!("{warning}");
            history.push(warning.clone());
        }

        let nodes = Arc::new(load_deployment(&config, &mut history));
        let metrics = Arc::new(MetricsRecorder::new());
        let contexts = DashboardContexts::new();
        let results_reader = contexts.results.subscribe();
        let highlights_reader = contexts.highlights.subscribe();

        let (channel, poller, preference) = match FileStore::open(&config.store_dir) {
            Ok(store) => {
                let store = Arc::new(store);
                let channel = DurableChannel::new(Arc::clone(&store));
                let poller = ChannelPoller::new(
                    channel.clone(),
                    contexts.clone(),
                    Arc::clone(&nodes),
                    Arc::clone(&metrics),
                );
                (Some(channel), Some(poller), Some(PreferenceSlot::new(store)))
            }
            Err(err) => {
                log::warn!("profile store unavailable: {err}");
                history.push(format!("Profile store unavailable: {err}"));
                (None, None, None)
            }
        };
        let mode = preference.as_ref().and_then(PreferenceSlot::load);

        let backend = match HttpDetectionQuery::new(&config.api_url) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(err) => {
                log::warn!("{err}");
                history.push(err.to_string());
                None
            }
        };

        let availability = MapAvailability::from_config(&config.provider);
        let mut surface = MapSurface::new(Arc::clone(&nodes), config.map.clone());
        if availability.is_ready() {
            surface.on_camera_change(CameraChange::with_engine(CanvasEngine::default()));
        }

        let last_position = Position::at(config.tracking.initial, now_millis());
        let accumulator = PathAccumulator::seeded(config.tracking.path_capacity, last_position)
            .unwrap_or_else(|err| {
                log::warn!("{err}; keeping the last {DEFAULT_PATH_CAPACITY} positions");
                history.push(format!("Path capacity reset to {DEFAULT_PATH_CAPACITY}: {err}"));
                let mut fallback = PathAccumulator::default();
                fallback.push(last_position);
                fallback
            });
        surface.on_tracking_update(&TrackingUpdate {
            position: last_position,
            path: accumulator.path().clone(),
        });

        Dashboard {
            walk: RandomWalk::from_config(&config.tracking),
            accumulator,
            last_position,
            availability,
            surface,
            contexts,
            results_reader,
            highlights_reader,
            channel,
            poller,
            preference,
            mode,
            backend,
            search: SearchForm::default(),
            search_error: None,
            searching: false,
            results_page: 0,
            metrics,
            status: tracking_status(&last_position),
            history,
            config,
        }
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                state.advance_position();
                Task::none()
            }
            Message::Poll => {
                match state.poller.as_mut().map(ChannelPoller::poll_once) {
                    Some(PollOutcome::Applied(count)) => {
                        state.push_history(format!("Stored results picked up: {count}"));
                    }
                    // Already logged by the poller; the current results stay up.
                    Some(PollOutcome::Retained(_)) | Some(PollOutcome::Unchanged) | None => {}
                }
                state.apply_context_updates();
                Task::none()
            }
            Message::Camera(adjustment) => {
                state.surface.adjust_camera(adjustment);
                Task::none()
            }
            Message::TogglePanel => {
                state.surface.panel_mut().toggle_collapsed();
                Task::none()
            }
            Message::SearchFieldChanged(field, value) => {
                state.search.update_field(field, value);
                state.search_error = None;
                Task::none()
            }
            Message::SubmitSearch => {
                let plan = match state.search.form().plan() {
                    Ok(plan) => plan,
                    Err(err) => {
                        state.search_error = Some(err.to_string());
                        return Task::none();
                    }
                };
                let Some(backend) = state.backend.clone() else {
                    state.search_error = Some("No detection backend configured.".into());
                    return Task::none();
                };
                state.searching = true;
                state.search_error = None;
                Task::perform(run_search(backend, plan), Message::SearchCompleted)
            }
            Message::SearchCompleted(Ok(detections)) => {
                state.searching = false;
                state.metrics.record_search(true);
                state.publish(detections);
                Task::none()
            }
            Message::SearchCompleted(Err(err)) => {
                state.searching = false;
                state.metrics.record_search(false);
                log::warn!("search failed: {err}");
                state.search_error = Some(err.to_string());
                Task::none()
            }
            Message::ResultsPage(page) => {
                let last = export::page_count(state.surface.results().len()) - 1;
                state.results_page = page.min(last);
                Task::none()
            }
            Message::ExportResults => {
                match export::write_results(&state.config.store_dir, state.surface.results()) {
                    Ok(path) => {
                        state.push_history(format!("Results exported to {}", path.display()));
                    }
                    Err(err) => {
                        log::warn!("export failed: {err}");
                        state.status = format!("Export failed: {err}");
                    }
                }
                Task::none()
            }
            Message::SelectMode(mode) => {
                match &state.preference {
                    Some(preference) => match preference.select(mode) {
                        Ok(()) => state.mode = Some(mode),
                        Err(err) => state.status = err.to_string(),
                    },
                    None if mode.is_available() => state.mode = Some(mode),
                    None => state.status = format!("{} is not available yet", mode.title()),
                }
                Task::none()
            }
            Message::ChangeApplication => {
                if let Some(preference) = &state.preference {
                    if let Err(err) = preference.clear() {
                        state.status = err.to_string();
                    }
                }
                state.mode = None;
                Task::none()
            }
        }
    }

    fn advance_position(&mut self) {
        let position = self.walk.step(&self.last_position, now_millis());
        self.last_position = position;
        let path = self.accumulator.push(position).clone();
        self.surface
            .on_tracking_update(&TrackingUpdate { position, path });
        self.metrics.record_emitted();
        self.status = tracking_status(&position);
    }

    fn publish(&mut self, detections: Vec<Detection>) {
        let count = detections.len();
        match &self.channel {
            Some(channel) => {
                if let Err(err) = publish_search_results(
                    detections,
                    &self.contexts,
                    channel,
                    self.surface.nodes(),
                ) {
                    log::warn!("search results not stored: {err}");
                    self.status = format!("Results shown but not stored: {err}");
                }
            }
            None => {
                let highlights = HighlightSet::from_detections(&detections, self.surface.nodes());
                self.contexts.results.set(detections);
                self.contexts.highlights.set(highlights);
            }
        }
        self.push_history(format!("Search returned {count} detections"));
        self.apply_context_updates();
    }

    fn apply_context_updates(&mut self) {
        if let Some(results) = self.results_reader.take_update() {
            self.results_page = 0;
            self.surface.on_results(results);
        }
        if let Some(highlights) = self.highlights_reader.take_update() {
            self.surface.on_highlights(highlights);
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let content = match state.mode {
            None => state.mode_selection(),
            Some(_) => row![state.sidebar(), state.map_column()]
                .spacing(20)
                .align_y(Alignment::Start)
                .into(),
        };
        Container::new(content)
            .padding(20)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn mode_selection(&self) -> Element<'_, Message> {
        let choices = ApplicationMode::ALL
            .into_iter()
            .fold(Column::new().spacing(8), |col, mode| {
                let label = if mode.is_available() {
                    mode.title().to_string()
                } else {
                    format!("{} (coming soon)", mode.title())
                };
                col.push(
                    button(text(label))
                        .on_press_maybe(mode.is_available().then_some(Message::SelectMode(mode)))
                        .padding(10)
                        .width(Length::Fixed(280.0)),
                )
            });
        column![
            text("Select Application").size(26),
            choices,
            text(&self.status).size(14),
        ]
        .spacing(12)
        .into()
    }

    fn sidebar(&self) -> Element<'_, Message> {
        let mut form = Column::new().spacing(6).push(text("Vehicle Search").size(24));
        for (slot, value) in self.search.tire_ids.iter().enumerate() {
            form = form.push(
                text_input(&format!("Tire ID {}", slot + 1), value)
                    .on_input(move |value| {
                        Message::SearchFieldChanged(SearchField::TireId(slot), value)
                    })
                    .padding(6),
            );
        }
        form = form
            .push(
                text_input("Sensor model", &self.search.sensor_model)
                    .on_input(|value| Message::SearchFieldChanged(SearchField::Model, value))
                    .padding(6),
            )
            .push(
                text_input("License plate", &self.search.license_plate)
                    .on_input(|value| Message::SearchFieldChanged(SearchField::Plate, value))
                    .padding(6),
            )
            .push(
                button(if self.searching { "Searching..." } else { "Search" })
                    .on_press_maybe((!self.searching).then_some(Message::SubmitSearch))
                    .padding(10),
            );
        if let Some(error) = &self.search_error {
            form = form.push(text(error).size(14).color(iced::Color::from_rgb(1.0, 0.4, 0.4)));
        }

        let all_results = self.surface.results();
        let pages = export::page_count(all_results.len());
        let results = if all_results.is_empty() {
            Column::new().push(text("No search results").size(12))
        } else {
            export::page_slice(all_results, self.results_page)
                .iter()
                .fold(Column::new().spacing(4), |col, detection| {
                    col.push(
                        text(format!(
                            "{} | {} | {} | {}",
                            detection.timestamp,
                            detection.tpms_id,
                            detection.car_model,
                            detection.location
                        ))
                        .size(12),
                    )
                })
        };
        let page = self.results_page.min(pages - 1);
        let pager = row![
            button("Previous")
                .on_press_maybe((page > 0).then(|| Message::ResultsPage(page - 1)))
                .padding(4),
            text(format!("Page {} of {pages}", page + 1)).size(12),
            button("Next")
                .on_press_maybe((page + 1 < pages).then(|| Message::ResultsPage(page + 1)))
                .padding(4),
            button("Export CSV")
                .on_press_maybe((!all_results.is_empty()).then_some(Message::ExportResults))
                .padding(4),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let unplaced = self
            .surface
            .overlays()
            .unplaced()
            .iter()
            .fold(Column::new().spacing(4), |col, entry| {
                col.push(text(entry.label()).size(12))
            });

        let history = self
            .history
            .iter()
            .rev()
            .fold(Column::new().spacing(4), |col, entry| {
                col.push(text(entry.clone()).size(12))
            });

        column![
            form,
            text(format!("Results ({})", all_results.len())).size(16),
            Container::new(scrollable(results).height(Length::Fixed(160.0))).padding(6),
            pager,
            text("Not on the map").size(16),
            Container::new(scrollable(unplaced).height(Length::Fixed(80.0))).padding(6),
            text("Activity log").size(16),
            Container::new(scrollable(history).height(Length::Fixed(90.0))).padding(6),
            button("Change Application")
                .on_press(Message::ChangeApplication)
                .padding(8),
        ]
        .spacing(10)
        .width(Length::Fixed(360.0))
        .into()
    }

    fn map_column(&self) -> Element<'_, Message> {
        let map: Element<'_, Message> = match (&self.availability, self.surface.engine()) {
            (MapAvailability::Ready, Some(engine)) => Canvas::new(MapCanvas {
                scene: engine.scene(),
            })
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
            (MapAvailability::Unavailable(reason), _) => column![
                text("Map unavailable").size(24),
                text(reason).size(14),
            ]
            .spacing(8)
            .into(),
            (MapAvailability::Ready, None) => text("Loading map...").into(),
        };

        column![
            text(&self.status).size(14),
            Container::new(map).width(Length::Fill).height(Length::Fill),
            self.camera_panel(),
        ]
        .spacing(10)
        .width(Length::Fill)
        .into()
    }

    fn camera_panel(&self) -> Element<'_, Message> {
        let camera = self.surface.camera();
        let panel = self.surface.panel();
        let header = row![
            text("Camera").size(18),
            button(if panel.is_collapsed() { "Show" } else { "Hide" })
                .on_press(Message::TogglePanel)
                .padding(4),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let rows = panel.rows(camera).into_iter().fold(
            Column::new().spacing(6),
            |col, control| {
                col.push(
                    row![
                        text(format!(
                            "{} {:.0}{}",
                            control.label, control.value, control.unit
                        ))
                        .width(Length::Fixed(110.0)),
                        slider(control.min..=control.max, control.value, move |value| {
                            Message::Camera(control.adjustment(value))
                        })
                        .step(control.step),
                    ]
                    .spacing(10)
                    .align_y(Alignment::Center),
                )
            },
        );

        let mut body = column![header].spacing(8);
        if !panel.is_collapsed() {
            let follow = if camera.follow_target {
                "Following target"
            } else {
                "Follow target"
            };
            body = body.push(rows).push(
                button(follow)
                    .on_press(Message::Camera(CameraAdjustment::ToggleFollow))
                    .padding(6),
            );
        }
        Container::new(body).padding(8).width(Length::Fill).into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

fn tracking_status(position: &Position) -> String {
    format!(
        "Tracking {:.5}, {:.5}",
        position.latitude, position.longitude
    )
}

fn load_deployment(config: &VisualizerConfig, history: &mut Vec<String>) -> Vec<StaticNode> {
    let Some(path) = &config.nodes_file else {
        return lantern_nodes();
    };
    match load_nodes(path) {
        Ok(nodes) => nodes,
        Err(err) => {
            log::warn!("could not load nodes from {}: {err}", path.display());
            history.push(format!("Node file ignored: {err}"));
            lantern_nodes()
        }
    }
}

async fn run_search(
    backend: Arc<HttpDetectionQuery>,
    plan: SearchPlan,
) -> Result<Vec<Detection>, DashboardError> {
    execute_plan(&plan, backend.as_ref()).await
}

/// Raw text of the vehicle search form.
#[derive(Debug, Clone, Default)]
struct SearchForm {
    tire_ids: [String; MAX_TIRE_IDS],
    sensor_model: String,
    license_plate: String,
}

impl SearchForm {
    fn update_field(&mut self, field: SearchField, value: String) {
        match field {
            SearchField::TireId(slot) => {
                if let Some(id) = self.tire_ids.get_mut(slot) {
                    *id = value;
                }
            }
            SearchField::Model => self.sensor_model = value,
            SearchField::Plate => self.license_plate = value,
        }
    }

    fn form(&self) -> VehicleSearch {
        VehicleSearch {
            tire_ids: self.tire_ids.clone(),
            sensor_model: self.sensor_model.clone(),
            license_plate: self.license_plate.clone(),
        }
    }
}
