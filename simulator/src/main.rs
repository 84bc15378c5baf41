use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{bind_address, QueryBridge};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;
use trackcore::bridge::{DurableChannel, DurableStore, FileStore, MemoryStore};
use trackcore::geo::GeoPoint;
use trackcore::map::CameraChange;
use trackcore::telemetry::MetricsRecorder;
use trackcore::tracking::PositionSource;
use trackcore::DashboardSession;
use workflow::config::WorkflowConfig;
use workflow::runner::{LogEngine, Runner, SearchOutcome};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Headless driver for the tracking dashboard")]
struct Args {
    /// Run one offline session (search, durable hand-off, simulated track) and report
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Position updates the offline session waits for
    #[arg(long, default_value_t = 10)]
    ticks: usize,
    /// Serve the mock detection backend until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Run a headless session fed by "lat,lng" lines on stdin
    #[arg(long, default_value_t = false)]
    live: bool,
    /// Comma-separated tire IDs to search for
    #[arg(long)]
    search_ids: Option<String>,
    /// Sensor model to search for
    #[arg(long)]
    search_model: Option<String>,
    /// Profile directory holding the durable slots
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

fn parse_point(line: &str) -> Option<GeoPoint> {
    let (lat, lng) = line.split_once(',')?;
    let point = GeoPoint::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?);
    point.is_finite().then_some(point)
}

fn spawn_stdin_feed() -> mpsc::Receiver<GeoPoint> {
    let (tx, rx) = mpsc::channel(16);
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_point(&line) {
                Some(point) => {
                    if tx.blocking_send(point).is_err() {
                        break;
                    }
                }
                None => log::warn!("ignoring position line '{}'", line.trim()),
            }
        }
    });
    rx
}

async fn run_live<S: DurableStore + 'static>(
    runner: &Runner,
    store: Arc<S>,
) -> anyhow::Result<()> {
    let nodes = runner.nodes()?;
    let mut session: DashboardSession<LogEngine> = DashboardSession::mount(
        &runner.config().session,
        PositionSource::Live(spawn_stdin_feed()),
        nodes,
        store,
        Arc::new(MetricsRecorder::new()),
    )
    .context("mounting live session")?;
    session
        .surface_mut()
        .on_camera_change(CameraChange::with_engine(LogEngine::default()));
    let summary = session
        .run(async {
            if let Err(err) = signal::ctrl_c().await {
                log::warn!("Ctrl+C handler failed: {}", err);
            }
        })
        .await;
    println!(
        "Live session -> updates {}, result sets {}, overlays {}",
        summary.updates_applied, summary.result_sets_applied, summary.overlay_count
    );
    Ok(())
}

async fn publish_only<S: DurableStore>(runner: &Runner, store: Arc<S>) -> anyhow::Result<()> {
    let nodes = runner.nodes()?;
    let backend = runner.detection_store(&nodes)?;
    let outcome = runner
        .search_and_publish(
            &backend,
            &DurableChannel::new(store),
            &nodes,
            &MetricsRecorder::new(),
        )
        .await?;
    println!("Search -> {:?}", outcome);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(
            args.ticks,
            args.search_ids.as_deref(),
            args.search_model.clone(),
            args.store_dir.clone(),
        )
    };
    if args.store_dir.is_some() {
        workflow_config.store_dir = args.store_dir.clone();
    }
    let runner = Runner::new(workflow_config.clone());

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;

    if args.offline {
        let result = runtime.block_on(runner.execute())?;
        let search = match &result.search {
            SearchOutcome::Skipped => "no search".to_string(),
            SearchOutcome::Published {
                results,
                highlighted,
            } => format!("{results} results, {highlighted} highlighted nodes"),
            SearchOutcome::Rejected(reason) | SearchOutcome::Failed(reason) => reason.clone(),
        };
        println!(
            "Offline run -> detections {}, search: {}, updates {}, path {}, overlays {}, unplaced {}",
            result.detections_generated,
            search,
            result.session.updates_applied,
            result.session.path_len,
            result.session.overlay_count,
            result.session.unplaced
        );

        let report = format!(
            "detections={} search={:?} updates={} path={} overlays={} metrics={:?}\n",
            result.detections_generated,
            result.search,
            result.session.updates_applied,
            result.session.path_len,
            result.session.overlay_count,
            result.session.metrics
        );
        let report_path = PathBuf::from("tools/data/offline_session.log");
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_path)?;
        file.write_all(report.as_bytes())?;
    } else if !workflow_config.search.is_empty() {
        match &workflow_config.store_dir {
            Some(dir) => {
                let store = FileStore::open(dir)
                    .with_context(|| format!("opening profile store {}", dir.display()))?;
                runtime.block_on(publish_only(&runner, Arc::new(store)))?;
            }
            None => log::warn!("search results are only kept with --store-dir"),
        }
    }

    if args.live {
        match &workflow_config.store_dir {
            Some(dir) => {
                let store = FileStore::open(dir)
                    .with_context(|| format!("opening profile store {}", dir.display()))?;
                runtime.block_on(run_live(&runner, Arc::new(store)))?;
            }
            None => runtime.block_on(run_live(&runner, Arc::new(MemoryStore::new())))?,
        }
    }

    if args.serve {
        let nodes = runner.nodes()?;
        let backend = runner.detection_store(&nodes)?;
        let _server = QueryBridge::new(backend).serve(bind_address());
        println!("Query bridge running on http://{} (Ctrl+C to stop)...", bind_address());
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_lines_parse() {
        assert_eq!(parse_point("42.36, -71.05"), Some(GeoPoint::new(42.36, -71.05)));
        assert_eq!(parse_point("42.36"), None);
        assert_eq!(parse_point("NaN,1"), None);
    }
}
