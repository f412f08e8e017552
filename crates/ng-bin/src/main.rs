//! nvgrid entrypoint.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use core_config::{Config, load_from};
use core_engine::{EditorEngine, MemoryEngine, WindowPlacement};
use core_events::{
    EVENT_CHANNEL_CAP, Event, EventSourceRegistry, InputEvent, TickEventSource, TransportSink,
};
use core_minimap::{Minimap, MinimapOptions, SyncStart};
use core_protocol::RawBatch;
use core_render::{
    Compositor, CompositorOptions, FixedMetrics, PaintMetricsSnapshot, RecordingBackend,
};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const SHUTDOWN_WAIT: Duration = Duration::from_millis(200);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "nvgrid", version, about = "Neovim GUI grid renderer")]
struct Args {
    /// Configuration file path (overrides discovery of `nvgrid.toml`).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay recorded redraw batches (one JSON array per line) through the compositor.
    Replay {
        dump: PathBuf,
        /// Second dump fed to the minimap; enables the minimap.
        #[arg(long)]
        minimap: Option<PathBuf>,
        /// Window placement `grid:row:col:rows:cols[:float]`; repeatable.
        #[arg(long = "window", value_parser = parse_window)]
        windows: Vec<WindowPlacement>,
        /// Window size `WIDTHxHEIGHT` in pixels, sent as a resize before replay.
        #[arg(long, value_parser = parse_size)]
        size: Option<(f32, f32)>,
    },
}

fn parse_window(raw: &str) -> Result<WindowPlacement, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    if !(5..=6).contains(&parts.len()) {
        return Err(format!("expected grid:row:col:rows:cols[:float], got `{raw}`"));
    }
    let num = |i: usize| -> Result<usize, String> {
        parts[i]
            .parse::<usize>()
            .map_err(|e| format!("field {} of `{raw}`: {e}", i + 1))
    };
    let grid = num(0)? as u64;
    let placement = WindowPlacement::new(grid, num(1)?, num(2)?, num(3)?, num(4)?);
    match parts.get(5) {
        None => Ok(placement),
        Some(&"float") => Ok(placement.floating()),
        Some(other) => Err(format!("unknown window flag `{other}`")),
    }
}

fn parse_size(raw: &str) -> Result<(f32, f32), String> {
    let (w, h) = raw
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{raw}`"))?;
    let w = w.parse::<f32>().map_err(|e| format!("width: {e}"))?;
    let h = h.parse::<f32>().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, args: &Args) -> Result<Config> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let mut config = load_from(args.config.clone())?;
        let clamped = config.apply_limits();
        info!(
            target: "runtime",
            config_override = args.config.is_some(),
            config_loaded = config.raw.is_some(),
            clamped,
            "bootstrap_complete"
        );
        Ok(config)
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("nvgrid.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "nvgrid.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

// -------------------------------------------------------------------------------------------------
// Replay transport
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayTarget {
    Primary,
    Minimap,
}

impl ReplayTarget {
    fn as_str(&self) -> &'static str {
        match self {
            ReplayTarget::Primary => "primary",
            ReplayTarget::Minimap => "minimap",
        }
    }
}

/// Read one batch per line and enqueue it. Lines that are not valid batches
/// are logged and skipped. Returns the number of batches sent.
fn replay_lines<R: BufRead>(reader: R, sink: &TransportSink, target: ReplayTarget) -> Result<usize> {
    let mut sent = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("read replay dump")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(err) => {
                warn!(target: "runtime", source = target.as_str(), line = idx + 1, error = %err, "replay_line_invalid");
                continue;
            }
        };
        let batch = match RawBatch::from_value(value) {
            Ok(b) => b,
            Err(err) => {
                warn!(target: "runtime", source = target.as_str(), line = idx + 1, error = %err, "replay_batch_invalid");
                continue;
            }
        };
        match target {
            ReplayTarget::Primary => sink.send_redraw(batch)?,
            ReplayTarget::Minimap => sink.send_minimap(batch)?,
        }
        sent += 1;
    }
    Ok(sent)
}

/// Spawn a transport thread replaying `path`. The last transport to finish
/// enqueues `Event::Shutdown`.
fn spawn_replay_transport(
    path: &Path,
    sink: TransportSink,
    target: ReplayTarget,
    remaining: Arc<AtomicUsize>,
) -> Result<std::thread::JoinHandle<Result<usize>>> {
    let file = File::open(path).with_context(|| format!("open replay dump {}", path.display()))?;
    let handle = std::thread::Builder::new()
        .name(format!("replay-{}", target.as_str()))
        .spawn(move || {
            let result = replay_lines(BufReader::new(file), &sink, target);
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _ = sink.send(Event::Shutdown);
            }
            result
        })
        .context("spawn replay transport")?;
    Ok(handle)
}

// -------------------------------------------------------------------------------------------------
// Runtime
// -------------------------------------------------------------------------------------------------

struct ReplayPlan {
    dump: PathBuf,
    minimap: Option<PathBuf>,
    windows: Vec<WindowPlacement>,
    size: Option<(f32, f32)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReplayStats {
    primary_batches: u64,
    minimap_batches: u64,
    backend_commands: u64,
    minimap_paints: u64,
    ticks: u64,
    inputs: u64,
    syncs_started: u64,
}

enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    ReplayComplete,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::ReplayComplete => "replay_complete",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

fn compositor_options(config: &Config) -> CompositorOptions {
    let f = &config.file;
    CompositorOptions {
        draw_borders: f.render.draw_borders,
        border_fade_px: f.render.border_fade_px,
        placement_timeout: config.placement_timeout(),
        glyph_cache_capacity: f.render.glyph_cache_capacity,
        cursor_animate: f.cursor.animate,
        cursor_duration: config.cursor_duration(),
    }
}

fn font_metrics(config: &Config) -> FixedMetrics {
    let font = &config.file.font;
    FixedMetrics::new(font.cell_width, font.line_height, font.ascent)
}

struct ReplayRuntime {
    compositor: Compositor<RecordingBackend>,
    minimap: Option<Minimap<RecordingBackend>>,
    primary: Arc<dyn EditorEngine>,
    stats: ReplayStats,
    last_tick: Instant,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
    transports: Vec<(ReplayTarget, std::thread::JoinHandle<Result<usize>>)>,
}

impl ReplayRuntime {
    /// Build the compositor (and minimap when asked for), then start the
    /// transports and the frame tick. Must run inside the tokio runtime.
    fn start(config: &Config, plan: ReplayPlan) -> Result<Self> {
        let engine = Arc::new(MemoryEngine::named("replay"));
        engine.set_placements(plan.windows);
        let primary: Arc<dyn EditorEngine> = engine;
        let font = font_metrics(config);
        let compositor = Compositor::new(
            RecordingBackend::new(),
            Box::new(font),
            Arc::clone(&primary),
            compositor_options(config),
        );

        let minimap_enabled = config.file.minimap.enabled || plan.minimap.is_some();
        let minimap = minimap_enabled.then(|| {
            let secondary: Arc<dyn EditorEngine> = Arc::new(MemoryEngine::named("minimap"));
            Minimap::new(
                RecordingBackend::new(),
                font.scaled(config.file.minimap.scale),
                secondary,
                MinimapOptions {
                    enabled: true,
                    sync_timeout: config.minimap_sync_timeout(),
                    glyph_cache_capacity: config.file.render.glyph_cache_capacity,
                },
            )
        });

        let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
        if let Some((width_px, height_px)) = plan.size {
            tx.try_send(Event::Input(InputEvent::Resize { width_px, height_px }))
                .context("queue initial resize")?;
        }

        let mut feeds = vec![(ReplayTarget::Primary, plan.dump)];
        if let Some(path) = plan.minimap {
            feeds.push((ReplayTarget::Minimap, path));
        }
        let remaining = Arc::new(AtomicUsize::new(feeds.len()));
        let mut transports = Vec::with_capacity(feeds.len());
        for (target, path) in feeds {
            let sink = TransportSink::new(tx.clone());
            let handle = spawn_replay_transport(&path, sink, target, Arc::clone(&remaining))?;
            transports.push((target, handle));
        }

        let mut registry = EventSourceRegistry::new();
        registry.register(TickEventSource::new(FRAME_INTERVAL));
        let source_handles = registry.spawn_all(&tx);

        Ok(Self {
            compositor,
            minimap,
            primary,
            stats: ReplayStats::default(),
            last_tick: Instant::now(),
            rx,
            tx: Some(tx),
            source_handles,
            transports,
        })
    }

    async fn run(&mut self) -> Result<ReplayStats> {
        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            let control = match event {
                Event::Redraw(batch) => self.handle_redraw(&batch),
                Event::MinimapRedraw(batch) => self.handle_minimap_redraw(&batch),
                Event::Input(input) => self.handle_input_event(input),
                Event::Tick => self.handle_tick(),
                Event::Shutdown => LoopControl::Break {
                    reason: ShutdownReason::ReplayComplete,
                },
            };
            if let LoopControl::Break { reason } = control {
                shutdown_reason = reason;
                break;
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(self.stats)
    }

    fn drain_backend(&mut self) {
        let backend = self.compositor.backend_mut();
        self.stats.backend_commands += backend.commands().len() as u64;
        backend.clear();
    }

    fn handle_redraw(&mut self, batch: &RawBatch) -> LoopControl {
        self.stats.primary_batches += 1;
        let report = self.compositor.apply_batch(batch);
        self.drain_backend();
        let Some(minimap) = self.minimap.as_mut() else {
            return LoopControl::Continue;
        };
        let grids = self.compositor.grids();
        let focus = grids.cursor_grid();
        if let (Some(viewport), Some(grid)) = (grids.viewport(focus), grids.grid(focus)) {
            minimap.on_primary_viewport(viewport, grid.rows());
        }
        if report.cycle.is_some() && minimap.request_sync(&self.primary) == SyncStart::Started {
            self.stats.syncs_started += 1;
        }
        if minimap.paint().is_some() {
            self.stats.minimap_paints += 1;
        }
        minimap.backend_mut().clear();
        LoopControl::Continue
    }

    fn handle_minimap_redraw(&mut self, batch: &RawBatch) -> LoopControl {
        self.stats.minimap_batches += 1;
        let Some(minimap) = self.minimap.as_mut() else {
            trace!(target: "minimap", "minimap_batch_without_minimap");
            return LoopControl::Continue;
        };
        if minimap.apply_batch(batch).is_some() {
            self.stats.minimap_paints += 1;
        }
        minimap.backend_mut().clear();
        LoopControl::Continue
    }

    fn handle_input_event(&mut self, input: InputEvent) -> LoopControl {
        self.stats.inputs += 1;
        match input {
            InputEvent::Key { repeat } => self.compositor.set_key_repeat(repeat),
            InputEvent::Scroll { grid, phase } => {
                self.compositor.set_scroll_active(grid, phase.is_active())
            }
            InputEvent::Resize {
                width_px,
                height_px,
            } => {
                if !self.compositor.update_size(width_px, height_px) {
                    trace!(target: "runtime", width_px, height_px, "resize_unchanged");
                }
            }
            InputEvent::FocusGained => self.compositor.set_focus(true),
            InputEvent::FocusLost => self.compositor.set_focus(false),
        }
        self.drain_backend();
        LoopControl::Continue
    }

    fn handle_tick(&mut self) -> LoopControl {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.stats.ticks += 1;
        self.compositor.tick(dt);
        self.drain_backend();
        LoopControl::Continue
    }

    fn metrics(&self) -> PaintMetricsSnapshot {
        self.compositor.metrics().snapshot()
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(SHUTDOWN_WAIT, handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        for (target, handle) in self.transports.drain(..) {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            match joined {
                Ok(Ok(Ok(sent))) => info!(
                    target: "runtime.shutdown",
                    source = target.as_str(),
                    batches = sent,
                    "transport_joined"
                ),
                Ok(Ok(Err(err))) => warn!(
                    target: "runtime.shutdown",
                    source = target.as_str(),
                    error = %err,
                    "transport_failed"
                ),
                Ok(Err(_)) | Err(_) => error!(
                    target: "runtime.shutdown",
                    source = target.as_str(),
                    "transport_panicked"
                ),
            }
        }

        log_shutdown_stage(reason, "complete");
    }
}

fn print_summary(stats: &ReplayStats, m: &PaintMetricsSnapshot) {
    println!("batches        primary={} minimap={}", stats.primary_batches, stats.minimap_batches);
    println!("events         applied={} decode_errors={} unknown={}", m.events_applied, m.decode_errors, m.unknown_events);
    println!("paint cycles   painted={} skipped={} grids={}", m.paint_cycles, m.skipped_cycles, m.grids_painted);
    println!(
        "backend calls  total={} fills={} text_runs={} glyph_blits={} rasterized={}",
        stats.backend_commands, m.fill_calls, m.text_runs, m.glyph_blits, m.glyph_rasterized
    );
    println!("borders        drawn={}", m.border_draws);
    println!("placements     refreshes={} timeouts={}", m.placement_refreshes, m.placement_timeouts);
    println!("cursor         animations={} ticks={}", m.cursor_animations, stats.ticks);
    println!("minimap        paints={} syncs={}", stats.minimap_paints, stats.syncs_started);
    println!("last paint     {} ns", m.last_paint_ns);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let config = startup.run(&args)?;

    let plan = match args.command {
        Command::Replay {
            dump,
            minimap,
            windows,
            size,
        } => {
            if !dump.exists() {
                bail!("replay dump {} does not exist", dump.display());
            }
            ReplayPlan {
                dump,
                minimap,
                windows,
                size,
            }
        }
    };

    let mut runtime = ReplayRuntime::start(&config, plan)?;
    let stats = runtime.run().await?;
    print_summary(&stats, &runtime.metrics());
    info!(target: "runtime", "exit");
    Ok(())
}
