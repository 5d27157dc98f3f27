use anyhow::{Context, Result};
use api::{LogLevel, ModuleLogger, TrackingStatus, UnifiedTrackingData};
use common::Config;
use log::{debug, error, info, trace, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vrft_d::modules::{load_installed, LoadedModule, LocalModuleStore};
use vrft_d::operator::{self, OperatorCommand, OperatorState};
use vrft_d::osc::vrchat::VRChatOsc;
use vrft_d::runtime::TrackingRuntime;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(100);
const WARN_INTERVAL: Duration = Duration::from_secs(5);

extern "C" fn module_log_callback(level: LogLevel, target: *const i8, message: *const i8) {
    // SAFETY: ModuleLogger always passes valid NUL-terminated strings.
    let (target, message) = unsafe {
        (
            std::ffi::CStr::from_ptr(target).to_string_lossy(),
            std::ffi::CStr::from_ptr(message).to_string_lossy(),
        )
    };
    let target = format!("vrft_d::plugins::{}", target);
    match level {
        LogLevel::Error => error!(target: target.as_str(), "{}", message),
        LogLevel::Warn => warn!(target: target.as_str(), "{}", message),
        LogLevel::Info => info!(target: target.as_str(), "{}", message),
        LogLevel::Debug => debug!(target: target.as_str(), "{}", message),
        LogLevel::Trace => trace!(target: target.as_str(), "{}", message),
    }
}

fn load_config(path: &Path) -> Config {
    Config::load_or_create(path).unwrap_or_else(|e| {
        error!("Failed to load config: {:#}. Using defaults.", e);
        Config::default()
    })
}

fn initialize_modules(modules: &mut [LoadedModule]) {
    for loaded in modules.iter_mut() {
        let logger = ModuleLogger::new(module_log_callback, loaded.name.clone());
        match loaded.module.initialize(logger) {
            Ok(()) => info!("Initialized module: {}", loaded.name),
            Err(e) => error!("Failed to initialize module {}: {:#}", loaded.name, e),
        }
    }
}

/// Consumer side: owns the active profile and the namespace, runs one tick
/// per snapshot.
fn run_consumer(
    mut runtime: TrackingRuntime,
    mut osc: VRChatOsc,
    snapshots: Receiver<(UnifiedTrackingData, TrackingStatus)>,
    commands: Receiver<OperatorCommand>,
    running: Arc<AtomicBool>,
) {
    info!("Consumer thread started");
    runtime.reset(&osc);

    let mut last_frame = Instant::now();
    let mut last_error_log: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let (mut data, status) = match snapshots.recv_timeout(SNAPSHOT_TIMEOUT) {
            Ok(snapshot) => snapshot,
            Err(RecvTimeoutError::Timeout) => {
                (UnifiedTrackingData::default(), TrackingStatus::INACTIVE)
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        for command in commands.try_iter() {
            command.apply(runtime.mutator_mut());
        }

        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        if let Err(e) = runtime.tick(&mut data, status, dt, &mut osc) {
            if last_error_log.map_or(true, |t| t.elapsed() >= WARN_INTERVAL) {
                last_error_log = Some(now);
                error!("Failed to send parameters: {:#}", e);
            }
        }
    }

    if let Err(e) = runtime.zero(&mut osc) {
        warn!("Failed to zero parameters on exit: {:#}", e);
    }
    runtime.shutdown();
    osc.shutdown();
    info!("Consumer thread stopped");
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!("Starting...");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let config = load_config(Path::new("config.json"));
    debug!("Loaded config: {:?}", config);

    let store = LocalModuleStore::from_config(&config.module);
    store.ensure_dirs()?;
    let mut modules = load_installed(&store)?;
    if modules.is_empty() {
        warn!("No modules loaded!");
    } else {
        info!("Loaded {} module(s)", modules.len());
    }
    initialize_modules(&mut modules);

    let mut runtime = TrackingRuntime::new(&config);
    runtime.mutator_mut().initialize(&config);
    runtime.load_calibration();

    let (command_tx, command_rx) = channel::<OperatorCommand>();
    if config.operator.enabled {
        let state = OperatorState::new(command_tx, runtime.mutator().calibration());
        operator::spawn_server(&config.operator, state)?;
    } else {
        drop(command_tx);
    }

    let mut osc = VRChatOsc::new(&config.osc);
    osc.initialize()?;

    let (snapshot_tx, snapshot_rx) = sync_channel::<(UnifiedTrackingData, TrackingStatus)>(1);
    let consumer_running = running.clone();
    let consumer = thread::Builder::new()
        .name("tick".into())
        .spawn(move || run_consumer(runtime, osc, snapshot_rx, command_rx, consumer_running))
        .context("Failed to spawn tick thread")?;

    info!("Entering main loop (producer)...");

    let active = config.module.active.clone();
    let frame_budget = config
        .max_fps
        .filter(|fps| *fps > 0.0)
        .map(|fps| Duration::from_secs_f32(1.0 / fps));
    let mut data = UnifiedTrackingData::default();
    let mut last_frame = Instant::now();
    let mut last_missing_warn: Option<Instant> = None;
    let mut frames: u64 = 0;
    let has_modules = !modules.is_empty();

    while running.load(Ordering::SeqCst) {
        let Some(loaded) = modules.iter_mut().find(|m| m.name == active) else {
            if has_modules && last_missing_warn.map_or(true, |t| t.elapsed() >= WARN_INTERVAL)
            {
                last_missing_warn = Some(Instant::now());
                warn!("Active module '{}' not found among loaded modules!", active);
            }
            thread::sleep(SNAPSHOT_TIMEOUT);
            continue;
        };

        match loaded.module.update(&mut data) {
            Ok(()) => {
                let _ = snapshot_tx.try_send((data.clone(), loaded.module.status()));
                frames += 1;
                if frames % 10_000 == 0 {
                    debug!("Processed {} frames", frames);
                }
            }
            Err(e) => trace!("Module update failed: {:#}", e),
        }

        if let Some(budget) = frame_budget {
            let elapsed = last_frame.elapsed();
            if elapsed < budget {
                thread::sleep(budget - elapsed);
            }
        }
        last_frame = Instant::now();
    }

    info!("Shutting down...");
    drop(snapshot_tx);
    if consumer.join().is_err() {
        error!("Tick thread panicked");
    }
    for loaded in &mut modules {
        loaded.module.unload();
    }
    Ok(())
}
