//! Demo exercising asset creation, use and eviction from several threads

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use lazy_assets::prelude::*;
use rustc_hash::FxHashMap;

const LOADER_THREADS: usize = 4;
const CYCLES: usize = 40;
const CYCLE_INTERVAL: Duration = Duration::from_millis(25);

/// Pretend to read a text file
fn fake_load(path: &AssetPath) -> Result<String, AssetError> {
    if path.as_str().ends_with(".missing") {
        return Err(AssetError::NotFound(path.to_string()));
    }
    Ok(format!("contents of {path}"))
}

fn load_config() -> Result<CacheConfig, String> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(CacheConfig::default().with_baseline(16));
    };
    let config = CacheConfig::load_ron(&path).map_err(|e| e.to_string())?;
    log::info!("Loaded cache config from {path}");
    Ok(config)
}

/// Repeatedly request a rotating subset of files, keeping a few hot
fn loader(worker: usize, table: &ResourceTable<AssetPath, String>, running: &AtomicBool) {
    // Derived handles live as long as the worker; only their elements come and go
    let mut sizes: FxHashMap<AssetPath, Asset<usize>> = FxHashMap::default();
    let mut round = 0_usize;
    while running.load(Ordering::Relaxed) {
        let path = if round % 4 == 0 {
            AssetPath::new(format!("shared/common_{}.txt", worker % 2))
        } else {
            AssetPath::new(format!("worker_{worker}/file_{}.txt", round % 12))
        };
        let size = sizes.entry(path).or_insert_with_key(|path| {
            table
                .load(path.clone(), fake_load)
                .derive(|s: &String| s.len())
        });

        match size.get() {
            Ok(len) => log::trace!("Worker {worker} read {} ({len} bytes)", size.describe()),
            Err(e) => log::warn!("Worker {worker}: {e}"),
        }

        round += 1;
        thread::sleep(Duration::from_millis(5));
    }
}

fn main() {
    env_logger::init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return;
        }
    };
    log::info!("Starting with {config:?}");

    let registry = match Registry::with_config(config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Config error: {e}");
            return;
        }
    };
    let table = Arc::new(ResourceTable::new(&registry));
    let running = Arc::new(AtomicBool::new(true));

    let frame = Asset::new(&registry, || Ok(vec![0_u8; 1024]));
    let missing = table.load(AssetPath::new("broken.missing"), fake_load);

    let workers: Vec<_> = (0..LOADER_THREADS)
        .map(|worker| {
            let table = Arc::clone(&table);
            let running = Arc::clone(&running);
            thread::spawn(move || loader(worker, &table, &running))
        })
        .collect();

    let mut stats = CycleStats::new();
    for cycle in 0..CYCLES {
        if let Err(e) = frame.get() {
            log::error!("Frame buffer unavailable: {e}");
        }
        if cycle == CYCLES / 2 {
            if let Err(e) = missing.get() {
                log::warn!("Using built-in text instead: {e}");
            }
        }

        stats.record(registry.cycle());
        if cycle % 10 == 9 {
            log::info!("{}", stats.format_stats());
        }
        thread::sleep(CYCLE_INTERVAL);
    }

    running.store(false, Ordering::Relaxed);
    for worker in workers {
        if worker.join().is_err() {
            log::error!("Loader thread panicked");
        }
    }

    registry.for_each_active(|asset| log::debug!("Still loaded: {}", asset.describe()));
    let dropped = registry.drop_all();
    log::info!(
        "Shut down after {} cycles: {} evicted, {dropped} dropped at exit, {} keyed assets",
        stats.total_cycles(),
        stats.total_evicted(),
        table.len()
    );
}
