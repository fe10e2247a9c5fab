// ==============================================
// ASSET CONCURRENCY TESTS (integration)
// ==============================================
//
// Multi-threaded behavior of keyed lookup, registration, regeneration and
// the eviction cycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use lazy_assets::assets::{Asset, AssetError, AssetPath, Generator, Registry, ResourceTable};
use lazy_assets::core::CacheConfig;

const THREADS: usize = 8;

// ==============================================
// Keyed deduplication
// ==============================================

mod keyed_dedup {
    use super::*;

    #[test]
    fn concurrent_first_requests_share_one_asset() {
        for _ in 0..50 {
            let registry = Registry::new();
            let table: Arc<ResourceTable<AssetPath, usize>> =
                Arc::new(ResourceTable::new(&registry));
            let factory_calls = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let table = Arc::clone(&table);
                    let calls = Arc::clone(&factory_calls);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        table.get_or_create(AssetPath::new("textures/grass.png"), |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Generator::new(|| Ok::<_, AssetError>(1_usize))
                        })
                    })
                })
                .collect();

            let assets: Vec<Asset<usize>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
            assert!(assets.iter().all(|asset| *asset == assets[0]));
            assert_eq!(registry.len(), 1);
        }
    }
}

// ==============================================
// Registration
// ==============================================

mod registration {
    use super::*;

    #[test]
    fn concurrent_creation_registers_every_asset() {
        let registry = Registry::new();
        let barrier = Arc::new(Barrier::new(THREADS));
        let per_thread = 100;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..per_thread)
                        .map(|i| Asset::new(&registry, move || Ok(t * 1000 + i)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let assets: Vec<Asset<usize>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(registry.len(), THREADS * per_thread);
        let mut ids: Vec<u64> = assets.iter().map(Asset::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), THREADS * per_thread);

        drop(assets);
        assert!(registry.is_empty());
    }

    #[test]
    fn cycle_runs_while_assets_come_and_go() {
        let registry = Registry::with_config(CacheConfig::default().with_baseline(4)).unwrap();
        let running = Arc::new(AtomicBool::new(true));

        let churners: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                let running = Arc::clone(&running);
                thread::spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        let asset = Asset::new(&registry, move || Ok(t));
                        let derived = asset.derive(|v: &i32| v + 1);
                        assert_eq!(*derived.get().unwrap(), t + 1);
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let report = registry.cycle();
            assert!(report.active <= report.live);
        }

        running.store(false, Ordering::Relaxed);
        for churner in churners {
            churner.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}

// ==============================================
// Single-flight regeneration
// ==============================================

mod single_flight {
    use super::*;

    #[test]
    fn concurrent_get_generates_once() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let asset = Asset::new(&registry, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Ok(String::from("expensive"))
        });
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let asset = asset.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    asset.get().unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[test]
    fn drop_races_with_get() {
        let registry = Registry::new();
        let generated = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));
        let (g, c) = (Arc::clone(&generated), Arc::clone(&cleaned));
        let asset = Asset::with_cleanup(
            &registry,
            move || {
                g.fetch_add(1, Ordering::SeqCst);
                Ok(vec![0_u8; 64])
            },
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let barrier = Arc::new(Barrier::new(2));

        let getter = {
            let asset = asset.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..1000 {
                    assert_eq!(asset.get().unwrap().len(), 64);
                }
            })
        };
        let dropper = {
            let asset = asset.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..1000 {
                    asset.drop_element();
                }
            })
        };
        getter.join().unwrap();
        dropper.join().unwrap();

        // Every generated element is cleaned up exactly once
        drop(asset);
        assert_eq!(
            generated.load(Ordering::SeqCst),
            cleaned.load(Ordering::SeqCst)
        );
    }
}

// ==============================================
// Maintenance during regeneration
// ==============================================
//
// A loader thread is inside a slow generator (holding the element slot)
// when the scheduler runs the cycle or a force drop. Maintenance must not
// wait for the load, and must not throw away the element it produces.

mod maintenance_during_regeneration {
    use super::*;

    const SLOW: Duration = Duration::from_millis(400);

    /// Asset whose generator reports on `started`, then takes `SLOW`
    fn slow_asset(registry: &Registry, started: mpsc::Sender<()>) -> Asset<u32> {
        Asset::new(registry, move || {
            started.send(()).ok();
            thread::sleep(SLOW);
            Ok(7)
        })
    }

    fn load_in_background(asset: &Asset<u32>) -> thread::JoinHandle<Arc<u32>> {
        let asset = asset.clone();
        thread::spawn(move || asset.get().unwrap())
    }

    #[test]
    fn cycle_does_not_wait_for_or_evict_loading_asset() {
        let registry = Registry::with_config(CacheConfig::default().with_baseline(1)).unwrap();
        let (started, on_start) = mpsc::channel();
        let asset = slow_asset(&registry, started);

        let loader = load_in_background(&asset);
        on_start.recv().unwrap();

        let begin = Instant::now();
        let report = registry.cycle();
        let elapsed = begin.elapsed();
        assert!(elapsed < SLOW / 2, "cycle waited {elapsed:?}");
        assert_eq!(report.evicted, 0);

        assert_eq!(*loader.join().unwrap(), 7);
        assert!(asset.is_loaded());

        // The finished load counts as a use on the next cycle
        let report = registry.cycle();
        assert_eq!(report.evicted, 0);
        assert_eq!(report.active, 1);
        assert_eq!(asset.heat(), 2);
    }

    #[test]
    fn drop_all_skips_loading_asset() {
        let registry = Registry::new();
        let (started, on_start) = mpsc::channel();
        let asset = slow_asset(&registry, started);

        let loader = load_in_background(&asset);
        on_start.recv().unwrap();

        let begin = Instant::now();
        assert_eq!(registry.drop_all(), 0);
        assert!(begin.elapsed() < SLOW / 2);

        loader.join().unwrap();
        assert!(asset.is_loaded());
        assert_eq!(registry.drop_all(), 1);
        assert!(!asset.is_loaded());
    }
}
