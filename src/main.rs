//! STRATA - Load Driver
//! Hammers an in-process store with concurrent random puts and gets, then
//! prints level occupancy and engine metrics.
//!
//! Usage: `strata [threads] [ops_per_thread]`

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::Rng;

use strata::{Config, Store};

fn parse_arg(args: &[String], idx: usize, default: usize) -> usize {
    match args.get(idx) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("[ERROR] expected a number, got '{}'", raw);
            std::process::exit(2);
        }),
        None => default,
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let threads = parse_arg(&args, 1, 16);
    let ops_per_thread = parse_arg(&args, 2, 10_000);

    let store = match Store::open(Config::default()) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("[ERROR] Failed to open store: {}", err);
            std::process::exit(1);
        }
    };

    store.put("name", "strata");
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for i in 0..ops_per_thread {
                    let key = rng.gen::<u64>().to_string();
                    if i % 2 == 0 {
                        store.put(key.clone(), key);
                    } else {
                        store.get(&key);
                    }
                }
                log::debug!("worker {} done", worker);
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("[ERROR] worker thread panicked");
        }
    }

    let elapsed = start.elapsed();
    match store.get("name").into_value() {
        Some(value) => println!("  name -> {}", value),
        None => println!("  name -> (missing)"),
    }

    if let Err(err) = store.close() {
        eprintln!("[ERROR] {}", err);
    }

    println!(
        "  {} threads x {} ops in {:.3}s",
        threads,
        ops_per_thread,
        elapsed.as_secs_f64()
    );
    println!("  Levels (0..N): {:?}", store.level_sizes());
    println!("{}", store.metrics().report());
}
