//! Models of computation, side by side
//!
//! Runs four units of "work" (each just a wait) four ways: sequentially,
//! one OS thread each, as an async chain, and as concurrent async tasks.
//! Run it a few times to watch the interleavings.
//!
//! Usage: demo [config.json] [work-ms]

use cooprt::future::join_all;
use cooprt::time::sleep;
use cooprt::{Config, Executor};
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_WORK_MS: u64 = 500;

fn do_work(x: u32, work: Duration) {
    println!("starting work {} on thread {:?}", x, thread::current().id());
    thread::sleep(work);
    println!("work done! {} on thread {:?}", x, thread::current().id());
}

async fn do_work_async(x: u32, work: Duration) {
    println!("starting work {} on thread {:?}", x, thread::current().id());
    sleep(work).await;
    println!("work done! {} on thread {:?}", x, thread::current().id());
}

fn sequential(work: Duration) {
    for x in 1..=4 {
        do_work(x, work);
    }
}

fn multi_threaded(work: Duration) {
    let handles: Vec<_> = (1..=4)
        .map(|x| thread::spawn(move || do_work(x, work)))
        .collect();
    for handle in handles {
        let _ = handle.join();
    }
}

async fn async_seq(work: Duration) {
    for x in 1..=4 {
        do_work_async(x, work).await;
    }
}

async fn async_concurrent(work: Duration) {
    join_all((1..=4).map(|x| do_work_async(x, work))).await;
}

fn timed(label: &str, f: impl FnOnce()) {
    println!("── {} ──", label);
    let start = Instant::now();
    f();
    println!("{} took {:?}\n", label, start.elapsed());
}

fn load_config(path: Option<String>) -> Config {
    let Some(path) = path else {
        return Config::default().name("demo");
    };
    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|json| Config::from_json(&json).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ignoring {}: {}", path, err);
            Config::default().name("demo")
        }
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let config = load_config(args.next());
    let work = Duration::from_millis(
        args.next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WORK_MS),
    );

    let mut executor = Executor::with_config(config);

    timed("sequential", || sequential(work));
    timed("multi-threaded", || multi_threaded(work));
    timed("async sequential", || executor.block_on(async_seq(work)));
    timed("async concurrent", || executor.block_on(async_concurrent(work)));

    match serde_json::to_string_pretty(&executor.stats()) {
        Ok(json) => println!("executor stats:\n{}", json),
        Err(err) => eprintln!("could not encode stats: {}", err),
    }
}
