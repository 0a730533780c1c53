mod difficulty;
mod kernel;
mod output;
mod pattern;
mod search;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use output::{fmt_count, fmt_duration, fmt_rate, human, print_match, save_keypair, verify, Styles};
use pattern::{MatchMode, Pattern, PatternError};
use search::cpu::CpuBackend;
use search::wgpu_backend::{self, WgpuBackend};
use search::{Found, SearchBackend, SearchConfig, SearchError};

/// Grind Ed25519 keypairs whose Base58 address matches a pattern
#[derive(Parser)]
#[command(name = "grind", version)]
struct Cli {
    /// Pattern to match, optionally with a count (e.g. ABC or AB?:5).
    /// Base58 characters plus '?' wildcards.
    #[arg(env = "VANITY_PATTERN")]
    pattern: Option<String>,

    /// Case-sensitive comparison (default: case-insensitive)
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Match at the start of the address (default)
    #[arg(long, conflicts_with_all = ["suffix", "anywhere"])]
    prefix: bool,

    /// Match at the end of the address
    #[arg(long, conflicts_with = "anywhere")]
    suffix: bool,

    /// Match at any position in the address
    #[arg(long)]
    anywhere: bool,

    /// Force the CPU fallback
    #[arg(long)]
    cpu: bool,

    /// Work-group size for GPU, worker count for CPU
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Run the CPU and GPU paths against pattern ZZZZ for 10s each
    #[arg(long)]
    benchmark: bool,
}

fn main() {
    let cli = Cli::parse();
    let s = Styles::new();

    if cli.benchmark {
        run_benchmark(cli.threads);
        return;
    }

    let raw = match cli.pattern.as_deref() {
        Some(p) => p,
        None => {
            eprintln!("Error: no pattern supplied (argument or VANITY_PATTERN)");
            std::process::exit(1);
        }
    };
    let (text, target_count) = match split_count(raw) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mode = resolve_mode(&cli);
    let ignore_case = !(cli.case_sensitive || env_truthy("CASE_SENSITIVE"));
    let pattern = match Pattern::new(text, mode, ignore_case) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            if matches!(e, PatternError::InvalidCharacter { .. }) {
                eprintln!("Base58 alphabet does not include: 0, O, I, l");
            }
            std::process::exit(1);
        }
    };

    // backend selection: GPU unless forced or unavailable
    let backend: Box<dyn SearchBackend>;
    let threads;
    if cli.cpu {
        threads = cli.threads.unwrap_or_else(num_cpus::get);
        backend = Box::new(CpuBackend { workers: threads });
    } else if wgpu_backend::gpu_available() {
        threads = cli.threads.unwrap_or(search::DEFAULT_THREADS as usize);
        backend = Box::new(WgpuBackend {
            workgroup_size: threads as u32,
        });
    } else {
        eprintln!("Error: no GPU compute adapter available (pass --cpu for the CPU fallback)");
        std::process::exit(2);
    }

    let expected = difficulty::expected_attempts(&pattern);
    let p50 = difficulty::p50_attempts(expected);

    println!();
    println!(
        "  {} {}",
        s.dim.apply_to("keygrind"),
        s.dim.apply_to(env!("CARGO_PKG_VERSION")),
    );
    println!("  {} {}", s.dim.apply_to("pattern   "), s.cyan.apply_to(&pattern));
    println!(
        "  {} {} ({}{})",
        s.dim.apply_to("mode      "),
        pattern.mode.label(),
        if pattern.ignore_case { "case-insensitive" } else { "case-sensitive" },
        if target_count > 1 {
            format!(", {target_count} matches")
        } else {
            String::new()
        },
    );
    println!(
        "  {} {}",
        s.dim.apply_to("difficulty"),
        s.dim.apply_to(format!(
            "~{} attempts expected, {} to even odds",
            human(expected),
            human(p50),
        )),
    );
    println!("  {} {}", s.dim.apply_to("backend   "), backend.name());
    println!("  {} {}", s.dim.apply_to("threads   "), threads);
    println!();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .expect("static spinner template"),
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        // SIGINT finishes the in-flight dispatch, then the loop drains
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .expect("install SIGINT handler");
    }
    let total = Arc::new(AtomicU64::new(0));
    let start = Instant::now();
    let (tx, rx) = mpsc::channel::<Found>();

    let backend_thread = {
        let stop = stop.clone();
        let total = total.clone();
        let config = SearchConfig {
            pattern: pattern.clone(),
        };
        std::thread::spawn(move || backend.run(&config, &stop, &total, tx))
    };

    let mut found_count = 0u64;
    loop {
        match rx.try_recv() {
            Ok(found) => {
                if let Err(e) = verify(&found) {
                    pb.finish_and_clear();
                    eprintln!("{}", s.red.apply_to(format!("VERIFICATION FAILED: {e}")));
                    std::process::exit(1);
                }
                let saved = match save_keypair(&found) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        // a failed write never counts toward the target
                        eprintln!(
                            "{}",
                            s.yellow
                                .apply_to(format!("warning: could not write keypair file: {e}"))
                        );
                        None
                    }
                };
                if saved.is_some() {
                    found_count += 1;
                }
                let display_index = if saved.is_some() {
                    found_count
                } else {
                    found_count + 1
                };
                pb.suspend(|| {
                    print_match(&found, display_index, target_count, saved.as_ref(), &s);
                    println!();
                });
                if found_count >= target_count {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
            Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {
                let n = total.load(Ordering::Relaxed);
                let elapsed = start.elapsed().as_secs_f64().max(0.001);
                let rate = n as f64 / elapsed;
                let eta = difficulty::eta_to_p50(expected, n, rate)
                    .map(|d| format!("~{}", fmt_duration(d.as_secs_f64())))
                    .unwrap_or_else(|| "...".to_string());
                pb.set_message(format!(
                    "grinding...  {}  |  {}/s  |  {}  |  ETA(P50) {}  |  found {}/{}",
                    fmt_count(n),
                    fmt_rate(rate),
                    fmt_duration(elapsed),
                    eta,
                    found_count,
                    target_count,
                ));
                pb.tick();
                std::thread::sleep(Duration::from_millis(80));
            }
        }
    }

    pb.finish_and_clear();
    stop.store(true, Ordering::Relaxed);

    let attempts = total.load(Ordering::Relaxed);
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "  {}",
        s.dim.apply_to(format!(
            "{} attempts in {} ({}/s), {found_count}/{target_count} found",
            fmt_count(attempts),
            fmt_duration(elapsed),
            fmt_rate(attempts as f64 / elapsed.max(0.001)),
        ))
    );

    match backend_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            let code = if matches!(e, SearchError::NoGpu) { 2 } else { 1 };
            std::process::exit(code);
        }
        Err(_) => {
            eprintln!("Error: search backend panicked");
            std::process::exit(1);
        }
    }
}

/// `<pattern>[:<count>]`, count defaulting to 1.
fn split_count(raw: &str) -> Result<(&str, u64), String> {
    match raw.split_once(':') {
        None => Ok((raw, 1)),
        Some((text, count)) => {
            let n: u64 = count
                .parse()
                .map_err(|_| format!("invalid match count '{count}'"))?;
            if n == 0 {
                return Err("match count must be positive".to_string());
            }
            Ok((text, n))
        }
    }
}

fn resolve_mode(cli: &Cli) -> MatchMode {
    if cli.suffix {
        MatchMode::Suffix
    } else if cli.anywhere {
        MatchMode::Anywhere
    } else if cli.prefix {
        MatchMode::Prefix
    } else {
        std::env::var("MATCH_MODE")
            .ok()
            .and_then(|v| MatchMode::parse(&v))
            .unwrap_or(MatchMode::Prefix)
    }
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// 10-second throughput window per backend against the fixed pattern ZZZZ.
fn run_benchmark(threads: Option<usize>) {
    let pattern = Pattern::new("ZZZZ", MatchMode::Prefix, true).expect("static pattern");
    println!("Benchmark: pattern ZZZZ, prefix, case-insensitive, 10s per backend");

    let cpu_workers = threads.unwrap_or_else(num_cpus::get);
    let (attempts, rate) = bench_backend(
        Box::new(CpuBackend {
            workers: cpu_workers,
        }),
        &pattern,
    );
    println!("cpu:  {} attempts, {}/s", fmt_count(attempts), fmt_rate(rate));

    if wgpu_backend::gpu_available() {
        let workgroup = threads.unwrap_or(search::DEFAULT_THREADS as usize);
        let (attempts, rate) = bench_backend(
            Box::new(WgpuBackend {
                workgroup_size: workgroup as u32,
            }),
            &pattern,
        );
        println!("wgpu: {} attempts, {}/s", fmt_count(attempts), fmt_rate(rate));
    } else {
        println!("wgpu: no compute adapter available, skipped");
    }
}

fn bench_backend(backend: Box<dyn SearchBackend>, pattern: &Pattern) -> (u64, f64) {
    let stop = Arc::new(AtomicBool::new(false));
    let total = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::channel::<Found>();
    let config = SearchConfig {
        pattern: pattern.clone(),
    };

    let handle = {
        let stop = stop.clone();
        let total = total.clone();
        std::thread::spawn(move || {
            if let Err(e) = backend.run(&config, &stop, &total, tx) {
                eprintln!("warning: benchmark backend failed: {e}");
            }
        })
    };

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(10) {
        std::thread::sleep(Duration::from_millis(100));
        // matches during the window are discarded
        while rx.try_recv().is_ok() {}
    }
    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();

    let attempts = total.load(Ordering::Relaxed);
    (attempts, attempts as f64 / start.elapsed().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_suffix_parses() {
        assert_eq!(split_count("ABC").unwrap(), ("ABC", 1));
        assert_eq!(split_count("AB:5").unwrap(), ("AB", 5));
        assert_eq!(split_count("A?:12").unwrap(), ("A?", 12));
    }

    #[test]
    fn count_suffix_rejects_garbage() {
        assert!(split_count("AB:").is_err());
        assert!(split_count("AB:0").is_err());
        assert!(split_count("AB:-3").is_err());
        assert!(split_count("AB:x").is_err());
    }
}
