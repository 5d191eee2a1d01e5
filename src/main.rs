//! parfx CLI
//!
//! Runs one scheduling strategy over a data set laid out as:
//!
//! ```text
//! <root>/effects.txt      job manifest (concatenated JSON objects)
//! <root>/in/<dir>/<name>  input PNGs
//! <root>/out/             outputs, written as <dir>_<name>
//! ```
//!
//! A `key=value` stats line is written to stderr on completion.
//!
//! # Exit Codes
//!
//! - `0`: run completed (per-item failures are reported, not fatal)
//! - `1`: fatal error (manifest unreadable)
//! - `2`: invalid arguments

use parfx::{run, DataLayout, RunConfig, Strategy, PERF_TEST_SENTINEL};
use std::env;
use std::process;

fn print_usage(exe: &std::ffi::OsStr) {
    eprintln!(
        "usage: {} [OPTIONS] <dirs>

ARGS:
    <dirs>                  `+`-delimited directory identifiers under <root>/in/

OPTIONS:
    --mode=<M>              sequential | parfiles | parslices | pipeline | steal
                            (default: sequential)
    --threads=<N>           Worker count (default: CPU count; -1 skips all work)
    --data=<ROOT>           Data root holding effects.txt, in/, out/ (default: data)
    --seed=<S>              Placement seed for the steal mode (default: 0)
    --help, -h              Show this help message",
        exe.to_string_lossy()
    );
}

fn main() {
    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "parfx".into());

    let mut dirs: Option<String> = None;
    let mut mode = Strategy::Sequential;
    let mut threads: Option<i32> = None;
    let mut data_root = String::from("data");
    let mut seed = 0u64;

    for arg in args {
        let Some(flag) = arg.to_str() else {
            eprintln!("invalid (non-UTF-8) argument");
            process::exit(2);
        };
        if let Some(value) = flag.strip_prefix("--mode=") {
            mode = Strategy::from_name(value).unwrap_or_else(|| {
                eprintln!("invalid --mode value: {}", value);
                process::exit(2);
            });
            continue;
        }
        if let Some(value) = flag.strip_prefix("--threads=") {
            let n: i32 = value.parse().unwrap_or_else(|_| {
                eprintln!("invalid --threads value: {}", value);
                process::exit(2);
            });
            if n < 1 && n != PERF_TEST_SENTINEL {
                eprintln!("--threads must be >= 1 (or -1 for a no-op timing run)");
                process::exit(2);
            }
            threads = Some(n);
            continue;
        }
        if let Some(value) = flag.strip_prefix("--data=") {
            data_root = value.to_string();
            continue;
        }
        if let Some(value) = flag.strip_prefix("--seed=") {
            seed = value.parse().unwrap_or_else(|_| {
                eprintln!("invalid --seed value: {}", value);
                process::exit(2);
            });
            continue;
        }
        match flag {
            "--help" | "-h" => {
                print_usage(&exe);
                return;
            }
            _ if flag.starts_with("--") => {
                eprintln!("unknown option: {}", flag);
                print_usage(&exe);
                process::exit(2);
            }
            _ => {
                if dirs.replace(flag.to_string()).is_some() {
                    eprintln!("expected exactly one <dirs> argument");
                    process::exit(2);
                }
            }
        }
    }

    let Some(dirs) = dirs else {
        print_usage(&exe);
        process::exit(2);
    };
    if dirs.split('+').all(|d| d.is_empty()) {
        eprintln!("<dirs> must name at least one directory");
        process::exit(2);
    }

    let config = RunConfig {
        threads: threads.unwrap_or_else(|| num_cpus::get().max(1) as i32),
        data_dirs: dirs,
        strategy: mode,
        layout: DataLayout::new(data_root),
        seed,
    };

    match run(&config) {
        Ok(stats) => eprintln!("{stats}"),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
