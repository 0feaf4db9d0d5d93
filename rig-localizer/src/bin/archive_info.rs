//! CLI tool for inspecting observation archives.
//!
//! Works on both input archives and `_located*` outputs; for the latter
//! it reports how many scans carry a resolved pose.
//!
//! # Usage
//!
//! ```bash
//! archive_info run1.rlog
//! archive_info --verbose run1_located-ICP.rlog
//! ```

use std::collections::BTreeMap;
use std::env;

use rig_localizer::{ArchivePlayer, Observation};

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct Config {
    archive_path: String,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Result<Config, String> {
    let mut archive_path = None;
    let mut verbose = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => return Err("Help requested".to_string()),
            arg if !arg.starts_with('-') => {
                if archive_path.is_some() {
                    return Err("Multiple archives specified".to_string());
                }
                archive_path = Some(arg.to_string());
            }
            _ => return Err(format!("Unknown argument: {}", arg)),
        }
    }

    Ok(Config {
        archive_path: archive_path.ok_or("Missing archive argument")?,
        verbose,
    })
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Usage: {} [OPTIONS] <ARCHIVE>

Display information about an observation archive.

OPTIONS:
    -v, --verbose   Per-sensor breakdown and first resolved poses
    -h, --help      Show this help message
"#,
        program
    );
}

#[derive(Default)]
struct SensorStats {
    scans: u64,
    resolved: u64,
    points: u64,
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut player = ArchivePlayer::open(&config.archive_path)?;
    let header = player.header().clone();

    println!("Archive Information");
    println!("===================");
    println!("File: {}", config.archive_path);
    println!("  Format version: {}", header.version);
    println!("  Start time: {} us", header.start_time_us);
    println!("  End time: {} us", header.end_time_us);
    println!("  Duration: {:.3} seconds", header.duration_secs());
    println!("  Message count (header): {}", header.message_count);

    let mut planar = 0u64;
    let mut sensors: BTreeMap<String, SensorStats> = BTreeMap::new();
    let mut first_resolved = Vec::new();

    while let Some(observation) = player.next_observation()? {
        match observation {
            Observation::PlanarScan { .. } => planar += 1,
            Observation::RangeScan(scan) => {
                let stats = sensors.entry(scan.sensor_label.clone()).or_default();
                stats.scans += 1;
                stats.points += scan.points.len() as u64;
                if let Some(pose) = scan.resolved_pose {
                    stats.resolved += 1;
                    if first_resolved.len() < 5 {
                        first_resolved.push((scan.timestamp_us, scan.sensor_label, pose));
                    }
                }
            }
        }
    }

    let range: u64 = sensors.values().map(|s| s.scans).sum();
    let resolved: u64 = sensors.values().map(|s| s.resolved).sum();
    println!();
    println!("Observations:");
    println!("  Planar scans: {}", planar);
    println!("  Rig scans: {} ({} with resolved pose)", range, resolved);

    if config.verbose {
        println!();
        println!("Rig sensors:");
        for (label, stats) in &sensors {
            println!(
                "  {:<10} scans: {:>6}, resolved: {:>6}, mean points: {:.0}",
                label,
                stats.scans,
                stats.resolved,
                stats.points as f64 / stats.scans.max(1) as f64
            );
        }
        if !first_resolved.is_empty() {
            println!();
            println!("First resolved poses:");
            for (t, label, pose) in &first_resolved {
                println!("  [{:>12} us] {:<10} {}", t, label, pose);
            }
        }
    }

    let file_size = std::fs::metadata(&config.archive_path)?.len();
    println!();
    println!("File size: {:.2} MB", file_size as f64 / 1_048_576.0);
    Ok(())
}
