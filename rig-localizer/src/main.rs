//! rig-localizer - posed 3D trajectories from an observation archive
//!
//! Reads an archive of planar and rig range scans, localizes the platform
//! against a reference map, assigns each rig scan a global pose and
//! optionally refines those poses with 3D alignment. The result is written
//! next to the input archive.
//!
//! # Usage
//!
//! ```bash
//! # Interpolated poses only
//! rig-localizer run1.rlog map.txt
//!
//! # Refine with 3D ICP against everything aligned so far
//! rig-localizer run1.rlog map.txt -enable_ICP3D -enable_memory
//!
//! # Custom configuration
//! rig-localizer run1.rlog map.txt -enable_GICP3D --config rig-localizer.toml
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use rig_localizer::config::RunConfig;
use rig_localizer::engine::localization::PlanarLocalizer;
use rig_localizer::engine::pipeline::{Backend, Pipeline, RunMode};
use rig_localizer::error::Result;
use rig_localizer::io::archive::{export_scans, ArchivePlayer};
use rig_localizer::io::map_loader::load_reference_map;
use rig_localizer::io::trajectory_log::TrajectoryLog;
use rig_localizer::{PlanarIcp, PlanarMap};

struct Args {
    archive: PathBuf,
    map: PathBuf,
    mode: RunMode,
    config_path: Option<PathBuf>,
}

/// `None` means usage was printed and there is nothing to do.
fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut positional = Vec::new();
    let mut mode = RunMode::default();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-disable_ICP2D" => mode.localization = false,
            "-enable_ICP3D" => mode.refinement = Some(Backend::Icp),
            "-enable_GICP3D" => mode.refinement = Some(Backend::Gicp),
            "-enable_memory" => mode.accumulate = true,
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Missing value for {}", args[i]);
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => positional.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    if positional.len() < 2 {
        print_help();
        return None;
    }
    if positional.len() > 2 {
        eprintln!("Unexpected argument: {}", positional[2].display());
        print_help();
        std::process::exit(1);
    }

    let map = positional.pop()?;
    let archive = positional.pop()?;
    Some(Args {
        archive,
        map,
        mode,
        config_path,
    })
}

fn print_help() {
    println!("rig-localizer - globally posed 3D trajectories for a multi-sensor rig");
    println!();
    println!("USAGE:");
    println!("    rig-localizer <ARCHIVE> <REFERENCE_MAP> [OPTIONS]");
    println!();
    println!("ARGUMENTS:");
    println!("    <ARCHIVE>               Observation archive with planar and rig scans");
    println!("    <REFERENCE_MAP>         Plain-text 2D points map (x y per line)");
    println!();
    println!("OPTIONS:");
    println!("    -disable_ICP2D          Do not localize with 2D scans; rig scans start at");
    println!("                            their extrinsic poses");
    println!("    -enable_ICP3D           Refine rig poses with point-to-point 3D ICP");
    println!("    -enable_GICP3D          Refine rig poses with generalized ICP");
    println!("    -enable_memory          Align against every group registered so far");
    println!("    -c, --config <FILE>     Configuration file (default: rig-localizer.toml)");
    println!("    -h, --help              Print help information");
    println!();
    println!("OUTPUT:");
    println!("    <ARCHIVE stem>_located[-ICP|-GICP][-memory].<ext> next to the input");
}

fn build_localizer(config: &RunConfig, map_path: &Path) -> Result<PlanarLocalizer> {
    let map = PlanarMap::new(load_reference_map(map_path)?);
    let log = TrajectoryLog::create(&config.localization.trajectory_log)?;
    log::info!("  Trajectory log: {}", log.path().display());

    Ok(PlanarLocalizer::new(
        PlanarIcp::new(config.planar_icp()),
        map,
        config.initial_pose(),
    )
    .with_min_goodness(config.localization.icp.min_goodness)
    .with_sink(Box::new(log)))
}

fn run(args: &Args) -> Result<()> {
    let (config, config_path) = RunConfig::load(args.config_path.as_deref())?;
    match config_path {
        Some(path) => log::info!("Loaded config from {}", path.display()),
        None => log::info!("Using default configuration"),
    }

    let mode = args.mode;
    let output = mode.output_path(&args.archive);
    log::info!("rig-localizer starting");
    log::info!("  Input: {}", args.archive.display());
    log::info!("  Output: {}", output.display());
    log::info!("  Mode: {}", mode);

    let layout = config.rig_layout()?;
    let localizer = if mode.localization {
        Some(build_localizer(&config, &args.map)?)
    } else {
        None
    };
    let aligner = mode
        .refinement
        .map(|backend| config.aligner(backend, mode.accumulate));
    if let Some(aligner) = aligner.as_ref() {
        log::info!("  Refinement gate: {} {}", aligner.name(), aligner.gate());
    }

    let player = ArchivePlayer::open(&args.archive)?;
    log::info!(
        "Archive holds {} observations over {:.1}s",
        player.message_count(),
        player.header().duration_secs()
    );

    let pipeline = Pipeline::new(mode, layout, localizer, aligner)?;
    let bundle = pipeline.run(player)?;

    let info = export_scans(&output, &bundle.scans)?;
    bundle.log_summary();
    log::info!(
        "Wrote {} posed scans to {} ({:.2} MB)",
        info.range_count,
        info.path.display(),
        info.file_size_mb()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let Some(args) = parse_args() else {
        return;
    };

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
