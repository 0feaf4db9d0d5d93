//! End-to-end pipeline scenarios.
//!
//! Planar scans are synthesized from a rectangular room seen from known
//! poses, so the localizer's fixes land on those poses. Refinement uses
//! the scripted aligner to control goodness exactly.

use std::path::Path;

use approx::assert_relative_eq;
use rig_localizer::engine::interpolation::UnresolvedReason;
use rig_localizer::io::trajectory_log::read_trajectory_log;
use rig_localizer::{
    export_scans, AlignmentScript, ArchivePlayer, ArchiveRecorder, Backend, ExportBundle,
    Observation, Pipeline, PlanarIcp, PlanarIcpConfig, PlanarLocalizer, PlanarMap, Point3D,
    PointCloud2D, PointCloud3D, Pose2D, Pose3D, RigLayout, RigScan, RigidAligner, RunMode,
    TrajectoryLog,
};
use tempfile::TempDir;

const LABELS: [&str; 4] = ["RGBD_1", "RGBD_2", "RGBD_3", "RGBD_4"];

// ============================================================================
// Fixtures
// ============================================================================

/// 6 m x 4 m room with a pillar, walls slightly jittered.
fn room_map() -> PointCloud2D {
    let mut cloud = PointCloud2D::new();
    for i in 0..120 {
        let f = i as f32 / 120.0;
        let jitter = (i % 7) as f32 * 0.0007;
        cloud.push_xy(-2.0 + f * 6.0, -2.0 + jitter);
        cloud.push_xy(4.0 - f * 6.0, 2.0 - jitter);
    }
    for i in 0..80 {
        let f = i as f32 / 80.0;
        let jitter = (i % 5) as f32 * 0.0007;
        cloud.push_xy(4.0 - jitter, -2.0 + f * 4.0);
        cloud.push_xy(-2.0 + jitter, 2.0 - f * 4.0);
    }
    for i in 0..20 {
        let f = i as f32 / 20.0 * 0.5;
        cloud.push_xy(1.5 + f, 0.5);
        cloud.push_xy(2.0, 0.5 + f);
        cloud.push_xy(2.0 - f, 1.0);
        cloud.push_xy(1.5, 1.0 - f);
    }
    cloud
}

fn planar(t: u64, x: f32, y: f32, theta: f32) -> Observation {
    let pose = Pose2D::new(x, y, theta);
    Observation::PlanarScan {
        label: "HOKUYO1".to_string(),
        timestamp_us: t,
        points: room_map().transform(&pose.inverse()),
    }
}

fn extrinsic(slot: usize) -> Pose3D {
    Pose3D::new(0.27, 0.0, 1.0, 0.0, 0.0, slot as f32 * std::f32::consts::FRAC_PI_2)
}

fn rig(label_slot: usize, t: u64) -> Observation {
    let points: Vec<Point3D> = (0..10)
        .map(|i| Point3D::new(1.0 + i as f32 * 0.1, 0.1 * i as f32, 0.3))
        .collect();
    Observation::RangeScan(RigScan::new(
        LABELS[label_slot % 4],
        t,
        PointCloud3D::from_points(&points),
        extrinsic(label_slot % 4),
    ))
}

fn localizer() -> PlanarLocalizer {
    localizer_with(PlanarIcpConfig::default())
}

fn localizer_with(config: PlanarIcpConfig) -> PlanarLocalizer {
    PlanarLocalizer::new(
        PlanarIcp::new(config),
        PlanarMap::new(room_map()),
        Pose2D::identity(),
    )
}

fn run(mode: RunMode, aligner: Option<Box<dyn RigidAligner>>, input: Vec<Observation>) -> ExportBundle {
    let layout = RigLayout::new(&LABELS).unwrap();
    let tracker = mode.localization.then(localizer);
    let pipeline = Pipeline::new(mode, layout, tracker, aligner).unwrap();
    pipeline
        .run(input.into_iter().map(Ok::<_, std::convert::Infallible>))
        .unwrap()
}

fn refine_mode(accumulate: bool) -> RunMode {
    RunMode {
        localization: true,
        refinement: Some(Backend::Icp),
        accumulate,
    }
}

/// Two fixes around two complete groups of rig scans.
fn two_group_stream() -> Vec<Observation> {
    let mut input = vec![planar(0, 0.0, 0.0, 0.0)];
    for i in 0..8 {
        input.push(rig(i, 10 + i as u64 * 10));
    }
    input.push(planar(100, 0.2, 0.1, 0.05));
    input
}

fn resolved(bundle: &ExportBundle) -> Vec<Pose3D> {
    bundle
        .scans
        .iter()
        .map(|s| s.resolved_pose.expect("exported scans are resolved"))
        .collect()
}

fn assert_pose_eq(a: &Pose3D, b: &Pose3D, tol: f32) {
    assert_relative_eq!(a.x(), b.x(), epsilon = tol);
    assert_relative_eq!(a.y(), b.y(), epsilon = tol);
    assert_relative_eq!(a.z(), b.z(), epsilon = tol);
    assert_relative_eq!(a.inverse().compose(b).rotation_angle(), 0.0, epsilon = tol);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_midpoint_scan_interpolates() {
    let input = vec![
        planar(0, 0.0, 0.0, 0.0),
        Observation::RangeScan(RigScan::new(
            "RGBD_1",
            5,
            PointCloud3D::new(),
            Pose3D::identity(),
        )),
        planar(10, 1.0, 0.0, 0.0),
    ];

    // A full meter between fixes needs a wider first correspondence gate.
    let tracker = localizer_with(PlanarIcpConfig {
        threshold_dist: 1.5,
        ..PlanarIcpConfig::default()
    });
    let layout = RigLayout::new(&LABELS).unwrap();
    let pipeline = Pipeline::new(RunMode::default(), layout, Some(tracker), None).unwrap();
    let bundle = pipeline
        .run(input.into_iter().map(Ok::<_, std::convert::Infallible>))
        .unwrap();

    assert_eq!(bundle.fixes.len(), 2);
    assert_relative_eq!(bundle.fixes[1].data.x, 1.0, epsilon = 0.05);

    let pose = resolved(&bundle)[0];
    assert_relative_eq!(pose.x(), 0.5, epsilon = 0.05);
    assert_relative_eq!(pose.y(), 0.0, epsilon = 0.05);
    assert_relative_eq!(pose.planar().theta, 0.0, epsilon = 0.02);
}

#[test]
fn scenario_b_accepted_alignment_moves_second_group() {
    let baseline = run(RunMode::default(), None, two_group_stream());

    let correction = Pose3D::new(0.05, -0.02, 0.0, 0.0, 0.0, 0.01);
    let script = AlignmentScript::percentage(96.0).then(correction, 99.0);
    let bundle = run(refine_mode(false), Some(Box::new(script)), two_group_stream());

    let (before, after) = (resolved(&baseline), resolved(&bundle));
    assert_eq!(after.len(), 8);
    for i in 0..4 {
        assert_pose_eq(&after[i], &before[i], 1e-5);
    }
    for i in 4..8 {
        assert_pose_eq(&after[i], &correction.compose(&before[i]), 1e-5);
    }
    assert_eq!(bundle.goodness_log, vec![99.0]);
    assert_eq!(bundle.mean_goodness, Some(99.0));
    assert_eq!(bundle.stats.fallbacks, 0);
}

#[test]
fn scenario_c_rejected_alignment_keeps_interpolated_poses() {
    let baseline = run(RunMode::default(), None, two_group_stream());

    let wild = Pose3D::new(3.0, 1.0, 0.5, 0.2, 0.0, 1.0);
    let script = AlignmentScript::percentage(96.0).then(wild, 50.0);
    let bundle = run(refine_mode(false), Some(Box::new(script)), two_group_stream());

    for (after, before) in resolved(&bundle).iter().zip(&resolved(&baseline)) {
        assert_pose_eq(after, before, 1e-5);
    }
    assert_eq!(bundle.goodness_log, vec![50.0]);
    assert_eq!(bundle.stats.fallbacks, 1);
    assert_eq!(bundle.stats.groups_refined, 1);
}

#[test]
fn trailing_partial_group_is_not_refined() {
    let mut input = vec![planar(0, 0.0, 0.0, 0.0)];
    for i in 0..11 {
        input.push(rig(i, 10 + i as u64 * 5));
    }
    input.push(planar(100, 0.1, 0.0, 0.0));

    let script = AlignmentScript::percentage(96.0);
    let bundle = run(refine_mode(false), Some(Box::new(script)), input);

    assert_eq!(bundle.stats.groups_emitted, 2);
    assert_eq!(bundle.stats.groups_refined, 1);
    // The three leftovers keep their interpolated poses and archive order.
    assert_eq!(bundle.scans.len(), 11);
    let order: Vec<u64> = bundle.scans.iter().map(|s| s.sequence).collect();
    assert_eq!(order, (0..11).collect::<Vec<u64>>());
}

#[test]
fn unbracketed_scans_are_reported() {
    let input = vec![
        rig(0, 1),
        planar(10, 0.0, 0.0, 0.0),
        rig(1, 15),
        planar(20, 0.0, 0.0, 0.0),
        rig(2, 25),
    ];

    let bundle = run(RunMode::default(), None, input);

    assert_eq!(bundle.scans.len(), 1);
    assert_eq!(bundle.scans[0].timestamp_us, 15);
    let reasons: Vec<UnresolvedReason> = bundle.unresolved.iter().map(|u| u.reason).collect();
    assert_eq!(
        reasons,
        vec![UnresolvedReason::NoPriorFix, UnresolvedReason::NoClosingFix]
    );
    assert_eq!(bundle.stats.scans_unresolved, 2);
}

#[test]
fn accumulate_mode_aligns_each_sensor() {
    let script = AlignmentScript::percentage(96.0);
    let mut input = vec![planar(0, 0.0, 0.0, 0.0)];
    for i in 0..12 {
        input.push(rig(i, 10 + i as u64 * 5));
    }
    input.push(planar(100, 0.1, 0.0, 0.0));

    let bundle = run(refine_mode(true), Some(Box::new(script)), input);

    assert_eq!(bundle.stats.groups_refined, 2);
    assert_eq!(bundle.goodness_log.len(), 8);
}

#[test]
fn output_names_follow_mode() {
    let input = Path::new("dataset/run_7.rlog");
    let cases = [
        (None, false, "run_7_located.rlog"),
        (None, true, "run_7_located.rlog"),
        (Some(Backend::Icp), false, "run_7_located-ICP.rlog"),
        (Some(Backend::Icp), true, "run_7_located-ICP-memory.rlog"),
        (Some(Backend::Gicp), false, "run_7_located-GICP.rlog"),
        (Some(Backend::Gicp), true, "run_7_located-GICP-memory.rlog"),
    ];
    for (refinement, accumulate, expected) in cases {
        let mode = RunMode {
            localization: true,
            refinement,
            accumulate,
        };
        assert_eq!(mode.output_path(input), Path::new("dataset").join(expected));
    }
}

// ============================================================================
// Archive round trip
// ============================================================================

#[test]
fn archive_in_archive_out() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("run.rlog");
    let log_path = temp_dir.path().join("trajectory.txt");

    let mut recorder = ArchiveRecorder::create(&input_path).unwrap();
    for observation in two_group_stream() {
        recorder.record(&observation).unwrap();
    }
    recorder.finish().unwrap();

    let mode = refine_mode(false);
    let tracker = localizer().with_sink(Box::new(TrajectoryLog::create(&log_path).unwrap()));
    let pipeline = Pipeline::new(
        mode,
        RigLayout::new(&LABELS).unwrap(),
        Some(tracker),
        Some(Box::new(AlignmentScript::percentage(96.0))),
    )
    .unwrap();
    let bundle = pipeline.run(ArchivePlayer::open(&input_path).unwrap()).unwrap();

    let output_path = mode.output_path(&input_path);
    let info = export_scans(&output_path, &bundle.scans).unwrap();
    assert_eq!(info.range_count, 8);
    assert_eq!(info.planar_count, 0);

    let mut player = ArchivePlayer::open(&output_path).unwrap();
    let scans: Vec<RigScan> = player
        .range_scans()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(scans.len(), 8);
    assert!(scans.iter().all(|s| s.resolved_pose.is_some()));
    assert!(scans.windows(2).all(|w| w[0].timestamp_us < w[1].timestamp_us));

    let logged = read_trajectory_log(&log_path).unwrap();
    assert_eq!(logged.len(), bundle.fixes.len());
    assert_eq!(logged[1].timestamp_us, 100);
}

#[test]
fn corrupt_archive_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.rlog");

    let mut recorder = ArchiveRecorder::create(&path).unwrap();
    for observation in two_group_stream() {
        recorder.record(&observation).unwrap();
    }
    recorder.finish().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let pipeline = Pipeline::new(
        RunMode::default(),
        RigLayout::new(&LABELS).unwrap(),
        Some(localizer()),
        None,
    )
    .unwrap();
    assert!(pipeline.run(ArchivePlayer::open(&path).unwrap()).is_err());
}
