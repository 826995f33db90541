use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_3d::linalg::euclidean_distance;
use strata_3d::pointcloud::PointCloud;
use strata_3d::transforms::{axis_angle_to_rotation_matrix, RigidTransform};
use strata_icp::IcpCriteria;
use strata_session::clip::ClipPlayer;
use strata_session::source::{FrameProducer, SharedFrameSource};
use strata_session::{
    EndOfClipPolicy, Frame, OperationMode, SessionConfig, SessionController, SessionError,
};

fn scene_cloud(num_points: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points = (0..num_points)
        .map(|_| {
            [
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.0..0.5),
            ]
        })
        .collect();
    PointCloud::new(points, None)
}

fn tracking_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.tracker.criteria = IcpCriteria {
        max_iterations: 100,
        tolerance: 1e-10,
    };
    config.tracker.min_correspondences = 10;
    config.tracker.divergence_rmse = 0.05;
    config
}

fn new_session(
    config: SessionConfig,
) -> (SessionController<SharedFrameSource>, FrameProducer) {
    let (source, producer) = SharedFrameSource::new();
    (SessionController::new(source, config), producer)
}

#[test]
fn record_then_replay_is_lossless() -> Result<(), SessionError> {
    let tmp = tempfile::tempdir().expect("tempdir");
    let clip_dir = tmp.path().join("capture");

    let (mut controller, producer) = new_session(SessionConfig::default());
    controller.record_new_clip(&clip_dir)?;

    let mut originals = Vec::new();
    for seq in 0..5 {
        let cloud = scene_cloud(50, seq);
        originals.push(cloud.clone());
        producer.publish(Frame::new(seq, seq * 33_000, cloud));
        controller.spin_once()?;
    }

    let info = controller.stop_recording()?.expect("recording was active");
    assert_eq!(info.frame_count, 5);
    assert_eq!(info.dropped, 0);

    // replay through the session in playback mode
    controller.set_playback_clip(&clip_dir)?;
    controller.set_operation_mode(OperationMode::ClipPlayback)?;

    for (seq, original) in originals.iter().enumerate() {
        let snapshot = controller.spin_once()?;
        assert_eq!(snapshot.mode, OperationMode::ClipPlayback);
        let replayed = snapshot.frame.expect("frame within the clip");
        assert_eq!(replayed.seq, seq as u64);
        for (a, b) in replayed.cloud.points().iter().zip(original.points().iter()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    // default policy: the exhausted clip falls back to streaming
    let snapshot = controller.spin_once()?;
    assert_eq!(snapshot.mode, OperationMode::Streaming);
    Ok(())
}

#[test]
fn end_of_clip_loop_policy_rewinds() -> Result<(), SessionError> {
    let tmp = tempfile::tempdir().expect("tempdir");
    let clip_dir = tmp.path().join("loop_clip");

    let mut config = SessionConfig::default();
    config.end_of_clip = EndOfClipPolicy::Loop;

    let (mut controller, producer) = new_session(config);
    controller.record_new_clip(&clip_dir)?;
    for seq in 0..3 {
        producer.publish(Frame::new(seq, seq, scene_cloud(20, seq)));
        controller.spin_once()?;
    }
    controller.stop_recording()?;

    controller.set_playback_clip(&clip_dir)?;
    controller.set_operation_mode(OperationMode::ClipPlayback)?;

    let mut sequence = Vec::new();
    for _ in 0..7 {
        let snapshot = controller.spin_once()?;
        assert_eq!(snapshot.mode, OperationMode::ClipPlayback);
        sequence.push(snapshot.frame.expect("looping playback always yields").seq);
    }
    assert_eq!(sequence, vec![0, 1, 2, 0, 1, 2, 0]);
    Ok(())
}

#[test]
fn tracking_follows_motion_and_freezes_on_loss() -> Result<(), SessionError> {
    let (mut controller, producer) = new_session(tracking_config());

    // adopt a frame and make it the template
    let template = scene_cloud(300, 99);
    producer.publish(Frame::new(0, 0, template.clone()));
    controller.spin_once()?;
    controller.extract_template()?;
    controller.set_operation_mode(OperationMode::Tracking)?;

    let step = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.02).expect("unit axis"),
        [0.01, -0.005, 0.0],
    );

    let mut motion = RigidTransform::identity();
    for seq in 1..=8u64 {
        motion = step.compose(&motion);
        let mut moved = vec![[0.0; 3]; template.len()];
        motion.transform_points(template.points(), &mut moved);
        producer.publish(Frame::new(seq, seq * 33_000, PointCloud::new(moved, None)));

        let snapshot = controller.spin_once()?;
        assert!(!snapshot.tracking_stale);
        let pose = snapshot.tracking_transform.expect("tracker is alive");

        // the pose must map the moved frame back onto the template
        let frame = snapshot.frame.expect("frame was published");
        let mut recovered = vec![[0.0; 3]; frame.cloud.len()];
        pose.transform_points(frame.cloud.points(), &mut recovered);
        let mean_err = recovered
            .iter()
            .zip(template.points().iter())
            .map(|(a, b)| euclidean_distance(a, b))
            .sum::<f64>()
            / recovered.len() as f64;
        assert!(mean_err < 1e-3, "tick {seq}: mean alignment error {mean_err}");
    }

    let good_pose = controller.snapshot().tracking_transform.expect("pose");

    // the template disappears: pose freezes, staleness is flagged
    producer.publish(Frame::new(
        100,
        100 * 33_000,
        PointCloud::new(
            vec![[9.0, 9.0, 9.0], [9.1, 9.0, 9.0], [9.0, 9.1, 9.0], [9.1, 9.1, 9.0]],
            None,
        ),
    ));
    let snapshot = controller.spin_once()?;
    assert!(snapshot.tracking_stale);
    assert_eq!(snapshot.tracking_transform.expect("frozen pose"), good_pose);

    // leaving tracking clears the tracker state
    controller.set_operation_mode(OperationMode::Streaming)?;
    let snapshot = controller.snapshot();
    assert!(snapshot.tracking_transform.is_none());
    assert!(!snapshot.tracking_stale);
    Ok(())
}

#[test]
fn switching_to_streaming_finalizes_recording() -> Result<(), SessionError> {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source_clip = tmp.path().join("source_clip");
    let capture_clip = tmp.path().join("capture_clip");

    // a clip to play back
    let (mut controller, producer) = new_session(SessionConfig::default());
    controller.record_new_clip(&source_clip)?;
    for seq in 0..3 {
        producer.publish(Frame::new(seq, seq, scene_cloud(20, seq)));
        controller.spin_once()?;
    }
    controller.stop_recording()?;

    // record while playing back, then fall back to streaming
    controller.record_new_clip(&capture_clip)?;
    controller.set_playback_clip(&source_clip)?;
    controller.set_operation_mode(OperationMode::ClipPlayback)?;
    controller.spin_once()?;
    controller.set_operation_mode(OperationMode::Streaming)?;

    // the transition finalized the capture: it is playable and closed
    assert!(controller.stop_recording()?.is_none());
    let player = ClipPlayer::open(&capture_clip)?;
    assert_eq!(player.len(), 1);
    Ok(())
}

#[test]
fn floor_refresh_failure_keeps_previous_transform() -> Result<(), SessionError> {
    let (mut controller, producer) = new_session(SessionConfig::default());

    // a frame dominated by a floor plane at z = -1
    let mut rng = StdRng::seed_from_u64(4);
    let mut points: Vec<[f64; 3]> = (0..300)
        .map(|_| {
            [
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                -1.0 + rng.random_range(-0.005..0.005),
            ]
        })
        .collect();
    points.extend((0..60).map(|_| {
        [
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(0.5..1.5),
        ]
    }));
    producer.publish(Frame::new(0, 0, PointCloud::new(points, None)));

    controller.request_floor_update();
    let snapshot = controller.spin_once()?;
    let floor = snapshot.floor_transform;
    assert!(snapshot.floor_plane.is_some());

    // floor points land at height ~0
    let mapped = floor.transform_point(&[0.1, 0.2, -1.0]);
    assert!(mapped[2].abs() < 0.02, "height {}", mapped[2]);

    // a refresh over structureless noise fails and keeps the transform
    let noise: Vec<[f64; 3]> = (0..300)
        .map(|_| {
            [
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ]
        })
        .collect();
    producer.publish(Frame::new(1, 1, PointCloud::new(noise, None)));
    controller.request_floor_update();
    let snapshot = controller.spin_once()?;
    assert_eq!(snapshot.floor_transform, floor);
    Ok(())
}
