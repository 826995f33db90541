use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argh::FromArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_3d::pointcloud::PointCloud;
use strata_session::source::SharedFrameSource;
use strata_session::{Frame, OperationMode, SessionConfig, SessionController};

#[derive(FromArgs)]
/// Drive a session over a synthetic depth stream, recording or replaying a clip
struct Args {
    /// the clip directory to record into or play back from
    #[argh(option, short = 'c', default = "String::from(\"./clip\")")]
    clip_dir: String,

    /// record a new clip while streaming
    #[argh(switch, short = 'r')]
    record: bool,

    /// play the clip back instead of streaming
    #[argh(switch, short = 'p')]
    playback: bool,

    /// number of ticks to run
    #[argh(option, short = 'n', default = "120")]
    ticks: u64,
}

/// A fake sensor frame: a floor plane at z = -1 with a small object
/// drifting across it.
fn synth_frame(seq: u64) -> Frame {
    let mut rng = StdRng::seed_from_u64(seq);
    let mut points = Vec::with_capacity(450);

    for _ in 0..350 {
        points.push([
            rng.random_range(-1.5..1.5),
            rng.random_range(-1.5..1.5),
            -1.0 + rng.random_range(-0.005..0.005),
        ]);
    }

    let drift = seq as f64 * 0.01;
    for _ in 0..100 {
        points.push([
            drift + rng.random_range(-0.1..0.1),
            rng.random_range(-0.1..0.1),
            -0.7 + rng.random_range(0.0..0.3),
        ]);
    }

    Frame::new(seq, seq * 33_000, PointCloud::new(points, None))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let (source, producer) = SharedFrameSource::new();

    // create a cancel token to stop the tick loop
    let cancel_token = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    // fake sensor thread feeding the latest-frame slot
    let sensor = std::thread::spawn({
        let cancel_token = cancel_token.clone();
        move || {
            let mut seq = 0;
            while !cancel_token.load(Ordering::SeqCst) {
                producer.publish(synth_frame(seq));
                seq += 1;
                std::thread::sleep(Duration::from_millis(33));
            }
        }
    });

    let mut controller = SessionController::new(source, SessionConfig::default());
    controller.wait_for_first_frame();
    controller.request_floor_update();

    if args.record {
        controller.record_new_clip(&args.clip_dir)?;
        println!("recording into {}", args.clip_dir);
    }
    if args.playback {
        controller.set_playback_clip(&args.clip_dir)?;
        controller.set_operation_mode(OperationMode::ClipPlayback)?;
        println!("playing back {}", args.clip_dir);
    }

    for tick in 0..args.ticks {
        if cancel_token.load(Ordering::SeqCst) {
            break;
        }

        let snapshot = controller.spin_once()?;
        if tick % 30 == 0 {
            let seq = snapshot.frame.as_ref().map(|f| f.seq);
            println!(
                "tick {tick}: mode {:?}, frame {:?}, floor fitted: {}",
                snapshot.mode,
                seq,
                snapshot.floor_plane.is_some()
            );
        }

        std::thread::sleep(Duration::from_millis(33));
    }

    if let Some(info) = controller.stop_recording()? {
        println!(
            "recorded {} frames into {} ({} dropped)",
            info.frame_count,
            info.path.display(),
            info.dropped
        );
    }

    cancel_token.store(true, Ordering::SeqCst);
    sensor.join().expect("sensor thread");

    println!("Finished. Closing session.");
    Ok(())
}
