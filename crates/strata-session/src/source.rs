use std::sync::{Arc, Condvar, Mutex};

use crate::frame::Frame;

/// Boundary to the sensor acquisition driver.
///
/// Blocking happens only at this boundary, never inside the processing core.
pub trait FrameSource {
    /// Block until the producer has delivered at least one frame.
    fn wait_for_first_frame(&self) -> Arc<Frame>;

    /// The last delivered frame, if any. Never blocks.
    fn current_frame(&self) -> Option<Arc<Frame>>;
}

struct FrameSlot {
    latest: Mutex<Option<Arc<Frame>>>,
    ready: Condvar,
}

/// A latest-frame slot fed by an external producer thread.
///
/// The producer overwrites the slot on every delivery; consumers always see
/// the most recent complete frame.
pub struct SharedFrameSource {
    slot: Arc<FrameSlot>,
}

/// Producer handle for pushing frames into a [`SharedFrameSource`].
#[derive(Clone)]
pub struct FrameProducer {
    slot: Arc<FrameSlot>,
}

impl SharedFrameSource {
    /// Create the source together with its producer handle.
    pub fn new() -> (Self, FrameProducer) {
        let slot = Arc::new(FrameSlot {
            latest: Mutex::new(None),
            ready: Condvar::new(),
        });
        (
            Self { slot: slot.clone() },
            FrameProducer { slot },
        )
    }
}

impl FrameProducer {
    /// Publish a frame, replacing any previously published one.
    pub fn publish(&self, frame: Frame) {
        // SAFETY: we have a lock on the latest frame
        let mut latest = self.slot.latest.lock().unwrap();
        *latest = Some(Arc::new(frame));
        self.slot.ready.notify_all();
    }
}

impl FrameSource for SharedFrameSource {
    fn wait_for_first_frame(&self) -> Arc<Frame> {
        let mut latest = self.slot.latest.lock().unwrap();
        loop {
            match latest.as_ref() {
                Some(frame) => return frame.clone(),
                None => latest = self.slot.ready.wait(latest).unwrap(),
            }
        }
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.slot.latest.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_3d::pointcloud::PointCloud;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, seq * 1000, PointCloud::new(vec![[seq as f64, 0.0, 0.0]], None))
    }

    #[test]
    fn test_current_frame_tracks_latest() {
        let (source, producer) = SharedFrameSource::new();
        assert!(source.current_frame().is_none());

        producer.publish(frame(0));
        producer.publish(frame(1));

        let current = source.current_frame().expect("frame was published");
        assert_eq!(current.seq, 1);
    }

    #[test]
    fn test_wait_for_first_frame_blocks_until_publish() {
        let (source, producer) = SharedFrameSource::new();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            producer.publish(frame(42));
        });

        let first = source.wait_for_first_frame();
        assert_eq!(first.seq, 42);
        handle.join().unwrap();
    }
}
