// Frame source interface
//
// The tracking session is an external collaborator. The recorder only needs
// to ask it for the current camera frame and the device's orientation.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::{DeviceClass, Orientation};
use crate::frame::RawFrame;

/// Supplier of camera frames, polled once per ingest tick
pub trait FrameSource: Send + Sync {
    /// The most recent camera frame, if the session has produced one
    fn current_frame(&self) -> Option<RawFrame>;

    /// Current interface orientation
    fn orientation(&self) -> Orientation {
        Orientation::LandscapeRight
    }

    fn device_class(&self) -> DeviceClass {
        DeviceClass::Phone
    }
}

/// Adapts a push-style camera callback to the polled [`FrameSource`] interface.
///
/// Producers call [`push`](Self::push) from the capture thread; it never blocks,
/// and when the queue is full the frame is discarded. Pollers always see the
/// newest frame delivered so far.
pub struct LatestFrameSource {
    sender: Sender<RawFrame>,
    receiver: Receiver<RawFrame>,
    latest: Mutex<Option<RawFrame>>,
    orientation: RwLock<Orientation>,
    device_class: DeviceClass,
}

impl LatestFrameSource {
    pub fn new(queue_depth: usize, device_class: DeviceClass) -> Self {
        let (sender, receiver) = bounded(queue_depth.max(1));
        Self {
            sender,
            receiver,
            latest: Mutex::new(None),
            orientation: RwLock::new(Orientation::default()),
            device_class,
        }
    }

    /// Hand a new camera frame to the source.
    ///
    /// Returns `false` if the frame was discarded because pollers are behind.
    pub fn push(&self, frame: RawFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                // Pollers only care about the newest frame: make room for it
                let _ = self.receiver.try_recv();
                self.sender.try_send(frame).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        *self.orientation.write() = orientation;
    }
}

impl FrameSource for LatestFrameSource {
    fn current_frame(&self) -> Option<RawFrame> {
        let mut latest = self.latest.lock();
        while let Ok(frame) = self.receiver.try_recv() {
            *latest = Some(frame);
        }
        latest.clone()
    }

    fn orientation(&self) -> Orientation {
        *self.orientation.read()
    }

    fn device_class(&self) -> DeviceClass {
        self.device_class
    }
}
