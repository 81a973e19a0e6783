// Recording through the real GStreamer writer and remux.
// Skipped on machines without GStreamer or an H.264 encoder.

#![cfg(feature = "gst")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use arcap_lib::container::GstWriterFactory;
use arcap_lib::encoding::detect_best_encoder;
use arcap_lib::gstreamer_init;
use arcap_lib::transcode::GstRemuxTranscoder;
use arcap_lib::{
    DeviceClass, LatestFrameSource, Orientation, RecordingSession, RecordingState, StartOptions,
};

use common::*;

fn can_encode() -> bool {
    if !gstreamer_init::is_gstreamer_available() || detect_best_encoder().is_none() {
        eprintln!("skipping: GStreamer H.264 encoding unavailable");
        return false;
    }
    true
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn portrait_recording_is_remuxed_to_mp4() {
    if !can_encode() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(LatestFrameSource::new(4, DeviceClass::Phone));
    source.set_orientation(Orientation::Portrait);
    source.push(gray_nv12(320, 240, 120, 0));

    let session = RecordingSession::new(
        source.clone(),
        Arc::new(GstWriterFactory::new()),
        Arc::new(GstRemuxTranscoder::new()),
        settings_in(dir.path()),
    );
    session
        .start(StartOptions {
            fps: Some(30),
            ..StartOptions::default()
        })
        .unwrap();
    let intermediate = session.current_output().unwrap();

    let mut appended = 0;
    for i in 0..600u64 {
        if appended == 30 {
            break;
        }
        source.push(gray_nv12(320, 240, (i * 7 % 200) as u8 + 16, i * 33));
        if session.ingest().is_appended() {
            appended += 1;
        } else {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    assert_eq!(appended, 30);

    let delivered = session.stop().await.unwrap();
    assert_eq!(delivered, intermediate.with_extension("mp4"));
    assert!(std::fs::metadata(&delivered).unwrap().len() > 0);
    assert!(!intermediate.exists());
    assert_eq!(session.state(), RecordingState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recording_without_frames_leaves_nothing_behind() {
    if !can_encode() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(LatestFrameSource::new(4, DeviceClass::Phone));
    source.push(gray_nv12(320, 240, 120, 0));

    let session = RecordingSession::new(
        source,
        Arc::new(GstWriterFactory::new()),
        Arc::new(GstRemuxTranscoder::new()),
        settings_in(dir.path()),
    );
    session.start(StartOptions::default()).unwrap();
    let intermediate = session.current_output().unwrap();

    assert_eq!(session.stop().await, None);
    assert!(!intermediate.exists());
    assert_eq!(session.state(), RecordingState::Idle);
}
