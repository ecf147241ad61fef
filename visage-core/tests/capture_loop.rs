use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, bail};
use image::{Rgb, RgbImage};
use visage_core::{
    CameraBackend, CaptureConfig, CaptureLoop, FrameGrabber, available_cameras,
};

/// Devices listed in `available` open; each frame is a single flat colour that changes on
/// every read, so a torn frame shows up as mixed pixel values.
struct FakeBackend {
    available: Vec<u32>,
    grab_delay: Duration,
}

struct FakeGrabber {
    width: u32,
    height: u32,
    shade: Arc<AtomicU8>,
    delay: Duration,
}

impl FrameGrabber for FakeGrabber {
    fn grab(&mut self) -> Result<RgbImage> {
        thread::sleep(self.delay);
        let shade = self.shade.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([shade, shade, shade]),
        ))
    }
}

impl CameraBackend for FakeBackend {
    fn open(&self, index: u32, width: u32, height: u32) -> Result<Box<dyn FrameGrabber>> {
        if !self.available.contains(&index) {
            bail!("no device at index {index}");
        }
        Ok(Box::new(FakeGrabber {
            width,
            height,
            shade: Arc::new(AtomicU8::new(0)),
            delay: self.grab_delay,
        }))
    }
}

fn backend(available: &[u32]) -> Arc<FakeBackend> {
    Arc::new(FakeBackend {
        available: available.to_vec(),
        grab_delay: Duration::ZERO,
    })
}

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        frame_interval: Duration::from_millis(2),
        stop_timeout: Duration::from_secs(1),
    }
}

fn wait_for_frame(capture: &CaptureLoop) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if capture.get_frame().is_some() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn frames_flow_between_start_and_stop() {
    let mut capture = CaptureLoop::new(backend(&[0]), fast_config());
    assert!(capture.get_frame().is_none());
    assert!(!capture.is_running());

    assert!(capture.start(0, 64, 48));
    assert!(capture.is_running());
    assert!(wait_for_frame(&capture), "no frame captured");
    let frame = capture.get_frame().unwrap();
    assert_eq!(frame.dimensions(), (64, 48));

    capture.stop();
    assert!(!capture.is_running());
    assert!(capture.get_frame().is_none());

    // Stopping twice is harmless.
    capture.stop();
}

#[test]
fn start_reports_unopenable_devices_and_ignores_restarts() {
    let mut capture = CaptureLoop::new(backend(&[1]), fast_config());
    assert!(!capture.start(0, 32, 32));
    assert!(!capture.is_running());

    assert!(capture.start(1, 32, 32));
    assert!(capture.start(0, 32, 32), "already running");
    assert!(wait_for_frame(&capture));
    assert_eq!(capture.get_frame().unwrap().dimensions(), (32, 32));
}

#[test]
fn concurrent_readers_never_see_torn_frames() {
    let mut capture = CaptureLoop::new(backend(&[0]), fast_config());
    assert!(capture.start(0, 320, 240));
    assert!(wait_for_frame(&capture));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let latest = capture.latest();
            thread::spawn(move || {
                let deadline = Instant::now() + Duration::from_millis(300);
                let mut checked = 0;
                while Instant::now() < deadline {
                    if let Some(frame) = latest.get() {
                        let first = *frame.image.get_pixel(0, 0);
                        assert!(frame.image.pixels().all(|p| *p == first));
                        checked += 1;
                    }
                }
                checked
            })
        })
        .collect();

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    capture.stop();
}

#[test]
fn stop_returns_even_when_the_device_blocks() {
    let slow = Arc::new(FakeBackend {
        available: vec![0],
        grab_delay: Duration::from_millis(1500),
    });
    let mut capture = CaptureLoop::new(
        slow,
        CaptureConfig {
            frame_interval: Duration::from_millis(1),
            stop_timeout: Duration::from_millis(100),
        },
    );
    assert!(capture.start(0, 8, 8));

    let begun = Instant::now();
    capture.stop();
    assert!(begun.elapsed() < Duration::from_millis(1000));
    assert!(!capture.is_running());
    assert!(capture.get_frame().is_none());
}

#[test]
fn dropping_a_running_loop_stops_it() {
    let capture_backend = backend(&[0]);
    let mut capture = CaptureLoop::new(capture_backend, fast_config());
    assert!(capture.start(0, 16, 16));
    let latest = capture.latest();
    drop(capture);
    assert!(latest.get().is_none());
}

#[test]
fn probing_stops_at_first_gap_after_index_zero() {
    let found = available_cameras(backend(&[0, 1, 2, 4]).as_ref(), 10);
    let indices: Vec<u32> = found.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(found[1].name, "Camera 1");

    let without_zero = available_cameras(backend(&[1, 2, 5]).as_ref(), 10);
    let indices: Vec<u32> = without_zero.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1, 2]);

    assert!(available_cameras(backend(&[]).as_ref(), 10).is_empty());
    assert!(available_cameras(backend(&[0]).as_ref(), 0).is_empty());
}
