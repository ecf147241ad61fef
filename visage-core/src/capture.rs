//! Background camera capture with a shared latest-frame slot.
//!
//! The device is opened on the capture thread itself because some camera drivers hand out
//! handles that cannot cross threads. [`CaptureLoop::start`] waits for the open attempt and
//! reports it as a boolean.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};
use log::{debug, info, trace, warn};
use visage_utils::CameraSettings;

const PROBE_WIDTH: u32 = 640;
const PROBE_HEIGHT: u32 = 480;

/// Single-writer, many-reader cell. Reads return an owned copy, so a reader never observes
/// a value while it is being replaced.
#[derive(Debug, Default)]
pub struct LatestValue<T> {
    slot: Mutex<Option<T>>,
}

impl<T: Clone> LatestValue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn set(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn get(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// One RGB frame and the moment it was read.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Copy suitable for the inference gateway.
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.image.clone())
    }
}

/// An open device. Lives on the capture thread only.
pub trait FrameGrabber {
    fn grab(&mut self) -> Result<RgbImage>;
}

/// Opens camera devices by index.
pub trait CameraBackend: Send + Sync + 'static {
    /// `width`/`height` are hints; the device may deliver another size.
    fn open(&self, index: u32, width: u32, height: u32) -> Result<Box<dyn FrameGrabber>>;

    fn describe(&self, index: u32) -> String {
        format!("Camera {index}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Pause after each frame read.
    pub frame_interval: Duration,
    /// Bound on how long `stop` waits for the thread before detaching it.
    pub stop_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&CameraSettings> for CaptureConfig {
    fn from(settings: &CameraSettings) -> Self {
        Self {
            frame_interval: Duration::from_millis(settings.frame_interval_ms.max(1)),
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
        }
    }
}

struct Worker {
    device_index: u32,
    stop: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Continuously reads frames from one device into a [`LatestValue`].
pub struct CaptureLoop {
    backend: Arc<dyn CameraBackend>,
    config: CaptureConfig,
    latest: Arc<LatestValue<CapturedFrame>>,
    worker: Option<Worker>,
}

impl CaptureLoop {
    pub fn new(backend: Arc<dyn CameraBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            latest: Arc::new(LatestValue::new()),
            worker: None,
        }
    }

    /// Open `device_index` and start capturing. Returns `false` when the device cannot be
    /// opened; returns `true` without reopening when already running.
    pub fn start(&mut self, device_index: u32, width: u32, height: u32) -> bool {
        if let Some(worker) = &self.worker {
            debug!(
                "Capture already running on device {}",
                worker.device_index
            );
            return true;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (open_tx, open_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let backend = Arc::clone(&self.backend);
        let latest = Arc::clone(&self.latest);
        let interval = self.config.frame_interval;
        let thread_stop = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name(format!("visage-capture-{device_index}"))
            .spawn(move || {
                let grabber = match backend.open(device_index, width, height) {
                    Ok(grabber) => {
                        let _ = open_tx.send(Ok(()));
                        grabber
                    }
                    Err(err) => {
                        let _ = open_tx.send(Err(format!("{err:#}")));
                        return;
                    }
                };
                run_capture(grabber, &latest, &thread_stop, interval);
                let _ = done_tx.send(());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                warn!("Failed to spawn capture thread: {err}");
                return false;
            }
        };

        match open_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    "Capture started on device {} ({}x{} requested)",
                    device_index, width, height
                );
                self.worker = Some(Worker {
                    device_index,
                    stop,
                    done_rx,
                    handle,
                });
                true
            }
            Ok(Err(message)) => {
                warn!("Could not open camera {device_index}: {message}");
                let _ = handle.join();
                false
            }
            Err(_) => {
                warn!("Capture thread for camera {device_index} exited before opening");
                let _ = handle.join();
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Owned copy of the most recent frame.
    pub fn get_frame(&self) -> Option<CapturedFrame> {
        self.latest.get()
    }

    /// Shared handle to the frame slot for readers on other threads.
    pub fn latest(&self) -> Arc<LatestValue<CapturedFrame>> {
        Arc::clone(&self.latest)
    }

    /// Stop capturing and release the device. No-op when not running.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::SeqCst);
        match worker.done_rx.recv_timeout(self.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!("Capture thread for camera {} panicked", worker.device_index);
                }
                info!("Capture stopped on device {}", worker.device_index);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Capture thread for camera {} did not stop within {:?}; detaching",
                    worker.device_index, self.config.stop_timeout
                );
            }
        }
        self.latest.clear();
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    mut grabber: Box<dyn FrameGrabber>,
    latest: &LatestValue<CapturedFrame>,
    stop: &AtomicBool,
    interval: Duration,
) {
    let mut frames = 0u64;
    while !stop.load(Ordering::SeqCst) {
        match grabber.grab() {
            Ok(image) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                latest.set(CapturedFrame::new(image));
                frames += 1;
            }
            Err(err) => trace!("Frame read failed: {err:#}"),
        }
        thread::sleep(interval);
    }
    debug!("Capture loop exiting after {frames} frame(s)");
}

/// A device found by [`available_cameras`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
}

/// Probe indices `0..max`. The first index above zero that fails to open ends the scan.
pub fn available_cameras(backend: &dyn CameraBackend, max: u32) -> Vec<CameraInfo> {
    let mut cameras = Vec::new();
    for index in 0..max {
        match backend.open(index, PROBE_WIDTH, PROBE_HEIGHT) {
            Ok(grabber) => {
                drop(grabber);
                cameras.push(CameraInfo {
                    index,
                    name: backend.describe(index),
                });
            }
            Err(err) => {
                debug!("Camera {index} unavailable: {err:#}");
                if index > 0 {
                    break;
                }
            }
        }
    }
    cameras
}

#[cfg(feature = "webcam")]
mod native {
    use super::*;
    use visage_utils::{WebcamCapture, list_webcam_devices};

    /// Real devices through `nokhwa`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NokhwaBackend;

    impl FrameGrabber for WebcamCapture {
        fn grab(&mut self) -> Result<RgbImage> {
            self.read_frame()
        }
    }

    impl CameraBackend for NokhwaBackend {
        fn open(&self, index: u32, width: u32, height: u32) -> Result<Box<dyn FrameGrabber>> {
            let capture = WebcamCapture::open(index, width, height)?;
            let (actual_w, actual_h) = capture.resolution();
            debug!("Camera {index} streaming at {actual_w}x{actual_h}");
            Ok(Box::new(capture))
        }

        fn describe(&self, index: u32) -> String {
            list_webcam_devices()
                .ok()
                .and_then(|devices| {
                    devices
                        .into_iter()
                        .find(|(idx, _)| *idx == index)
                        .map(|(_, name)| name)
                })
                .unwrap_or_else(|| format!("Camera {index}"))
        }
    }
}

#[cfg(feature = "webcam")]
pub use native::NokhwaBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_replaces_and_clears() {
        let cell = LatestValue::new();
        assert!(cell.is_empty());
        cell.set(1);
        cell.set(2);
        assert_eq!(cell.get(), Some(2));
        cell.clear();
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn config_from_settings_clamps_interval() {
        let settings = CameraSettings {
            frame_interval_ms: 0,
            stop_timeout_ms: 250,
            ..CameraSettings::default()
        };
        let config = CaptureConfig::from(&settings);
        assert_eq!(config.frame_interval, Duration::from_millis(1));
        assert_eq!(config.stop_timeout, Duration::from_millis(250));
    }

    #[test]
    fn captured_frame_converts_to_dynamic() {
        let frame = CapturedFrame::new(RgbImage::new(4, 3));
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.to_dynamic().width(), 4);
    }
}
