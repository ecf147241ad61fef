//! Webcam access through `nokhwa`.
//!
//! `nokhwa::Camera` is not `Send` on every platform, so a [`WebcamCapture`] must be opened
//! on the thread that reads from it.

use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use log::{debug, info, warn};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
};

/// An open camera stream delivering RGB frames.
pub struct WebcamCapture {
    camera: Camera,
    device_index: u32,
}

impl WebcamCapture {
    /// Opens `device_index` and asks the driver for `width`x`height`.
    ///
    /// The driver may pick a different resolution; the request is a hint only.
    pub fn open(device_index: u32, width: u32, height: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        debug!(
            "Opening camera {} with requested resolution {}x{}",
            device_index, width, height
        );

        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .with_context(|| format!("failed to open camera {device_index}"))?;

        // Some drivers reject resolution changes until the stream is open.
        camera
            .open_stream()
            .with_context(|| format!("failed to open stream for camera {device_index}"))?;

        if let Err(err) = camera.set_resolution(Resolution::new(width, height)) {
            warn!(
                "Camera {} rejected resolution {}x{}: {}",
                device_index, width, height, err
            );
        }

        let actual = camera.resolution();
        info!(
            "Camera {} streaming at {}x{}",
            device_index,
            actual.width(),
            actual.height()
        );

        Ok(Self {
            camera,
            device_index,
        })
    }

    /// Blocks until the next frame is available and decodes it to RGB.
    pub fn read_frame(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .with_context(|| format!("failed to read frame from camera {}", self.device_index))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("failed to decode camera frame")?;

        // nokhwa links its own `image` version, so hand the raw bytes across.
        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| anyhow!("camera frame buffer does not match {width}x{height}"))
    }

    /// Returns the resolution negotiated with the driver.
    pub fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            warn!("Failed to stop camera {}: {}", self.device_index, err);
        } else {
            debug!("Camera {} released", self.device_index);
        }
    }
}

/// Lists camera devices known to the platform backend as `(index, human name)`.
pub fn list_webcam_devices() -> Result<Vec<(u32, String)>> {
    let devices = query(ApiBackend::Auto).context("failed to query camera devices")?;
    Ok(devices
        .iter()
        .enumerate()
        .map(|(idx, info)| (idx as u32, info.human_name().to_string()))
        .collect())
}
