//! `cameras` and `snapshot` subcommands.

use std::{
    fs,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use log::info;
use visage_core::{
    BatchProcessor, CameraBackend, CaptureConfig, CaptureLoop, available_cameras,
};
use visage_utils::AppSettings;

use crate::{
    args::{CamerasArgs, SnapshotArgs},
    config::{analyzer_factory, resolve_actions},
    report::format_record,
};

/// How long `snapshot` keeps polling for a first frame after the warm-up.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(feature = "webcam")]
fn camera_backend() -> Result<Arc<dyn CameraBackend>> {
    Ok(Arc::new(visage_core::NokhwaBackend))
}

#[cfg(not(feature = "webcam"))]
fn camera_backend() -> Result<Arc<dyn CameraBackend>> {
    bail!("camera support is not compiled in; rebuild with `--features webcam`")
}

pub fn run_cameras(args: &CamerasArgs, settings: &AppSettings) -> Result<()> {
    let backend = camera_backend()?;
    let max = args.max.unwrap_or(settings.camera.max_probe);
    let cameras = available_cameras(backend.as_ref(), max);
    if cameras.is_empty() {
        println!("No cameras found");
        return Ok(());
    }
    for camera in cameras {
        println!("[{}] {}", camera.index, camera.name);
    }
    Ok(())
}

pub fn run_snapshot(args: &SnapshotArgs, settings: &AppSettings) -> Result<()> {
    let actions = if args.analyze {
        Some(resolve_actions(settings, args.actions.as_ref())?)
    } else {
        None
    };
    let processor = match actions {
        Some(_) => Some(BatchProcessor::new(analyzer_factory(settings)?)),
        None => None,
    };

    let camera = &settings.camera;
    let device = args.device.unwrap_or(camera.device_index);
    let width = args.width.unwrap_or(camera.width);
    let height = args.height.unwrap_or(camera.height);

    let mut capture = CaptureLoop::new(camera_backend()?, CaptureConfig::from(camera));
    if !capture.start(device, width, height) {
        bail!("could not open camera {device}");
    }
    thread::sleep(Duration::from_millis(args.warmup_ms));

    let deadline = Instant::now() + FIRST_FRAME_TIMEOUT;
    let frame = loop {
        if let Some(frame) = capture.get_frame() {
            break frame;
        }
        if Instant::now() >= deadline {
            bail!("camera {device} delivered no frame");
        }
        thread::sleep(Duration::from_millis(20));
    };
    capture.stop();

    let (w, h) = frame.dimensions();
    info!(
        "Captured {}x{} frame at {}",
        w,
        h,
        frame.captured_at.to_rfc3339()
    );

    if let Some(path) = args.save.as_ref() {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        frame
            .image
            .save(path)
            .with_context(|| format!("failed to save frame to {}", path.display()))?;
        println!("Saved frame to {}", path.display());
    }

    if let (Some(processor), Some(actions)) = (processor, actions) {
        match processor.analyze_image(&frame.to_dynamic(), &actions) {
            Some(record) => print!("{}", format_record(&record)),
            None => bail!("no face detected in the captured frame"),
        }
    }
    Ok(())
}
