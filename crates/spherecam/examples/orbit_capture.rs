//! Runs a camera-on-sphere capture against an in-memory scene.
//!
//! Each "rendered" frame writes the camera pose to a text file, and the
//! output directory is zipped when the capture completes.
//!
//! Run with `RUST_LOG=info` to see what the controller does.

use std::fs;

use spherecam::*;

fn main() -> Result<()> {
    env_logger::init();

    let mut props = Properties::default();
    props.capture.save_path = std::env::temp_dir().join("spherecam-demo");
    props.capture.camera_on_sphere.dataset_name = "orbit demo".to_string();
    props.trajectory.trajectory = Trajectory::SequentialSpiral;
    props.trajectory.upper_hemisphere_only = true;
    props.sphere.radius = 3.0;
    props.orbit_frames = 24;

    let mut controller = Controller::new(MemoryScene::new(), props)?;
    controller.scene_recomputed()?;

    let output = controller.begin_capture(CaptureKind::CameraOnSphere)?;
    let (start, end) = {
        let render = controller.store().render_settings();
        (render.frame_start, render.frame_end)
    };

    for frame in start..=end {
        controller.frame_changed(frame)?;
        let camera = controller
            .proxies()
            .camera()
            .ok_or(SphereCamError::MissingProxy(ProxyKind::Camera))?;
        let transform = controller
            .store()
            .transform(camera)
            .ok_or(SphereCamError::ObjectNotFound(camera))?;
        fs::write(
            output.join(format!("frame_{frame:04}.txt")),
            format!("location {}\nrotation {}\n", transform.location, transform.rotation),
        )?;
    }

    match controller.capture_completed()? {
        Some(archive) => println!("wrote {}", archive.display()),
        None => println!("no capture was active"),
    }
    Ok(())
}
