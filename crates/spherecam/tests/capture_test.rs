//! Integration tests for capture sessions driven through the controller.

use std::fs;
use std::path::{Path, PathBuf};

use spherecam::*;

fn controller_in(dir: &Path) -> Controller<MemoryScene> {
    let mut props = Properties::default();
    props.capture.save_path = dir.to_path_buf();
    props.capture.camera_on_sphere.dataset_name = "orbit set".to_string();
    props.orbit_frames = 8;
    Controller::new(MemoryScene::new(), props).unwrap()
}

struct BrokenArchiver;

impl Archiver for BrokenArchiver {
    fn archive(&self, source: &Path, _destination_stem: &Path) -> Result<PathBuf> {
        Err(SphereCamError::ArchiveFailed {
            dir: source.to_path_buf(),
            reason: "no space left on device".to_string(),
        })
    }
}

#[test]
fn test_orbit_capture_restores_scene() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    let before = ctl.store().render_settings().clone();

    let output = ctl.begin_capture(CaptureKind::CameraOnSphere).unwrap();
    assert_eq!(output, tmp.path().join("orbit_set"));
    let camera = ctl.proxies().camera().unwrap();
    {
        let render = ctl.store().render_settings();
        assert_eq!(render.active_camera, Some(camera));
        assert_eq!(render.frame_end, render.frame_start + 7);
        assert_eq!(render.output_path, output);
    }

    let mut positions = Vec::new();
    for frame in 1..=8 {
        ctl.frame_changed(frame).unwrap();
        positions.push(ctl.store().transform(camera).unwrap().location);
        fs::write(output.join(format!("{frame:04}.png")), b"frame").unwrap();
    }
    assert_eq!(ctl.phase(), SessionPhase::Running);
    assert_eq!(ctl.session().session().unwrap().frames_captured(), 8);
    positions.dedup();
    assert_eq!(positions.len(), 8);

    let archive = ctl.capture_completed().unwrap();
    assert_eq!(archive, Some(tmp.path().join("orbit_set.zip")));
    assert!(!output.exists());

    // Proxies created for the session are gone, and the scene is as before.
    assert!(ctl.store().is_empty());
    assert_eq!(ctl.store().camera_data_len(), 0);
    assert!(!ctl.properties().show_camera);
    assert!(!ctl.properties().show_sphere);
    let mut after = ctl.store().render_settings().clone();
    after.frame_current = before.frame_current;
    assert_eq!(after, before);
    assert_eq!(ctl.phase(), SessionPhase::Idle);
}

#[test]
fn test_orbit_capture_keeps_user_proxies() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    ctl.set_property(PropertyChange::ShowSphere(true)).unwrap();
    let sphere = ctl.proxies().sphere();

    ctl.begin_capture(CaptureKind::CameraOnSphere).unwrap();
    ctl.frame_changed(1).unwrap();
    ctl.capture_completed().unwrap();

    // The sphere existed before the session; the camera did not.
    assert_eq!(ctl.proxies().sphere(), sphere);
    assert!(ctl.properties().show_sphere);
    assert!(!ctl.proxies().exists(ProxyKind::Camera));
    assert!(!ctl.properties().show_camera);
    assert_eq!(ctl.store().len(), 1);
}

#[test]
fn test_still_frames_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    let before = ctl.store().render_settings().clone();

    let output = ctl.begin_capture(CaptureKind::StillFrames).unwrap();
    assert_eq!(output, tmp.path().join("dataset"));
    assert_eq!(ctl.store().render_settings().frame_step, 3);
    assert!(ctl.store().is_empty());

    let archive = ctl.capture_completed().unwrap();
    assert!(archive.unwrap().is_file());
    assert_eq!(ctl.store().render_settings(), &before);
}

#[test]
fn test_second_capture_rejected_while_active() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    ctl.begin_capture(CaptureKind::TimeCrop).unwrap();

    let err = ctl.begin_capture(CaptureKind::CameraOnSphere);
    assert!(matches!(
        err,
        Err(SphereCamError::SessionAlreadyActive(CaptureKind::TimeCrop))
    ));
    assert!(!ctl.proxies().exists(ProxyKind::Camera));
    assert_eq!(ctl.session().active_kind(), Some(CaptureKind::TimeCrop));
}

#[test]
fn test_completion_without_session_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    assert_eq!(ctl.capture_completed().unwrap(), None);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_archive_failure_keeps_output() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path()).with_archiver(BrokenArchiver);
    let before = ctl.store().render_settings().clone();

    let output = ctl.begin_capture(CaptureKind::TimeCrop).unwrap();
    fs::write(output.join("0001.png"), b"frame").unwrap();

    let err = ctl.capture_completed();
    assert!(matches!(err, Err(SphereCamError::ArchiveFailed { .. })));
    assert!(output.join("0001.png").is_file());
    // Scene settings are restored before archiving is attempted.
    assert_eq!(ctl.store().render_settings(), &before);
    assert_eq!(ctl.phase(), SessionPhase::Idle);
}

#[test]
fn test_failed_camera_setup_aborts_session() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    let before = ctl.store().render_settings().clone();

    // With panel-to-proxy sync disabled the camera proxy is never created.
    let err = ctl.with_suppressed(SyncDirection::UiToProxy, |ctl| {
        ctl.begin_capture(CaptureKind::CameraOnSphere)
    });
    assert!(matches!(
        err,
        Err(SphereCamError::MissingProxy(ProxyKind::Camera))
    ));
    assert_eq!(ctl.phase(), SessionPhase::Idle);
    assert_eq!(ctl.store().render_settings(), &before);
    assert!(!tmp.path().join("orbit_set").exists());
}

#[test]
fn test_dot_dot_dataset_name_stays_inside_save_path() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("projects");
    let captures = project.join("captures");
    fs::create_dir_all(&captures).unwrap();
    fs::write(project.join("scene.blend"), b"project").unwrap();

    let mut props = Properties::default();
    props.capture.save_path = captures.clone();
    props.capture.time_crop.dataset_name = "..".to_string();
    let mut ctl = Controller::new(MemoryScene::new(), props).unwrap();
    let output = ctl.begin_capture(CaptureKind::TimeCrop).unwrap();
    assert_eq!(output, captures.join("__"));

    let archive = ctl.capture_completed().unwrap();
    assert_eq!(archive, Some(captures.join("__.zip")));
    assert!(project.join("scene.blend").is_file());
    assert!(captures.is_dir());
}

#[test]
fn test_recapture_replaces_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctl = controller_in(tmp.path());
    fs::write(tmp.path().join("dataset.zip"), b"old run").unwrap();

    ctl.begin_capture(CaptureKind::StillFrames).unwrap();
    let archive = ctl.capture_completed().unwrap().unwrap();

    assert_ne!(fs::read(&archive).unwrap(), b"old run");
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}
