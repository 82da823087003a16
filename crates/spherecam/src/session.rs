//! Capture session state machine.
//!
//! Arming a session snapshots the render settings it is about to change and
//! which proxies already existed. Finalizing puts all of it back, removes
//! the proxies the session created, and packages the output directory.

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use spherecam_core::{
    CaptureKind, ObjectHandle, Properties, ProxyKind, Result, SceneStore, SphereCamError,
};

use crate::archive::{clean_name, package_and_remove, Archiver};
use crate::proxy::ProxyManager;

/// Scene state captured when a session is armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSnapshot {
    pub frame_step: i64,
    pub frame_end: i64,
    pub active_camera: Option<ObjectHandle>,
    pub output_path: PathBuf,
    pub sphere_existed: bool,
    pub camera_existed: bool,
}

impl SceneSnapshot {
    fn capture<S>(store: &S, proxies: &ProxyManager) -> Self
    where
        S: SceneStore + ?Sized,
    {
        let render = store.render_settings();
        Self {
            frame_step: render.frame_step,
            frame_end: render.frame_end,
            active_camera: render.active_camera,
            output_path: render.output_path.clone(),
            sphere_existed: proxies.exists(ProxyKind::Sphere),
            camera_existed: proxies.exists(ProxyKind::Camera),
        }
    }
}

/// An armed or running capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    kind: CaptureKind,
    output_dir: PathBuf,
    snapshot: SceneSnapshot,
    frames_captured: u64,
}

impl CaptureSession {
    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// Directory frames are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn snapshot(&self) -> &SceneSnapshot {
        &self.snapshot
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

/// Where the state machine currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Settings are applied, no frame captured yet.
    Armed(CaptureSession),
    /// At least one frame captured.
    Running(CaptureSession),
}

/// Payload-free view of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Armed,
    Running,
}

/// Owns the single capture session.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Armed(_) => SessionPhase::Armed,
            SessionState::Running(_) => SessionPhase::Running,
        }
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&CaptureSession> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Armed(session) | SessionState::Running(session) => Some(session),
        }
    }

    /// Kind of the active session, if any.
    pub fn active_kind(&self) -> Option<CaptureKind> {
        self.session().map(CaptureSession::kind)
    }

    /// Starts a session of `kind`.
    ///
    /// Creates the output directory, snapshots the scene, then applies the
    /// frame range and output path for the kind. Showing the camera proxy for
    /// [`CaptureKind::CameraOnSphere`] is left to the caller, after this
    /// returns, so the snapshot sees the proxies as they were.
    ///
    /// Returns the output directory.
    pub fn arm<S>(
        &mut self,
        kind: CaptureKind,
        props: &Properties,
        proxies: &ProxyManager,
        store: &mut S,
    ) -> Result<PathBuf>
    where
        S: SceneStore + ?Sized,
    {
        if let Some(active) = self.active_kind() {
            log::warn!("cannot arm {kind}: {active} session is active");
            return Err(SphereCamError::SessionAlreadyActive(active));
        }
        props.validate()?;
        let save_path = &props.capture.save_path;
        if save_path.as_os_str().is_empty() {
            return Err(SphereCamError::InvalidConfig(
                "capture save path is not set".to_string(),
            ));
        }

        let output_dir = save_path.join(clean_name(props.capture.dataset_name(kind)));
        fs::create_dir_all(&output_dir)?;

        let snapshot = SceneSnapshot::capture(&*store, proxies);
        let render = store.render_settings_mut();
        match kind {
            CaptureKind::StillFrames => {
                render.frame_step = props.capture.still_frames.frame_step;
            }
            CaptureKind::TimeCrop => {
                render.frame_end =
                    render.frame_start + i64::from(props.capture.time_crop.frame_count) - 1;
            }
            CaptureKind::CameraOnSphere => {
                render.frame_end = render.frame_start + i64::from(props.orbit_frames) - 1;
            }
        }
        render.output_path.clone_from(&output_dir);

        log::info!(
            "armed {kind} capture into {} (frames {}..={} step {})",
            output_dir.display(),
            render.frame_start,
            render.frame_end,
            render.frame_step
        );
        self.state = SessionState::Armed(CaptureSession {
            kind,
            output_dir: output_dir.clone(),
            snapshot,
            frames_captured: 0,
        });
        Ok(output_dir)
    }

    /// Counts a captured frame.
    ///
    /// Returns the active kind, or `None` when no session is active.
    pub fn record_frame(&mut self) -> Option<CaptureKind> {
        self.state = match mem::take(&mut self.state) {
            SessionState::Idle => return None,
            SessionState::Armed(mut session) | SessionState::Running(mut session) => {
                session.frames_captured += 1;
                SessionState::Running(session)
            }
        };
        self.active_kind()
    }

    /// Ends the active session and archives its output.
    ///
    /// Returns the archive path, or `None` if no session was active. The
    /// machine is idle afterwards even when archiving fails, in which case
    /// the output directory is kept and the failure returned.
    pub fn finalize<S>(
        &mut self,
        props: &mut Properties,
        proxies: &mut ProxyManager,
        store: &mut S,
        archiver: &dyn Archiver,
    ) -> Result<Option<PathBuf>>
    where
        S: SceneStore + ?Sized,
    {
        let Some(session) = self.take_session() else {
            log::info!("capture completed with no active session");
            return Ok(None);
        };

        restore(&session, props, proxies, store)?;
        log::info!(
            "{} capture finished after {} frame(s)",
            session.kind,
            session.frames_captured
        );
        package_and_remove(archiver, &session.output_dir).map(Some)
    }

    /// Ends the active session without archiving.
    ///
    /// Used when arming could not complete. The output directory is removed
    /// if nothing was written to it.
    pub fn abort<S>(
        &mut self,
        props: &mut Properties,
        proxies: &mut ProxyManager,
        store: &mut S,
    ) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        let Some(session) = self.take_session() else {
            return Ok(());
        };
        restore(&session, props, proxies, store)?;
        // Fails harmlessly when frames were already written.
        let _ = fs::remove_dir(&session.output_dir);
        log::warn!("{} capture aborted", session.kind);
        Ok(())
    }

    fn take_session(&mut self) -> Option<CaptureSession> {
        match mem::take(&mut self.state) {
            SessionState::Idle => None,
            SessionState::Armed(session) | SessionState::Running(session) => Some(session),
        }
    }
}

/// Undoes everything arming a session changed.
fn restore<S>(
    session: &CaptureSession,
    props: &mut Properties,
    proxies: &mut ProxyManager,
    store: &mut S,
) -> Result<()>
where
    S: SceneStore + ?Sized,
{
    let snapshot = &session.snapshot;
    {
        let render = store.render_settings_mut();
        match session.kind {
            CaptureKind::StillFrames => render.frame_step = snapshot.frame_step,
            CaptureKind::TimeCrop => render.frame_end = snapshot.frame_end,
            CaptureKind::CameraOnSphere => {
                render.frame_end = snapshot.frame_end;
                render.active_camera = snapshot.active_camera;
            }
        }
    }

    if session.kind == CaptureKind::CameraOnSphere {
        if !snapshot.camera_existed {
            proxies.remove_camera_proxy(store)?;
            props.show_camera = false;
        }
        if !snapshot.sphere_existed {
            proxies.remove_sphere_proxy(store)?;
            props.show_sphere = false;
        }
    }

    store.render_settings_mut().output_path.clone_from(&snapshot.output_path);
    Ok(())
}
