//! The controller tying panel properties, proxies and capture sessions to
//! the host's lifecycle callbacks.

use std::path::PathBuf;
use std::rc::Rc;

use spherecam_core::{
    CaptureKind, Properties, ProxyKind, Result, SceneStore, SphereCamError,
};

use crate::archive::{Archiver, ZipArchiver};
use crate::events::{CallbackRegistry, EventQueue, Handler, HostEvent};
use crate::proxy::{orbit_pose, ProxyManager};
use crate::session::{SessionMachine, SessionPhase};
use crate::sync::{PropertyChange, SyncController, SyncDirection, SyncStats};

/// Owns all controller state for one open scene.
///
/// The host reports what happened through [`set_property`](Self::set_property),
/// [`scene_recomputed`](Self::scene_recomputed),
/// [`frame_changed`](Self::frame_changed) and
/// [`capture_completed`](Self::capture_completed). Each call queues a
/// notification and runs registered callbacks until the queue is empty.
pub struct Controller<S: SceneStore> {
    store: S,
    props: Properties,
    proxies: ProxyManager,
    sync: SyncController,
    session: SessionMachine,
    queue: EventQueue,
    callbacks: CallbackRegistry,
    archiver: Box<dyn Archiver>,
    last_archive: Option<PathBuf>,
}

impl<S: SceneStore> Controller<S> {
    /// Creates a controller with the standard callbacks registered.
    pub fn new(store: S, props: Properties) -> Result<Self> {
        props.validate()?;
        Ok(Self {
            store,
            props,
            proxies: ProxyManager::new(),
            sync: SyncController::new(),
            session: SessionMachine::new(),
            queue: EventQueue::new(),
            callbacks: CallbackRegistry::with_defaults(),
            archiver: Box::new(ZipArchiver::new()),
            last_archive: None,
        })
    }

    /// Replaces the archiver used when a capture completes.
    #[must_use]
    pub fn with_archiver(mut self, archiver: impl Archiver + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct access to the scene, as the user editing it in the host.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    pub fn proxies(&self) -> &ProxyManager {
        &self.proxies
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Runs `f` with a sync direction disabled.
    ///
    /// Notifications of that direction raised inside `f` are dropped.
    pub fn with_suppressed<R>(
        &mut self,
        direction: SyncDirection,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let guard = Rc::clone(self.sync.guard());
        let _suppression = guard.suppress(direction);
        f(self)
    }

    /// Applies a panel edit and runs the callbacks it triggers.
    ///
    /// Invalid values are rejected before anything changes.
    pub fn set_property(&mut self, change: PropertyChange) -> Result<()> {
        let property = change.property();
        change.apply(&mut self.props)?;
        self.queue
            .push(HostEvent::PropertyChanged(property), self.sync.guard());
        self.pump()
    }

    /// Reports that the host re-evaluated the scene.
    pub fn scene_recomputed(&mut self) -> Result<()> {
        self.queue.push(HostEvent::SceneRecomputed, self.sync.guard());
        self.pump()
    }

    /// Reports that the host moved to `frame`.
    pub fn frame_changed(&mut self, frame: i64) -> Result<()> {
        self.store.render_settings_mut().frame_current = frame;
        self.queue
            .push(HostEvent::FrameRendered(frame), self.sync.guard());
        self.pump()
    }

    /// Arms a capture session of `kind`.
    ///
    /// For [`CaptureKind::CameraOnSphere`] the camera proxy is shown,
    /// creating the sphere proxy if needed, and becomes the active camera.
    /// Returns the output directory frames should be written to.
    pub fn begin_capture(&mut self, kind: CaptureKind) -> Result<PathBuf> {
        let output_dir = self
            .session
            .arm(kind, &self.props, &self.proxies, &mut self.store)?;

        if kind == CaptureKind::CameraOnSphere {
            if let Err(err) = self.activate_orbit_camera() {
                log::error!("could not set up the orbit camera: {err}");
                self.session
                    .abort(&mut self.props, &mut self.proxies, &mut self.store)?;
                return Err(err);
            }
        }
        Ok(output_dir)
    }

    fn activate_orbit_camera(&mut self) -> Result<()> {
        self.set_property(PropertyChange::ShowCamera(true))?;
        let camera = self
            .proxies
            .camera()
            .ok_or(SphereCamError::MissingProxy(ProxyKind::Camera))?;
        self.store.render_settings_mut().active_camera = Some(camera);
        Ok(())
    }

    /// Reports that the host finished rendering.
    ///
    /// Returns the archive written for the session, or `None` when no
    /// session was active.
    pub fn capture_completed(&mut self) -> Result<Option<PathBuf>> {
        self.last_archive = None;
        self.queue.push(HostEvent::CaptureCompleted, self.sync.guard());
        self.pump()?;
        Ok(self.last_archive.take())
    }

    /// Dispatches queued events until none are left.
    fn pump(&mut self) -> Result<()> {
        while let Some(event) = self.queue.next_event()? {
            for handler in self.callbacks.take_handlers(event.lifecycle()) {
                if let Err(err) = self.run(handler, event) {
                    self.queue.clear();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, handler: Handler, event: HostEvent) -> Result<()> {
        log::trace!("{handler:?} <- {event:?}");
        match (handler, event) {
            (Handler::InitDefaults, _) => {
                self.init_defaults();
                Ok(())
            }
            (Handler::ToggleProxies, HostEvent::PropertyChanged(property))
                if property.is_visibility() =>
            {
                self.sync.apply_visibility(
                    property,
                    &mut self.props,
                    &mut self.proxies,
                    &mut self.store,
                    &mut self.queue,
                )
            }
            (Handler::SyncUiToProxy, HostEvent::PropertyChanged(property))
                if !property.is_visibility() =>
            {
                self.sync
                    .push_ui_to_proxy(&self.props, &self.proxies, &mut self.store, &mut self.queue)
            }
            (Handler::SyncProxyToUi, _) => {
                let loss = self.sync.pull_proxy_to_ui(
                    &mut self.props,
                    &mut self.proxies,
                    &mut self.store,
                    &mut self.queue,
                )?;
                if !loss.is_empty() {
                    log::info!("proxies lost: {loss:?}");
                }
                Ok(())
            }
            (Handler::FollowOrbit, HostEvent::FrameRendered(_)) => self.follow_orbit(),
            (Handler::FinalizeCapture, _) => {
                self.last_archive = self.session.finalize(
                    &mut self.props,
                    &mut self.proxies,
                    &mut self.store,
                    &*self.archiver,
                )?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Defaults that need a loaded scene.
    fn init_defaults(&mut self) {
        if !self.props.capture.save_path.as_os_str().is_empty() {
            return;
        }
        if let Some(dir) = self.store.scene_file().and_then(|file| file.parent()) {
            log::debug!("capture save path defaults to {}", dir.display());
            self.props.capture.save_path = dir.to_path_buf();
        }
    }

    fn follow_orbit(&mut self) -> Result<()> {
        if let Some(kind) = self.session.record_frame() {
            log::debug!(
                "{kind} frame {}",
                self.store.render_settings().frame_current
            );
        }
        if !self.proxies.exists(ProxyKind::Camera) {
            return Ok(());
        }
        let pose = orbit_pose(&self.props, self.store.render_settings());
        self.proxies.apply_pose(&mut self.store, &pose)?;
        self.queue.post(HostEvent::SceneRecomputed, self.sync.guard());
        Ok(())
    }
}
