//! Host lifecycle events, the reentrancy-bounded event queue, and the
//! callback registry.
//!
//! The host invokes callbacks synchronously, and a callback that mutates the
//! scene or the panel triggers further callbacks. Those follow-up
//! notifications are queued here instead of being dispatched recursively.
//! Each queued event remembers how deep in such a chain it was raised, and a
//! chain longer than [`MAX_REENTRANCY_DEPTH`] is treated as a missing guard.

use std::collections::VecDeque;

use spherecam_core::{Result, SphereCamError};

use crate::sync::{SyncDirection, SyncGuard};

/// Longest chain of notifications raised by handlers of earlier ones.
pub const MAX_REENTRANCY_DEPTH: usize = 16;

/// The lifecycle points the controller registers callbacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// A panel property was edited.
    PropertyChanged,
    /// The host re-evaluated the scene graph.
    SceneRecomputed,
    /// A frame is about to be captured.
    FrameRendered,
    /// A capture run finished.
    CaptureCompleted,
}

/// Panel property that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    SphereCenter,
    SphereRotation,
    SphereScale,
    SphereRadius,
    FocalLength,
    Orientation,
    ShowSphere,
    ShowCamera,
    Trajectory,
    OrbitFrames,
    Capture,
}

impl Property {
    /// Whether the property toggles proxy visibility rather than proxy values.
    #[must_use]
    pub fn is_visibility(self) -> bool {
        matches!(self, Property::ShowSphere | Property::ShowCamera)
    }
}

/// A notification delivered to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    PropertyChanged(Property),
    SceneRecomputed,
    FrameRendered(i64),
    CaptureCompleted,
}

impl HostEvent {
    /// The lifecycle point this event belongs to.
    #[must_use]
    pub fn lifecycle(self) -> LifecycleEvent {
        match self {
            HostEvent::PropertyChanged(_) => LifecycleEvent::PropertyChanged,
            HostEvent::SceneRecomputed => LifecycleEvent::SceneRecomputed,
            HostEvent::FrameRendered(_) => LifecycleEvent::FrameRendered,
            HostEvent::CaptureCompleted => LifecycleEvent::CaptureCompleted,
        }
    }

    /// The sync direction whose flag gates delivery of this event.
    #[must_use]
    pub fn sync_direction(self) -> Option<SyncDirection> {
        match self {
            HostEvent::PropertyChanged(_) => Some(SyncDirection::UiToProxy),
            HostEvent::SceneRecomputed => Some(SyncDirection::ProxyToUi),
            HostEvent::FrameRendered(_) | HostEvent::CaptureCompleted => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedEvent {
    event: HostEvent,
    depth: usize,
}

/// Single-threaded FIFO of pending notifications.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<QueuedEvent>,
    /// Depth of the event currently being handled.
    depth: usize,
    max_depth_seen: usize,
    suppressed: usize,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notification raised by the host.
    pub fn push(&mut self, event: HostEvent, guard: &SyncGuard) -> bool {
        self.enqueue(event, 0, guard)
    }

    /// Queues a notification raised while handling the current event.
    pub fn post(&mut self, event: HostEvent, guard: &SyncGuard) -> bool {
        self.enqueue(event, self.depth + 1, guard)
    }

    fn enqueue(&mut self, event: HostEvent, depth: usize, guard: &SyncGuard) -> bool {
        if let Some(direction) = event.sync_direction() {
            if !guard.is_enabled(direction) {
                self.suppressed += 1;
                log::trace!("dropped {event:?}: {direction:?} sync suppressed");
                return false;
            }
        }
        self.pending.push_back(QueuedEvent { event, depth });
        true
    }

    /// Takes the next event and makes it the current one.
    ///
    /// Fails, and drops everything pending, if the event sits deeper than
    /// [`MAX_REENTRANCY_DEPTH`].
    pub fn next_event(&mut self) -> Result<Option<HostEvent>> {
        let Some(queued) = self.pending.pop_front() else {
            self.depth = 0;
            return Ok(None);
        };
        if queued.depth > MAX_REENTRANCY_DEPTH {
            log::error!(
                "dropping {} pending event(s): chain reached depth {}",
                self.pending.len() + 1,
                queued.depth
            );
            self.clear();
            return Err(SphereCamError::ReentrancyLimit {
                depth: MAX_REENTRANCY_DEPTH,
            });
        }
        self.depth = queued.depth;
        self.max_depth_seen = self.max_depth_seen.max(queued.depth);
        Ok(Some(queued.event))
    }

    /// Drops all pending events.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.depth = 0;
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deepest chain handled so far.
    #[must_use]
    pub fn max_depth_seen(&self) -> usize {
        self.max_depth_seen
    }

    /// Number of notifications dropped because their sync direction was off.
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}

/// The controller's callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Fills in defaults that need a loaded scene; runs once.
    InitDefaults,
    /// Creates or removes proxies when a visibility toggle changes.
    ToggleProxies,
    /// Pushes panel values into the proxies.
    SyncUiToProxy,
    /// Pulls proxy values back into the panel.
    SyncProxyToUi,
    /// Moves the camera proxy to the pose of the current frame.
    FollowOrbit,
    /// Ends the active capture session.
    FinalizeCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    event: LifecycleEvent,
    handler: Handler,
    one_shot: bool,
}

/// Ordered set of `(event, handler)` registrations.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    registrations: Vec<Registration>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the controller's standard callbacks.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Registers the standard callbacks. Calling it again adds nothing.
    pub fn register_defaults(&mut self) {
        self.register_once(LifecycleEvent::SceneRecomputed, Handler::InitDefaults);
        self.register(LifecycleEvent::PropertyChanged, Handler::ToggleProxies);
        self.register(LifecycleEvent::PropertyChanged, Handler::SyncUiToProxy);
        self.register(LifecycleEvent::SceneRecomputed, Handler::SyncProxyToUi);
        self.register(LifecycleEvent::FrameRendered, Handler::FollowOrbit);
        self.register(LifecycleEvent::CaptureCompleted, Handler::FinalizeCapture);
    }

    /// Registers a persistent callback. Returns false if already registered.
    pub fn register(&mut self, event: LifecycleEvent, handler: Handler) -> bool {
        self.insert(event, handler, false)
    }

    /// Registers a callback that is removed after its first invocation.
    pub fn register_once(&mut self, event: LifecycleEvent, handler: Handler) -> bool {
        self.insert(event, handler, true)
    }

    fn insert(&mut self, event: LifecycleEvent, handler: Handler, one_shot: bool) -> bool {
        if self.is_registered(event, handler) {
            return false;
        }
        self.registrations.push(Registration {
            event,
            handler,
            one_shot,
        });
        true
    }

    /// Removes a callback. Returns whether it was registered.
    pub fn unregister(&mut self, event: LifecycleEvent, handler: Handler) -> bool {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| !(r.event == event && r.handler == handler));
        before != self.registrations.len()
    }

    /// Returns whether a callback is registered.
    #[must_use]
    pub fn is_registered(&self, event: LifecycleEvent, handler: Handler) -> bool {
        self.registrations
            .iter()
            .any(|r| r.event == event && r.handler == handler)
    }

    /// Handlers to invoke for an event, in registration order.
    ///
    /// One-shot registrations are removed by this call.
    pub fn take_handlers(&mut self, event: LifecycleEvent) -> Vec<Handler> {
        let handlers = self
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .map(|r| r.handler)
            .collect();
        self.registrations
            .retain(|r| !(r.event == event && r.one_shot));
        handlers
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
