//! In-memory scene store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SphereCamError};
use crate::scene::{
    CameraParams, ObjectHandle, ObjectKind, ObjectTransform, OrientationConstraint,
    RenderSettings, SceneStore,
};

/// An object held by [`MemoryScene`].
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub transform: ObjectTransform,
    pub constraint: Option<OrientationConstraint>,
    /// Name of the camera data block, for cameras.
    pub camera_data: Option<String>,
}

/// A [`SceneStore`] backed by hash maps.
///
/// Objects are keyed by handle; camera data blocks live in their own map so
/// that deleting a camera object without releasing its data leaves an orphan,
/// as host editors do.
#[derive(Debug, Default)]
pub struct MemoryScene {
    objects: HashMap<ObjectHandle, SceneObject>,
    camera_data: HashMap<String, CameraParams>,
    /// Data block of each camera ever created, kept after the object is deleted.
    data_owners: HashMap<ObjectHandle, String>,
    next_id: u64,
    render: RenderSettings,
    scene_file: Option<PathBuf>,
}

impl MemoryScene {
    /// Creates a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty scene that reports `path` as its saved file.
    pub fn with_scene_file(path: impl Into<PathBuf>) -> Self {
        Self {
            scene_file: Some(path.into()),
            ..Self::default()
        }
    }

    /// Gets an object by handle.
    pub fn get(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(&handle)
    }

    /// Returns the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the scene holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of objects with the given name.
    pub fn count_named(&self, name: &str) -> usize {
        self.objects.values().filter(|o| o.name == name).count()
    }

    /// Number of camera data blocks, including orphans.
    pub fn camera_data_len(&self) -> usize {
        self.camera_data.len()
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Result<&mut SceneObject> {
        self.objects
            .get_mut(&handle)
            .ok_or(SphereCamError::ObjectNotFound(handle))
    }

    /// Picks a name not yet used by an object or data block, like hosts do
    /// when a name is taken.
    fn unique_name(&self, name: &str) -> String {
        let taken = |candidate: &str| {
            self.objects.values().any(|o| o.name == candidate)
                || self.camera_data.contains_key(candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{name}.{n:03}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

impl SceneStore for MemoryScene {
    fn create_object(&mut self, kind: ObjectKind, name: &str) -> ObjectHandle {
        self.next_id += 1;
        let handle = ObjectHandle::from_raw(self.next_id);
        let name = self.unique_name(name);
        let camera_data = match kind {
            ObjectKind::Camera => {
                self.camera_data.insert(name.clone(), CameraParams::default());
                self.data_owners.insert(handle, name.clone());
                Some(name.clone())
            }
            ObjectKind::SphereEmpty => None,
        };
        self.objects.insert(
            handle,
            SceneObject {
                name,
                kind,
                transform: ObjectTransform::default(),
                constraint: None,
                camera_data,
            },
        );
        handle
    }

    fn delete_object(&mut self, handle: ObjectHandle) -> Result<()> {
        self.objects
            .remove(&handle)
            .map(|_| ())
            .ok_or(SphereCamError::ObjectNotFound(handle))
    }

    fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains_key(&handle)
    }

    fn find(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(h, _)| *h)
    }

    fn transform(&self, handle: ObjectHandle) -> Option<ObjectTransform> {
        self.objects.get(&handle).map(|o| o.transform)
    }

    fn set_transform(&mut self, handle: ObjectHandle, transform: ObjectTransform) -> Result<()> {
        self.object_mut(handle)?.transform = transform;
        Ok(())
    }

    fn camera_params(&self, handle: ObjectHandle) -> Option<CameraParams> {
        let data = self.objects.get(&handle)?.camera_data.as_ref()?;
        self.camera_data.get(data).copied()
    }

    fn set_camera_params(&mut self, handle: ObjectHandle, params: CameraParams) -> Result<()> {
        let data = self
            .object_mut(handle)?
            .camera_data
            .clone()
            .ok_or(SphereCamError::ObjectNotFound(handle))?;
        self.camera_data.insert(data, params);
        Ok(())
    }

    fn set_orientation_constraint(
        &mut self,
        handle: ObjectHandle,
        constraint: OrientationConstraint,
    ) -> Result<()> {
        self.object_mut(handle)?.constraint = Some(constraint);
        Ok(())
    }

    fn orientation_constraint(&self, handle: ObjectHandle) -> Option<OrientationConstraint> {
        self.objects.get(&handle)?.constraint
    }

    fn remove_camera_data(&mut self, handle: ObjectHandle) -> bool {
        self.data_owners
            .remove(&handle)
            .is_some_and(|block| self.camera_data.remove(&block).is_some())
    }

    fn render_settings(&self) -> &RenderSettings {
        &self.render
    }

    fn render_settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.render
    }

    fn scene_file(&self) -> Option<&Path> {
        self.scene_file.as_deref()
    }
}
