//! The model record: a placed asset with its meshes.

use super::{decode_vec3, encode_vec3, snapshot, typed_id, Mesh};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::handle::ObjectHandle;
use crate::id::OwnedId;
use crate::record::{Payload, Record};
use spectradb_codec::{CodecResult, Decoder, Encoder};
use std::path::{Path, PathBuf};

/// A model placed in a scene.
///
/// The source path points at the geometry file the model was imported
/// from; it is stored relative to the database file. Meshes are
/// exclusively-owned children and are deleted with the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Display name.
    pub name: String,
    /// Geometry file this model was imported from; empty for none.
    pub source_path: PathBuf,
    /// World-space translation.
    pub location: [f64; 3],
    /// Euler rotation in degrees.
    pub rotation: [f64; 3],
    /// Per-axis scale.
    pub scale: [f64; 3],
    /// Whether the model is rendered.
    pub visible: bool,
    /// The model's meshes, owned by this model.
    pub meshes: Vec<OwnedId<Mesh>>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            name: String::new(),
            source_path: PathBuf::new(),
            location: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            visible: true,
            meshes: Vec::new(),
        }
    }
}

impl Record for Model {
    const TYPE_NAME: &'static str = "Model";
    const VERSION: u32 = 1;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        enc.encode_path(&self.source_path)?;
        encode_vec3(enc, &self.location);
        encode_vec3(enc, &self.rotation);
        encode_vec3(enc, &self.scale);
        enc.encode_bool(self.visible);
        enc.encode_seq(&self.meshes, |e, id| {
            id.encode(e);
            Ok(())
        })?;
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            source_path: dec.decode_path()?,
            location: decode_vec3(dec)?,
            rotation: decode_vec3(dec)?,
            scale: decode_vec3(dec)?,
            visible: dec.decode_bool()?,
            meshes: dec.decode_seq(OwnedId::decode)?,
        })
    }

    fn into_payload(self) -> Payload {
        Payload::Model(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::Model(model) => Some(model),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::Model(model) => Some(model),
            _ => None,
        }
    }
}

impl Model {
    /// Creates a model with default transform and no meshes.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn create(db: &Database, name: &str) -> DbResult<ObjectHandle> {
        db.create(Self {
            name: name.to_owned(),
            ..Self::default()
        })
    }

    /// Returns the model's name, or an empty string for an invalid handle.
    #[must_use]
    pub fn name(db: &Database, model: &ObjectHandle) -> String {
        db.get::<Self>(model)
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    /// Renames the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_name(db: &Database, model: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(model, record)
    }

    /// Returns the model's source path, or an empty path for an invalid
    /// handle.
    #[must_use]
    pub fn source_path(db: &Database, model: &ObjectHandle) -> PathBuf {
        db.get::<Self>(model)
            .map(|m| m.source_path.clone())
            .unwrap_or_default()
    }

    /// Sets the model's source path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_source_path(db: &Database, model: &ObjectHandle, path: &Path) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.source_path == path {
            return Ok(());
        }
        record.source_path = path.to_path_buf();
        db.modify(model, record)
    }

    /// Returns the model's location, or the origin for an invalid handle.
    #[must_use]
    pub fn location(db: &Database, model: &ObjectHandle) -> [f64; 3] {
        db.get::<Self>(model).map(|m| m.location).unwrap_or_default()
    }

    /// Moves the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_location(db: &Database, model: &ObjectHandle, location: [f64; 3]) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.location == location {
            return Ok(());
        }
        record.location = location;
        db.modify(model, record)
    }

    /// Returns the model's rotation, or zeros for an invalid handle.
    #[must_use]
    pub fn rotation(db: &Database, model: &ObjectHandle) -> [f64; 3] {
        db.get::<Self>(model).map(|m| m.rotation).unwrap_or_default()
    }

    /// Rotates the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_rotation(db: &Database, model: &ObjectHandle, rotation: [f64; 3]) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.rotation == rotation {
            return Ok(());
        }
        record.rotation = rotation;
        db.modify(model, record)
    }

    /// Returns the model's scale, or unit scale for an invalid handle.
    #[must_use]
    pub fn scale(db: &Database, model: &ObjectHandle) -> [f64; 3] {
        db.get::<Self>(model).map(|m| m.scale).unwrap_or([1.0; 3])
    }

    /// Scales the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_scale(db: &Database, model: &ObjectHandle, scale: [f64; 3]) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.scale == scale {
            return Ok(());
        }
        record.scale = scale;
        db.modify(model, record)
    }

    /// Returns whether the model is rendered; `false` for an invalid
    /// handle.
    #[must_use]
    pub fn visible(db: &Database, model: &ObjectHandle) -> bool {
        db.get::<Self>(model).map(|m| m.visible).unwrap_or(false)
    }

    /// Shows or hides the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a model.
    pub fn set_visible(db: &Database, model: &ObjectHandle, visible: bool) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, model)?;
        if record.visible == visible {
            return Ok(());
        }
        record.visible = visible;
        db.modify(model, record)
    }

    /// Returns handles to the model's meshes.
    #[must_use]
    pub fn meshes(db: &Database, model: &ObjectHandle) -> Vec<ObjectHandle> {
        db.get::<Self>(model)
            .map(|m| m.meshes.iter().map(|id| db.handle(id.id())).collect())
            .unwrap_or_default()
    }

    /// Adds a mesh to the model. No-op if the mesh is already listed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn add_mesh(db: &Database, model: &ObjectHandle, mesh: &ObjectHandle) -> DbResult<()> {
        let mesh_id = OwnedId::new(typed_id::<Mesh>(db, mesh)?);
        let mut record = snapshot::<Self>(db, model)?;
        if record.meshes.contains(&mesh_id) {
            return Ok(());
        }
        record.meshes.push(mesh_id);
        db.modify(model, record)
    }

    /// Removes a mesh from the model and deletes it along with its
    /// material.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for a bad handle, or `ObjectNotFound` if the
    /// mesh is not in this model.
    pub fn del_mesh(db: &Database, model: &ObjectHandle, mesh: &ObjectHandle) -> DbResult<()> {
        let mesh_id = OwnedId::new(typed_id::<Mesh>(db, mesh)?);
        let mut record = snapshot::<Self>(db, model)?;
        if !record.meshes.contains(&mesh_id) {
            return Err(DbError::ObjectNotFound);
        }
        Mesh::delete(db, mesh)?;
        record.meshes.retain(|id| *id != mesh_id);
        db.modify(model, record)
    }

    /// Replaces the model's mesh list.
    ///
    /// Old meshes that are not part of the new list are deleted first,
    /// cascading to their materials.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if any handle is invalid or mistyped.
    pub fn set_meshes(
        db: &Database,
        model: &ObjectHandle,
        meshes: &[ObjectHandle],
    ) -> DbResult<()> {
        let mut new_ids = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            new_ids.push(OwnedId::new(typed_id::<Mesh>(db, mesh)?));
        }
        let mut record = snapshot::<Self>(db, model)?;
        if record.meshes == new_ids {
            return Ok(());
        }
        for id in &record.meshes {
            if new_ids.contains(id) {
                continue;
            }
            let handle = db.handle(id.id());
            if handle.is_valid() {
                Mesh::delete(db, &handle)?;
            }
        }
        record.meshes = new_ids;
        db.modify(model, record)
    }

    /// Deletes the model, cascading to its meshes and their materials.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn delete(db: &Database, model: &ObjectHandle) -> DbResult<()> {
        let record = snapshot::<Self>(db, model)?;
        for id in &record.meshes {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                Mesh::delete(db, &handle)?;
            }
        }
        db.remove::<Self>(model)
    }
}
