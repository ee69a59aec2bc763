//! The mesh record: one surface of a model.

use super::{snapshot, typed_id, Material};
use crate::database::Database;
use crate::error::DbResult;
use crate::handle::ObjectHandle;
use crate::id::OwnedId;
use crate::record::{Payload, Record};
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// A mesh belonging to a model.
///
/// Every mesh exclusively owns its material: replacing or deleting the
/// mesh deletes the material with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    /// Display name.
    pub name: String,
    /// Whether normals are smoothed across faces.
    pub smooth_normals: bool,
    /// The surface material, owned by this mesh.
    pub material: OwnedId<Material>,
}

impl Record for Mesh {
    const TYPE_NAME: &'static str = "Mesh";
    const VERSION: u32 = 1;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        enc.encode_bool(self.smooth_normals);
        self.material.encode(enc);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            smooth_normals: dec.decode_bool()?,
            material: OwnedId::decode(dec)?,
        })
    }

    fn into_payload(self) -> Payload {
        Payload::Mesh(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

impl Mesh {
    /// Creates a mesh together with a fresh default material that it owns.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn create(db: &Database, name: &str) -> DbResult<ObjectHandle> {
        let material = db.create(Material {
            name: format!("{name}_mat"),
            ..Material::default()
        })?;
        db.create(Self {
            name: name.to_owned(),
            smooth_normals: false,
            material: OwnedId::new(material.id()),
        })
    }

    /// Returns the mesh's name, or an empty string for an invalid handle.
    #[must_use]
    pub fn name(db: &Database, mesh: &ObjectHandle) -> String {
        db.get::<Self>(mesh)
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    /// Renames the mesh.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a mesh.
    pub fn set_name(db: &Database, mesh: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, mesh)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(mesh, record)
    }

    /// Returns whether normals are smoothed; `false` for an invalid handle.
    #[must_use]
    pub fn smooth_normals(db: &Database, mesh: &ObjectHandle) -> bool {
        db.get::<Self>(mesh)
            .map(|m| m.smooth_normals)
            .unwrap_or(false)
    }

    /// Enables or disables normal smoothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a mesh.
    pub fn set_smooth_normals(db: &Database, mesh: &ObjectHandle, smooth: bool) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, mesh)?;
        if record.smooth_normals == smooth {
            return Ok(());
        }
        record.smooth_normals = smooth;
        db.modify(mesh, record)
    }

    /// Returns a handle to the mesh's material.
    #[must_use]
    pub fn material(db: &Database, mesh: &ObjectHandle) -> ObjectHandle {
        db.get::<Self>(mesh)
            .map(|m| db.handle(m.material.id()))
            .unwrap_or_default()
    }

    /// Replaces the mesh's material, deleting the old one it owned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn set_material(db: &Database, mesh: &ObjectHandle, material: &ObjectHandle) -> DbResult<()> {
        let material_id = OwnedId::new(typed_id::<Material>(db, material)?);
        let mut record = snapshot::<Self>(db, mesh)?;
        if record.material == material_id {
            return Ok(());
        }
        let old = db.handle(record.material.id());
        if old.is_valid() {
            db.remove::<Material>(&old)?;
        }
        record.material = material_id;
        db.modify(mesh, record)
    }

    /// Deletes the mesh and the material it owns.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn delete(db: &Database, mesh: &ObjectHandle) -> DbResult<()> {
        let record = snapshot::<Self>(db, mesh)?;
        let material = db.handle(record.material.id());
        if material.is_valid() {
            db.remove::<Material>(&material)?;
        }
        db.remove::<Self>(mesh)
    }
}
