//! The scene record: root of the object graph.

use super::{snapshot, typed_id, Model, SpectrumMaterial, Wave};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::handle::ObjectHandle;
use crate::id::{OwnedId, SharedId};
use crate::record::{Payload, Record};
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// A scene: the designated root object.
///
/// Models are exclusively-owned children. Spectrum materials and waves are
/// scene-level shared resources: models and materials reference them, but
/// their lifetime is controlled only by the scene's own
/// `add_*`/`del_*`/`clear_*` operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    /// Display name.
    pub name: String,
    /// Placed models, owned by this scene.
    pub models: Vec<OwnedId<Model>>,
    /// Shared spectral materials available to this scene's surfaces.
    pub spectrum_materials: Vec<SharedId<SpectrumMaterial>>,
    /// Shared spectral distributions available to this scene's materials.
    pub waves: Vec<SharedId<Wave>>,
}

impl Record for Scene {
    const TYPE_NAME: &'static str = "Scene";
    const VERSION: u32 = 1;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        enc.encode_seq(&self.models, |e, id| {
            id.encode(e);
            Ok(())
        })?;
        enc.encode_seq(&self.spectrum_materials, |e, id| {
            id.encode(e);
            Ok(())
        })?;
        enc.encode_seq(&self.waves, |e, id| {
            id.encode(e);
            Ok(())
        })?;
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            models: dec.decode_seq(OwnedId::decode)?,
            spectrum_materials: dec.decode_seq(SharedId::decode)?,
            waves: dec.decode_seq(SharedId::decode)?,
        })
    }

    fn into_payload(self) -> Payload {
        Payload::Scene(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::Scene(scene) => Some(scene),
            _ => None,
        }
    }
}

impl Scene {
    /// Creates an empty scene.
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

    /// Returns the scene's name, or an empty string for an invalid handle.
    #[must_use]
    pub fn name(db: &Database, scene: &ObjectHandle) -> String {
        db.get::<Self>(scene)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    /// Renames the scene.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a scene.
    pub fn set_name(db: &Database, scene: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, scene)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(scene, record)
    }

    /// Returns handles to the scene's models.
    #[must_use]
    pub fn models(db: &Database, scene: &ObjectHandle) -> Vec<ObjectHandle> {
        db.get::<Self>(scene)
            .map(|s| s.models.iter().map(|id| db.handle(id.id())).collect())
            .unwrap_or_default()
    }

    /// Adds a model to the scene. Adding a model that is already listed is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn add_model(db: &Database, scene: &ObjectHandle, model: &ObjectHandle) -> DbResult<()> {
        let model_id = OwnedId::new(typed_id::<Model>(db, model)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if record.models.contains(&model_id) {
            return Ok(());
        }
        record.models.push(model_id);
        db.modify(scene, record)
    }

    /// Removes a model from the scene and deletes it, cascading to its
    /// meshes and their materials. Spectrum materials the model's surfaces
    /// referenced are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for a bad handle, or `ObjectNotFound` if the
    /// model is not in this scene.
    pub fn del_model(db: &Database, scene: &ObjectHandle, model: &ObjectHandle) -> DbResult<()> {
        let model_id = OwnedId::new(typed_id::<Model>(db, model)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if !record.models.contains(&model_id) {
            return Err(DbError::ObjectNotFound);
        }
        Model::delete(db, model)?;
        record.models.retain(|id| *id != model_id);
        db.modify(scene, record)
    }

    /// Deletes all of the scene's models.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn clear_models(db: &Database, scene: &ObjectHandle) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, scene)?;
        for id in &record.models {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                Model::delete(db, &handle)?;
            }
        }
        if record.models.is_empty() {
            return Ok(());
        }
        record.models.clear();
        db.modify(scene, record)
    }

    /// Returns handles to the scene's spectrum materials.
    #[must_use]
    pub fn spectrum_materials(db: &Database, scene: &ObjectHandle) -> Vec<ObjectHandle> {
        db.get::<Self>(scene)
            .map(|s| {
                s.spectrum_materials
                    .iter()
                    .map(|id| db.handle(id.id()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registers a shared spectrum material with the scene. No-op if it is
    /// already listed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn add_spectrum_material(
        db: &Database,
        scene: &ObjectHandle,
        material: &ObjectHandle,
    ) -> DbResult<()> {
        let material_id = SharedId::new(typed_id::<SpectrumMaterial>(db, material)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if record.spectrum_materials.contains(&material_id) {
            return Ok(());
        }
        record.spectrum_materials.push(material_id);
        db.modify(scene, record)
    }

    /// Removes a spectrum material from the scene and deletes it outright.
    ///
    /// This is the only deletion path for spectrum materials; no reference
    /// check is made, so surfaces still pointing at it are left with a
    /// dangling (and thereafter invalid) reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for a bad handle, or `ObjectNotFound` if the
    /// material is not in this scene.
    pub fn del_spectrum_material(
        db: &Database,
        scene: &ObjectHandle,
        material: &ObjectHandle,
    ) -> DbResult<()> {
        let material_id = SharedId::new(typed_id::<SpectrumMaterial>(db, material)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if !record.spectrum_materials.contains(&material_id) {
            return Err(DbError::ObjectNotFound);
        }
        db.remove::<SpectrumMaterial>(material)?;
        record.spectrum_materials.retain(|id| *id != material_id);
        db.modify(scene, record)
    }

    /// Deletes all of the scene's spectrum materials.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn clear_spectrum_materials(db: &Database, scene: &ObjectHandle) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, scene)?;
        for id in &record.spectrum_materials {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                db.remove::<SpectrumMaterial>(&handle)?;
            }
        }
        if record.spectrum_materials.is_empty() {
            return Ok(());
        }
        record.spectrum_materials.clear();
        db.modify(scene, record)
    }

    /// Returns handles to the scene's waves.
    #[must_use]
    pub fn waves(db: &Database, scene: &ObjectHandle) -> Vec<ObjectHandle> {
        db.get::<Self>(scene)
            .map(|s| s.waves.iter().map(|id| db.handle(id.id())).collect())
            .unwrap_or_default()
    }

    /// Registers a shared wave with the scene. No-op if already listed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn add_wave(db: &Database, scene: &ObjectHandle, wave: &ObjectHandle) -> DbResult<()> {
        let wave_id = SharedId::new(typed_id::<Wave>(db, wave)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if record.waves.contains(&wave_id) {
            return Ok(());
        }
        record.waves.push(wave_id);
        db.modify(scene, record)
    }

    /// Removes a wave from the scene and deletes it outright, without
    /// checking for remaining references.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for a bad handle, or `ObjectNotFound` if the
    /// wave is not in this scene.
    pub fn del_wave(db: &Database, scene: &ObjectHandle, wave: &ObjectHandle) -> DbResult<()> {
        let wave_id = SharedId::new(typed_id::<Wave>(db, wave)?);
        let mut record = snapshot::<Self>(db, scene)?;
        if !record.waves.contains(&wave_id) {
            return Err(DbError::ObjectNotFound);
        }
        db.remove::<Wave>(wave)?;
        record.waves.retain(|id| *id != wave_id);
        db.modify(scene, record)
    }

    /// Deletes all of the scene's waves.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn clear_waves(db: &Database, scene: &ObjectHandle) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, scene)?;
        for id in &record.waves {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                db.remove::<Wave>(&handle)?;
            }
        }
        if record.waves.is_empty() {
            return Ok(());
        }
        record.waves.clear();
        db.modify(scene, record)
    }

    /// Deletes the scene with everything it owns: its models (cascading to
    /// meshes and materials) and its listed shared records.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn delete(db: &Database, scene: &ObjectHandle) -> DbResult<()> {
        let record = snapshot::<Self>(db, scene)?;
        for id in &record.models {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                Model::delete(db, &handle)?;
            }
        }
        for id in &record.spectrum_materials {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                db.remove::<SpectrumMaterial>(&handle)?;
            }
        }
        for id in &record.waves {
            let handle = db.handle(id.id());
            if handle.is_valid() {
                db.remove::<Wave>(&handle)?;
            }
        }
        db.remove::<Self>(scene)
    }
}
