//! Database file save and load.
//!
//! The on-disk container is big-endian throughout:
//!
//! ```text
//! magic bytes            (store-configured)
//! version                 u32
//! root object id          u32
//! object count            u32
//! repeated per object:
//!   id                    u32
//!   type name             u32 length + UTF-8 bytes
//!   payload               u32 length + opaque bytes
//!   object schema version u32
//! ```
//!
//! Only alive objects are written. Each payload is produced by the type's
//! own encode routine into a scratch buffer, so its length can be written
//! first; a loader that does not know the type can skip the object by its
//! length. The schema version written is always the type's *current*
//! version, so every save upgrades the on-disk tags.

use crate::database::{Database, Entry, Slot, State};
use crate::error::{DbError, DbResult};
use crate::id::ObjectId;
use spectradb_codec::{Decoder, Encoder};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

impl Database {
    /// Saves all alive objects to `path`.
    ///
    /// The bytes are written to a sibling temporary file which then
    /// replaces the target, so a crash mid-write cannot corrupt the
    /// previous good file. On success the store is marked unmodified and
    /// remembers `path` as its current file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::FileOpen`] or [`DbError::Io`] on I/O failure, or
    /// a codec error if a record cannot be encoded.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let base = file_base(path);
        let mut state = self.state.write();

        let mut enc = Encoder::new();
        enc.encode_raw(&self.config.magic);
        enc.encode_u32(self.config.file_version);
        enc.encode_u32(state.root.unwrap_or(ObjectId::NONE).as_u32());

        let alive: Vec<(ObjectId, &Entry)> = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .filter_map(|(index, slot)| {
                let entry = slot.entry.as_ref()?;
                Some((ObjectId::new(index as u16, slot.generation), entry))
            })
            .collect();

        let object_count = alive.len();
        enc.encode_u32(object_count as u32);
        for (id, entry) in alive {
            let info = self
                .registry
                .get_by_name(entry.type_name)
                .ok_or_else(|| DbError::unknown_type(entry.type_name))?;

            enc.encode_u32(id.as_u32());
            enc.encode_str(entry.type_name)?;

            let mut scratch = Encoder::with_base(&base);
            (info.encode)(&entry.payload, &mut scratch)?;
            let payload = scratch.into_bytes();
            let len = u32::try_from(payload.len())
                .map_err(|_| DbError::failure("record payload exceeds 4 GiB"))?;
            enc.encode_u32(len);
            enc.encode_raw(&payload);
            enc.encode_u32(info.version);
        }

        write_atomic(path, enc.as_bytes())?;

        state.modified = 0;
        state.file_path = Some(path.to_path_buf());
        tracing::info!(objects = object_count, path = %path.display(), "database saved");
        Ok(())
    }

    /// Loads `path`, replacing the entire contents of this store.
    ///
    /// All undo/redo history is discarded and the modified counter reset.
    /// Objects of unknown type are skipped (their bytes consumed but
    /// discarded) so files from newer builds still load. A payload stored
    /// with an older schema version is passed through the type's migrate
    /// hook before use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::FileOpen`] if the file cannot be read,
    /// [`DbError::FileFormat`] on bad magic or a malformed object table,
    /// [`DbError::FileVersion`] if the file comes from a newer build, or a
    /// codec error on truncated or corrupt content.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| DbError::file_open(path, e))?;
        let base = file_base(path);

        let mut state = self.state.write();

        let mut dec = Decoder::with_base(&bytes, &base);
        let magic = dec
            .take_bytes(self.config.magic.len())
            .map_err(|_| DbError::file_format("file too short for magic bytes"))?;
        if magic != self.config.magic {
            return Err(DbError::file_format("bad magic bytes"));
        }
        let version = dec.decode_u32()?;
        if version > self.config.file_version {
            return Err(DbError::FileVersion {
                found: version,
                supported: self.config.file_version,
            });
        }
        let root_raw = ObjectId::from_u32(dec.decode_u32()?);
        let count = dec.decode_u32()?;

        let mut slots: Vec<Slot> = Vec::new();
        let mut loaded = 0usize;
        for _ in 0..count {
            let id = ObjectId::decode(&mut dec)?;
            let type_name = dec.decode_str()?;
            let payload_len = dec.decode_u32()? as usize;

            let Some(info) = self.registry.get_by_name(&type_name) else {
                dec.skip(payload_len)?;
                let _schema_version = dec.decode_u32()?;
                tracing::warn!(type_name = %type_name, "skipping object of unknown type");
                continue;
            };

            let payload_bytes = dec.take_bytes(payload_len)?;
            let mut payload_dec = Decoder::with_base(payload_bytes, &base);
            let mut payload = (info.decode)(&mut payload_dec)?;
            let schema_version = dec.decode_u32()?;
            if schema_version < info.version {
                tracing::debug!(
                    type_name = info.name,
                    from = schema_version,
                    to = info.version,
                    "migrating record"
                );
                (info.migrate)(&mut payload, schema_version);
            }

            if id.is_none() || id.index() > ObjectId::MAX_INDEX {
                return Err(DbError::file_format("object id out of range"));
            }
            let idx = usize::from(id.index());
            if idx >= slots.len() {
                slots.resize_with(idx + 1, Slot::vacant);
            }
            if slots[idx].alive {
                return Err(DbError::file_format("duplicate slot index"));
            }
            slots[idx] = Slot {
                generation: id.generation(),
                alive: true,
                entry: Some(Entry {
                    type_name: info.name,
                    payload,
                }),
            };
            loaded += 1;
        }

        let undo_capacity = state.undo_capacity;
        *state = State::blank(undo_capacity);
        state.slots = slots;
        state.rebuild_free();
        state.root = if root_raw.is_none() {
            None
        } else {
            Some(root_raw)
        };
        state.file_path = Some(path.to_path_buf());
        let skipped = count as usize - loaded;
        tracing::info!(objects = loaded, skipped, path = %path.display(), "database loaded");
        Ok(())
    }

    /// Returns the path of the file this store was last saved to or loaded
    /// from, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        self.state.read().file_path.clone()
    }

    /// Resets the store to a blank state: no objects, no root, no history,
    /// no current file, unmodified.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let undo_capacity = state.undo_capacity;
        *state = State::blank(undo_capacity);
    }
}

/// Directory paths inside the file are stored relative to. Uses the
/// canonical parent directory when it exists so relativization is stable
/// regardless of how the target path was spelled.
fn file_base(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    parent.canonicalize().unwrap_or(parent)
}

/// Write-then-rename so the previous file survives a crash mid-write.
fn write_atomic(path: &Path, bytes: &[u8]) -> DbResult<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp).map_err(|e| DbError::file_open(&tmp, e))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    sync_parent_dir(path)?;
    Ok(())
}

/// Fsync the containing directory so the rename itself is durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> DbResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

/// Windows has no directory fsync; NTFS journaling covers the metadata
/// update.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> DbResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::record::Record;
    use crate::records::{Material, Mesh, Model, Scene, SpectralSample, SpectrumMaterial, Wave};
    use crate::registry::TypeRegistry;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn create_db() -> Arc<Database> {
        Database::new(Arc::new(TypeRegistry::with_defaults()))
    }

    fn sample_wave() -> Wave {
        Wave {
            name: "d65".to_string(),
            samples: vec![
                SpectralSample {
                    wavelength: 380.0,
                    power: 0.5,
                },
                SpectralSample {
                    wavelength: 780.0,
                    power: 0.25,
                },
            ],
        }
    }

    #[test]
    fn save_then_load_roundtrips_objects_and_root() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("scene.spdb");

        let db = create_db();
        let scene = Scene::create(&db, "main").unwrap();
        let model = Model::create(&db, "teapot").unwrap();
        Model::set_location(&db, &model, [1.0, 2.0, 3.0]).unwrap();
        Scene::add_model(&db, &scene, &model).unwrap();
        db.set_root(&scene).unwrap();

        let wave = db.create(sample_wave()).unwrap();
        Scene::add_wave(&db, &scene, &wave).unwrap();

        db.save_to_file(&file).unwrap();
        assert!(!db.is_modified());
        assert_eq!(db.file_path(), Some(file.clone()));

        let fresh = create_db();
        fresh.load_from_file(&file).unwrap();
        assert!(!fresh.is_modified());
        assert_eq!(fresh.object_count(), db.object_count());

        let root = fresh.root().unwrap();
        assert_eq!(Scene::name(&fresh, &root), "main");

        let models = Scene::models(&fresh, &root);
        assert_eq!(models.len(), 1);
        assert_eq!(Model::name(&fresh, &models[0]), "teapot");
        assert_eq!(Model::location(&fresh, &models[0]), [1.0, 2.0, 3.0]);

        let waves = Scene::waves(&fresh, &root);
        assert_eq!(waves.len(), 1);
        assert_eq!(
            *fresh.get::<Wave>(&waves[0]).unwrap(),
            sample_wave()
        );
    }

    #[test]
    fn load_discards_history_and_transaction_state() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("a.spdb");

        let db = create_db();
        db.with_transaction(|db| db.create(sample_wave())).unwrap();
        db.save_to_file(&file).unwrap();

        db.with_transaction(|db| db.create(sample_wave())).unwrap();
        assert!(db.can_undo());

        db.load_from_file(&file).unwrap();
        assert!(!db.can_undo());
        assert!(!db.can_redo());
        assert!(!db.in_transaction());
        assert_eq!(db.object_count(), 1);
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("bad.spdb");
        fs::write(&file, b"NOPExxxxxxxxxxxx").unwrap();

        let db = create_db();
        let result = db.load_from_file(&file);
        assert!(matches!(result, Err(DbError::FileFormat { .. })));
    }

    #[test]
    fn newer_file_version_is_rejected() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("v9.spdb");

        let writer = Database::with_config(
            Arc::new(TypeRegistry::with_defaults()),
            DbConfig::new().file_version(9),
        );
        writer.save_to_file(&file).unwrap();

        let reader = create_db();
        let result = reader.load_from_file(&file);
        assert!(matches!(
            result,
            Err(DbError::FileVersion {
                found: 9,
                supported: 1
            })
        ));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let db = create_db();
        let result = db.load_from_file("/nonexistent/dir/a.spdb");
        assert!(matches!(result, Err(DbError::FileOpen { .. })));
    }

    #[test]
    fn unknown_type_is_skipped_not_fatal() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("forward.spdb");

        // Writer knows all types; reader's registry is missing Wave, as if
        // the file came from a newer build.
        let writer = create_db();
        let scene = Scene::create(&writer, "main").unwrap();
        writer.set_root(&scene).unwrap();
        writer.create(sample_wave()).unwrap();
        writer.save_to_file(&file).unwrap();

        let partial = Arc::new(TypeRegistry::new());
        partial.register::<Scene>();
        partial.register::<Model>();
        partial.register::<Mesh>();
        partial.register::<Material>();
        partial.register::<SpectrumMaterial>();
        let reader = Database::new(partial);

        reader.load_from_file(&file).unwrap();
        assert_eq!(reader.object_count(), 1);
        assert_eq!(Scene::name(&reader, &reader.root().unwrap()), "main");
    }

    #[test]
    fn source_paths_survive_the_roundtrip() {
        let temp = tempdir().unwrap();
        let dir = temp.path().canonicalize().unwrap();
        let file = dir.join("paths.spdb");
        let asset = dir.join("assets").join("teapot.obj");

        let db = create_db();
        let model = Model::create(&db, "teapot").unwrap();
        Model::set_source_path(&db, &model, &asset).unwrap();
        db.save_to_file(&file).unwrap();

        // The file stores the path relative to itself.
        let fresh = create_db();
        fresh.load_from_file(&file).unwrap();
        let loaded = fresh.handle(model.id());
        assert_eq!(Model::source_path(&fresh, &loaded), asset);
    }

    #[test]
    fn wave_v1_payload_is_migrated_on_load() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("old.spdb");

        // Hand-write a file containing one Wave tagged with schema
        // version 1, whose power values are in the old milliwatt scale.
        let db = create_db();
        let mut enc = Encoder::new();
        enc.encode_raw(&db.config().magic);
        enc.encode_u32(db.config().file_version);
        enc.encode_u32(ObjectId::NONE.as_u32());
        enc.encode_u32(1);

        let wave = Wave {
            name: "old".to_string(),
            samples: vec![SpectralSample {
                wavelength: 500.0,
                power: 250.0,
            }],
        };
        enc.encode_u32(ObjectId::new(0, 0).as_u32());
        enc.encode_str(Wave::TYPE_NAME).unwrap();
        let mut scratch = Encoder::new();
        wave.encode(&mut scratch).unwrap();
        let payload = scratch.into_bytes();
        enc.encode_u32(payload.len() as u32);
        enc.encode_raw(&payload);
        enc.encode_u32(1);

        write_atomic(&file, enc.as_bytes()).unwrap();

        db.load_from_file(&file).unwrap();
        let handle = db.handle(ObjectId::new(0, 0));
        let loaded = db.get::<Wave>(&handle).unwrap();
        assert_eq!(loaded.samples[0].power, 0.25);
    }

    #[test]
    fn save_replaces_existing_file_atomically() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("twice.spdb");

        let db = create_db();
        db.create(sample_wave()).unwrap();
        db.save_to_file(&file).unwrap();
        let first_len = fs::metadata(&file).unwrap().len();

        db.create(sample_wave()).unwrap();
        db.save_to_file(&file).unwrap();
        let second_len = fs::metadata(&file).unwrap().len();

        assert!(second_len > first_len);
        // No stray temp file left behind.
        assert!(!temp.path().join("twice.spdb.tmp").exists());
    }

    #[test]
    fn reset_returns_to_blank() {
        let db = create_db();
        let handle = db.with_transaction(|db| db.create(sample_wave())).unwrap();
        assert!(db.is_modified());

        db.reset();
        assert!(!handle.is_valid());
        assert_eq!(db.object_count(), 0);
        assert!(!db.is_modified());
        assert!(db.file_path().is_none());
        assert!(!db.can_undo());
    }

    #[test]
    fn load_preserves_ids_and_generations() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("gen.spdb");

        let db = create_db();
        let a = db.create(sample_wave()).unwrap();
        db.remove::<Wave>(&a).unwrap();
        let b = db.create(sample_wave()).unwrap();
        assert_eq!(b.id().generation(), 1);

        db.save_to_file(&file).unwrap();

        let fresh = create_db();
        fresh.load_from_file(&file).unwrap();
        let loaded = fresh.handle(b.id());
        assert!(loaded.is_valid());
        assert_eq!(loaded.id().generation(), 1);
    }
}
