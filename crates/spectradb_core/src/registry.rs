//! Runtime type metadata and lookup.

use crate::error::{DbError, DbResult};
use crate::record::{Payload, Record};
use crate::records::{Material, Mesh, Model, Scene, SpectrumMaterial, Wave};
use parking_lot::RwLock;
use spectradb_codec::{Decoder, Encoder};
use std::any::TypeId;
use std::collections::HashMap;

/// Runtime metadata for a registered record type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// Stable type name used in database files.
    pub name: &'static str,
    /// Current schema version.
    pub version: u32,
    pub(crate) encode: fn(&Payload, &mut Encoder) -> DbResult<()>,
    pub(crate) decode: fn(&mut Decoder<'_>) -> DbResult<Payload>,
    pub(crate) migrate: fn(&mut Payload, u32),
}

fn encode_thunk<T: Record>(payload: &Payload, enc: &mut Encoder) -> DbResult<()> {
    let value = T::from_payload(payload)
        .ok_or_else(|| DbError::failure("stored payload does not match registered type"))?;
    value.encode(enc)?;
    Ok(())
}

fn decode_thunk<T: Record>(dec: &mut Decoder<'_>) -> DbResult<Payload> {
    Ok(T::decode(dec)?.into_payload())
}

fn migrate_thunk<T: Record>(payload: &mut Payload, from_version: u32) {
    if let Some(value) = T::from_payload_mut(payload) {
        value.migrate(from_version);
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_name: HashMap<&'static str, TypeInfo>,
    names: HashMap<TypeId, &'static str>,
}

/// Map from record types to their runtime metadata.
///
/// The registry is an explicit, constructed object: a store receives its
/// registry at creation time rather than reaching for a process-global.
/// Registration happens once at startup for the fixed record set
/// ([`TypeRegistry::with_defaults`]); lookups are available both by the
/// on-disk type name and by Rust type identity. Registration and lookup are
/// guarded by the registry's own reader/writer lock, independent of any
/// store's lock.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all built-in record types registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<Scene>();
        registry.register::<Model>();
        registry.register::<Mesh>();
        registry.register::<Material>();
        registry.register::<SpectrumMaterial>();
        registry.register::<Wave>();
        registry
    }

    /// Registers a record type. Registering the same type twice is a no-op.
    pub fn register<T: Record>(&self) {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(T::TYPE_NAME) {
            return;
        }
        inner.names.insert(TypeId::of::<T>(), T::TYPE_NAME);
        inner.by_name.insert(
            T::TYPE_NAME,
            TypeInfo {
                name: T::TYPE_NAME,
                version: T::VERSION,
                encode: encode_thunk::<T>,
                decode: decode_thunk::<T>,
                migrate: migrate_thunk::<T>,
            },
        );
    }

    /// Returns `true` if `T` has been registered.
    #[must_use]
    pub fn contains<T: Record>(&self) -> bool {
        self.inner.read().names.contains_key(&TypeId::of::<T>())
    }

    /// Returns `true` if a type with the given on-disk name is registered.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// Looks up type metadata by on-disk name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<TypeInfo> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Looks up type metadata by Rust type identity.
    #[must_use]
    pub fn get<T: Record>(&self) -> Option<TypeInfo> {
        let inner = self.inner.read();
        let name = inner.names.get(&TypeId::of::<T>())?;
        inner.by_name.get(name).copied()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let registry = TypeRegistry::new();
        registry.register::<Scene>();
        registry.register::<Scene>();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_by_name_and_identity() {
        let registry = TypeRegistry::new();
        registry.register::<Wave>();

        assert!(registry.contains::<Wave>());
        assert!(!registry.contains::<Scene>());

        let info = registry.get_by_name("Wave").unwrap();
        assert_eq!(info.name, "Wave");
        assert_eq!(info.version, Wave::VERSION);
        assert_eq!(
            registry.get::<Wave>().map(|i| i.name),
            Some("Wave")
        );
    }

    #[test]
    fn defaults_cover_all_record_kinds() {
        let registry = TypeRegistry::with_defaults();
        for name in [
            "Scene",
            "Model",
            "Mesh",
            "Material",
            "SpectrumMaterial",
            "Wave",
        ] {
            assert!(registry.contains_name(name), "missing {name}");
        }
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn thunks_roundtrip_through_payload() {
        let registry = TypeRegistry::with_defaults();
        let info = registry.get::<Wave>().unwrap();

        let wave = Wave {
            name: "d65".to_string(),
            samples: Vec::new(),
        };
        let payload = wave.clone().into_payload();

        let mut enc = Encoder::new();
        (info.encode)(&payload, &mut enc).unwrap();
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        let decoded = (info.decode)(&mut dec).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn encode_thunk_rejects_mismatched_payload() {
        let registry = TypeRegistry::with_defaults();
        let info = registry.get::<Wave>().unwrap();

        let payload = Scene::default().into_payload();
        let mut enc = Encoder::new();
        assert!((info.encode)(&payload, &mut enc).is_err());
    }
}
