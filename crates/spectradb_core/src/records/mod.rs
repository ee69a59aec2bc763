//! Domain records and their accessor façades.
//!
//! Each record type exposes static accessor functions taking a store plus a
//! handle. They all follow the same template: resolve the handle to a typed
//! view (getters degrade to a neutral default when the handle is invalid or
//! mistyped, setters fail with `InvalidHandle`), skip the write entirely
//! when the new value equals the old one, otherwise clone the whole record,
//! change the one field, and submit it through [`Database::modify`].
//!
//! Ownership discipline: `Vec<OwnedId<..>>` fields are exclusively-owned
//! children and cascade-delete with their parent; `SharedId<..>` fields are
//! references to scene-level shared resources, which only the explicit
//! scene-level `del_*`/`clear_*` calls delete.

mod material;
mod mesh;
mod model;
mod scene;
mod spectrum;

pub use material::Material;
pub use mesh::Mesh;
pub use model::Model;
pub use scene::Scene;
pub use spectrum::{SpectralSample, SpectrumMaterial, Wave};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::handle::ObjectHandle;
use crate::id::ObjectId;
use crate::record::Record;
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// Clones the record behind `handle`, or fails with `InvalidHandle`.
pub(crate) fn snapshot<T: Record>(db: &Database, handle: &ObjectHandle) -> DbResult<T> {
    match db.get::<T>(handle) {
        Some(view) => Ok(T::clone(&view)),
        None => Err(DbError::InvalidHandle),
    }
}

/// Returns the id behind `handle` after checking it resolves to a live `T`.
pub(crate) fn typed_id<T: Record>(db: &Database, handle: &ObjectHandle) -> DbResult<ObjectId> {
    if db.get::<T>(handle).is_some() {
        Ok(handle.id())
    } else {
        Err(DbError::InvalidHandle)
    }
}

pub(crate) fn encode_vec3(enc: &mut Encoder, v: &[f64; 3]) {
    for component in v {
        enc.encode_f64(*component);
    }
}

pub(crate) fn decode_vec3(dec: &mut Decoder<'_>) -> CodecResult<[f64; 3]> {
    Ok([dec.decode_f64()?, dec.decode_f64()?, dec.decode_f64()?])
}
