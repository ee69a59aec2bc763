//! The record contract and the closed payload union.

use crate::records::{Material, Mesh, Model, Scene, SpectrumMaterial, Wave};
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// Contract implemented by every storable record type.
///
/// Records are plain value structs holding primitives, strings, file paths
/// and identifiers of other objects — never handles or pointers.
/// Cross-object references are resolved lazily through the owning store.
///
/// Each implementation also bridges to [`Payload`], the closed union the
/// store keeps in its slots. The fixed record set trades open extensibility
/// for exhaustiveness checking; adding a record type means adding a
/// `Payload` variant and registering the type at startup.
pub trait Record: Clone + PartialEq + std::fmt::Debug + Send + Sync + Sized + 'static {
    /// Stable type name used in database files.
    const TYPE_NAME: &'static str;

    /// Current schema version, stamped on every save.
    const VERSION: u32;

    /// Writes the record body.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be encoded.
    fn encode(&self, enc: &mut Encoder) -> CodecResult<()>;

    /// Reads a record body written by [`Record::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated or malformed.
    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self>;

    /// Upgrades a value decoded from an older schema version.
    ///
    /// Called after [`Record::decode`] when the version stored in the file
    /// is lower than [`Record::VERSION`]. The default is a no-op.
    fn migrate(&mut self, from_version: u32) {
        let _ = from_version;
    }

    /// Wraps the record into the store's payload union.
    fn into_payload(self) -> Payload;

    /// Borrows the record out of a payload, or `None` on a kind mismatch.
    fn from_payload(payload: &Payload) -> Option<&Self>;

    /// Mutably borrows the record out of a payload.
    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self>;
}

/// The value stored in a live slot: one of the known record kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A scene, the root of the object graph.
    Scene(Scene),
    /// A placed model.
    Model(Model),
    /// A mesh belonging to a model.
    Mesh(Mesh),
    /// A surface material belonging to a mesh.
    Material(Material),
    /// A shared spectral material.
    SpectrumMaterial(SpectrumMaterial),
    /// A shared spectral distribution.
    Wave(Wave),
}

impl Payload {
    /// Returns the stable type name of the wrapped record.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scene(_) => Scene::TYPE_NAME,
            Self::Model(_) => Model::TYPE_NAME,
            Self::Mesh(_) => Mesh::TYPE_NAME,
            Self::Material(_) => Material::TYPE_NAME,
            Self::SpectrumMaterial(_) => SpectrumMaterial::TYPE_NAME,
            Self::Wave(_) => Wave::TYPE_NAME,
        }
    }
}
