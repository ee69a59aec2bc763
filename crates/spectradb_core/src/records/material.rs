//! The material record: surface appearance of one mesh.

use super::{decode_vec3, encode_vec3, snapshot, typed_id, SpectrumMaterial};
use crate::database::Database;
use crate::error::DbResult;
use crate::handle::ObjectHandle;
use crate::id::SharedId;
use crate::record::{Payload, Record};
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// A surface material.
///
/// Owned by exactly one mesh. It may reference a shared
/// [`SpectrumMaterial`] for spectral response; the reference does not own
/// its target, and it dangles harmlessly if the spectrum material is
/// deleted at scene level.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Display name.
    pub name: String,
    /// RGB albedo used when no spectrum is assigned.
    pub base_color: [f64; 3],
    /// Microfacet roughness in `[0, 1]`.
    pub roughness: f64,
    /// Index of refraction.
    pub ior: f64,
    /// Emission strength; zero for non-emitters.
    pub emission: f64,
    /// Optional reference to a shared spectral response.
    pub spectrum: Option<SharedId<SpectrumMaterial>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [0.8; 3],
            roughness: 0.5,
            ior: 1.45,
            emission: 0.0,
            spectrum: None,
        }
    }
}

impl Record for Material {
    const TYPE_NAME: &'static str = "Material";
    const VERSION: u32 = 1;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        encode_vec3(enc, &self.base_color);
        enc.encode_f64(self.roughness);
        enc.encode_f64(self.ior);
        enc.encode_f64(self.emission);
        enc.encode_opt(self.spectrum.as_ref(), |e, id| {
            id.encode(e);
            Ok(())
        })?;
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            base_color: decode_vec3(dec)?,
            roughness: dec.decode_f64()?,
            ior: dec.decode_f64()?,
            emission: dec.decode_f64()?,
            spectrum: dec.decode_opt(SharedId::decode)?,
        })
    }

    fn into_payload(self) -> Payload {
        Payload::Material(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::Material(material) => Some(material),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::Material(material) => Some(material),
            _ => None,
        }
    }
}

impl Material {
    /// Creates a material with default parameters.
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

    /// Returns the material's name, or an empty string for an invalid
    /// handle.
    #[must_use]
    pub fn name(db: &Database, material: &ObjectHandle) -> String {
        db.get::<Self>(material)
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    /// Renames the material.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn set_name(db: &Database, material: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(material, record)
    }

    /// Returns the base color, or black for an invalid handle.
    #[must_use]
    pub fn base_color(db: &Database, material: &ObjectHandle) -> [f64; 3] {
        db.get::<Self>(material)
            .map(|m| m.base_color)
            .unwrap_or_default()
    }

    /// Sets the base color.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn set_base_color(
        db: &Database,
        material: &ObjectHandle,
        base_color: [f64; 3],
    ) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.base_color == base_color {
            return Ok(());
        }
        record.base_color = base_color;
        db.modify(material, record)
    }

    /// Returns the roughness, or zero for an invalid handle.
    #[must_use]
    pub fn roughness(db: &Database, material: &ObjectHandle) -> f64 {
        db.get::<Self>(material)
            .map(|m| m.roughness)
            .unwrap_or_default()
    }

    /// Sets the roughness.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn set_roughness(db: &Database, material: &ObjectHandle, roughness: f64) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.roughness == roughness {
            return Ok(());
        }
        record.roughness = roughness;
        db.modify(material, record)
    }

    /// Returns the index of refraction, or zero for an invalid handle.
    #[must_use]
    pub fn ior(db: &Database, material: &ObjectHandle) -> f64 {
        db.get::<Self>(material).map(|m| m.ior).unwrap_or_default()
    }

    /// Sets the index of refraction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn set_ior(db: &Database, material: &ObjectHandle, ior: f64) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.ior == ior {
            return Ok(());
        }
        record.ior = ior;
        db.modify(material, record)
    }

    /// Returns the emission strength, or zero for an invalid handle.
    #[must_use]
    pub fn emission(db: &Database, material: &ObjectHandle) -> f64 {
        db.get::<Self>(material)
            .map(|m| m.emission)
            .unwrap_or_default()
    }

    /// Sets the emission strength.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn set_emission(db: &Database, material: &ObjectHandle, emission: f64) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.emission == emission {
            return Ok(());
        }
        record.emission = emission;
        db.modify(material, record)
    }

    /// Returns a handle to the referenced spectrum material, or a null
    /// handle if none is assigned.
    #[must_use]
    pub fn spectrum(db: &Database, material: &ObjectHandle) -> ObjectHandle {
        db.get::<Self>(material)
            .and_then(|m| m.spectrum.map(|id| db.handle(id.id())))
            .unwrap_or_default()
    }

    /// References a shared spectrum material. The old reference (if any) is
    /// dropped but its target is not deleted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn set_spectrum(
        db: &Database,
        material: &ObjectHandle,
        spectrum: &ObjectHandle,
    ) -> DbResult<()> {
        let spectrum_id = SharedId::new(typed_id::<SpectrumMaterial>(db, spectrum)?);
        let mut record = snapshot::<Self>(db, material)?;
        if record.spectrum == Some(spectrum_id) {
            return Ok(());
        }
        record.spectrum = Some(spectrum_id);
        db.modify(material, record)
    }

    /// Drops the spectrum reference without deleting its target.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a
    /// material.
    pub fn clear_spectrum(db: &Database, material: &ObjectHandle) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.spectrum.is_none() {
            return Ok(());
        }
        record.spectrum = None;
        db.modify(material, record)
    }
}
