//! Spectral records: shared distributions and spectral materials.

use super::{snapshot, typed_id};
use crate::database::Database;
use crate::error::DbResult;
use crate::handle::ObjectHandle;
use crate::id::SharedId;
use crate::record::{Payload, Record};
use spectradb_codec::{CodecResult, Decoder, Encoder};

/// One point of a spectral distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectralSample {
    /// Wavelength in nanometers.
    pub wavelength: f64,
    /// Radiant power in watts.
    pub power: f64,
}

/// A sampled spectral distribution, shared at scene level.
///
/// Schema history: version 1 stored sample power in milliwatts; version 2
/// stores watts and rescales old payloads on load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wave {
    /// Display name.
    pub name: String,
    /// Distribution samples, ordered by wavelength.
    pub samples: Vec<SpectralSample>,
}

impl Record for Wave {
    const TYPE_NAME: &'static str = "Wave";
    const VERSION: u32 = 2;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        enc.encode_seq(&self.samples, |e, sample| {
            e.encode_f64(sample.wavelength);
            e.encode_f64(sample.power);
            Ok(())
        })?;
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            samples: dec.decode_seq(|d| {
                Ok(SpectralSample {
                    wavelength: d.decode_f64()?,
                    power: d.decode_f64()?,
                })
            })?,
        })
    }

    fn migrate(&mut self, from_version: u32) {
        if from_version < 2 {
            for sample in &mut self.samples {
                sample.power /= 1000.0;
            }
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Wave(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::Wave(wave) => Some(wave),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::Wave(wave) => Some(wave),
            _ => None,
        }
    }
}

impl Wave {
    /// Creates a wave with the given samples.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn create(db: &Database, name: &str, samples: Vec<SpectralSample>) -> DbResult<ObjectHandle> {
        db.create(Self {
            name: name.to_owned(),
            samples,
        })
    }

    /// Returns the wave's name, or an empty string for an invalid handle.
    #[must_use]
    pub fn name(db: &Database, wave: &ObjectHandle) -> String {
        db.get::<Self>(wave)
            .map(|w| w.name.clone())
            .unwrap_or_default()
    }

    /// Renames the wave.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a wave.
    pub fn set_name(db: &Database, wave: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, wave)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(wave, record)
    }

    /// Returns the wave's samples, or an empty list for an invalid handle.
    #[must_use]
    pub fn samples(db: &Database, wave: &ObjectHandle) -> Vec<SpectralSample> {
        db.get::<Self>(wave)
            .map(|w| w.samples.clone())
            .unwrap_or_default()
    }

    /// Replaces the wave's samples.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a wave.
    pub fn set_samples(
        db: &Database,
        wave: &ObjectHandle,
        samples: Vec<SpectralSample>,
    ) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, wave)?;
        if record.samples == samples {
            return Ok(());
        }
        record.samples = samples;
        db.modify(wave, record)
    }
}

/// A spectral material, shared at scene level.
///
/// References the waves that make up its response. Deleting a spectrum
/// material is a scene-level decision ([`super::Scene::del_spectrum_material`]);
/// nothing here checks whether surfaces still reference it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumMaterial {
    /// Display name.
    pub name: String,
    /// Referenced spectral distributions.
    pub waves: Vec<SharedId<Wave>>,
}

impl Record for SpectrumMaterial {
    const TYPE_NAME: &'static str = "SpectrumMaterial";
    const VERSION: u32 = 1;

    fn encode(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.encode_str(&self.name)?;
        enc.encode_seq(&self.waves, |e, id| {
            id.encode(e);
            Ok(())
        })?;
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            name: dec.decode_str()?,
            waves: dec.decode_seq(SharedId::decode)?,
        })
    }

    fn into_payload(self) -> Payload {
        Payload::SpectrumMaterial(self)
    }

    fn from_payload(payload: &Payload) -> Option<&Self> {
        match payload {
            Payload::SpectrumMaterial(material) => Some(material),
            _ => None,
        }
    }

    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
        match payload {
            Payload::SpectrumMaterial(material) => Some(material),
            _ => None,
        }
    }
}

impl SpectrumMaterial {
    /// Creates a spectrum material with no waves.
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
    /// Returns `InvalidHandle` if the handle does not resolve to a spectrum
    /// material.
    pub fn set_name(db: &Database, material: &ObjectHandle, name: &str) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.name == name {
            return Ok(());
        }
        record.name = name.to_owned();
        db.modify(material, record)
    }

    /// Returns handles to the referenced waves.
    #[must_use]
    pub fn waves(db: &Database, material: &ObjectHandle) -> Vec<ObjectHandle> {
        db.get::<Self>(material)
            .map(|m| m.waves.iter().map(|id| db.handle(id.id())).collect())
            .unwrap_or_default()
    }

    /// References a wave. No-op if already referenced.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if either handle is invalid or mistyped.
    pub fn add_wave(db: &Database, material: &ObjectHandle, wave: &ObjectHandle) -> DbResult<()> {
        let wave_id = SharedId::new(typed_id::<Wave>(db, wave)?);
        let mut record = snapshot::<Self>(db, material)?;
        if record.waves.contains(&wave_id) {
            return Ok(());
        }
        record.waves.push(wave_id);
        db.modify(material, record)
    }

    /// Drops a wave reference. The wave itself is not deleted; waves are
    /// shared and die only through the scene's own calls.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the material handle is invalid or
    /// mistyped.
    pub fn del_wave(db: &Database, material: &ObjectHandle, wave: &ObjectHandle) -> DbResult<()> {
        let wave_id = SharedId::new(wave.id());
        let mut record = snapshot::<Self>(db, material)?;
        if !record.waves.contains(&wave_id) {
            return Ok(());
        }
        record.waves.retain(|id| *id != wave_id);
        db.modify(material, record)
    }

    /// Drops all wave references without deleting their targets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle does not resolve to a spectrum
    /// material.
    pub fn clear_waves(db: &Database, material: &ObjectHandle) -> DbResult<()> {
        let mut record = snapshot::<Self>(db, material)?;
        if record.waves.is_empty() {
            return Ok(());
        }
        record.waves.clear();
        db.modify(material, record)
    }
}
