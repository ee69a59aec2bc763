//! # SpectraDB Core
//!
//! Embedded object store for the Spectra editor.
//!
//! Every editable entity — scenes, models, meshes, materials, spectral
//! data — lives in a [`Database`]: a generational slot store with
//! transactional undo/redo and a versioned binary file format. External
//! code never holds objects directly; it holds [`ObjectHandle`]s and reads
//! or replaces whole records through them.
//!
//! ```
//! use spectradb_core::records::{Model, Scene};
//! use spectradb_core::{Database, TypeRegistry};
//! use std::sync::Arc;
//!
//! let db = Database::new(Arc::new(TypeRegistry::with_defaults()));
//!
//! let scene = Scene::create(&db, "main").unwrap();
//! let model = Model::create(&db, "teapot").unwrap();
//! db.set_root(&scene).unwrap();
//!
//! // One transaction = one undo step.
//! db.with_transaction(|db| Scene::add_model(db, &scene, &model))
//!     .unwrap();
//! assert_eq!(Scene::models(&db, &scene).len(), 1);
//!
//! db.undo().unwrap();
//! assert!(Scene::models(&db, &scene).is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod file;
mod handle;
mod id;
mod record;
pub mod records;
mod registry;
mod transaction;

pub use config::{DbConfig, CURRENT_FILE_VERSION, DEFAULT_UNDO_CAPACITY};
pub use database::Database;
pub use error::{DbError, DbResult};
pub use handle::ObjectHandle;
pub use id::{ObjectId, OwnedId, SharedId};
pub use record::{Payload, Record};
pub use registry::{TypeInfo, TypeRegistry};
pub use transaction::TxnGuard;
