//! Compliance catalogue import
//!
//! Security and compliance standards are published as spreadsheets, JSON
//! exports and DocBook documents. This crate folds each of them into a common
//! catalogue model of topics and requirements, and uploads the result to a
//! requirements repository in a single all-or-nothing run.

/// Catalogue model, repository entities and configuration.
pub mod domain;
pub use domain::{CatalogueDraft, Config, Key};

/// One import run from download to commit.
pub mod import;

/// Clients of the requirements repository.
pub mod repository;
pub use repository::{HttpRepository, MemoryRepository, Repository};

/// Per-run tracking of created entities and rollback.
pub mod session;
pub use session::Session;

/// The supported standards and their adapters.
pub mod source;
pub use source::Standard;

/// Creation of a catalogue's entities in dependency order.
pub mod upload;
