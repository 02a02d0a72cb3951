//! Domain models for catalogue import.
//!
//! This module contains the core domain types: normalized keys, the entities
//! stored by the requirements repository, the canonical catalogue draft shared
//! by every source adapter, and configuration.

mod config;
pub use config::Config;

/// Canonical catalogue mapping.
pub mod draft;
pub use draft::{
    CatalogueDraft, DraftError, DraftStats, ExtraDraft, ExtraTypeDraft, Keyed, RequirementDraft,
    Siblings, TopicDraft,
};

/// Repository entities and identifiers.
pub mod entity;
pub use entity::{
    Catalogue, EntityKind, ExtraEntry, ExtraKind, ExtraType, Id, IdRef, NewEntity, Requirement,
    Tag, Topic,
};

/// Topic and requirement keys, and their zero-padding normalization.
pub mod key;
pub use key::{EmptyKeyError, Key};
