//! The remote requirements repository.
//!
//! The importer only needs two primitives from the repository: create an
//! entity and receive its identifier, and delete an entity by identifier.
//! [`HttpRepository`] talks to the repository's REST API;
//! [`MemoryRepository`] keeps everything in memory and is used for dry runs
//! and tests.

use crate::domain::{EntityKind, Id, NewEntity};

/// REST client for the repository API.
pub mod http;
pub use http::HttpRepository;

/// In-memory repository.
pub mod memory;
pub use memory::MemoryRepository;

/// Create and delete primitives of a requirements repository.
///
/// The repository offers no transaction spanning several entities. Callers
/// that need all-or-nothing semantics track what they created and compensate
/// on failure (see [`crate::session::Session`]).
pub trait Repository {
    /// Creates an entity and returns the identifier assigned to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository rejects the entity or cannot be
    /// reached.
    fn create(&self, entity: &NewEntity) -> Result<Id, RepositoryError>;

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository rejects the deletion or cannot be
    /// reached.
    fn delete(&self, kind: EntityKind, id: Id) -> Result<(), RepositoryError>;
}

impl<R: Repository + ?Sized> Repository for &R {
    fn create(&self, entity: &NewEntity) -> Result<Id, RepositoryError> {
        (**self).create(entity)
    }

    fn delete(&self, kind: EntityKind, id: Id) -> Result<(), RepositoryError> {
        (**self).delete(kind, id)
    }
}

/// Errors returned by a [`Repository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The repository refused the request.
    #[error("{kind} rejected by repository (status {status}): {message}")]
    Rejected {
        /// Kind of the entity involved.
        kind: EntityKind,
        /// HTTP-style status code.
        status: u16,
        /// Message returned by the repository.
        message: String,
    },

    /// The entity to delete does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of the entity.
        kind: EntityKind,
        /// Identifier that was not found.
        id: Id,
    },

    /// The request could not be sent or the response not received.
    #[error("failed to reach repository: {0}")]
    Transport(#[from] reqwest::Error),

    /// The repository answered with something that is not a valid response.
    #[error("unexpected response from repository: {0}")]
    Response(String),
}
