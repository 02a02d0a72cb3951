//! Per-run tracking of created entities and compensating rollback.
//!
//! The repository has no multi-entity transactions. A [`Session`] records the
//! identifier of every entity it creates, so a failed run can delete them all
//! again and leave the repository as it was before the run.

use std::collections::BTreeMap;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    domain::{EntityKind, Id, NewEntity},
    repository::{Repository, RepositoryError},
};

/// The order in which entity kinds are deleted during rollback.
///
/// Dependents go before the entities they reference. Within a kind, entities
/// are deleted in reverse creation order, so child topics go before their
/// parents.
pub const ROLLBACK_ORDER: [EntityKind; 6] = [
    EntityKind::ExtraEntry,
    EntityKind::Requirement,
    EntityKind::Topic,
    EntityKind::Tag,
    EntityKind::ExtraType,
    EntityKind::Catalogue,
];

/// Identifiers created during one run, per kind, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    ids: BTreeMap<EntityKind, Vec<Id>>,
}

impl Ledger {
    /// Records a created entity.
    pub fn record(&mut self, kind: EntityKind, id: Id) {
        self.ids.entry(kind).or_default().push(id);
    }

    /// The identifiers created for a kind, in creation order.
    #[must_use]
    pub fn ids(&self, kind: EntityKind) -> &[Id] {
        self.ids.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// The number of entities created for a kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids(kind).len()
    }

    /// The number of entities created in total.
    #[must_use]
    pub fn total(&self) -> usize {
        self.ids.values().map(Vec::len).sum()
    }

    /// Whether nothing was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A created entity could not be deleted during rollback.
#[derive(Debug, thiserror::Error)]
#[error("failed to delete {kind} {id} during rollback")]
pub struct RollbackError {
    /// Kind of the entity left behind.
    pub kind: EntityKind,
    /// Identifier of the entity left behind.
    pub id: Id,
    /// Why the deletion failed.
    #[source]
    pub source: RepositoryError,
}

/// The outcome of a rollback.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Entities deleted successfully.
    pub deleted: usize,
    /// Entities that could not be deleted and remain in the repository.
    pub failures: Vec<RollbackError>,
}

impl RollbackReport {
    /// Whether every created entity was deleted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One import run against a repository.
///
/// Every entity created through the session is recorded. The session ends
/// either with [`Session::commit`], which keeps everything, or
/// [`Session::rollback`], which deletes everything.
#[derive(Debug)]
pub struct Session<'r, R: Repository + ?Sized> {
    repository: &'r R,
    run_id: Uuid,
    ledger: Ledger,
}

impl<'r, R: Repository + ?Sized> Session<'r, R> {
    /// Starts a session with a fresh run identifier.
    pub fn new(repository: &'r R) -> Self {
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, "Starting import session");
        Self {
            repository,
            run_id,
            ledger: Ledger::default(),
        }
    }

    /// The identifier of this run, recorded on its log spans.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Everything created so far.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Creates an entity and records its identifier.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if the entity could not be created.
    /// Nothing is recorded in that case.
    #[instrument(skip(self, entity), fields(run_id = %self.run_id, kind = %entity.kind()))]
    pub fn create(&mut self, entity: &NewEntity) -> Result<Id, RepositoryError> {
        let id = self.repository.create(entity)?;
        self.ledger.record(entity.kind(), id);
        tracing::debug!("Created {} ({id})", entity.label());
        Ok(id)
    }

    /// Ends the run successfully, keeping every created entity.
    #[must_use]
    pub fn commit(self) -> Ledger {
        tracing::info!(
            run_id = %self.run_id,
            "Committed {} entities",
            self.ledger.total()
        );
        self.ledger
    }

    /// Ends the run unsuccessfully, deleting every created entity.
    ///
    /// Deletion failures do not stop the rollback; each is logged and
    /// collected in the report.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub fn rollback(self) -> RollbackReport {
        let mut report = RollbackReport::default();
        tracing::warn!("Rolling back {} created entities", self.ledger.total());

        for kind in ROLLBACK_ORDER {
            for &id in self.ledger.ids(kind).iter().rev() {
                match self.repository.delete(kind, id) {
                    Ok(()) => report.deleted += 1,
                    Err(source) => {
                        let error = RollbackError { kind, id, source };
                        tracing::error!("{error}: {}", error.source);
                        report.failures.push(error);
                    }
                }
            }
        }

        if report.is_clean() {
            tracing::info!("Rolled back {} entities", report.deleted);
        } else {
            tracing::error!(
                "Rollback incomplete: {} deleted, {} left behind",
                report.deleted,
                report.failures.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{Key, Requirement, Tag, Topic},
        repository::MemoryRepository,
    };

    fn tag(name: &str) -> NewEntity {
        NewEntity::Tag(Tag {
            name: name.to_string(),
        })
    }

    fn topic(key: &str, parent: Option<Id>) -> NewEntity {
        NewEntity::Topic(Topic {
            key: Key::new(key).unwrap(),
            title: key.to_string(),
            description: "-".to_string(),
            parent,
        })
    }

    /// Creates a tag, a three-level topic chain and a tagged requirement.
    fn populate(session: &mut Session<'_, MemoryRepository>) -> Result<(), RepositoryError> {
        let level = session.create(&tag("Level 1"))?;
        let root = session.create(&topic("A", None))?;
        let child = session.create(&topic("A.01", Some(root)))?;
        let grandchild = session.create(&topic("A.01.01", Some(child)))?;
        session.create(&NewEntity::Requirement(Requirement {
            key: Key::new("A.01.01.01").unwrap(),
            title: "R".to_string(),
            description: "-".to_string(),
            parent: grandchild,
            visible: true,
            tags: vec![level.into()],
        }))?;
        Ok(())
    }

    #[test]
    fn ledger_records_per_kind_in_order() {
        let mut ledger = Ledger::default();
        ledger.record(EntityKind::Topic, Id::new(3));
        ledger.record(EntityKind::Tag, Id::new(1));
        ledger.record(EntityKind::Topic, Id::new(5));

        assert_eq!(ledger.ids(EntityKind::Topic), [Id::new(3), Id::new(5)]);
        assert_eq!(ledger.count(EntityKind::Tag), 1);
        assert_eq!(ledger.count(EntityKind::Catalogue), 0);
        assert_eq!(ledger.total(), 3);
    }

    #[test]
    fn commit_keeps_everything() {
        let repository = MemoryRepository::new();
        let mut session = Session::new(&repository);
        populate(&mut session).unwrap();

        let ledger = session.commit();
        assert_eq!(ledger.count(EntityKind::Topic), 3);
        assert_eq!(repository.len(), 5);
    }

    #[test]
    fn rollback_deletes_children_before_parents() {
        let repository = MemoryRepository::new();
        let mut session = Session::new(&repository);
        populate(&mut session).unwrap();

        let report = session.rollback();
        assert!(report.is_clean());
        assert_eq!(report.deleted, 5);
        assert!(repository.is_empty());
    }

    #[test_case(0; "first create fails")]
    #[test_case(1; "after the tag")]
    #[test_case(3; "mid topic chain")]
    #[test_case(4; "on the requirement")]
    fn failed_run_restores_pre_run_counts(successes: usize) {
        // Two pre-existing entities the run must not touch.
        let failing = MemoryRepository::new().failing_after(successes + 2);
        failing.create(&tag("Existing")).unwrap();
        failing.create(&topic("X", None)).unwrap();
        let before = EntityKind::ALL.map(|kind| failing.count(kind));

        let mut session = Session::new(&failing);
        assert!(populate(&mut session).is_err());
        assert_eq!(session.ledger().total(), successes);
        let report = session.rollback();

        assert!(report.is_clean());
        assert_eq!(report.deleted, successes);
        assert_eq!(EntityKind::ALL.map(|kind| failing.count(kind)), before);
    }

    #[test]
    fn rollback_continues_past_delete_failures() {
        let repository = MemoryRepository::new().failing_delete_of(EntityKind::Tag);
        let mut session = Session::new(&repository);
        populate(&mut session).unwrap();

        let report = session.rollback();
        assert_eq!(report.deleted, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, EntityKind::Tag);
        assert_eq!(repository.count(EntityKind::Topic), 0);
        assert_eq!(repository.count(EntityKind::Tag), 1);
    }

    #[test]
    fn sessions_have_distinct_run_ids() {
        let repository = MemoryRepository::new();
        let first = Session::new(&repository);
        let second = Session::new(&repository);
        assert_ne!(first.run_id(), second.run_id());
    }
}
