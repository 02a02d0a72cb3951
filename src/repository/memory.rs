use std::{
    cell::RefCell,
    collections::{BTreeMap, HashSet},
};

use tracing::instrument;

use crate::{
    domain::{EntityKind, Id, Key, NewEntity},
    repository::{Repository, RepositoryError},
};

/// A [`Repository`] that keeps every entity in memory.
///
/// It enforces the same referential rules as the remote repository: an entity
/// may only reference identifiers of the right kind that already exist, sibling
/// keys are unique, and an entity that others still depend on cannot be
/// deleted. Failures can be injected to exercise rollback.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RefCell<State>,
    faults: Faults,
}

#[derive(Debug, Default)]
struct State {
    last_id: u64,
    creates: usize,
    entities: BTreeMap<Id, NewEntity>,
}

#[derive(Debug, Default)]
struct Faults {
    create_after: Option<usize>,
    create_of: HashSet<EntityKind>,
    delete_of: HashSet<EntityKind>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every create after the first `successes` fail.
    #[must_use]
    pub const fn failing_after(mut self, successes: usize) -> Self {
        self.faults.create_after = Some(successes);
        self
    }

    /// Makes every create of the given kind fail.
    #[must_use]
    pub fn failing_create_of(mut self, kind: EntityKind) -> Self {
        self.faults.create_of.insert(kind);
        self
    }

    /// Makes every delete of the given kind fail.
    #[must_use]
    pub fn failing_delete_of(mut self, kind: EntityKind) -> Self {
        self.faults.delete_of.insert(kind);
        self
    }

    /// Number of stored entities of the given kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.state
            .borrow()
            .entities
            .values()
            .filter(|entity| entity.kind() == kind)
            .count()
    }

    /// Number of stored entities of every kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().entities.len()
    }

    /// Whether the repository holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().entities.is_empty()
    }

    /// Returns a copy of the entity with the given identifier.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<NewEntity> {
        self.state.borrow().entities.get(&id).cloned()
    }

    /// Returns copies of every stored entity of the given kind, in creation
    /// order.
    #[must_use]
    pub fn entities(&self, kind: EntityKind) -> Vec<(Id, NewEntity)> {
        self.state
            .borrow()
            .entities
            .iter()
            .filter(|(_, entity)| entity.kind() == kind)
            .map(|(&id, entity)| (id, entity.clone()))
            .collect()
    }
}

fn rejected(kind: EntityKind, status: u16, message: impl Into<String>) -> RepositoryError {
    RepositoryError::Rejected {
        kind,
        status,
        message: message.into(),
    }
}

impl State {
    fn require(
        &self,
        kind: EntityKind,
        referenced: EntityKind,
        id: Id,
    ) -> Result<(), RepositoryError> {
        match self.entities.get(&id) {
            Some(entity) if entity.kind() == referenced => Ok(()),
            _ => Err(rejected(
                kind,
                422,
                format!("referenced {referenced} {id} does not exist"),
            )),
        }
    }

    fn sibling_key_taken(&self, parent: Id, key: &Key) -> bool {
        self.entities.values().any(|entity| match entity {
            NewEntity::Topic(topic) => topic.parent == Some(parent) && topic.key == *key,
            NewEntity::Requirement(requirement) => {
                requirement.parent == parent && requirement.key == *key
            }
            _ => false,
        })
    }

    fn check_references(&self, entity: &NewEntity) -> Result<(), RepositoryError> {
        let kind = entity.kind();
        match entity {
            NewEntity::Tag(_) | NewEntity::ExtraType(_) => Ok(()),
            NewEntity::Topic(topic) => match topic.parent {
                Some(parent) => {
                    self.require(kind, EntityKind::Topic, parent)?;
                    if self.sibling_key_taken(parent, &topic.key) {
                        return Err(rejected(
                            kind,
                            409,
                            format!("key {} already exists", topic.key),
                        ));
                    }
                    Ok(())
                }
                None => Ok(()),
            },
            NewEntity::Requirement(requirement) => {
                self.require(kind, EntityKind::Topic, requirement.parent)?;
                if self.sibling_key_taken(requirement.parent, &requirement.key) {
                    return Err(rejected(
                        kind,
                        409,
                        format!("key {} already exists", requirement.key),
                    ));
                }
                requirement
                    .tags
                    .iter()
                    .try_for_each(|tag| self.require(kind, EntityKind::Tag, tag.id))
            }
            NewEntity::ExtraEntry(entry) => {
                self.require(kind, EntityKind::ExtraType, entry.extra_type)?;
                self.require(kind, EntityKind::Requirement, entry.requirement)
            }
            NewEntity::Catalogue(catalogue) => catalogue
                .topics
                .iter()
                .try_for_each(|topic| self.require(kind, EntityKind::Topic, topic.id)),
        }
    }

    /// Whether any stored entity other than a catalogue references `id`.
    fn is_referenced(&self, id: Id) -> bool {
        self.entities.values().any(|entity| match entity {
            NewEntity::Topic(topic) => topic.parent == Some(id),
            NewEntity::Requirement(requirement) => {
                requirement.parent == id || requirement.tags.iter().any(|tag| tag.id == id)
            }
            NewEntity::ExtraEntry(entry) => entry.extra_type == id || entry.requirement == id,
            NewEntity::Tag(_) | NewEntity::ExtraType(_) | NewEntity::Catalogue(_) => false,
        })
    }
}

impl Repository for MemoryRepository {
    #[instrument(skip(self, entity), fields(kind = %entity.kind()))]
    fn create(&self, entity: &NewEntity) -> Result<Id, RepositoryError> {
        let kind = entity.kind();
        let mut state = self.state.borrow_mut();

        if self
            .faults
            .create_after
            .is_some_and(|successes| state.creates >= successes)
            || self.faults.create_of.contains(&kind)
        {
            return Err(rejected(kind, 500, "injected create failure"));
        }

        state.check_references(entity)?;

        state.last_id += 1;
        state.creates += 1;
        let id = Id::new(state.last_id);
        state.entities.insert(id, entity.clone());
        tracing::trace!("Stored {} as {id}", entity.label());
        Ok(id)
    }

    #[instrument(skip(self))]
    fn delete(&self, kind: EntityKind, id: Id) -> Result<(), RepositoryError> {
        if self.faults.delete_of.contains(&kind) {
            return Err(rejected(kind, 500, "injected delete failure"));
        }

        let mut state = self.state.borrow_mut();
        match state.entities.get(&id) {
            Some(entity) if entity.kind() == kind => {}
            _ => return Err(RepositoryError::NotFound { kind, id }),
        }
        if state.is_referenced(id) {
            return Err(rejected(kind, 409, format!("{kind} {id} is still referenced")));
        }
        state.entities.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Catalogue, ExtraEntry, ExtraKind, ExtraType, Requirement, Tag, Topic};

    fn topic(key: &str, parent: Option<Id>) -> NewEntity {
        NewEntity::Topic(Topic {
            key: Key::new(key).unwrap(),
            title: key.to_string(),
            description: "-".to_string(),
            parent,
        })
    }

    fn requirement(key: &str, parent: Id, tags: &[Id]) -> NewEntity {
        NewEntity::Requirement(Requirement {
            key: Key::new(key).unwrap(),
            title: key.to_string(),
            description: "-".to_string(),
            parent,
            visible: true,
            tags: tags.iter().copied().map(Into::into).collect(),
        })
    }

    fn tag(name: &str) -> NewEntity {
        NewEntity::Tag(Tag {
            name: name.to_string(),
        })
    }

    #[test]
    fn assigns_increasing_ids_and_counts_per_kind() {
        let repository = MemoryRepository::new();
        let level = repository.create(&tag("Level 1")).unwrap();
        let root = repository.create(&topic("V01", None)).unwrap();
        let leaf = repository
            .create(&requirement("V01.01", root, &[level]))
            .unwrap();

        assert!(level < root && root < leaf);
        assert_eq!(repository.count(EntityKind::Tag), 1);
        assert_eq!(repository.count(EntityKind::Topic), 1);
        assert_eq!(repository.count(EntityKind::Requirement), 1);
        assert_eq!(repository.len(), 3);
    }

    #[test]
    fn rejects_dangling_references() {
        let repository = MemoryRepository::new();
        let error = repository
            .create(&topic("V01.01", Some(Id::new(99))))
            .unwrap_err();
        assert!(matches!(error, RepositoryError::Rejected { status: 422, .. }));

        let level = repository.create(&tag("Level 1")).unwrap();
        // A tag is not a valid parent.
        assert!(repository.create(&requirement("R", level, &[])).is_err());
        assert_eq!(repository.len(), 1);
    }

    #[test]
    fn rejects_duplicate_sibling_keys() {
        let repository = MemoryRepository::new();
        let root = repository.create(&topic("A", None)).unwrap();
        repository.create(&topic("A.01", Some(root))).unwrap();
        let error = repository.create(&topic("A.01", Some(root))).unwrap_err();
        assert!(matches!(error, RepositoryError::Rejected { status: 409, .. }));
    }

    #[test]
    fn refuses_to_delete_referenced_entities() {
        let repository = MemoryRepository::new();
        let extra = repository
            .create(&NewEntity::ExtraType(ExtraType {
                title: "CVE Ref".to_string(),
                kind: ExtraKind::ShortText,
                description: "CVE Reference".to_string(),
            }))
            .unwrap();
        let root = repository.create(&topic("A", None)).unwrap();
        let leaf = repository.create(&requirement("A.1", root, &[])).unwrap();
        let entry = repository
            .create(&NewEntity::ExtraEntry(ExtraEntry {
                content: "79".to_string(),
                extra_type: extra,
                requirement: leaf,
            }))
            .unwrap();
        repository
            .create(&NewEntity::Catalogue(Catalogue {
                title: "C".to_string(),
                description: "-".to_string(),
                topics: vec![root.into()],
            }))
            .unwrap();

        assert!(repository.delete(EntityKind::Requirement, leaf).is_err());
        assert!(repository.delete(EntityKind::ExtraType, extra).is_err());
        repository.delete(EntityKind::ExtraEntry, entry).unwrap();
        repository.delete(EntityKind::Requirement, leaf).unwrap();
        repository.delete(EntityKind::ExtraType, extra).unwrap();
        // Catalogue membership does not pin a topic.
        repository.delete(EntityKind::Topic, root).unwrap();
        assert_eq!(repository.count(EntityKind::Catalogue), 1);
    }

    #[test]
    fn delete_checks_kind_and_existence() {
        let repository = MemoryRepository::new();
        let level = repository.create(&tag("Level 1")).unwrap();
        assert!(matches!(
            repository.delete(EntityKind::Topic, level),
            Err(RepositoryError::NotFound { .. })
        ));
        repository.delete(EntityKind::Tag, level).unwrap();
        assert!(matches!(
            repository.delete(EntityKind::Tag, level),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn injected_failures() {
        let repository = MemoryRepository::new().failing_after(2);
        repository.create(&tag("a")).unwrap();
        repository.create(&tag("b")).unwrap();
        assert!(repository.create(&tag("c")).is_err());
        assert_eq!(repository.count(EntityKind::Tag), 2);

        let repository = MemoryRepository::new()
            .failing_create_of(EntityKind::Topic)
            .failing_delete_of(EntityKind::Tag);
        let level = repository.create(&tag("a")).unwrap();
        assert!(repository.create(&topic("A", None)).is_err());
        assert!(repository.delete(EntityKind::Tag, level).is_err());
    }
}
