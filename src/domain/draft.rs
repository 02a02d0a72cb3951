//! The canonical catalogue mapping shared by every source adapter.
//!
//! A [`CatalogueDraft`] is an in-memory description of one catalogue: the tags
//! and supplementary fields it declares, and its topic tree with requirement
//! leaves. It holds no repository identifiers; those are assigned when the
//! draft is uploaded.

use std::collections::{HashMap, HashSet};

use crate::domain::{ExtraKind, Key};

/// Items stored in [`Siblings`] expose the key they are indexed by.
pub trait Keyed {
    /// The sibling-unique key.
    fn key(&self) -> &Key;
}

/// An insertion-ordered collection of items with unique keys.
///
/// Source documents define the display order of topics and requirements, so
/// the order of first insertion is kept. Re-inserting an existing key
/// replaces the item in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Siblings<T> {
    /// The items, stored contiguously in insertion order.
    items: Vec<T>,

    /// An index from key to position in `items`.
    index: HashMap<Key, usize>,
}

impl<T> Default for Siblings<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> Siblings<T> {
    /// Inserts an item, replacing (in place) any item with the same key.
    ///
    /// Returns the replaced item, if any.
    pub fn insert(&mut self, item: T) -> Option<T> {
        if let Some(&position) = self.index.get(item.key()) {
            return Some(std::mem::replace(&mut self.items[position], item));
        }
        self.index.insert(item.key().clone(), self.items.len());
        self.items.push(item);
        None
    }

    /// Returns the item with the given key, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, key: &Key, make: impl FnOnce() -> T) -> &mut T {
        let position = if let Some(&position) = self.index.get(key) {
            position
        } else {
            let item = make();
            debug_assert_eq!(item.key(), key);
            self.index.insert(key.clone(), self.items.len());
            self.items.push(item);
            self.items.len() - 1
        };
        &mut self.items[position]
    }

    /// Retrieves an item by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.index
            .get(key)
            .and_then(|&position| self.items.get(position))
    }

    /// Retrieves an item by key, mutably.
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut T> {
        let position = *self.index.get(key)?;
        self.items.get_mut(position)
    }

    /// Whether an item with the given key exists.
    #[must_use]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }
}

impl<T> Siblings<T> {
    /// Iterates over the items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a Siblings<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Keyed> FromIterator<T> for Siblings<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut siblings = Self::default();
        for item in iter {
            siblings.insert(item);
        }
        siblings
    }
}

/// The canonical description of one catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogueDraft {
    /// Catalogue title.
    pub title: String,
    /// Catalogue description.
    pub description: String,
    /// Tag names declared by this catalogue, created before any topic.
    pub tags: Vec<String>,
    /// Supplementary fields declared by this catalogue.
    pub extra_types: Vec<ExtraTypeDraft>,
    /// Root topics.
    pub topics: Siblings<TopicDraft>,
}

/// A supplementary field declared by a catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraTypeDraft {
    /// Field name; requirements refer to the field by this name.
    pub title: String,
    /// Presentation kind.
    pub kind: ExtraKind,
    /// Field description.
    pub description: String,
}

/// A topic and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDraft {
    /// Key, unique among siblings.
    pub key: Key,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Child topics.
    pub topics: Siblings<TopicDraft>,
    /// Requirement leaves directly below this topic.
    pub requirements: Siblings<RequirementDraft>,
}

impl TopicDraft {
    /// Creates an empty topic.
    #[must_use]
    pub fn new(key: Key, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            description: description.into(),
            topics: Siblings::default(),
            requirements: Siblings::default(),
        }
    }
}

impl Keyed for TopicDraft {
    fn key(&self) -> &Key {
        &self.key
    }
}

/// A requirement leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementDraft {
    /// Key, unique among siblings.
    pub key: Key,
    /// Short title.
    pub title: String,
    /// Requirement text.
    pub description: String,
    /// `false` when the source marks the requirement withdrawn or superseded.
    pub visible: bool,
    /// Names of declared tags.
    pub tags: Vec<String>,
    /// Values of declared supplementary fields.
    pub extras: Vec<ExtraDraft>,
}

impl RequirementDraft {
    /// Creates a visible requirement without tags or extras.
    #[must_use]
    pub fn new(key: Key, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            description: description.into(),
            visible: true,
            tags: Vec::new(),
            extras: Vec::new(),
        }
    }
}

impl Keyed for RequirementDraft {
    fn key(&self) -> &Key {
        &self.key
    }
}

/// The value of a supplementary field on a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDraft {
    /// Title of the declared field.
    pub extra_type: String,
    /// Field value.
    pub content: String,
}

/// Entity counts of a draft, as they would be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftStats {
    /// Declared tags.
    pub tags: usize,
    /// Declared supplementary fields.
    pub extra_types: usize,
    /// Topics at every level.
    pub topics: usize,
    /// Requirement leaves.
    pub requirements: usize,
    /// Supplementary field values.
    pub extra_entries: usize,
}

/// A draft references something it does not declare.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DraftError {
    /// A requirement carries a tag the catalogue does not declare.
    #[error("requirement {requirement} references undeclared tag '{tag}'")]
    UnknownTag {
        /// The offending requirement.
        requirement: Key,
        /// The undeclared tag name.
        tag: String,
    },

    /// A requirement carries a value of an undeclared field.
    #[error("requirement {requirement} references undeclared extra type '{extra_type}'")]
    UnknownExtraType {
        /// The offending requirement.
        requirement: Key,
        /// The undeclared field name.
        extra_type: String,
    },

    /// The catalogue has no topics at all.
    #[error("catalogue '{0}' has no topics")]
    Empty(String),
}

impl CatalogueDraft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Iterates over every topic, depth-first, parents before children.
    pub fn topics_depth_first(&self) -> impl Iterator<Item = &TopicDraft> {
        let mut stack: Vec<&TopicDraft> = self.topics.iter().rev().collect();
        std::iter::from_fn(move || {
            let topic = stack.pop()?;
            stack.extend(topic.topics.iter().rev());
            Some(topic)
        })
    }

    /// Iterates over every requirement leaf, in upload order.
    pub fn requirements(&self) -> impl Iterator<Item = &RequirementDraft> {
        self.topics_depth_first()
            .flat_map(|topic| topic.requirements.iter())
    }

    /// Counts the entities uploading this draft would create.
    #[must_use]
    pub fn stats(&self) -> DraftStats {
        DraftStats {
            tags: self.tags.len(),
            extra_types: self.extra_types.len(),
            topics: self.topics_depth_first().count(),
            requirements: self.requirements().count(),
            extra_entries: self.requirements().map(|r| r.extras.len()).sum(),
        }
    }

    /// Checks that every reference in the draft resolves to a declaration.
    ///
    /// # Errors
    ///
    /// Returns the first undeclared tag or field found, or
    /// [`DraftError::Empty`] if the catalogue has no topics.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.topics.is_empty() {
            return Err(DraftError::Empty(self.title.clone()));
        }

        let tags: HashSet<&str> = self.tags.iter().map(String::as_str).collect();
        let extra_types: HashSet<&str> =
            self.extra_types.iter().map(|e| e.title.as_str()).collect();

        for requirement in self.requirements() {
            if let Some(tag) = requirement.tags.iter().find(|t| !tags.contains(t.as_str())) {
                return Err(DraftError::UnknownTag {
                    requirement: requirement.key.clone(),
                    tag: tag.clone(),
                });
            }
            if let Some(extra) = requirement
                .extras
                .iter()
                .find(|e| !extra_types.contains(e.extra_type.as_str()))
            {
                return Err(DraftError::UnknownExtraType {
                    requirement: requirement.key.clone(),
                    extra_type: extra.extra_type.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::new(s).unwrap()
    }

    fn sample() -> CatalogueDraft {
        let mut draft = CatalogueDraft::new("Sample", "A sample catalogue");
        draft.tags.push("Level 1".to_string());

        let mut root = TopicDraft::new(key("A"), "Alpha", "-");
        let mut child = TopicDraft::new(key("A.01"), "Alpha one", "-");
        let mut requirement = RequirementDraft::new(key("A.01.01"), "First", "Do it");
        requirement.tags.push("Level 1".to_string());
        child.requirements.insert(requirement);
        root.topics.insert(child);
        root.requirements
            .insert(RequirementDraft::new(key("A.R"), "Direct", "-"));
        draft.topics.insert(root);
        draft.topics.insert(TopicDraft::new(key("B"), "Beta", "-"));
        draft
    }

    #[test]
    fn siblings_keep_insertion_order() {
        let siblings: Siblings<TopicDraft> = ["B10", "B02", "A"]
            .into_iter()
            .map(|k| TopicDraft::new(key(k), k, "-"))
            .collect();
        let keys: Vec<_> = siblings.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["B10", "B02", "A"]);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut siblings = Siblings::default();
        siblings.insert(TopicDraft::new(key("A"), "first", "-"));
        siblings.insert(TopicDraft::new(key("B"), "second", "-"));
        let old = siblings.insert(TopicDraft::new(key("A"), "replaced", "-"));

        assert_eq!(old.unwrap().title, "first");
        assert_eq!(siblings.len(), 2);
        assert_eq!(siblings.iter().next().unwrap().title, "replaced");
    }

    #[test]
    fn get_or_insert_keeps_existing() {
        let mut siblings = Siblings::default();
        siblings.insert(TopicDraft::new(key("A"), "kept", "-"));
        let topic = siblings.get_or_insert_with(&key("A"), || TopicDraft::new(key("A"), "new", "-"));
        assert_eq!(topic.title, "kept");
        assert_eq!(siblings.get("A").unwrap().title, "kept");
        assert!(siblings.get("missing").is_none());
    }

    #[test]
    fn depth_first_visits_parents_first() {
        let draft = sample();
        let keys: Vec<_> = draft.topics_depth_first().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["A", "A.01", "B"]);
    }

    #[test]
    fn stats_count_every_level() {
        let stats = sample().stats();
        assert_eq!(
            stats,
            DraftStats {
                tags: 1,
                extra_types: 0,
                topics: 3,
                requirements: 2,
                extra_entries: 0,
            }
        );
    }

    #[test]
    fn validate_accepts_declared_references() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_undeclared_tag() {
        let mut draft = sample();
        draft.tags.clear();
        assert_eq!(
            draft.validate(),
            Err(DraftError::UnknownTag {
                requirement: key("A.01.01"),
                tag: "Level 1".to_string(),
            })
        );
    }

    #[test]
    fn validate_rejects_undeclared_extra_type() {
        let mut draft = sample();
        let root = draft.topics.get_mut(&key("A")).unwrap();
        root.requirements.get_mut(&key("A.R")).unwrap().extras.push(ExtraDraft {
            extra_type: "CVE Ref".to_string(),
            content: "79".to_string(),
        });
        assert!(matches!(
            draft.validate(),
            Err(DraftError::UnknownExtraType { .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_catalogue() {
        let draft = CatalogueDraft::new("Empty", "-");
        assert_eq!(draft.validate(), Err(DraftError::Empty("Empty".to_string())));
    }
}
