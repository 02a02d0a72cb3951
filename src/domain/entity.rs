//! Entities as they are sent to the requirements repository.
//!
//! These are the wire shapes of the six entity kinds the repository stores.
//! References between entities are repository-assigned [`Id`]s, so an entity
//! can only be built once everything it points at has been created.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::Key;

/// Identifier assigned by the repository on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(u64);

impl Id {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of entity stored by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// A classification label.
    Tag,
    /// A non-leaf grouping node.
    Topic,
    /// A leaf compliance statement.
    Requirement,
    /// A supplementary field definition.
    ExtraType,
    /// A value of a supplementary field on one requirement.
    ExtraEntry,
    /// The root container of a topic tree.
    Catalogue,
}

impl EntityKind {
    /// Every kind, in creation-dependency order.
    pub const ALL: [Self; 6] = [
        Self::Tag,
        Self::ExtraType,
        Self::Topic,
        Self::Requirement,
        Self::ExtraEntry,
        Self::Catalogue,
    ];

    /// The path segment of the repository API serving this kind.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Topic => "topics",
            Self::Requirement => "requirements",
            Self::ExtraType => "extraTypes",
            Self::ExtraEntry => "extraEntries",
            Self::Catalogue => "catalogues",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Tag => "tag",
            Self::Topic => "topic",
            Self::Requirement => "requirement",
            Self::ExtraType => "extra type",
            Self::ExtraEntry => "extra entry",
            Self::Catalogue => "catalogue",
        };
        f.write_str(name)
    }
}

/// Reference to another entity, serialized as `{"id": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRef {
    /// The referenced identifier.
    pub id: Id,
}

impl From<Id> for IdRef {
    fn from(id: Id) -> Self {
        Self { id }
    }
}

/// A reusable classification label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Display name, e.g. `Level 1`.
    pub name: String,
}

/// A grouping node in a catalogue's topic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    /// Key, unique among siblings.
    pub key: Key,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Parent topic; `None` for catalogue roots.
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent: Option<Id>,
}

/// A leaf compliance statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// Key, unique among siblings.
    pub key: Key,
    /// Short title.
    pub title: String,
    /// Requirement text.
    pub description: String,
    /// The topic this requirement belongs to.
    #[serde(rename = "parentId")]
    pub parent: Id,
    /// `false` when the source marks the requirement as withdrawn.
    pub visible: bool,
    /// Classification labels.
    pub tags: Vec<IdRef>,
}

/// How the value of a supplementary field is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraKind {
    /// Multi-line free text.
    LongText,
    /// A single short value such as a reference list.
    ShortText,
}

impl ExtraKind {
    /// The numeric code the repository uses for this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::LongText => 1,
            Self::ShortText => 3,
        }
    }
}

impl Serialize for ExtraKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Definition of a supplementary field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraType {
    /// Field name.
    pub title: String,
    /// Presentation kind.
    #[serde(rename = "extraType")]
    pub kind: ExtraKind,
    /// Field description.
    pub description: String,
}

/// The value of a supplementary field on a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraEntry {
    /// Field value.
    pub content: String,
    /// The field definition.
    #[serde(rename = "extraTypeId")]
    pub extra_type: Id,
    /// The requirement the value belongs to.
    #[serde(rename = "requirementId")]
    pub requirement: Id,
}

/// The root container of a topic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalogue {
    /// Catalogue title.
    pub title: String,
    /// Catalogue description.
    pub description: String,
    /// Root topics, in display order.
    pub topics: Vec<IdRef>,
}

/// Any entity that can be created in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NewEntity {
    /// See [`Tag`].
    Tag(Tag),
    /// See [`Topic`].
    Topic(Topic),
    /// See [`Requirement`].
    Requirement(Requirement),
    /// See [`ExtraType`].
    ExtraType(ExtraType),
    /// See [`ExtraEntry`].
    ExtraEntry(ExtraEntry),
    /// See [`Catalogue`].
    Catalogue(Catalogue),
}

impl NewEntity {
    /// The kind of entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Tag(_) => EntityKind::Tag,
            Self::Topic(_) => EntityKind::Topic,
            Self::Requirement(_) => EntityKind::Requirement,
            Self::ExtraType(_) => EntityKind::ExtraType,
            Self::ExtraEntry(_) => EntityKind::ExtraEntry,
            Self::Catalogue(_) => EntityKind::Catalogue,
        }
    }

    /// A short human-readable label used in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Tag(tag) => format!("tag '{}'", tag.name),
            Self::Topic(topic) => format!("topic {}", topic.key),
            Self::Requirement(requirement) => format!("requirement {}", requirement.key),
            Self::ExtraType(extra) => format!("extra type '{}'", extra.title),
            Self::ExtraEntry(entry) => format!(
                "extra entry of type {} on requirement {}",
                entry.extra_type, entry.requirement
            ),
            Self::Catalogue(catalogue) => format!("catalogue '{}'", catalogue.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn root_topic_omits_parent() {
        let topic = NewEntity::Topic(Topic {
            key: Key::new("V01").unwrap(),
            title: "Architecture".to_string(),
            description: "-".to_string(),
            parent: None,
        });
        assert_eq!(
            serde_json::to_value(&topic).unwrap(),
            json!({"key": "V01", "title": "Architecture", "description": "-"})
        );
    }

    #[test]
    fn requirement_wire_shape() {
        let requirement = NewEntity::Requirement(Requirement {
            key: Key::new("V01.01.01").unwrap(),
            title: "Lifecycle".to_string(),
            description: "Verify".to_string(),
            parent: Id::new(4),
            visible: false,
            tags: vec![Id::new(1).into(), Id::new(2).into()],
        });
        assert_eq!(
            serde_json::to_value(&requirement).unwrap(),
            json!({
                "key": "V01.01.01",
                "title": "Lifecycle",
                "description": "Verify",
                "parentId": 4,
                "visible": false,
                "tags": [{"id": 1}, {"id": 2}],
            })
        );
    }

    #[test]
    fn extra_type_uses_numeric_kind() {
        let extra = ExtraType {
            title: "CVE Ref".to_string(),
            kind: ExtraKind::ShortText,
            description: "CVE Reference".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&extra).unwrap(),
            json!({"title": "CVE Ref", "extraType": 3, "description": "CVE Reference"})
        );
    }

    #[test]
    fn extra_entry_and_catalogue_references() {
        let entry = ExtraEntry {
            content: "79;80".to_string(),
            extra_type: Id::new(7),
            requirement: Id::new(9),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"content": "79;80", "extraTypeId": 7, "requirementId": 9})
        );

        let catalogue = Catalogue {
            title: "C".to_string(),
            description: "D".to_string(),
            topics: vec![Id::new(3).into()],
        };
        assert_eq!(
            serde_json::to_value(&catalogue).unwrap(),
            json!({"title": "C", "description": "D", "topics": [{"id": 3}]})
        );
    }

    #[test]
    fn kinds_have_distinct_endpoints() {
        let mut endpoints: Vec<_> = EntityKind::ALL.iter().map(|k| k.endpoint()).collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        assert_eq!(endpoints.len(), EntityKind::ALL.len());
    }
}
