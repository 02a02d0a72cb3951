//! Chapters become root topics, sections become child topics, and numbered
//! requirements become requirements tagged with the levels that require them.

use std::fmt;

use serde::Deserialize;
use tracing::instrument;

use crate::{
    domain::{
        CatalogueDraft, ExtraDraft, ExtraKind, ExtraTypeDraft, Key, RequirementDraft, TopicDraft,
        key::pad_segments,
    },
    source::FormatError,
};

/// Download location of the 4.0.3 JSON export.
pub const URL: &str = "https://github.com/OWASP/ASVS/releases/download/v4.0.3_release/OWASP.Application.Security.Verification.Standard.4.0.3-en.json";

/// Supplementary field holding NIST SP 800-63 references.
pub const NIST_REF: &str = "NIST Ref";

/// Supplementary field holding CWE references.
pub const CVE_REF: &str = "CVE Ref";

const LEVELS: [&str; 3] = ["Level 1", "Level 2", "Level 3"];

/// Marker of requirements withdrawn from the standard.
const DELETED_MARKER: &str = "[DELETED,";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    name: String,
    short_name: String,
    description: String,
    requirements: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Chapter {
    shortcode: String,
    short_name: String,
    name: String,
    items: Vec<Section>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Section {
    shortcode: String,
    name: String,
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "Shortcode")]
    shortcode: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "L1")]
    l1: Level,
    #[serde(rename = "L2")]
    l2: Level,
    #[serde(rename = "L3")]
    l3: Level,
    #[serde(rename = "CWE", default)]
    cwe: Vec<Reference>,
    #[serde(rename = "NIST", default)]
    nist: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
struct Level {
    #[serde(rename = "Required")]
    required: bool,
}

/// A reference is a bare CWE number or a section string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reference {
    Number(u64),
    Text(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Derives a key from a shortcode: `V1.2.3` becomes `V01.02.03`.
fn key(shortcode: &str) -> Result<Key, FormatError> {
    let numbering = shortcode.trim().trim_start_matches('V');
    Ok(Key::new(format!("V{}", pad_segments(numbering)))?)
}

fn join(references: &[Reference]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// Folds the JSON export into a catalogue.
///
/// # Errors
///
/// Returns an error if the document is not the expected JSON shape.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let document: Document = serde_json::from_slice(document)?;

    let mut draft = CatalogueDraft::new(
        format!("{} ({})", document.name, document.short_name),
        document.description,
    );
    draft.tags = LEVELS.map(String::from).to_vec();
    draft.extra_types = vec![
        ExtraTypeDraft {
            title: NIST_REF.to_string(),
            kind: ExtraKind::ShortText,
            description: "NIST Reference".to_string(),
        },
        ExtraTypeDraft {
            title: CVE_REF.to_string(),
            kind: ExtraKind::ShortText,
            description: "CVE Reference".to_string(),
        },
    ];

    for chapter in document.requirements {
        let mut chapter_topic =
            TopicDraft::new(key(&chapter.shortcode)?, chapter.short_name, chapter.name);

        for section in chapter.items {
            let mut section_topic =
                TopicDraft::new(key(&section.shortcode)?, &section.name, &section.name);

            for item in section.items {
                let mut requirement =
                    RequirementDraft::new(key(&item.shortcode)?, &section.name, item.description);
                requirement.visible = !requirement.description.contains(DELETED_MARKER);
                requirement.tags = [&item.l1, &item.l2, &item.l3]
                    .into_iter()
                    .zip(LEVELS)
                    .filter(|(level, _)| level.required)
                    .map(|(_, tag)| tag.to_string())
                    .collect();
                if !item.cwe.is_empty() {
                    requirement.extras.push(ExtraDraft {
                        extra_type: CVE_REF.to_string(),
                        content: join(&item.cwe),
                    });
                }
                if !item.nist.is_empty() {
                    requirement.extras.push(ExtraDraft {
                        extra_type: NIST_REF.to_string(),
                        content: join(&item.nist),
                    });
                }
                section_topic.requirements.insert(requirement);
            }
            chapter_topic.topics.insert(section_topic);
        }
        draft.topics.insert(chapter_topic);
    }

    let stats = draft.stats();
    tracing::info!(
        "Read {} chapters with {} requirements",
        draft.topics.len(),
        stats.requirements
    );
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn item(
        shortcode: &str,
        description: &str,
        levels: [bool; 3],
        cwe: &[u64],
        nist: &[&str],
    ) -> serde_json::Value {
        json!({
            "Shortcode": shortcode,
            "Ordinal": 1,
            "Description": description,
            "L1": {"Required": levels[0], "Requirement": ""},
            "L2": {"Required": levels[1], "Requirement": ""},
            "L3": {"Required": levels[2], "Requirement": ""},
            "CWE": cwe,
            "NIST": nist,
        })
    }

    fn sample() -> Vec<u8> {
        json!({
            "Name": "Application Security Verification Standard Project",
            "ShortName": "ASVS",
            "Version": "4.0.3",
            "Description": "The OWASP ASVS",
            "Requirements": [{
                "Shortcode": "V1",
                "Ordinal": 1,
                "ShortName": "Architecture",
                "Name": "Architecture, Design and Threat Modeling",
                "Items": [{
                    "Shortcode": "V1.1",
                    "Ordinal": 1,
                    "Name": "Secure Software Development Lifecycle",
                    "Items": [
                        item("V1.1.1", "Verify the use of a secure SDLC.", [false, true, true], &[], &[]),
                        item("V1.1.2", "Verify threat modeling.", [false, true, true], &[1053], &[]),
                        item("V1.1.10", "[DELETED, MERGED WITH 1.1.2]", [false, false, false], &[], &[]),
                    ],
                }, {
                    "Shortcode": "V1.2",
                    "Ordinal": 2,
                    "Name": "Authentication Architecture",
                    "Items": [
                        item("V1.2.1", "Verify unique accounts.", [true, true, true], &[250, 284], &["5.1.1.2", "5.1.3"]),
                    ],
                }],
            }],
        })
        .to_string()
        .into_bytes()
    }

    fn requirement<'a>(draft: &'a CatalogueDraft, key: &str) -> &'a RequirementDraft {
        draft.requirements().find(|r| r.key.as_str() == key).unwrap()
    }

    #[test_case("V1", "V01")]
    #[test_case("V1.2", "V01.02")]
    #[test_case("V14.5.10", "V14.05.10")]
    fn keys(shortcode: &str, expected: &str) {
        assert_eq!(key(shortcode).unwrap().as_str(), expected);
    }

    #[test]
    fn builds_three_level_hierarchy() {
        let draft = canonicalize(&sample()).unwrap();

        assert_eq!(draft.title, "Application Security Verification Standard Project (ASVS)");
        let topics: Vec<_> = draft.topics_depth_first().map(|t| t.key.as_str()).collect();
        assert_eq!(topics, ["V01", "V01.01", "V01.02"]);

        let chapter = draft.topics.get("V01").unwrap();
        assert_eq!(chapter.title, "Architecture");
        assert_eq!(chapter.description, "Architecture, Design and Threat Modeling");

        let first = requirement(&draft, "V01.01.01");
        assert_eq!(first.title, "Secure Software Development Lifecycle");
        assert_eq!(first.tags, ["Level 2", "Level 3"]);
        assert!(first.extras.is_empty());
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn deleted_requirements_are_hidden() {
        let draft = canonicalize(&sample()).unwrap();
        assert!(!requirement(&draft, "V01.01.10").visible);
        assert!(requirement(&draft, "V01.01.02").visible);
    }

    #[test]
    fn references_become_extra_entries() {
        let draft = canonicalize(&sample()).unwrap();
        let extras: Vec<_> = requirement(&draft, "V01.02.01")
            .extras
            .iter()
            .map(|e| (e.extra_type.as_str(), e.content.as_str()))
            .collect();
        assert_eq!(extras, [(CVE_REF, "250;284"), (NIST_REF, "5.1.1.2;5.1.3")]);
    }

    #[test]
    fn rejects_unexpected_shape() {
        assert!(matches!(
            canonicalize(br#"{"Name": "ASVS"}"#),
            Err(FormatError::Json(_))
        ));
    }
}
