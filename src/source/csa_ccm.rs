//! Domains become topics and controls become requirements. The matrix is read
//! from the JSON dataset inside the machine-readable bundle.

use std::io::{Cursor, Read};

use serde::Deserialize;
use tracing::instrument;
use zip::ZipArchive;

use crate::{
    domain::{CatalogueDraft, Key, RequirementDraft, TopicDraft},
    source::FormatError,
};

/// Download location of the machine-readable bundle.
pub const URL: &str =
    "https://cloudsecurityalliance.org/download/artifacts/ccm-machine-readable-bundle-json-yaml-oscal";

/// Suffix of the bundle member holding the matrix.
pub const DATASET: &str = "/CCM/primary-dataset.json";

#[derive(Debug, Deserialize)]
struct Matrix {
    name: String,
    version: String,
    url: String,
    domains: Vec<Domain>,
}

#[derive(Debug, Deserialize)]
struct Domain {
    id: String,
    title: String,
    controls: Vec<Control>,
}

#[derive(Debug, Deserialize)]
struct Control {
    id: String,
    title: String,
    specification: String,
}

/// Reads the matrix dataset out of the bundle.
fn dataset(bundle: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let name = archive
        .file_names()
        .filter(|name| name.ends_with(DATASET))
        .max()
        .map(str::to_string)
        .ok_or_else(|| FormatError::MissingMember(DATASET.to_string()))?;
    tracing::debug!("Reading {name} from bundle");

    let mut member = archive.by_name(&name)?;
    let mut content = Vec::new();
    member.read_to_end(&mut content)?;
    Ok(content)
}

/// Folds the bundle into a catalogue.
///
/// # Errors
///
/// Returns an error if the bundle is not a zip archive, lacks the matrix
/// dataset, or the dataset is not the expected JSON shape.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let matrix: Matrix = serde_json::from_slice(&dataset(document)?)?;

    let mut draft = CatalogueDraft::new(
        format!("{} ({})", matrix.name, matrix.version),
        format!(
            "{}, Version {}. See {}",
            matrix.name, matrix.version, matrix.url
        ),
    );
    for domain in matrix.domains {
        let mut topic = TopicDraft::new(Key::new(domain.id)?, domain.title, "-");
        for control in domain.controls {
            topic.requirements.insert(RequirementDraft::new(
                Key::new(control.id)?,
                control.title,
                control.specification,
            ));
        }
        draft.topics.insert(topic);
    }

    tracing::info!(
        "Read {} domains with {} controls",
        draft.topics.len(),
        draft.stats().requirements
    );
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    fn bundle(members: &[(&str, &str)]) -> Vec<u8> {
        let mut archive = Vec::new();
        let mut zip = ZipWriter::new(Cursor::new(&mut archive));
        for (name, content) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        archive
    }

    fn matrix() -> String {
        json!({
            "name": "Cloud Controls Matrix",
            "version": "4.0.12",
            "url": "https://cloudsecurityalliance.org/research/cloud-controls-matrix",
            "domains": [{
                "id": "A&A",
                "title": "Audit & Assurance",
                "controls": [
                    {"id": "A&A-01", "title": "Audit and Assurance Policy", "specification": "Establish audit policies."},
                    {"id": "A&A-02", "title": "Independent Assessments", "specification": "Conduct assessments."},
                ],
            }, {
                "id": "AIS",
                "title": "Application & Interface Security",
                "controls": [],
            }],
        })
        .to_string()
    }

    #[test]
    fn reads_matrix_from_bundle() {
        let matrix = matrix();
        let document = bundle(&[
            ("ccm/README.md", "readme"),
            ("ccm/CCM/primary-dataset.json", matrix.as_str()),
            ("ccm/CCM/primary-dataset.yaml", "name: x"),
        ]);
        let draft = canonicalize(&document).unwrap();

        assert_eq!(draft.title, "Cloud Controls Matrix (4.0.12)");
        assert_eq!(
            draft.description,
            "Cloud Controls Matrix, Version 4.0.12. See https://cloudsecurityalliance.org/research/cloud-controls-matrix"
        );
        let keys: Vec<_> = draft.topics.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["A&A", "AIS"]);

        let control = draft.requirements().next().unwrap();
        assert_eq!(control.key.as_str(), "A&A-01");
        assert_eq!(control.title, "Audit and Assurance Policy");
        assert_eq!(control.description, "Establish audit policies.");
    }

    #[test]
    fn missing_dataset_is_reported() {
        let document = bundle(&[("ccm/CCM/primary-dataset.yaml", "name: x")]);
        assert!(matches!(
            canonicalize(&document),
            Err(FormatError::MissingMember(_))
        ));
    }

    #[test]
    fn non_archive_is_rejected() {
        assert!(matches!(
            canonicalize(b"not a zip"),
            Err(FormatError::Archive(_))
        ));
    }
}
