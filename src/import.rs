//! One import run: fetch a standard, fold it into catalogues, upload them.
//!
//! A run is all-or-nothing. Every catalogue of the standard is uploaded
//! through a single [`Session`]; if anything fails, the session is rolled
//! back and the repository is left as it was before the run.

use tracing::instrument;
use uuid::Uuid;

use crate::{
    domain::{CatalogueDraft, Config, DraftError, Id},
    repository::Repository,
    session::{Ledger, RollbackReport, Session},
    source::{Fetch, FetchError, FormatError, Location, Standard},
    upload::{UploadError, upload},
};

/// Errors that end an import run.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The standard has no download location and none was given.
    #[error("{0} is only available as a local file; pass one with --file")]
    NoLocation(Standard),

    /// The source document could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The source document does not have the expected structure.
    #[error("failed to read {standard} document")]
    Format {
        /// The standard being imported.
        standard: Standard,
        /// What was wrong with the document.
        #[source]
        source: FormatError,
    },

    /// A folded catalogue references something it does not declare.
    #[error("invalid catalogue")]
    Invalid(#[from] DraftError),

    /// Uploading failed and the run was rolled back.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// An upload failed part-way and everything created was rolled back.
#[derive(Debug, thiserror::Error)]
#[error(
    "import rolled back ({} deleted, {} left behind)",
    rollback.deleted,
    rollback.failures.len()
)]
pub struct CommitError {
    /// Why the upload failed.
    #[source]
    pub source: UploadError,
    /// What the rollback achieved.
    pub rollback: RollbackReport,
}

/// A successful run.
#[derive(Debug)]
pub struct Committed {
    /// The identifier of the run, as recorded in the logs.
    pub run_id: Uuid,
    /// Title and identifier of every created catalogue, in upload order.
    pub catalogues: Vec<(String, Id)>,
    /// Everything created by the run.
    pub ledger: Ledger,
}

/// Determines where a standard is retrieved from.
///
/// An explicit location wins over a configured override, which wins over the
/// standard's default download location.
///
/// # Errors
///
/// Returns [`ImportError::NoLocation`] for a standard without a download
/// location when neither an explicit location nor an override is given.
pub fn locate(
    standard: Standard,
    config: &Config,
    explicit: Option<Location>,
) -> Result<Location, ImportError> {
    explicit
        .or_else(|| config.source_override(standard.name()).map(Location::parse))
        .or_else(|| standard.default_url().map(Location::parse))
        .ok_or(ImportError::NoLocation(standard))
}

/// Retrieves a standard and folds it into validated catalogue drafts.
///
/// Nothing is sent to the repository.
///
/// # Errors
///
/// Returns an error if the document cannot be retrieved, does not have the
/// expected structure, or folds into a catalogue with dangling references.
#[instrument(skip_all, fields(standard = %standard, location = %location))]
pub fn prepare(
    standard: Standard,
    fetcher: &(impl Fetch + ?Sized),
    location: &Location,
) -> Result<Vec<CatalogueDraft>, ImportError> {
    let document = fetcher.fetch(location)?;
    let drafts = standard
        .canonicalize(&document)
        .map_err(|source| ImportError::Format { standard, source })?;

    for draft in &drafts {
        draft.validate()?;
        let stats = draft.stats();
        tracing::info!(
            "Prepared '{}': {} topics, {} requirements, {} tags",
            draft.title,
            stats.topics,
            stats.requirements,
            stats.tags
        );
    }
    Ok(drafts)
}

/// Uploads every draft through one session, rolling back on failure.
///
/// # Errors
///
/// Returns [`CommitError`] carrying the upload failure and the rollback
/// report if any entity could not be created.
pub fn commit<R: Repository + ?Sized>(
    repository: &R,
    drafts: &[CatalogueDraft],
) -> Result<Committed, CommitError> {
    let mut session = Session::new(repository);
    let run_id = session.run_id();

    let mut catalogues = Vec::with_capacity(drafts.len());
    for draft in drafts {
        match upload(&mut session, draft) {
            Ok(id) => {
                tracing::info!(%run_id, "Catalogue '{}' created with ID {id}", draft.title);
                catalogues.push((draft.title.clone(), id));
            }
            Err(source) => {
                tracing::error!(%run_id, "{source}");
                let rollback = session.rollback();
                return Err(CommitError { source, rollback });
            }
        }
    }

    Ok(Committed {
        run_id,
        catalogues,
        ledger: session.commit(),
    })
}

/// Runs a complete import of one standard.
///
/// # Errors
///
/// Returns an error if preparing or uploading the catalogues fails. Upload
/// failures are rolled back before returning.
pub fn run<R: Repository + ?Sized>(
    standard: Standard,
    location: &Location,
    fetcher: &(impl Fetch + ?Sized),
    repository: &R,
) -> Result<Committed, ImportError> {
    let drafts = prepare(standard, fetcher, location)?;
    Ok(commit(repository, &drafts)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::{domain::EntityKind, repository::MemoryRepository};

    /// Serves one in-memory document for every location.
    struct StaticFetcher(Vec<u8>);

    impl Fetch for StaticFetcher {
        fn fetch(&self, _location: &Location) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn asvs() -> StaticFetcher {
        let item = |code: &str, levels: [bool; 3], cwe: &[u32]| {
            json!({
                "Shortcode": code,
                "Ordinal": 1,
                "Description": format!("Verify {code}."),
                "L1": {"Required": levels[0], "Requirement": ""},
                "L2": {"Required": levels[1], "Requirement": ""},
                "L3": {"Required": levels[2], "Requirement": ""},
                "CWE": cwe,
                "NIST": [],
            })
        };
        let document = json!({
            "Name": "Application Security Verification Standard Project",
            "ShortName": "ASVS",
            "Version": "4.0.3",
            "Description": "The OWASP ASVS",
            "Requirements": [{
                "Shortcode": "V1",
                "Ordinal": 1,
                "ShortName": "Architecture",
                "Name": "Architecture",
                "Items": [{
                    "Shortcode": "V1.1",
                    "Ordinal": 1,
                    "Name": "Secure Software Development Lifecycle",
                    "Items": [
                        item("V1.1.1", [false, true, true], &[]),
                        item("V1.1.2", [true, true, true], &[1053]),
                    ],
                }],
            }],
        });
        StaticFetcher(document.to_string().into_bytes())
    }

    fn location() -> Location {
        Location::File(PathBuf::from("asvs.json"))
    }

    #[test]
    fn explicit_location_wins() {
        let mut config = Config::default();
        config.set_source_override("asvs", "https://mirror.example.com/asvs.json".to_string());

        let explicit = Location::File(PathBuf::from("local.json"));
        assert_eq!(
            locate(Standard::Asvs, &config, Some(explicit.clone())).unwrap(),
            explicit
        );
        assert_eq!(
            locate(Standard::Asvs, &config, None).unwrap(),
            Location::Url("https://mirror.example.com/asvs.json".to_string())
        );
        assert_eq!(
            locate(Standard::Samm, &config, None).unwrap(),
            Location::Url(crate::source::samm::URL.to_string())
        );
    }

    #[test]
    fn cis_controls_need_a_file() {
        assert!(matches!(
            locate(Standard::CisControls, &Config::default(), None),
            Err(ImportError::NoLocation(Standard::CisControls))
        ));
    }

    #[test]
    fn successful_run_creates_every_entity() {
        let repository = MemoryRepository::new();
        let fetcher = asvs();
        let committed = run(Standard::Asvs, &location(), &fetcher, &repository).unwrap();

        assert_eq!(committed.catalogues.len(), 1);
        assert_eq!(repository.count(EntityKind::Catalogue), 1);
        assert_eq!(repository.len(), committed.ledger.total());

        let drafts = prepare(Standard::Asvs, &fetcher, &location()).unwrap();
        let stats = drafts[0].stats();
        assert_eq!(committed.ledger.count(EntityKind::Topic), stats.topics);
        assert_eq!(
            committed.ledger.count(EntityKind::Requirement),
            stats.requirements
        );
    }

    #[test]
    fn failed_run_leaves_repository_unchanged() {
        let repository = MemoryRepository::new().failing_create_of(EntityKind::Catalogue);
        let error = run(Standard::Asvs, &location(), &asvs(), &repository).unwrap_err();

        let ImportError::Commit(error) = error else {
            panic!("expected a rolled back commit, got {error:?}");
        };
        assert!(error.rollback.is_clean());
        assert!(error.rollback.deleted > 0);
        assert!(repository.is_empty());
    }

    #[test]
    fn failure_in_second_catalogue_removes_the_first() {
        let drafts = prepare(Standard::Asvs, &asvs(), &location()).unwrap();
        let mut second = drafts[0].clone();
        second.title = "ASVS again".to_string();
        let first_size = MemoryRepository::new();
        commit(&first_size, &drafts).unwrap();

        let repository = MemoryRepository::new().failing_after(first_size.len() + 2);
        let error = commit(&repository, &[drafts[0].clone(), second]).unwrap_err();

        assert_eq!(error.rollback.deleted, first_size.len() + 2);
        assert!(error.rollback.is_clean());
        assert!(repository.is_empty());
    }

    #[test]
    fn malformed_document_touches_nothing() {
        let repository = MemoryRepository::new();
        let fetcher = StaticFetcher(b"{\"not\": \"asvs\"}".to_vec());
        let error = run(Standard::Asvs, &location(), &fetcher, &repository).unwrap_err();

        assert!(matches!(
            error,
            ImportError::Format {
                standard: Standard::Asvs,
                ..
            }
        ));
        assert!(repository.is_empty());
    }
}
