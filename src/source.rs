//! The external standards and their canonicalization.
//!
//! Every standard is published in its own format. Each adapter module reads
//! one format and folds it into one or more [`CatalogueDraft`]s; nothing here
//! talks to the repository.

use std::{fmt, str::FromStr};

use crate::domain::{CatalogueDraft, EmptyKeyError};

/// OWASP Application Security Verification Standard (flat JSON export).
pub mod asvs;

/// BSI Cloud Computing Compliance Criteria Catalogue (workbook).
pub mod bsi_c5;

/// CIS Critical Security Controls (workbook, local file only).
pub mod cis_controls;

/// CSA Cloud Controls Matrix (zipped JSON bundle).
pub mod csa_ccm;

/// Retrieval of source documents.
pub mod fetch;
pub use fetch::{Fetch, FetchError, HttpFetcher, Location};

/// BSI IT-Grundschutz Kompendium (DocBook XML).
pub mod grundschutz;

/// Markup to markdown conversion.
pub mod markup;
pub use markup::{DocBookMarkdown, MarkupConverter};

/// NIST Cybersecurity Framework (workbook).
pub mod nist_csf;

/// Heading rules.
pub mod rules;
pub use rules::Rule;

/// OWASP Software Assurance Maturity Model (workbook).
pub mod samm;

/// Spreadsheet extraction.
pub mod tabular;

/// A source document does not have the expected structure.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The document is not valid JSON, or not the expected JSON shape.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document is not text.
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The document is not a readable workbook.
    #[error("unreadable workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// The document is not a readable zip archive.
    #[error("unreadable archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive member could not be read.
    #[error("failed to read archive member: {0}")]
    Io(#[from] std::io::Error),

    /// The workbook has no such sheet.
    #[error("workbook has no sheet {0}")]
    MissingSheet(String),

    /// No row of the sheet holds every expected header.
    #[error("sheet '{sheet}' has no header row with {}", missing.join(", "))]
    MissingHeaders {
        /// The sheet searched.
        sheet: String,
        /// Headers not found.
        missing: Vec<String>,
    },

    /// An expected section of the document is absent.
    #[error("document has no {0}")]
    MissingSection(String),

    /// The archive has no member with the expected name.
    #[error("archive has no member ending in '{0}'")]
    MissingMember(String),

    /// A heading does not have the expected shape.
    #[error("heading '{text}' does not match the {} pattern", rule.name())]
    Pattern {
        /// The rule the heading was matched against.
        rule: Rule,
        /// The heading text.
        text: String,
    },

    /// An entry appears before the entry it belongs to.
    #[error("{entry} appears before its parent {parent}")]
    Orphan {
        /// The entry without parent.
        entry: String,
        /// The missing parent.
        parent: String,
    },

    /// A key is blank.
    #[error(transparent)]
    Key(#[from] EmptyKeyError),
}

/// The standards that can be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Standard {
    /// OWASP ASVS 4.0.3.
    Asvs,
    /// NIST CSF 2.0.
    NistCsf,
    /// BSI C5:2020.
    BsiC5,
    /// OWASP SAMM 2.1.
    Samm,
    /// CSA Cloud Controls Matrix.
    CsaCcm,
    /// CIS Controls v8.
    CisControls,
    /// BSI IT-Grundschutz Kompendium 2023.
    Grundschutz,
}

impl Standard {
    /// Every standard.
    pub const ALL: [Self; 7] = [
        Self::Asvs,
        Self::NistCsf,
        Self::BsiC5,
        Self::Samm,
        Self::CsaCcm,
        Self::CisControls,
        Self::Grundschutz,
    ];

    /// The name used on the command line and in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Asvs => "asvs",
            Self::NistCsf => "nist-csf",
            Self::BsiC5 => "bsi-c5",
            Self::Samm => "samm",
            Self::CsaCcm => "csa-ccm",
            Self::CisControls => "cis-controls",
            Self::Grundschutz => "grundschutz",
        }
    }

    /// The full name of the standard.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Asvs => "OWASP Application Security Verification Standard 4.0.3",
            Self::NistCsf => "NIST Cybersecurity Framework 2.0",
            Self::BsiC5 => "BSI Cloud Computing Compliance Criteria Catalogue (C5:2020)",
            Self::Samm => "OWASP Software Assurance Maturity Model 2.1",
            Self::CsaCcm => "CSA Cloud Controls Matrix",
            Self::CisControls => "CIS Critical Security Controls v8",
            Self::Grundschutz => "BSI IT-Grundschutz Kompendium 2023",
        }
    }

    /// The format the standard is published in.
    #[must_use]
    pub const fn format(self) -> &'static str {
        match self {
            Self::Asvs => "JSON",
            Self::NistCsf | Self::BsiC5 | Self::Samm | Self::CisControls => "workbook",
            Self::CsaCcm => "zipped JSON",
            Self::Grundschutz => "DocBook XML",
        }
    }

    /// Where the standard is downloaded from, unless overridden.
    ///
    /// `None` for standards that are only available after registration and
    /// must be supplied as a local file.
    #[must_use]
    pub const fn default_url(self) -> Option<&'static str> {
        match self {
            Self::Asvs => Some(asvs::URL),
            Self::NistCsf => Some(nist_csf::URL),
            Self::BsiC5 => Some(bsi_c5::URL),
            Self::Samm => Some(samm::URL),
            Self::CsaCcm => Some(csa_ccm::URL),
            Self::CisControls => None,
            Self::Grundschutz => Some(grundschutz::URL),
        }
    }

    /// Folds a downloaded document into catalogue drafts.
    ///
    /// Every standard yields one catalogue, except the Grundschutz Kompendium,
    /// which yields a requirements and a threats catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not have the structure expected
    /// for this standard.
    pub fn canonicalize(self, document: &[u8]) -> Result<Vec<CatalogueDraft>, FormatError> {
        let drafts = match self {
            Self::Asvs => vec![asvs::canonicalize(document)?],
            Self::NistCsf => vec![nist_csf::canonicalize(document)?],
            Self::BsiC5 => vec![bsi_c5::canonicalize(document)?],
            Self::Samm => vec![samm::canonicalize(document)?],
            Self::CsaCcm => vec![csa_ccm::canonicalize(document)?],
            Self::CisControls => vec![cis_controls::canonicalize(document)?],
            Self::Grundschutz => {
                let text = String::from_utf8(document.to_vec())?;
                let kompendium = grundschutz::parse(&text, &DocBookMarkdown)?;
                vec![
                    kompendium.requirements_catalogue(),
                    kompendium.threats_catalogue()?,
                ]
            }
        };
        Ok(drafts)
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The name does not denote a known standard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown standard '{}' (expected one of: {})",
    .0,
    Standard::ALL.map(Standard::name).join(", ")
)]
pub struct UnknownStandard(String);

impl FromStr for Standard {
    type Err = UnknownStandard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|standard| standard.name() == normalized)
            .ok_or_else(|| UnknownStandard(s.to_string()))
    }
}
