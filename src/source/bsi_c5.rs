//! Areas become topics and criteria become requirements. The supplementary
//! columns of each criterion become extra entries.

use tracing::instrument;

use crate::{
    domain::{
        CatalogueDraft, ExtraDraft, ExtraKind, ExtraTypeDraft, Key, RequirementDraft, TopicDraft,
    },
    source::{
        FormatError, Rule,
        tabular::{Row, SheetSelector, Workbook, fill_down},
    },
};

/// Download location of the editable C5:2020 workbook.
pub const URL: &str = "https://www.bsi.bund.de/SharedDocs/Downloads/EN/BSI/CloudComputing/ComplianceControlsCatalogue/2020/C5_2020_editable.xlsx?__blob=publicationFile&v=5";

const TITLE: &str = "Cloud Computing Compliance Criteria Catalogue (C5:2020 Criteria)";

const DESCRIPTION: &str = "The C5 (Cloud Computing Compliance Criteria Catalogue) criteria catalogue specifies minimum requirements for secure cloud computing and is primarily intended for professional cloud providers, their auditors and customers.";

const AREA: &str = "Area";
const ID: &str = "ID";
const CRITERION_TITLE: &str = "Title";
const BASIC_CRITERIA: &str = "Basic Criteria";
const ADDITIONAL_CRITERIA: &str = "Additional Criteria";
const ABOUT: &str = "Supplementary Information - About the Criteria";
const CUSTOMER: &str = "Supplementary Information - Complementary Customer Criteria";
const FEASIBILITY: &str = "Supplementary Information - Notes on Continuous Auditing - Feasibility";
const AUDITING: &str = "Supplementary Information - Notes on Continuous Auditing";

/// The supplementary columns, each declared as an extra type of the same name.
const SUPPLEMENTARY: [(&str, ExtraKind); 5] = [
    (ADDITIONAL_CRITERIA, ExtraKind::LongText),
    (ABOUT, ExtraKind::LongText),
    (CUSTOMER, ExtraKind::LongText),
    (FEASIBILITY, ExtraKind::ShortText),
    (AUDITING, ExtraKind::LongText),
];

/// Replaces typographic bullets and quotes with their plain-text forms.
fn plain(text: &str, bullet: &str) -> String {
    text.replace('\u{2022}', bullet)
        .replace(['\u{201c}', '\u{201d}'], "\"")
}

fn fold(draft: &mut CatalogueDraft, row: &Row) -> Result<(), FormatError> {
    let id = row.get(ID);
    if id.is_empty() {
        return Ok(());
    }

    let area = row.get(AREA);
    if area.is_empty() {
        return Err(FormatError::Orphan {
            entry: id.to_string(),
            parent: "area".to_string(),
        });
    }
    let (title, code) = Rule::TitleCode.split(area, "title", "code")?;
    let topic_key = Key::new(code.trim())?;
    let topic = draft.topics.get_or_insert_with(&topic_key, || {
        TopicDraft::new(topic_key.clone(), title.trim(), "-")
    });

    let mut requirement = RequirementDraft::new(
        Key::new(id)?,
        row.get(CRITERION_TITLE),
        plain(row.get(BASIC_CRITERIA), "*"),
    );
    requirement.extras = SUPPLEMENTARY
        .iter()
        .map(|&(column, _)| {
            let bullet = if column == ADDITIONAL_CRITERIA { "* " } else { "*" };
            ExtraDraft {
                extra_type: column.to_string(),
                content: plain(row.get(column), bullet),
            }
        })
        .collect();
    topic.requirements.insert(requirement);
    Ok(())
}

/// Folds the criteria workbook into a catalogue.
///
/// # Errors
///
/// Returns an error if the workbook lacks the criteria sheet or its headers,
/// or if an area heading has no code.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let mut workbook = Workbook::open(document.to_vec())?;
    let sheet = workbook.sheet(SheetSelector::Index(1))?;
    let rows = sheet.locate(&[
        AREA,
        ID,
        CRITERION_TITLE,
        BASIC_CRITERIA,
        ADDITIONAL_CRITERIA,
        ABOUT,
        CUSTOMER,
        FEASIBILITY,
        AUDITING,
    ])?;
    fold_rows(rows)
}

fn fold_rows(rows: impl IntoIterator<Item = Row>) -> Result<CatalogueDraft, FormatError> {
    let mut draft = CatalogueDraft::new(TITLE, DESCRIPTION);
    draft.extra_types = SUPPLEMENTARY
        .iter()
        .map(|&(title, kind)| ExtraTypeDraft {
            title: title.to_string(),
            kind,
            description: "-".to_string(),
        })
        .collect();

    for row in fill_down(rows, &[AREA]) {
        fold(&mut draft, &row)?;
    }

    tracing::info!(
        "Read {} areas with {} criteria",
        draft.topics.len(),
        draft.stats().requirements
    );
    Ok(draft)
}
