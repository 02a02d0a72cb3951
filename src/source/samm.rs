//! Business functions, security practices and activities become three topic
//! levels; assessment questions become requirements tagged with their
//! maturity level.

use tracing::instrument;

use crate::{
    domain::{CatalogueDraft, Key, RequirementDraft, Siblings, TopicDraft},
    source::{
        FormatError,
        tabular::{Row, SheetSelector, Workbook},
    },
};

/// Download location of the SAMM 2.1 spreadsheet.
pub const URL: &str =
    "https://github.com/owaspsamm/core/releases/download/v2.1.0/SAMM_spreadsheet.xlsx";

const TITLE: &str = "Software Assurance Maturity Model (SAMM)";

const DESCRIPTION: &str = "SAMM provides an effective and measurable way for all types of organizations to analyze and improve their software security posture.";

const SHEET: &str = "imp-questions";

const ID: &str = "ID";
const FUNCTION: &str = "Business Function";
const PRACTICE: &str = "Security Practice";
const ACTIVITY: &str = "Activity";
const MATURITY: &str = "Maturity";
const QUESTION: &str = "Question";
const GUIDANCE: &str = "Guidance";

const MATURITY_LEVELS: [&str; 3] = ["Maturity 1", "Maturity 2", "Maturity 3"];

/// Returns the topic with the given key, inserting it first if absent.
fn topic<'s>(
    siblings: &'s mut Siblings<TopicDraft>,
    key: &str,
    title: &str,
) -> Result<&'s mut TopicDraft, FormatError> {
    let key = Key::new(key)?;
    Ok(siblings.get_or_insert_with(&key, || TopicDraft::new(key.clone(), title, "-")))
}

fn fold(draft: &mut CatalogueDraft, row: &Row) -> Result<(), FormatError> {
    let id = row.get(ID);
    let parts: Vec<&str> = id.split('-').collect();
    let &[function, practice, activity, ..] = parts.as_slice() else {
        return Err(FormatError::Orphan {
            entry: id.to_string(),
            parent: "activity".to_string(),
        });
    };

    let function_topic = topic(&mut draft.topics, function, row.get(FUNCTION))?;
    let practice_topic = topic(
        &mut function_topic.topics,
        &format!("{function}-{practice}"),
        row.get(PRACTICE),
    )?;
    let activity_topic = topic(
        &mut practice_topic.topics,
        &format!("{function}-{practice}-{activity}"),
        row.get(ACTIVITY),
    )?;

    let mut requirement =
        RequirementDraft::new(Key::new(id)?, row.get(QUESTION), row.get(GUIDANCE));
    let maturity = row.get(MATURITY);
    if !maturity.is_empty() {
        requirement.tags.push(format!("Maturity {maturity}"));
    }
    activity_topic.requirements.insert(requirement);
    Ok(())
}

/// Folds the SAMM spreadsheet into a catalogue.
///
/// # Errors
///
/// Returns an error if the spreadsheet lacks the question sheet or its headers,
/// or if a question identifier has fewer than three parts.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let mut workbook = Workbook::open(document.to_vec())?;
    let sheet = workbook.sheet(SheetSelector::Name(SHEET))?;
    let rows = sheet.locate(&[ID, FUNCTION, PRACTICE, ACTIVITY, MATURITY, QUESTION, GUIDANCE])?;
    fold_rows(rows)
}

fn fold_rows(rows: impl IntoIterator<Item = Row>) -> Result<CatalogueDraft, FormatError> {
    let mut draft = CatalogueDraft::new(TITLE, DESCRIPTION);
    draft.tags = MATURITY_LEVELS.map(String::from).to_vec();

    for row in rows {
        if !row.get(ID).is_empty() {
            fold(&mut draft, &row)?;
        }
    }

    tracing::info!(
        "Read {} business functions with {} questions",
        draft.topics.len(),
        draft.stats().requirements
    );
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, maturity: &str, question: &str) -> Row {
        Row::from_pairs(&[
            (ID, id),
            (FUNCTION, "Governance"),
            (PRACTICE, "Strategy & Metrics"),
            (ACTIVITY, "Create and Promote"),
            (MATURITY, maturity),
            (QUESTION, question),
            (GUIDANCE, "Consider the risk appetite"),
        ])
    }

    #[test]
    fn identifier_parts_become_three_topic_levels() {
        let draft = fold_rows(vec![
            row("G-SM-A-1", "1", "Do you understand the risk profile?"),
            row("G-SM-A-2", "2", "Do you have a strategy?"),
        ])
        .unwrap();

        let keys: Vec<_> = draft.topics_depth_first().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["G", "G-SM", "G-SM-A"]);

        let function = draft.topics.get("G").unwrap();
        assert_eq!(function.title, "Governance");
        let activity = function.topics.get("G-SM").unwrap().topics.get("G-SM-A").unwrap();
        assert_eq!(activity.title, "Create and Promote");
        assert_eq!(activity.requirements.len(), 2);
    }

    #[test]
    fn questions_are_tagged_with_maturity() {
        let draft = fold_rows(vec![row("G-SM-A-1", "3", "Q")]).unwrap();
        let requirement = draft.requirements().next().unwrap();
        assert_eq!(requirement.key.as_str(), "G-SM-A-1");
        assert_eq!(requirement.title, "Q");
        assert_eq!(requirement.description, "Consider the risk appetite");
        assert_eq!(requirement.tags, ["Maturity 3"]);
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn short_identifier_is_rejected() {
        assert!(matches!(
            fold_rows(vec![row("G-SM", "1", "Q")]),
            Err(FormatError::Orphan { .. })
        ));
    }
}
