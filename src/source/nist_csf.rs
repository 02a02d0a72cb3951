//! Functions become root topics, categories become child topics and
//! subcategories become requirements.
//!
//! The workbook only names a function or category on the first row that
//! belongs to it; the rows below leave the cell blank.

use tracing::instrument;

use crate::{
    domain::{CatalogueDraft, Key, RequirementDraft, TopicDraft},
    source::{
        FormatError, Rule,
        tabular::{Row, SheetSelector, Workbook, fill_down},
    },
};

/// Download location of the CSF 2.0 reference tool export.
pub const URL: &str = "https://csrc.nist.gov/extensions/nudp/services/json/csf/download?olirids=all";

const TITLE: &str = "NIST Cybersecurity Framework (CSF) 2.0";

const DESCRIPTION: &str = "The NIST Cybersecurity Framework (CSF) 2.0 provides guidance to industry, government agencies, and other organizations to manage cybersecurity risks. It offers a taxonomy of high-level cybersecurity outcomes that can be used by any organization \u{2014} regardless of its size, sector, or maturity \u{2014} to better understand, assess, prioritize, and communicate its cybersecurity efforts. The CSF does not prescribe how outcomes should be achieved. Rather, it links to online resources that provide additional guidance on practices and controls that could be used to achieve those outcomes.";

const FUNCTION: &str = "Function";
const CATEGORY: &str = "Category";
const SUBCATEGORY: &str = "Subcategory";
const EXAMPLES: &str = "Implementation Examples";

const WITHDRAWN_MARKER: &str = "[Withdrawn";

/// A `Name (CODE): description` heading.
struct Heading<'a> {
    code: &'a str,
    title: &'a str,
    description: &'a str,
}

impl<'a> Heading<'a> {
    fn parse(cell: &'a str) -> Result<Self, FormatError> {
        let (heading, description) = cell.split_once(':').unwrap_or((cell, ""));
        let (title, code) = Rule::TitleCode.split(heading, "title", "code")?;
        Ok(Self {
            code: code.trim(),
            title: title.trim(),
            description: description.trim(),
        })
    }

    fn topic(&self) -> Result<TopicDraft, FormatError> {
        Ok(TopicDraft::new(
            Key::new(self.code)?,
            self.title,
            self.description,
        ))
    }
}

/// Builds a subcategory requirement from its `ID: title` cell.
fn subcategory(cell: &str, examples: &str) -> Result<RequirementDraft, FormatError> {
    let (id, title) = cell.split_once(':').unwrap_or((cell, ""));
    let withdrawn = title.trim_start().starts_with(WITHDRAWN_MARKER);
    let title = if withdrawn { cell } else { title };

    let description = Rule::ExampleMarker.regex().replace_all(examples, "*");
    let mut requirement = RequirementDraft::new(Key::new(id.trim())?, title.trim(), description);
    requirement.visible = !withdrawn;
    Ok(requirement)
}

fn fold(draft: &mut CatalogueDraft, row: &Row) -> Result<(), FormatError> {
    let function_cell = row.get(FUNCTION);
    if function_cell.is_empty() {
        return Ok(());
    }
    let function = Heading::parse(function_cell)?;
    let function_key = Key::new(function.code)?;
    if !draft.topics.contains_key(&function_key) {
        draft.topics.insert(function.topic()?);
    }

    let category_cell = row.get(CATEGORY);
    let subcategory_cell = row.get(SUBCATEGORY);
    if category_cell.is_empty() {
        if subcategory_cell.is_empty() {
            return Ok(());
        }
        return Err(FormatError::Orphan {
            entry: subcategory_cell.to_string(),
            parent: "category".to_string(),
        });
    }

    let category = Heading::parse(category_cell)?;
    let category_key = Key::new(category.code)?;
    let Some(function_topic) = draft.topics.get_mut(&function_key) else {
        return Ok(());
    };
    if !function_topic.topics.contains_key(&category_key) {
        function_topic.topics.insert(category.topic()?);
    }
    if subcategory_cell.is_empty() {
        return Ok(());
    }

    let requirement = subcategory(subcategory_cell, row.get(EXAMPLES))?;
    if let Some(category_topic) = function_topic.topics.get_mut(&category_key) {
        if category_topic.requirements.contains_key(&requirement.key) {
            tracing::trace!("Skipping repeated subcategory {}", requirement.key);
        } else {
            category_topic.requirements.insert(requirement);
        }
    }
    Ok(())
}

/// Folds the framework workbook into a catalogue.
///
/// # Errors
///
/// Returns an error if the workbook lacks the framework sheet or its headers,
/// or if a heading is malformed.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let mut workbook = Workbook::open(document.to_vec())?;
    let sheet = workbook.sheet(SheetSelector::Index(1))?;
    let rows = sheet.locate(&[FUNCTION, CATEGORY, SUBCATEGORY, EXAMPLES])?;
    fold_rows(rows)
}

fn fold_rows(rows: impl IntoIterator<Item = Row>) -> Result<CatalogueDraft, FormatError> {
    let mut draft = CatalogueDraft::new(TITLE, DESCRIPTION);
    for row in fill_down(rows, &[FUNCTION, CATEGORY]) {
        fold(&mut draft, &row)?;
    }

    let stats = draft.stats();
    tracing::info!(
        "Read {} functions, {} categories and {} subcategories",
        draft.topics.len(),
        stats.topics - draft.topics.len(),
        stats.requirements
    );
    Ok(draft)
}
