//! Controls become topics and safeguards become requirements, tagged with
//! their implementation groups, asset type and security function.
//!
//! The workbook is only available after registration, so it is always read
//! from a local file.

use tracing::instrument;

use crate::{
    domain::{CatalogueDraft, Key, RequirementDraft, TopicDraft},
    source::{
        FormatError,
        tabular::{Row, SheetSelector, Workbook},
    },
};

const TITLE: &str = "CIS Controls Version 8";

const DESCRIPTION: &str = "The CIS Critical Security Controls (CIS Controls) are a prioritized set of Safeguards to mitigate the most prevalent cyber-attacks against systems and networks. They are mapped to and referenced by multiple legal, regulatory, and policy frameworks.";

const SHEET: &str = "Controls V8";

const CONTROL: &str = "CIS Control";
const SAFEGUARD: &str = "CIS Safeguard";
const ASSET_TYPE: &str = "Asset Type";
const SECURITY_FUNCTION: &str = "Security Function";
const CONTROL_TITLE: &str = "Title";
const CONTROL_DESCRIPTION: &str = "Description";

/// Implementation group columns; each doubles as the tag name.
const IMPLEMENTATION_GROUPS: [&str; 3] = ["IG1", "IG2", "IG3"];

/// Marks a safeguard as part of an implementation group.
const GROUP_MARKER: &str = "x";

/// Tags in order of first appearance.
#[derive(Debug, Default)]
struct TagSet {
    assets: Vec<String>,
    functions: Vec<String>,
}

impl TagSet {
    fn see(list: &mut Vec<String>, name: &str) {
        if !name.is_empty() && !list.iter().any(|seen| seen == name) {
            list.push(name.to_string());
        }
    }

    fn into_declarations(self) -> Vec<String> {
        let mut tags: Vec<String> = IMPLEMENTATION_GROUPS.map(String::from).to_vec();
        for tag in self.assets.into_iter().chain(self.functions) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

fn control_key(control: &str) -> Result<Key, FormatError> {
    Ok(Key::new(format!("CIS-{control}"))?)
}

fn fold(draft: &mut CatalogueDraft, tags: &mut TagSet, row: &Row) -> Result<(), FormatError> {
    let control = row.get(CONTROL);
    if control.is_empty() {
        return Ok(());
    }
    let safeguard = row.get(SAFEGUARD);

    if safeguard.is_empty() {
        draft.topics.insert(TopicDraft::new(
            control_key(control)?,
            row.get(CONTROL_TITLE),
            row.get(CONTROL_DESCRIPTION),
        ));
        return Ok(());
    }

    let parent = control_key(control)?;
    let topic = draft
        .topics
        .get_mut(&parent)
        .ok_or_else(|| FormatError::Orphan {
            entry: format!("safeguard {safeguard}"),
            parent: parent.to_string(),
        })?;

    let mut requirement = RequirementDraft::new(
        Key::new(format!("CIS-{}", safeguard.replace(',', ".")))?,
        row.get(CONTROL_TITLE),
        row.get(CONTROL_DESCRIPTION),
    );
    requirement.tags = IMPLEMENTATION_GROUPS
        .into_iter()
        .filter(|group| row.get(group).eq_ignore_ascii_case(GROUP_MARKER))
        .map(String::from)
        .collect();

    let (asset, function) = (row.get(ASSET_TYPE), row.get(SECURITY_FUNCTION));
    TagSet::see(&mut tags.assets, asset);
    TagSet::see(&mut tags.functions, function);
    requirement.tags.extend(
        [asset, function]
            .into_iter()
            .filter(|tag| !tag.is_empty())
            .map(String::from),
    );

    topic.requirements.insert(requirement);
    Ok(())
}

/// Folds the controls workbook into a catalogue.
///
/// # Errors
///
/// Returns an error if the workbook lacks the controls sheet or its headers,
/// or if a safeguard precedes its control.
#[instrument(skip_all)]
pub fn canonicalize(document: &[u8]) -> Result<CatalogueDraft, FormatError> {
    let mut workbook = Workbook::open(document.to_vec())?;
    let sheet = workbook.sheet(SheetSelector::Name(SHEET))?;
    let mut headers = vec![
        CONTROL,
        SAFEGUARD,
        ASSET_TYPE,
        SECURITY_FUNCTION,
        CONTROL_TITLE,
        CONTROL_DESCRIPTION,
    ];
    headers.extend(IMPLEMENTATION_GROUPS);
    fold_rows(sheet.locate(&headers)?)
}

fn fold_rows(rows: impl IntoIterator<Item = Row>) -> Result<CatalogueDraft, FormatError> {
    let mut draft = CatalogueDraft::new(TITLE, DESCRIPTION);
    let mut tags = TagSet::default();
    for row in rows {
        fold(&mut draft, &mut tags, &row)?;
    }
    draft.tags = tags.into_declarations();

    tracing::info!(
        "Read {} controls with {} safeguards and {} tags",
        draft.topics.len(),
        draft.stats().requirements,
        draft.tags.len()
    );
    Ok(draft)
}
