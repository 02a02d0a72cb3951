//! The IT-Grundschutz Kompendium is one DocBook document.
//!
//! Every building block (`APP Anwendungen`) is a chapter whose sections are
//! modules (`APP.1.1 Office-Produkte`). A module lists its threats below a
//! `Gefährdungslage` section and its requirements, grouped by level, below an
//! `Anforderungen` section. The elemental threats form a chapter of their own.
//!
//! The document is parsed once into a [`Kompendium`], which is then folded
//! into two catalogues: the requirements and the threats.

use roxmltree::{Document, Node, ParsingOptions};
use tracing::instrument;

use crate::{
    domain::{
        CatalogueDraft, Key, Keyed, RequirementDraft, Siblings, TopicDraft, key::pad_segment,
    },
    source::{
        FormatError, MarkupConverter, Rule,
        markup::title_of,
        rules::{correct_code, strip_level_marker},
    },
};

/// Download location of the 2023 Kompendium.
pub const URL: &str = "https://www.bsi.bund.de/SharedDocs/Downloads/DE/BSI/Grundschutz/IT-GS-Kompendium/XML_Kompendium_2023.xml?__blob=publicationFile&v=4";

const THREATS_SECTION: &str = "Gefährdungslage";
const REQUIREMENTS_SECTION: &str = "Anforderungen";
const ELEMENTAL_CHAPTER: &str = "Elementare Gefährdungen";
const ELEMENTAL_KEY: &str = "EG";

/// Requirement titles of superseded requirements start with this marker.
const SUPERSEDED_MARKER: &str = "ENTFALLEN";

const ELEMENTAL_TAG: &str = "Elementar";
const MODULE_THREAT_TAG: &str = "Themenspezifisch";

/// The protection level a requirement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Basis-Anforderung, marked `(B)`.
    Basic,
    /// Standard-Anforderung, marked `(S)`.
    Standard,
    /// Anforderung bei erhöhtem Schutzbedarf, marked `(H)`.
    Elevated,
}

impl Level {
    /// Every level, lowest first.
    pub const ALL: [Self; 3] = [Self::Basic, Self::Standard, Self::Elevated];

    /// Parses the marker letter of a requirement title.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "B" => Some(Self::Basic),
            "S" => Some(Self::Standard),
            "H" => Some(Self::Elevated),
            _ => None,
        }
    }

    /// The name of the tag carried by requirements of this level.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Basic => "Basis",
            Self::Standard => "Standard",
            Self::Elevated => "Erhöht",
        }
    }
}

/// A parsed Kompendium.
#[derive(Debug, Clone, Default)]
pub struct Kompendium {
    /// Building blocks in document order.
    pub building_blocks: Siblings<BuildingBlock>,
    /// Elemental threats in document order.
    pub elemental_threats: Vec<Threat>,
}

/// A top-level grouping of modules, such as `APP Anwendungen`.
#[derive(Debug, Clone)]
pub struct BuildingBlock {
    /// The block code, e.g. `APP`.
    pub key: Key,
    /// The block title, e.g. `Anwendungen`.
    pub title: String,
    /// Modules in document order.
    pub modules: Siblings<Module>,
}

/// A module (Baustein) such as `APP.1.1 Office-Produkte`.
#[derive(Debug, Clone)]
pub struct Module {
    /// The padded module code, e.g. `APP.01.01`.
    pub key: Key,
    /// The module title.
    pub title: String,
    /// Requirements in document order.
    pub requirements: Siblings<Requirement>,
    /// Module-specific threats in document order.
    pub threats: Siblings<Threat>,
}

/// A requirement of a module.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// The padded requirement code, e.g. `APP.01.01.A02`.
    pub key: Key,
    /// The title without its level marker.
    pub title: String,
    /// The level, if the title carries a marker.
    pub level: Option<Level>,
    /// The requirement text as markdown.
    pub description: String,
    /// `false` for superseded requirements.
    pub visible: bool,
}

/// A threat, either elemental or specific to a module.
#[derive(Debug, Clone)]
pub struct Threat {
    /// `G0.1` for elemental threats, `{module}.G01` for module threats.
    pub key: Key,
    /// The threat title.
    pub title: String,
    /// The threat text as markdown.
    pub description: String,
}

impl Keyed for BuildingBlock {
    fn key(&self) -> &Key {
        &self.key
    }
}

impl Keyed for Module {
    fn key(&self) -> &Key {
        &self.key
    }
}

impl Keyed for Requirement {
    fn key(&self) -> &Key {
        &self.key
    }
}

impl Keyed for Threat {
    fn key(&self) -> &Key {
        &self.key
    }
}

fn sections<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.has_tag_name("section"))
}

fn titled<'a, 'input>(
    node: Node<'a, 'input>,
    title: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    sections(node).filter(move |section| title_of(*section).as_deref() == Some(title))
}

fn title_text(node: Node<'_, '_>) -> Result<String, FormatError> {
    title_of(node).ok_or_else(|| {
        FormatError::MissingSection(format!("title of {}", node.tag_name().name()))
    })
}

/// A building-block chapter has a module section with an `Anforderungen`
/// section.
fn is_building_block(chapter: Node<'_, '_>) -> bool {
    sections(chapter).any(|module| titled(module, REQUIREMENTS_SECTION).next().is_some())
}

/// Derives the key of a requirement code such as `APP.1.1.A2`.
fn requirement_key(code: &str) -> Result<Key, FormatError> {
    let code = correct_code(code);
    let code = match code.split_once(".A") {
        Some((module, number)) => format!("{module}.A{}", pad_segment(number)),
        None => code.to_string(),
    };
    Ok(Key::padded(&code)?)
}

fn requirement(
    node: Node<'_, '_>,
    converter: &impl MarkupConverter,
) -> Result<Requirement, FormatError> {
    let heading = title_text(node)?;
    let (code, title) = Rule::CodeTitle.split(&heading, "code", "title")?;
    let visible = !title.starts_with(SUPERSEDED_MARKER);

    let (title, level) = match strip_level_marker(title) {
        Some((stripped, marker)) => (stripped, Level::from_marker(marker)),
        None => (title.to_string(), None),
    };

    Ok(Requirement {
        key: requirement_key(code)?,
        title,
        level,
        description: converter.convert(node),
        visible,
    })
}

fn module(node: Node<'_, '_>, converter: &impl MarkupConverter) -> Result<Module, FormatError> {
    let heading = title_text(node)?;
    let (code, title) = Rule::CodeTitle.split(&heading, "code", "title")?;
    let key = Key::padded(code)?;

    let mut threats = Siblings::default();
    for (index, threat) in titled(node, THREATS_SECTION)
        .flat_map(sections)
        .enumerate()
    {
        threats.insert(Threat {
            key: Key::new(format!("{key}.G{:02}", index + 1))?,
            title: title_text(threat)?,
            description: converter.convert(threat),
        });
    }
    if !threats.is_empty() {
        tracing::debug!("Numbered {} threats of {key} by position", threats.len());
    }

    let mut requirements = Siblings::default();
    for node in titled(node, REQUIREMENTS_SECTION)
        .flat_map(sections)
        .flat_map(sections)
    {
        requirements.insert(requirement(node, converter)?);
    }

    Ok(Module {
        key,
        title: title.to_string(),
        requirements,
        threats,
    })
}

fn building_block(
    chapter: Node<'_, '_>,
    converter: &impl MarkupConverter,
) -> Result<BuildingBlock, FormatError> {
    let heading = title_text(chapter)?;
    let (code, title) = Rule::CodeTitle.split(&heading, "code", "title")?;
    Ok(BuildingBlock {
        key: Key::new(code)?,
        title: title.to_string(),
        modules: sections(chapter)
            .map(|node| module(node, converter))
            .collect::<Result<_, _>>()?,
    })
}

fn elemental_threat(
    node: Node<'_, '_>,
    converter: &impl MarkupConverter,
) -> Result<Threat, FormatError> {
    let heading = title_text(node)?;
    let (number, title) = Rule::ElementalThreat.split(&heading, "number", "title")?;
    Ok(Threat {
        key: Key::new(format!("G{number}"))?,
        title: title.to_string(),
        description: converter.convert(node),
    })
}

/// Parses the Kompendium, converting every requirement and threat body with
/// `converter`.
///
/// # Errors
///
/// Returns an error if the document is not well-formed, has no building
/// blocks or elemental threats, or a heading does not have the expected shape.
#[instrument(skip_all)]
pub fn parse(xml: &str, converter: &impl MarkupConverter) -> Result<Kompendium, FormatError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(xml, options)?;
    let chapters: Vec<_> = document
        .root_element()
        .children()
        .filter(|child| child.has_tag_name("chapter"))
        .collect();

    let building_blocks: Siblings<BuildingBlock> = chapters
        .iter()
        .filter(|chapter| is_building_block(**chapter))
        .map(|chapter| building_block(*chapter, converter))
        .collect::<Result<_, _>>()?;
    if building_blocks.is_empty() {
        return Err(FormatError::MissingSection("building block chapters".to_string()));
    }

    let elemental = chapters
        .iter()
        .find(|chapter| title_of(**chapter).as_deref() == Some(ELEMENTAL_CHAPTER))
        .ok_or_else(|| FormatError::MissingSection(format!("chapter '{ELEMENTAL_CHAPTER}'")))?;
    let elemental_threats = sections(*elemental)
        .map(|node| elemental_threat(node, converter))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        "Read {} building blocks and {} elemental threats",
        building_blocks.len(),
        elemental_threats.len()
    );
    Ok(Kompendium {
        building_blocks,
        elemental_threats,
    })
}

fn threat_requirement(threat: &Threat, tag: &str) -> RequirementDraft {
    let mut requirement =
        RequirementDraft::new(threat.key.clone(), &threat.title, &threat.description);
    requirement.tags.push(tag.to_string());
    requirement
}

impl Kompendium {
    /// Folds the building blocks into the requirements catalogue.
    ///
    /// Building blocks become root topics and modules their children.
    /// Requirements are tagged with their level.
    #[must_use]
    pub fn requirements_catalogue(&self) -> CatalogueDraft {
        let mut draft = CatalogueDraft::new(
            "BSI Grundschutz Bausteine (2023)",
            "Anforderungsbausteine des BSI Grundschutzes (2023)",
        );
        draft.tags = Level::ALL.map(|level| level.tag().to_string()).to_vec();

        for block in &self.building_blocks {
            let mut root = TopicDraft::new(block.key.clone(), &block.title, "");
            for module in &block.modules {
                let mut topic = TopicDraft::new(module.key.clone(), &module.title, "");
                for requirement in &module.requirements {
                    let mut draft_requirement = RequirementDraft::new(
                        requirement.key.clone(),
                        &requirement.title,
                        &requirement.description,
                    );
                    draft_requirement.visible = requirement.visible;
                    draft_requirement
                        .tags
                        .extend(requirement.level.map(|level| level.tag().to_string()));
                    topic.requirements.insert(draft_requirement);
                }
                root.topics.insert(topic);
            }
            draft.topics.insert(root);
        }
        draft
    }

    /// Folds the threats into the threats catalogue.
    ///
    /// Every building block gets a root topic `{code} (G)` with one child per
    /// module. The elemental threats follow under the root topic `EG`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Key`] if a building block or module code yields
    /// a blank topic key.
    pub fn threats_catalogue(&self) -> Result<CatalogueDraft, FormatError> {
        let mut draft = CatalogueDraft::new(
            "BSI Grundschutz Gefährdungen (2023)",
            "Elementare und themenspezifische Gefährdungen aus dem BSI Grundschutz (2023)",
        );
        draft.tags = vec![ELEMENTAL_TAG.to_string(), MODULE_THREAT_TAG.to_string()];

        for block in &self.building_blocks {
            let mut root = TopicDraft::new(
                Key::new(format!("{} (G)", block.key))?,
                format!("{} Gefährdungen", block.title),
                "",
            );
            for module in &block.modules {
                let mut topic = TopicDraft::new(
                    Key::new(format!("{}.G", module.key))?,
                    format!("{} Gefährdungen", module.title),
                    "",
                );
                for threat in &module.threats {
                    topic
                        .requirements
                        .insert(threat_requirement(threat, MODULE_THREAT_TAG));
                }
                root.topics.insert(topic);
            }
            draft.topics.insert(root);
        }

        let mut elemental = TopicDraft::new(Key::new(ELEMENTAL_KEY)?, ELEMENTAL_CHAPTER, "");
        for threat in &self.elemental_threats {
            elemental
                .requirements
                .insert(threat_requirement(threat, ELEMENTAL_TAG));
        }
        draft.topics.insert(elemental);
        Ok(draft)
    }
}
