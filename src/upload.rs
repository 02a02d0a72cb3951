//! Uploads a [`CatalogueDraft`] through a [`Session`].

use std::collections::HashMap;

use tracing::instrument;

use crate::{
    domain::{
        Catalogue, CatalogueDraft, ExtraEntry, ExtraType, Id, IdRef, Key, NewEntity, Requirement,
        RequirementDraft, Tag, Topic, TopicDraft,
    },
    repository::{Repository, RepositoryError},
    session::Session,
};

/// Errors that abort an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A requirement carries a tag the catalogue does not declare.
    #[error("requirement {requirement} references undeclared tag '{tag}'")]
    UnknownTag {
        /// The offending requirement.
        requirement: Key,
        /// The undeclared tag name.
        tag: String,
    },

    /// A requirement carries a value of an undeclared field.
    #[error("requirement {requirement} references undeclared extra type '{extra_type}'")]
    UnknownExtraType {
        /// The offending requirement.
        requirement: Key,
        /// The undeclared field name.
        extra_type: String,
    },

    /// The repository refused to create an entity.
    #[error("failed to create {what}")]
    Create {
        /// Label of the entity that could not be created.
        what: String,
        /// The repository's error.
        #[source]
        source: RepositoryError,
    },
}

/// Creates every entity of a draft, ending with the catalogue itself.
///
/// Tags and extra types are created first, then topics depth-first with each
/// topic's requirements (and their extra entries) right after it. The
/// catalogue is created last, referencing the root topics.
///
/// Everything created is recorded in the session; on error the caller is
/// expected to roll the session back.
///
/// # Errors
///
/// Returns an error if the draft references an undeclared tag or extra type,
/// or if the repository rejects any entity.
#[instrument(skip_all, fields(catalogue = %draft.title))]
pub fn upload<R: Repository + ?Sized>(
    session: &mut Session<'_, R>,
    draft: &CatalogueDraft,
) -> Result<Id, UploadError> {
    let mut uploader = Uploader {
        session,
        tags: HashMap::new(),
        extra_types: HashMap::new(),
    };

    for name in &draft.tags {
        let id = uploader.create(NewEntity::Tag(Tag { name: name.clone() }))?;
        uploader.tags.insert(name.as_str(), id);
    }

    for extra in &draft.extra_types {
        let id = uploader.create(NewEntity::ExtraType(ExtraType {
            title: extra.title.clone(),
            kind: extra.kind,
            description: extra.description.clone(),
        }))?;
        uploader.extra_types.insert(extra.title.as_str(), id);
    }

    let mut roots = Vec::with_capacity(draft.topics.len());
    for topic in &draft.topics {
        roots.push(IdRef::from(uploader.topic(topic, None)?));
    }

    let id = uploader.create(NewEntity::Catalogue(Catalogue {
        title: draft.title.clone(),
        description: draft.description.clone(),
        topics: roots,
    }))?;

    let stats = draft.stats();
    tracing::info!(
        "Uploaded catalogue '{}' ({} topics, {} requirements)",
        draft.title,
        stats.topics,
        stats.requirements
    );
    Ok(id)
}

struct Uploader<'s, 'r, 'd, R: Repository + ?Sized> {
    session: &'s mut Session<'r, R>,
    tags: HashMap<&'d str, Id>,
    extra_types: HashMap<&'d str, Id>,
}

impl<'d, R: Repository + ?Sized> Uploader<'_, '_, 'd, R> {
    fn create(&mut self, entity: NewEntity) -> Result<Id, UploadError> {
        self.session
            .create(&entity)
            .map_err(|source| UploadError::Create {
                what: entity.label(),
                source,
            })
    }

    fn topic(&mut self, topic: &'d TopicDraft, parent: Option<Id>) -> Result<Id, UploadError> {
        let id = self.create(NewEntity::Topic(Topic {
            key: topic.key.clone(),
            title: topic.title.clone(),
            description: topic.description.clone(),
            parent,
        }))?;

        for requirement in &topic.requirements {
            self.requirement(requirement, id)?;
        }
        for child in &topic.topics {
            self.topic(child, Some(id))?;
        }
        Ok(id)
    }

    fn requirement(
        &mut self,
        requirement: &'d RequirementDraft,
        parent: Id,
    ) -> Result<(), UploadError> {
        let tags = requirement
            .tags
            .iter()
            .map(|name| {
                self.tags
                    .get(name.as_str())
                    .map(|&id| IdRef::from(id))
                    .ok_or_else(|| UploadError::UnknownTag {
                        requirement: requirement.key.clone(),
                        tag: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.create(NewEntity::Requirement(Requirement {
            key: requirement.key.clone(),
            title: requirement.title.clone(),
            description: requirement.description.clone(),
            parent,
            visible: requirement.visible,
            tags,
        }))?;

        for extra in &requirement.extras {
            let extra_type = *self
                .extra_types
                .get(extra.extra_type.as_str())
                .ok_or_else(|| UploadError::UnknownExtraType {
                    requirement: requirement.key.clone(),
                    extra_type: extra.extra_type.clone(),
                })?;
            self.create(NewEntity::ExtraEntry(ExtraEntry {
                content: extra.content.clone(),
                extra_type,
                requirement: id,
            }))?;
        }
        Ok(())
    }
}
