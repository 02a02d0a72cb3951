use reqwest::{StatusCode, blocking::Client};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    domain::{Config, EntityKind, Id, NewEntity},
    repository::{Repository, RepositoryError},
};

/// A [`Repository`] backed by the repository's REST API.
///
/// Entities are created with `POST {base}/api/{kind}` and deleted with
/// `DELETE {base}/api/{kind}/{id}`. Responses are wrapped in an envelope of the
/// form `{"status": 200, "data": {...}}`.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    base_url: String,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl HttpRepository {
    /// Creates a client from the given configuration.
    ///
    /// The API token is read from the environment variable named in the
    /// configuration; requests are sent unauthenticated if it is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .user_agent(concat!("req-import/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if config.token().is_none() {
            tracing::warn!(
                "No API token found in ${}, sending unauthenticated requests",
                config.token_env()
            );
        }

        Ok(Self {
            base_url: config.base_url().to_string(),
            token: config.token(),
            client,
        })
    }

    /// The endpoint serving entities of the given kind.
    #[must_use]
    pub fn endpoint(&self, kind: EntityKind) -> String {
        format!("{}/api/{}", self.base_url, kind.endpoint())
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Extracts a readable message from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(serde_json::Value::String(message)),
            ..
        }) => message,
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message.to_string(),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => body.trim().to_string(),
    }
}

impl Repository for HttpRepository {
    #[instrument(skip(self, entity), fields(kind = %entity.kind()))]
    fn create(&self, entity: &NewEntity) -> Result<Id, RepositoryError> {
        let kind = entity.kind();
        let response = self
            .authorize(self.client.post(self.endpoint(kind)))
            .json(entity)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(RepositoryError::Rejected {
                kind,
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let envelope: Envelope<Created> = serde_json::from_str(&body)
            .map_err(|e| RepositoryError::Response(format!("{kind} creation: {e}")))?;
        let id = Id::new(envelope.data.id);
        tracing::trace!("Created {} with id {id}", entity.label());
        Ok(id)
    }

    #[instrument(skip(self))]
    fn delete(&self, kind: EntityKind, id: Id) -> Result<(), RepositoryError> {
        let url = format!("{}/{id}", self.endpoint(kind));
        let response = self.authorize(self.client.delete(url)).send()?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RepositoryError::NotFound { kind, id }),
            status => Err(RepositoryError::Rejected {
                kind,
                status: status.as_u16(),
                message: error_message(&response.text()?),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn repository(base_url: &str) -> HttpRepository {
        let mut config = Config::default();
        config.set_base_url(base_url.to_string());
        HttpRepository::new(&config).unwrap()
    }

    #[test_case(EntityKind::Tag, "http://reqdb.local/api/tags")]
    #[test_case(EntityKind::Topic, "http://reqdb.local/api/topics")]
    #[test_case(EntityKind::Requirement, "http://reqdb.local/api/requirements")]
    #[test_case(EntityKind::ExtraType, "http://reqdb.local/api/extraTypes")]
    #[test_case(EntityKind::ExtraEntry, "http://reqdb.local/api/extraEntries")]
    #[test_case(EntityKind::Catalogue, "http://reqdb.local/api/catalogues")]
    fn endpoints(kind: EntityKind, expected: &str) {
        assert_eq!(repository("http://reqdb.local/").endpoint(kind), expected);
    }

    #[test_case(r#"{"status": 400, "message": "key already exists"}"#, "key already exists"; "string message")]
    #[test_case(r#"{"status": 400, "message": {"key": ["missing"]}}"#, r#"{"key":["missing"]}"#; "structured message")]
    #[test_case(r#"{"error": "Unauthorized"}"#, "Unauthorized"; "error field")]
    #[test_case("Internal Server Error", "Internal Server Error"; "plain text")]
    #[test_case("  ", "empty response body"; "empty body")]
    fn error_messages(body: &str, expected: &str) {
        assert_eq!(error_message(body), expected);
    }

    #[test]
    fn created_envelope_parses() {
        let envelope: Envelope<Created> =
            serde_json::from_str(r#"{"status": 200, "data": {"id": 42, "name": "Level 1"}}"#)
                .unwrap();
        assert_eq!(envelope.data.id, 42);
    }
}
