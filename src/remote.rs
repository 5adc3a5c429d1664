use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::warn;

use crate::error::{RemoteError, StoreError};

/// Connection to the REST backend. One instance is shared by all entity
/// stores; per-entity access goes through [`EntityApi`] handles.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl RemoteStore {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Setup(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
            backoff,
        })
    }

    /// Typed handle for one entity collection, e.g. `/jobs` or `/schedules`.
    pub(crate) fn collection<T>(&self, path: &'static str) -> EntityApi<T> {
        EntityApi {
            http: self.http.clone(),
            endpoint: format!("{}/{}", self.base_url, path),
            retries: self.retries,
            backoff: self.backoff,
            _marker: PhantomData,
        }
    }
}

/// Authenticated CRUD over one entity collection: GET the whole list, POST a
/// draft, PUT a patch, DELETE by id. All failures, transport or non-2xx,
/// collapse into [`RemoteError::Unavailable`].
///
/// Mutations (`create`/`update`/`delete`) retry a bounded number of times
/// with doubling backoff; `list` does not, since a failed load falls back to
/// the cache immediately.
pub(crate) struct EntityApi<T> {
    http: Client,
    endpoint: String,
    retries: u32,
    backoff: Duration,
    _marker: PhantomData<T>,
}

impl<T> EntityApi<T>
where
    T: DeserializeOwned,
{
    pub async fn list(&self, token: &str) -> Result<Vec<T>, RemoteError> {
        let response = self
            .send(Method::GET, self.endpoint.clone(), token, None)
            .await?;
        Ok(response.json().await?)
    }

    pub async fn create(&self, token: &str, draft: &impl Serialize) -> Result<T, RemoteError> {
        let body = to_body(draft)?;
        let response = self
            .send_with_retry(Method::POST, self.endpoint.clone(), token, Some(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn update(
        &self,
        token: &str,
        id: &str,
        patch: &impl Serialize,
    ) -> Result<T, RemoteError> {
        let body = to_body(patch)?;
        let url = format!("{}/{}", self.endpoint, id);
        let response = self
            .send_with_retry(Method::PUT, url, token, Some(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.endpoint, id);
        self.send_with_retry(Method::DELETE, url, token, None)
            .await?;
        Ok(())
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: String,
        token: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, RemoteError> {
        let mut attempt = 0u32;
        loop {
            match self
                .send(method.clone(), url.clone(), token, body.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                    warn!(%method, url, attempt, %err, "remote call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        token: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, RemoteError> {
        let mut request = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::Unavailable {
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(response)
    }
}

fn to_body(value: &impl Serialize) -> Result<Value, RemoteError> {
    serde_json::to_value(value).map_err(|err| RemoteError::Unavailable {
        reason: format!("failed to encode request body: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobPatch, JobStatus};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "userId": "user-1",
            "title": "Rust Engineer",
            "company": "Ferrous Labs",
            "status": "applied",
            "appliedDate": "2024-01-15T00:00:00Z",
            "createdAt": "2024-01-15T00:00:00Z",
            "updatedAt": "2024-01-15T00:00:00Z"
        })
    }

    fn remote(base: &str) -> RemoteStore {
        RemoteStore::new(base, Duration::from_secs(5), 2, Duration::from_millis(1)).unwrap()
    }

    #[tokio::test]
    async fn test_list_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![job_json("1")]))
            .mount(&server)
            .await;

        let api = remote(&server.uri()).collection::<Job>("jobs");
        let jobs = api.list("tok-123").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "1");
    }

    #[tokio::test]
    async fn test_non_2xx_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = remote(&server.uri()).collection::<Job>("jobs");
        let err = api.list("tok").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_mutation_retries_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/jobs/1"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/jobs/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json("1")))
            .expect(1)
            .mount(&server)
            .await;

        let api = remote(&server.uri()).collection::<Job>("jobs");
        let patch = JobPatch {
            status: Some(JobStatus::Offer),
            ..Default::default()
        };
        let job = api.update("tok", "1", &patch).await.unwrap();
        assert_eq!(job.id, "1");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/jobs/1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3) // initial attempt + 2 retries
            .mount(&server)
            .await;

        let api = remote(&server.uri()).collection::<Job>("jobs");
        assert!(api.delete("tok", "1").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/jobs/42"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let api = remote(&server.uri()).collection::<Job>("jobs");
        api.delete("tok", "42").await.unwrap();
    }
}
