use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Post, PostId},
    error::ErrorDocument,
    protocol::{posts_route, CreatePostRequest, PostListResponse, PostResponse},
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// Backend operations the controller depends on.
#[async_trait]
pub trait PostsApi: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError>;
    async fn create_post(&self, message: &str) -> Result<Post, ClientError>;
    async fn remove_post(&self, id: &PostId) -> Result<(), ClientError>;
}

pub struct HttpPostsApi {
    http: Client,
    base_url: Url,
}

impl HttpPostsApi {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(server_url).map_err(|source| ClientError::InvalidBaseUrl {
            url: server_url.to_string(),
            source,
        })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    /// Collection endpoint with `id` appended as one percent-encoded segment.
    fn post_endpoint(&self, id: &PostId) -> Result<Url, ClientError> {
        let mut url = self.endpoint(posts_route())?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .push(id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl PostsApi for HttpPostsApi {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        let response = self.http.get(self.endpoint(posts_route())?).send().await?;
        let body: PostListResponse = read_json(response).await?;
        Ok(body.into_inner())
    }

    async fn create_post(&self, message: &str) -> Result<Post, ClientError> {
        let response = self
            .http
            .post(self.endpoint(posts_route())?)
            .json(&CreatePostRequest::with_message(message))
            .send()
            .await?;
        let body: PostResponse = read_json(response).await?;
        Ok(body.into_inner())
    }

    async fn remove_post(&self, id: &PostId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.post_endpoint(id)?)
            .send()
            .await?;
        // Any success body is accepted.
        check_status(response).await?;
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let errors = serde_json::from_slice::<ErrorDocument>(&body)
        .map(|document| document.errors)
        .unwrap_or_default();
    debug!(
        status = status.as_u16(),
        error_count = errors.len(),
        "backend rejected request"
    );
    Err(ClientError::Status {
        status: status.as_u16(),
        errors,
    })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
