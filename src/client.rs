/*
 * Client for the REST API that owns polls and organizations
 */
use std::time::Duration;

use async_std::task;
use async_trait::async_trait;
use log::*;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api_models::ErrorBody;
use crate::models::{Organization, Poll, PollForm};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0} could not be found")]
    NotFound(String),
    #[error("the API responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not reach the API: {0}")]
    Transport(String),
    #[error("unexpected response from the API: {0}")]
    Decode(String),
}

/**
 * The remote operations the edit page needs
 */
#[async_trait]
pub trait PollApi: Send + Sync {
    async fn get_poll(&self, id: &str) -> Result<Poll, ApiError>;

    /**
     * Replace the editable fields of the poll, returning the stored record
     */
    async fn update_poll(&self, id: &str, form: &PollForm) -> Result<Poll, ApiError>;

    async fn search_organizations(&self, query: Option<&str>)
        -> Result<Vec<Organization>, ApiError>;
}

/**
 * PollApi over HTTP
 *
 * The blocking reqwest client is driven from `spawn_blocking` so it never
 * holds up the executor.
 */
#[derive(Clone, Debug)]
pub struct RestClient {
    base_url: Url,
    token: Option<String>,
    client: Client,
}

impl RestClient {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Transport(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T>(&self, request: RequestBuilder, resource: String) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        task::spawn_blocking(move || {
            let response = request
                .send()
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            decode(response, &resource)
        })
        .await
    }
}

#[async_trait]
impl PollApi for RestClient {
    async fn get_poll(&self, id: &str) -> Result<Poll, ApiError> {
        let url = self.endpoint(&["polls", id])?;
        debug!("Fetching poll from {}", url);
        self.execute(self.client.get(url), format!("poll {}", id))
            .await
    }

    async fn update_poll(&self, id: &str, form: &PollForm) -> Result<Poll, ApiError> {
        let url = self.endpoint(&["polls", id])?;
        debug!("Updating poll at {}: {:?}", url, form);
        self.execute(self.client.put(url).json(form), format!("poll {}", id))
            .await
    }

    async fn search_organizations(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<Organization>, ApiError> {
        let mut url = self.endpoint(&["organizations"])?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.query_pairs_mut().append_pair("search", query);
        }
        self.execute(self.client.get(url), "organizations".to_string())
            .await
    }
}

fn decode<T: DeserializeOwned>(response: Response, resource: &str) -> Result<T, ApiError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(resource.to_string()));
    }

    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(text);
        warn!("API request for {} failed with {}: {}", resource, status, message);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .map_err(|e| ApiError::Decode(e.to_string()))
}
