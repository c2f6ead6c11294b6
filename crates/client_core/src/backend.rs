use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{Square, SquareId},
    error::ApiError,
    protocol::{SQUARE_RESET_ROUTE, SQUARE_ROUTE},
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("square {id} already exists on the backend")]
    Conflict { id: SquareId },
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::Conflict { .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Remote square collection the client synchronizes against.
#[async_trait]
pub trait SquareBackend: Send + Sync {
    async fn list_squares(&self) -> Result<Vec<Square>, BackendError>;
    async fn create_square(&self, square: Square) -> Result<Square, BackendError>;
    async fn reset_squares(&self) -> Result<(), BackendError>;
    /// Lightweight reachability check; succeeds on any 2xx answer.
    async fn probe(&self) -> Result<(), BackendError>;
}

pub struct HttpSquareBackend {
    http: Client,
    squares_url: Url,
    reset_url: Url,
}

impl HttpSquareBackend {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(server_url)
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("server url must start with http:// or https://"));
        }
        Ok(Self {
            http: Client::new(),
            squares_url: base.join(SQUARE_ROUTE)?,
            reset_url: base.join(SQUARE_RESET_ROUTE)?,
        })
    }

    pub fn squares_url(&self) -> &Url {
        &self.squares_url
    }
}

#[async_trait]
impl SquareBackend for HttpSquareBackend {
    async fn list_squares(&self) -> Result<Vec<Square>, BackendError> {
        let response = self.http.get(self.squares_url.clone()).send().await?;
        let squares = ensure_success(response).await?.json().await?;
        Ok(squares)
    }

    async fn create_square(&self, square: Square) -> Result<Square, BackendError> {
        let response = self
            .http
            .post(self.squares_url.clone())
            .json(&square)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(BackendError::Conflict { id: square.id });
        }
        let stored = ensure_success(response).await?.json().await?;
        Ok(stored)
    }

    async fn reset_squares(&self) -> Result<(), BackendError> {
        let response = self.http.delete(self.reset_url.clone()).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let response = self.http.get(self.squares_url.clone()).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ApiError>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown status").to_string(),
    };
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
