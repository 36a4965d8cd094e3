// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated HTTP client for the coaching backend.

use std::sync::Arc;

use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::FailureClassifier;
use crate::config::{ClientConfig, LOGIN_PATH};
use crate::error::{ClientError, RequestError};
use crate::storage::CredentialStore;

/// Header carrying a per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Which credential, if any, to attach to a request.
#[derive(Debug, Clone, Copy)]
enum Bearer<'a> {
    /// Whatever is currently in the credential slot
    Stored,
    /// A specific credential, e.g. one that was just removed from the slot
    Explicit(&'a str),
}

/// HTTP client that attaches the bearer credential and routes every failure
/// through the [`FailureClassifier`].
#[derive(Debug)]
pub struct ApiClient {
    config: ClientConfig,
    http: Client,
    store: Arc<dyn CredentialStore>,
    classifier: FailureClassifier,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        classifier: FailureClassifier,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::HttpClient)?;

        Ok(Self {
            config,
            http,
            store,
            classifier,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    /// GET a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let response = self.send(Method::GET, path, None, Bearer::Stored).await?;
        decode_json(Method::GET, path, response).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_json(Method::POST, path, body)?;
        let response = self.send(Method::POST, path, Some(body), Bearer::Stored).await?;
        decode_json(Method::POST, path, response).await
    }

    /// PUT a JSON body and decode a JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_json(Method::PUT, path, body)?;
        let response = self.send(Method::PUT, path, Some(body), Bearer::Stored).await?;
        decode_json(Method::PUT, path, response).await
    }

    /// DELETE a resource, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<(), RequestError> {
        self.send(Method::DELETE, path, None, Bearer::Stored).await?;
        Ok(())
    }

    /// POST with an explicit credential, ignoring any response body.
    ///
    /// Used for logout, which runs after the credential has left the slot.
    pub(crate) async fn post_with_credential(
        &self,
        path: &str,
        credential: &str,
    ) -> Result<(), RequestError> {
        self.send(
            Method::POST,
            path,
            Some(Value::Object(Default::default())),
            Bearer::Explicit(credential),
        )
        .await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Bearer<'_>,
    ) -> Result<Response, RequestError> {
        let credential = self.bearer_credential(path, bearer);
        let result = self.execute(method, path, body, credential.as_deref()).await;
        if let Err(ref error) = result {
            self.classifier.handle(path, error, credential.as_deref());
        }
        result
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        credential: Option<&str>,
    ) -> Result<Response, RequestError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .http
            .request(method.clone(), self.config.endpoint(path))
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(credential) = credential {
            request = request.header("Authorization", format!("Bearer {credential}"));
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(method = %method, path = %path, request_id = %request_id, "Sending request");

        let response = request.send().await.map_err(|e| RequestError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }

    fn bearer_credential(&self, path: &str, bearer: Bearer<'_>) -> Option<String> {
        if path == LOGIN_PATH {
            return None;
        }

        match bearer {
            Bearer::Explicit(credential) => Some(credential.to_string()),
            Bearer::Stored => match self.store.load() {
                Ok(credential) => credential,
                Err(e) => {
                    warn!(error = %e, "Failed to read credential slot; sending unauthenticated");
                    None
                }
            },
        }
    }
}

fn encode_json<B: Serialize + ?Sized>(
    method: Method,
    path: &str,
    body: &B,
) -> Result<Value, RequestError> {
    serde_json::to_value(body).map_err(|e| RequestError::InvalidResponse {
        method: method.to_string(),
        path: path.to_string(),
        message: format!("serialize body failed: {e}"),
    })
}

async fn decode_json<T: DeserializeOwned>(
    method: Method,
    path: &str,
    response: Response,
) -> Result<T, RequestError> {
    response
        .json()
        .await
        .map_err(|e| RequestError::InvalidResponse {
            method: method.to_string(),
            path: path.to_string(),
            message: e.to_string(),
        })
}
