//! `reqwest` implementation of [`Gateway`].
//!
//! Every request goes through [`HttpGateway::call`]: bearer token from the
//! session store, JSON headers, one span per call, and failure packaging via
//! [`decode_response`]. Typed results are produced right after the call by
//! the [`normalize`] functions.

use super::{
    Gateway,
    endpoints::Endpoints,
    error::{ApiError, decode_response},
    normalize,
    types::{Acknowledgement, Activity, LoginOutcome, Lookup, ParticipantRecord, Stats, Update, VerifyOutcome},
};
use crate::{APP_USER_AGENT, session::SessionStore};
use reqwest::{
    Method,
    header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tracing::{Instrument, debug, info_span};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameter naming the event collection.
const COLLECTION_PARAM: &str = "coleccion";

#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    endpoints: Endpoints,
    sessions: Arc<dyn SessionStore>,
}

impl HttpGateway {
    /// Builds a gateway for `base_url` with the default route table.
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: Url,
        sessions: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            endpoints: Endpoints::default(),
            sessions,
        })
    }

    /// Joins `path` and the escaped `ids` onto the base URL.
    fn url(&self, path: &str, ids: &[&str], query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ApiError::transport(format!("Invalid API base URL: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|part| !part.is_empty()));
            segments.extend(ids);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn call(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, ApiError> {
        let span = info_span!("api.call", http.method = %method, url.path = %url.path());

        async move {
            let mut request = self
                .client
                .request(method, url)
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json");
            if let Some(token) = self.sessions.token() {
                request = request.bearer_auth(token.expose_secret());
            }
            if let Some(body) = body {
                request = request.json(&body);
            }

            let response = request.send().await.map_err(map_request_error)?;
            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.map_err(map_request_error)?;

            debug!(status = status.as_u16(), bytes = text.len(), "response received");
            decode_response(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                &text,
                retry_after,
            )
        }
        .instrument(span)
        .await
    }
}

fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::transport("Request timed out. Please try again.")
    } else {
        ApiError::transport(format!("Unable to reach the server: {err}"))
    }
}

impl Gateway for HttpGateway {
    async fn login(&self, username: &str, password: &SecretString) -> Result<LoginOutcome, ApiError> {
        let url = self.url(&self.endpoints.login, &[], &[])?;
        let body = json!({ "usuario": username, "password": password.expose_secret() });
        let response = self.call(Method::POST, url, Some(body)).await?;
        Ok(normalize::login_outcome(&response))
    }

    async fn request_code(&self, user_id: &str) -> Result<Acknowledgement, ApiError> {
        let url = self.url(&self.endpoints.request_code, &[], &[])?;
        let response = self
            .call(Method::POST, url, Some(json!({ "usuarioId": user_id })))
            .await?;
        Ok(normalize::acknowledgement(&response))
    }

    async fn verify_code(&self, user_id: &str, code: &str) -> Result<VerifyOutcome, ApiError> {
        let url = self.url(&self.endpoints.verify_code, &[], &[])?;
        let body = json!({ "usuarioId": user_id, "codigo": code });
        let response = self.call(Method::POST, url, Some(body)).await?;
        Ok(normalize::verify_outcome(&response))
    }

    async fn activities(&self) -> Result<Vec<Activity>, ApiError> {
        let url = self.url(&self.endpoints.activities, &[], &[])?;
        let response = self.call(Method::GET, url, None).await?;
        Ok(normalize::activities(&response))
    }

    async fn find_participant(&self, id: &str, collection: Option<&str>) -> Result<Lookup, ApiError> {
        let query: Vec<(&str, &str)> = collection
            .map(|collection| vec![(COLLECTION_PARAM, collection)])
            .unwrap_or_default();
        let url = self.url(&self.endpoints.find_participant, &[id], &query)?;
        let response = self.call(Method::GET, url, None).await?;
        Ok(normalize::lookup(&response))
    }

    async fn set_attendance(
        &self,
        id: &str,
        collection: &str,
        attended: bool,
    ) -> Result<Acknowledgement, ApiError> {
        let url = self.url(
            &self.endpoints.set_attendance,
            &[id],
            &[(COLLECTION_PARAM, collection)],
        )?;
        let response = self
            .call(Method::PUT, url, Some(json!({ "asistencia": attended })))
            .await?;
        Ok(normalize::acknowledgement(&response))
    }

    async fn registrations(&self, collection: &str) -> Result<Vec<ParticipantRecord>, ApiError> {
        let url = self.url(&self.endpoints.registrations, &[], &[(COLLECTION_PARAM, collection)])?;
        let response = self.call(Method::GET, url, None).await?;
        Ok(normalize::registrations(&response))
    }

    async fn stats(&self, collection: &str) -> Result<Stats, ApiError> {
        let url = self.url(&self.endpoints.stats, &[], &[(COLLECTION_PARAM, collection)])?;
        let response = self.call(Method::GET, url, None).await?;
        Ok(normalize::stats(&response))
    }

    async fn updates(&self, collection: &str, since: u64) -> Result<Vec<Update>, ApiError> {
        let since = since.to_string();
        let url = self.url(&self.endpoints.updates, &[collection], &[("since", since.as_str())])?;
        let response = self.call(Method::GET, url, None).await?;
        Ok(normalize::updates(&response))
    }
}
