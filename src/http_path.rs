// Named route templating and thin verb dispatch over reqwest
//
// Responses come back untouched: no status checks, no body parsing, no retries.
// Callers decide what a non-2xx status means for them.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use tracing::debug;

use crate::error::HttpError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Everything needed to dispatch one request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: Url,
    pub data: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
}

impl RequestSpec {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            data: None,
            headers: Vec::new(),
            content_type: None,
        }
    }

    pub fn with_data<T: Serialize>(mut self, data: &T) -> Result<Self, HttpError> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub struct HttpPathClient {
    client: Client,
    prefix: String,
    routes: HashMap<String, String>,
}

impl HttpPathClient {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            prefix: prefix.into().trim_end_matches('/').to_string(),
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.routes.insert(name.into(), template.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Renders the named route into an absolute URL.
    ///
    /// Placeholders with no matching entry in `route_params` stay in the path as-is.
    pub fn path(
        &self,
        route: &str,
        route_params: &[(&str, &str)],
        query_params: &[(&str, &str)],
    ) -> Result<Url, HttpError> {
        let template = self
            .routes
            .get(route)
            .ok_or_else(|| HttpError::UnknownRoute(route.to_string()))?;

        let raw = format!("{}{}", self.prefix, render_template(template, route_params));
        let mut url = Url::parse(&raw).map_err(|e| HttpError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(HttpError::InvalidUrl {
                url: raw,
                reason: "not a hierarchical absolute URL".to_string(),
            });
        }

        if !query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    pub async fn get(&self, spec: RequestSpec) -> Result<Response, HttpError> {
        self.dispatch(Method::GET, spec).await
    }

    pub async fn post(&self, spec: RequestSpec) -> Result<Response, HttpError> {
        self.dispatch(Method::POST, spec).await
    }

    pub async fn put(&self, spec: RequestSpec) -> Result<Response, HttpError> {
        self.dispatch(Method::PUT, spec).await
    }

    pub async fn patch(&self, spec: RequestSpec) -> Result<Response, HttpError> {
        self.dispatch(Method::PATCH, spec).await
    }

    pub async fn del(&self, spec: RequestSpec) -> Result<Response, HttpError> {
        self.dispatch(Method::DELETE, spec).await
    }

    /// POSTs a pre-encoded body. No content type is forced; multipart callers set
    /// their own boundary header through `spec`.
    pub async fn multi_post(&self, spec: RequestSpec, body: Bytes) -> Result<Response, HttpError> {
        debug!(method = "POST", url = %spec.url, bytes = body.len(), "Dispatching raw body request");

        let mut builder = self.client.post(spec.url);
        if let Some(content_type) = spec.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Ok(builder.body(body).send().await?)
    }

    async fn dispatch(&self, method: Method, spec: RequestSpec) -> Result<Response, HttpError> {
        debug!(method = %method, url = %spec.url, "Dispatching request");

        let content_type = spec
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let carries_body = method != Method::GET;

        let mut builder = self
            .client
            .request(method, spec.url)
            .header(CONTENT_TYPE, content_type);
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if carries_body {
            if let Some(data) = &spec.data {
                builder = builder.body(serde_json::to_vec(data)?);
            }
        }

        Ok(builder.send().await?)
    }
}

// Substitutes `:name` placeholders; a name runs over ASCII alphanumerics and '_'.
// Values are percent-encoded as a single path segment, so '/', '?' and '#' stay in the path.
fn render_template(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        match params.iter().find(|(key, _)| *key == name) {
            Some((_, value)) if !name.is_empty() => out.push_str(&urlencoding::encode(value)),
            _ => {
                out.push(':');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}
