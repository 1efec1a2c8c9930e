//! HTTP driver for the API domain.
//!
//! Relative endpoints are joined onto the configured base URL; absolute
//! `http(s)://` endpoints are used as given. Configured default headers are
//! sent with every request unless the action sets the same header (names
//! compare case-insensitively). The response body is parsed as JSON when
//! possible and kept as a JSON string otherwise.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use interlock_core::driver::{DomainDriver, DriverError};
use interlock_types::config::ApiConfig;
use interlock_types::domain::{ApiAction, ApiOutcome, Domain, RawOutcome, StepAction};

/// `DomainDriver` for `Domain::Api`, backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpApiDriver {
    client: reqwest::Client,
    base_url: Option<String>,
    default_headers: BTreeMap<String, String>,
}

impl HttpApiDriver {
    /// Build a driver from `[api]` settings.
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            default_headers: config.default_headers.clone(),
        })
    }

    /// Resolve `endpoint` against the base URL.
    pub fn resolve_url(&self, endpoint: &str) -> Result<String, DriverError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )),
            None => Err(DriverError::InvalidAction(format!(
                "relative endpoint '{endpoint}' needs an API base URL"
            ))),
        }
    }

    /// Turn an interpolated action into a ready-to-send request.
    pub fn build_request(&self, action: &ApiAction) -> Result<reqwest::Request, DriverError> {
        let method: reqwest::Method = action
            .method
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| DriverError::InvalidAction(format!("invalid HTTP method: {}", action.method)))?;
        let url = self.resolve_url(&action.endpoint)?;

        let mut request = self.client.request(method, &url);

        let defaults = self.default_headers.iter().filter(|(name, _)| {
            !action
                .headers
                .keys()
                .any(|own| own.eq_ignore_ascii_case(name))
        });
        for (name, value) in defaults.chain(action.headers.iter()) {
            request = request.header(name.as_str(), value.as_str());
        }

        if !action.query.is_empty() {
            request = request.query(&action.query);
        }
        if let Some(body) = &action.body {
            request = request.json(body);
        }

        request
            .build()
            .map_err(|e| DriverError::InvalidAction(format!("cannot build request to '{url}': {e}")))
    }
}

/// Parse a response body: JSON when it parses, a JSON string otherwise,
/// null when empty.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

impl DomainDriver for HttpApiDriver {
    fn domain(&self) -> Domain {
        Domain::Api
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        let StepAction::Api(api) = action else {
            return Err(DriverError::WrongDomain {
                domain: Domain::Api,
                actual: action.domain(),
            });
        };

        let request = self.build_request(api)?;
        let url = request.url().to_string();
        let started = Instant::now();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| DriverError::Request(format!("HTTP request to '{url}' failed: {e}")))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| DriverError::Request(format!("failed to read HTTP response body: {e}")))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            url = url.as_str(),
            method = %api.method,
            status,
            body_len = text.len(),
            elapsed_ms,
            "HTTP request completed"
        );

        Ok(RawOutcome::Api(ApiOutcome {
            status,
            headers,
            body: parse_body(&text),
            elapsed_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn driver(base_url: Option<&str>) -> HttpApiDriver {
        let mut config = ApiConfig::default();
        config.base_url = base_url.map(str::to_string);
        config
            .default_headers
            .insert("X-Env".to_string(), "test".to_string());
        config
            .default_headers
            .insert("Accept".to_string(), "application/json".to_string());
        HttpApiDriver::new(&config).unwrap()
    }

    fn action(method: &str, endpoint: &str) -> ApiAction {
        ApiAction {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    #[test]
    fn relative_endpoint_joins_base_url() {
        let d = driver(Some("http://localhost:8080/api/"));
        assert_eq!(
            d.resolve_url("/users/42").unwrap(),
            "http://localhost:8080/api/users/42"
        );
        assert_eq!(
            d.resolve_url("https://other.example/x").unwrap(),
            "https://other.example/x"
        );
    }

    #[test]
    fn relative_endpoint_without_base_is_invalid() {
        let d = driver(None);
        assert!(matches!(
            d.resolve_url("/users"),
            Err(DriverError::InvalidAction(_))
        ));
    }

    #[test]
    fn request_carries_method_query_headers_and_body() {
        let d = driver(Some("http://localhost:8080"));
        let mut a = action("post", "/users");
        a.headers.insert("x-env".to_string(), "override".to_string());
        a.query.insert("dry_run".to_string(), "true".to_string());
        a.body = Some(json!({ "name": "alice" }));

        let req = d.build_request(&a).unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://localhost:8080/users?dry_run=true");
        let envs: Vec<_> = req.headers().get_all("x-env").iter().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0], "override");
        assert_eq!(req.headers()["accept"], "application/json");
        assert_eq!(req.headers()["content-type"], "application/json");
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(body).unwrap(),
            json!({ "name": "alice" })
        );
    }

    #[test]
    fn invalid_method_is_rejected() {
        let d = driver(Some("http://localhost"));
        assert!(matches!(
            d.build_request(&action("NOT A METHOD", "/")),
            Err(DriverError::InvalidAction(_))
        ));
    }

    #[test]
    fn response_body_parsing() {
        assert_eq!(parse_body(r#"{"id": 7}"#), json!({ "id": 7 }));
        assert_eq!(parse_body("plain text"), json!("plain text"));
        assert_eq!(parse_body("  "), Value::Null);
    }

    #[tokio::test]
    async fn wrong_domain_action_is_rejected() {
        let d = driver(None);
        let custom = StepAction::Custom(interlock_types::domain::CustomAction {
            handler: "echo".to_string(),
            params: Default::default(),
        });
        assert!(matches!(
            d.execute(&custom).await,
            Err(DriverError::WrongDomain { actual: Domain::Custom, .. })
        ));
    }
}
