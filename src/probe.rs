//! One-shot connectivity test against a provider endpoint.
//!
//! The auth header scheme and test path depend on the provider's host. They
//! come from [`ENDPOINT_RULES`], checked in order, with [`DEFAULT_RULE`] as
//! the fallback. Building the request is pure (see [`plan_request`]); only
//! [`Prober::probe`] touches the network.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::env_block::EnvSnapshot;
use crate::store::ProviderProfile;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Model used when testing session variables that carry no model
pub const DEFAULT_TEST_MODEL: &str = "claude-3-sonnet-20240229";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How the API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `x-api-key` plus `anthropic-version`
    ApiKey,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl AuthScheme {
    fn headers(self, api_key: &str) -> Vec<(String, String)> {
        match self {
            Self::ApiKey => vec![
                ("x-api-key".to_string(), api_key.to_string()),
                ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
            ],
            Self::Bearer => vec![("Authorization".to_string(), format!("Bearer {}", api_key))],
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EndpointRule {
    /// Matches when the host contains any of these
    pub hosts: &'static [&'static str],
    pub auth: AuthScheme,
    /// Appended to the base URL
    pub path: &'static str,
}

impl EndpointRule {
    fn matches(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| host.contains(h))
    }
}

pub const ENDPOINT_RULES: &[EndpointRule] = &[
    EndpointRule {
        hosts: &["anthropic.com"],
        auth: AuthScheme::ApiKey,
        path: "/v1/messages",
    },
    EndpointRule {
        hosts: &["openai.com"],
        auth: AuthScheme::Bearer,
        path: "/v1/chat/completions",
    },
    EndpointRule {
        hosts: &["bigmodel.cn"],
        auth: AuthScheme::Bearer,
        path: "/api/anthropic/v1/messages",
    },
    EndpointRule {
        hosts: &["moonshot.cn"],
        auth: AuthScheme::Bearer,
        path: "/anthropic/v1/messages",
    },
    EndpointRule {
        hosts: &["dashscope-intl.aliyuncs.com"],
        auth: AuthScheme::Bearer,
        path: "/v1/messages",
    },
    EndpointRule {
        hosts: &["anyrouter.top", "wenwen-ai.com"],
        auth: AuthScheme::Bearer,
        path: "/v1/messages",
    },
];

pub static DEFAULT_RULE: EndpointRule = EndpointRule {
    hosts: &[],
    auth: AuthScheme::Bearer,
    path: "/v1/messages",
};

/// Pick the rule for a base URL; unparsable URLs are matched as raw text
pub fn rule_for(base_url: &str) -> &'static EndpointRule {
    let host = reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| base_url.to_string());

    ENDPOINT_RULES
        .iter()
        .find(|rule| rule.matches(&host))
        .unwrap_or(&DEFAULT_RULE)
}

/// Everything needed to send the test request
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub url: String,
    /// In application order; later entries replace earlier ones with the same name
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

pub fn plan_request(profile: &ProviderProfile) -> ProbeRequest {
    let rule = rule_for(&profile.base_url);
    let url = format!("{}{}", profile.base_url.trim_end_matches('/'), rule.path);

    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (
            "User-Agent".to_string(),
            format!("ccx/{}", env!("CARGO_PKG_VERSION")),
        ),
    ];
    headers.extend(profile.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    headers.extend(rule.auth.headers(&profile.api_key));

    let body = json!({
        "model": profile.model,
        "max_tokens": 10,
        "messages": [{ "role": "user", "content": "test" }],
    });

    ProbeRequest { url, headers, body }
}

/// Why a probe failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    /// The server answered with a non-2xx status
    #[error("API error ({code}): {message}")]
    Status { code: u16, message: String },
    /// Connection, DNS, TLS or timeout failure
    #[error("no response from server: {0}")]
    NoResponse(String),
    /// The request could not be built (bad URL or header)
    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub elapsed_ms: u64,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Build a throwaway profile from session variables
pub fn profile_from_env(env: &EnvSnapshot) -> Option<ProviderProfile> {
    let (Some(token), Some(base_url)) = (&env.auth_token, &env.base_url) else {
        return None;
    };
    let model = env.model.as_deref().unwrap_or(DEFAULT_TEST_MODEL);
    Some(ProviderProfile::new("Current Environment", token, base_url, model))
}

/// Blocking HTTP client with the probe timeout
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Send one test request; never retries
    pub fn probe(&self, profile: &ProviderProfile) -> ProbeOutcome {
        let request = plan_request(profile);
        debug!(url = %request.url, "probing provider");

        let start = Instant::now();
        let failure = self.send(&request).err();
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        ProbeOutcome {
            elapsed_ms,
            failure,
        }
    }

    fn send(&self, request: &ProbeRequest) -> Result<(), ProbeFailure> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProbeFailure::Request(format!("invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ProbeFailure::Request(format!("invalid value for header '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .json(&request.body)
            .send()
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = status.canonical_reason().unwrap_or("Unknown status").to_string();
        let message = response
            .json::<Value>()
            .ok()
            .and_then(|body| {
                body.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(reason);

        Err(ProbeFailure::Status {
            code: status.as_u16(),
            message,
        })
    }
}

fn classify(err: reqwest::Error) -> ProbeFailure {
    if err.is_builder() {
        ProbeFailure::Request(err.to_string())
    } else if err.is_timeout() {
        ProbeFailure::NoResponse(format!("timed out after {}s", TIMEOUT.as_secs()))
    } else {
        ProbeFailure::NoResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(base_url: &str) -> ProviderProfile {
        ProviderProfile::new("T", "sk-test", base_url, "m")
    }

    fn header<'a>(request: &'a ProbeRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_rule_lookup() {
        assert_eq!(rule_for("https://api.anthropic.com").auth, AuthScheme::ApiKey);
        assert_eq!(rule_for("https://api.openai.com/").path, "/v1/chat/completions");
        assert_eq!(
            rule_for("https://open.bigmodel.cn").path,
            "/api/anthropic/v1/messages"
        );
        assert_eq!(rule_for("https://api.moonshot.cn").path, "/anthropic/v1/messages");
        assert_eq!(rule_for("https://anyrouter.top"), &ENDPOINT_RULES[5]);
        assert_eq!(rule_for("https://proxy.internal:8443"), &DEFAULT_RULE);
        assert_eq!(rule_for("not a url at all"), &DEFAULT_RULE);
    }

    #[test]
    fn test_rule_matches_host_not_path() {
        // "openai.com" only in the path must not select the OpenAI rule
        assert_eq!(rule_for("https://gateway.example/openai.com"), &DEFAULT_RULE);
    }

    #[test]
    fn test_plan_anthropic() {
        let request = plan_request(&profile("https://api.anthropic.com/"));
        assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(header(&request, "x-api-key"), Some("sk-test"));
        assert_eq!(header(&request, "anthropic-version"), Some("2023-06-01"));
        assert_eq!(header(&request, "authorization"), None);
        assert_eq!(request.body["max_tokens"], 10);
        assert_eq!(request.body["model"], "m");
        assert_eq!(request.body["messages"][0]["content"], "test");
    }

    #[test]
    fn test_plan_default_bearer() {
        let request = plan_request(&profile("https://llm.example.com"));
        assert_eq!(request.url, "https://llm.example.com/v1/messages");
        assert_eq!(header(&request, "Authorization"), Some("Bearer sk-test"));
        assert!(header(&request, "User-Agent").unwrap().starts_with("ccx/"));
    }

    #[test]
    fn test_custom_headers_cannot_override_auth() {
        let mut p = profile("https://llm.example.com");
        p.headers.insert("Authorization".into(), "Basic nope".into());
        p.headers.insert("X-Team".into(), "infra".into());

        let request = plan_request(&p);
        assert_eq!(header(&request, "Authorization"), Some("Bearer sk-test"));
        assert_eq!(header(&request, "X-Team"), Some("infra"));
    }

    #[test]
    fn test_profile_from_env() {
        let mut env = EnvSnapshot::default();
        assert!(profile_from_env(&env).is_none());

        env.auth_token = Some("tok".into());
        assert!(profile_from_env(&env).is_none());

        env.base_url = Some("https://x".into());
        let p = profile_from_env(&env).unwrap();
        assert_eq!(p.model, DEFAULT_TEST_MODEL);
        assert_eq!(p.api_key, "tok");
    }

    #[test]
    fn test_probe_invalid_url_is_request_failure() {
        let prober = Prober::new().unwrap();
        let outcome = prober.probe(&profile("not a url"));
        assert!(!outcome.success());
        assert!(matches!(outcome.failure, Some(ProbeFailure::Request(_))));
    }

    #[test]
    fn test_probe_invalid_header_is_request_failure() {
        let mut p = profile("http://127.0.0.1:9");
        p.headers.insert("bad header".into(), "x".into());
        let outcome = Prober::new().unwrap().probe(&p);
        assert!(matches!(outcome.failure, Some(ProbeFailure::Request(_))));
    }

    #[test]
    fn test_probe_refused_is_no_response() {
        // Port 9 (discard) is closed on typical hosts, so the connect is refused
        let outcome = Prober::new().unwrap().probe(&profile("http://127.0.0.1:9"));
        assert!(matches!(outcome.failure, Some(ProbeFailure::NoResponse(_))));
    }

    #[test]
    fn test_failure_messages() {
        let status = ProbeFailure::Status {
            code: 401,
            message: "invalid x-api-key".into(),
        };
        assert_eq!(status.to_string(), "API error (401): invalid x-api-key");
    }
}
