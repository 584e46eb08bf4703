//! Serde data structures for the Gangway configuration file.
//!
//! Contains [`Config`] (the root), [`ServerConfig`], [`ProxyConfig`],
//! [`RefreshConfig`], and [`ApplicationConfig`]. All types derive
//! `Serialize` and `Deserialize` with `deny_unknown_fields` for strict
//! parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    5000
}

const fn default_poll_interval() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

fn default_api_prefix() -> String {
    "/api/applications/".to_string()
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_poll_interval(v: &u64) -> bool {
    *v == default_poll_interval()
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_default_api_prefix(v: &str) -> bool {
    v == "/api/applications/"
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "ServerConfig::is_default")]
    pub server: ServerConfig,

    #[serde(default, skip_serializing_if = "ProxyConfig::is_default")]
    pub proxy: ProxyConfig,

    #[serde(default, skip_serializing_if = "RefreshConfig::is_default")]
    pub refresh: RefreshConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<ApplicationConfig>,
}

impl Config {
    #[must_use]
    pub fn live_applications(&self) -> usize {
        self.applications.iter().filter(|a| a.healthy).count()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Path prefix the whole proxy is mounted under. Empty for root.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_path: String,

    /// Sub-path under which per-application routes are exposed.
    #[serde(
        default = "default_api_prefix",
        skip_serializing_if = "is_default_api_prefix"
    )]
    pub api_prefix: String,

    /// Global endpoint allow-list. Empty exposes every sub-path of an
    /// application; per-application lists override this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            api_prefix: default_api_prefix(),
            endpoints: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn is_default(&self) -> bool {
        self.base_path.is_empty()
            && is_default_api_prefix(&self.api_prefix)
            && self.endpoints.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Outbound call timeout in milliseconds.
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    /// Header names never copied between inbound and outbound, on top of
    /// the built-in hop-by-hop set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_headers: Vec<String>,

    /// Record request/response bodies into the trace sink.
    #[serde(default, skip_serializing_if = "is_false")]
    pub trace_body: bool,

    /// Static headers attached to every outbound call.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add_headers: HashMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            ignored_headers: Vec::new(),
            trace_body: false,
            add_headers: HashMap::new(),
        }
    }
}

impl ProxyConfig {
    fn is_default(&self) -> bool {
        self.timeout == default_timeout()
            && self.ignored_headers.is_empty()
            && !self.trace_body
            && self.add_headers.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Rebuild the route table on the notification task instead of waiting
    /// for the next lookup.
    #[serde(default, skip_serializing_if = "is_false")]
    pub eager: bool,

    /// Registry file poll interval in seconds.
    #[serde(
        default = "default_poll_interval",
        skip_serializing_if = "is_default_poll_interval"
    )]
    pub poll_interval: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            eager: false,
            poll_interval: default_poll_interval(),
        }
    }
}

impl RefreshConfig {
    fn is_default(&self) -> bool {
        !self.eager && self.poll_interval == default_poll_interval()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    pub id: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-application endpoint allow-list; overrides `server.endpoints`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub healthy: bool,
}
