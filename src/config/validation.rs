//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as malformed base/API paths, duplicate application ids,
//! invalid backend URLs, and bad endpoint names. Returns a list of
//! [`ValidationError`] values with per-field suggestions. Any error here
//! is fatal at startup: the proxy never accepts traffic on a config it
//! cannot route with.

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate the base path prefix. Empty means the proxy is mounted at root.
pub fn validate_base_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err(format!("base path must start with '/' (got '{path}')"));
    }
    if path.ends_with('/') {
        return Err("base path must not end with '/'".into());
    }
    Ok(())
}

/// Validate the API sub-path prefix under which applications are exposed.
pub fn validate_api_prefix(prefix: &str) -> Result<(), String> {
    if !prefix.starts_with('/') || !prefix.ends_with('/') {
        return Err(format!(
            "api prefix must start and end with '/' (got '{prefix}')"
        ));
    }
    Ok(())
}

/// Validate an application backend URL. Returns `Ok(())` or a human-readable error.
pub fn validate_backend_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate an application id as it will appear in route prefixes.
pub fn validate_application_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id cannot be empty".into());
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!(
            "id '{id}' may only contain letters, digits, '-', '_' and '.'"
        ));
    }
    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    if endpoint.is_empty() {
        return Err("endpoint name cannot be empty".into());
    }
    if endpoint.contains('/') {
        return Err(format!(
            "endpoint '{endpoint}' must be a single path segment"
        ));
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(msg) = validate_base_path(&config.server.base_path) {
        errors.push(ValidationError {
            item: "(root)".into(),
            field: "server.base_path".into(),
            message: msg,
            suggestion: config
                .server
                .base_path
                .strip_suffix('/')
                .map(|p| format!("did you mean '{p}'?")),
        });
    }

    if let Err(msg) = validate_api_prefix(&config.server.api_prefix) {
        errors.push(ValidationError {
            item: "(root)".into(),
            field: "server.api_prefix".into(),
            message: msg,
            suggestion: Some(format!(
                "did you mean '/{}/'?",
                config.server.api_prefix.trim_matches('/')
            )),
        });
    }

    for endpoint in &config.server.endpoints {
        if let Err(msg) = validate_endpoint(endpoint) {
            errors.push(ValidationError {
                item: "(root)".into(),
                field: "server.endpoints".into(),
                message: msg,
                suggestion: None,
            });
        }
    }

    if config.proxy.timeout == 0 {
        errors.push(ValidationError {
            item: "(root)".into(),
            field: "proxy.timeout".into(),
            message: "timeout must be greater than zero".into(),
            suggestion: None,
        });
    }

    if config.refresh.poll_interval == 0 {
        errors.push(ValidationError {
            item: "(root)".into(),
            field: "refresh.poll_interval".into(),
            message: "poll interval must be greater than zero".into(),
            suggestion: None,
        });
    }

    let mut seen_ids = std::collections::HashSet::new();

    for (i, app) in config.applications.iter().enumerate() {
        let item = if app.id.is_empty() {
            format!("applications[{i}]")
        } else {
            app.id.clone()
        };

        if let Err(msg) = validate_application_id(&app.id) {
            errors.push(ValidationError {
                item: item.clone(),
                field: "id".into(),
                message: msg,
                suggestion: None,
            });
        }

        if !seen_ids.insert(&app.id) {
            errors.push(ValidationError {
                item: item.clone(),
                field: "id".into(),
                message: "duplicate application id".into(),
                suggestion: None,
            });
        }

        if let Err(msg) = validate_backend_url(&app.url) {
            errors.push(ValidationError {
                item: item.clone(),
                field: "url".into(),
                message: msg,
                suggestion: if !app.url.is_empty() && !app.url.contains("://") {
                    Some(format!("did you mean 'http://{}'?", app.url))
                } else {
                    None
                },
            });
        }

        if let Some(ref endpoints) = app.endpoints {
            for endpoint in endpoints {
                if let Err(msg) = validate_endpoint(endpoint) {
                    errors.push(ValidationError {
                        item: item.clone(),
                        field: "endpoints".into(),
                        message: msg,
                        suggestion: None,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let live = config.live_applications();
    let mut lines = vec![format!(
        "  {} applications ({} live), api prefix {}\n",
        config.applications.len(),
        live,
        config.server.api_prefix,
    )];

    for app in &config.applications {
        let state = if app.healthy { "live" } else { "down" };
        let endpoints = match app.endpoints {
            Some(ref list) if !list.is_empty() => list.join(", "),
            _ if !config.server.endpoints.is_empty() => config.server.endpoints.join(", "),
            _ => "all".into(),
        };
        lines.push(format!("  {}  -> {} ({state})", app.id, app.url));
        lines.push(format!("    endpoints: {endpoints}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{ApplicationConfig, Config};

    fn app(id: &str, url: &str) -> ApplicationConfig {
        ApplicationConfig {
            id: id.into(),
            url: url.into(),
            version: None,
            endpoints: None,
            healthy: true,
        }
    }

    fn minimal_config() -> Config {
        Config {
            applications: vec![app("svc-a", "http://localhost:8080")],
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn empty_registry_is_allowed() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn duplicate_id_fails() {
        let config = Config {
            applications: vec![app("svc-a", "http://a:80"), app("svc-a", "http://b:80")],
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn invalid_url_fails() {
        let config = Config {
            applications: vec![app("svc-a", "not a url")],
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("not a valid URL")));
    }

    #[test]
    fn url_without_scheme_gets_suggestion() {
        let config = Config {
            applications: vec![app("svc-a", "localhost:8080")],
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean 'http://localhost:8080'?")));
    }

    #[test]
    fn bad_api_prefix_fails() {
        let mut config = minimal_config();
        config.server.api_prefix = "api/applications".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "server.api_prefix"));
    }

    #[test]
    fn base_path_trailing_slash_fails() {
        let mut config = minimal_config();
        config.server.base_path = "/admin/".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean '/admin'?")));
    }

    #[test]
    fn bad_application_id_fails() {
        let config = Config {
            applications: vec![app("svc a", "http://localhost:8080")],
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "id"));
    }

    #[test]
    fn multi_segment_endpoint_fails() {
        let mut config = minimal_config();
        config.applications[0].endpoints = Some(vec!["health/live".into()]);
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("single path segment")));
    }

    #[test]
    fn zero_timeout_fails() {
        let mut config = minimal_config();
        config.proxy.timeout = 0;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "proxy.timeout"));
    }
}
