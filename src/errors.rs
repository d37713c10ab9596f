// User-friendly error messages
//
// Turns client errors into actionable messages for the command line.
//
// Localization Support:
// Section headings follow the LANG environment variable. Currently
// supported: English (default), Spanish, French, German.

use std::fmt;

use crate::client::{ApiError, RequestFailure};
use crate::config::ClientConfig;

/// Get the current locale from environment
fn get_locale() -> &'static str {
    if let Ok(lang) = std::env::var("LANG") {
        if lang.starts_with("es") {
            return "es";
        } else if lang.starts_with("fr") {
            return "fr";
        } else if lang.starts_with("de") {
            return "de";
        }
    }
    "en"
}

/// Localized heading
fn t(key: &str) -> &str {
    match (get_locale(), key) {
        ("es", "try") => "Intenta:",
        ("es", "possible_causes") => "Posibles causas:",
        ("es", "suggestion") => "Sugerencia",

        ("fr", "try") => "Essayez:",
        ("fr", "possible_causes") => "Causes possibles:",
        ("fr", "suggestion") => "Suggestion",

        ("de", "try") => "Versuchen Sie:",
        ("de", "possible_causes") => "Mögliche Ursachen:",
        ("de", "suggestion") => "Vorschlag",

        (_, "try") => "Try:",
        (_, "possible_causes") => "Possible causes:",
        (_, "suggestion") => "Suggestion",
        (_, other) => other,
    }
}

/// Session could not be recovered; the user has to sign in again
pub fn session_expired_error(login_route: &str) -> String {
    format!(
        "Your session has expired and stored credentials were cleared\n\n\
        \x1b[1;32m{}\x1b[0m\n\
        1. Sign in again:\n\
           \x1b[36mrollcall login --username <name>\x1b[0m\n\n\
        (login route: {})",
        t("try"),
        login_route
    )
}

/// Backend not reachable
pub fn connection_refused_error(base_url: &str) -> String {
    format!(
        "Could not connect to the school API at {}\n\n\
        \x1b[1;33m{}\x1b[0m\n\
        • Backend is not running\n\
        • Wrong base URL\n\
        • Network or proxy problem\n\n\
        \x1b[1;32m{}\x1b[0m\n\
        1. Check the configured URL:\n\
           \x1b[36mcat ~/.rollcall/config.toml\x1b[0m\n\n\
        2. Override it for one run:\n\
           \x1b[36mROLLCALL_API_URL=https://... rollcall status\x1b[0m",
        base_url,
        t("possible_causes"),
        t("try")
    )
}

/// Request timed out
pub fn timeout_error(timeout_seconds: u64) -> String {
    wrap_error_with_suggestion(
        format!("The school API did not answer within {} seconds", timeout_seconds),
        "raise `timeout_seconds` in ~/.rollcall/config.toml or set ROLLCALL_TIMEOUT_SECS",
    )
}

/// Config file could not be parsed
pub fn config_parse_error(path: &str, error: &str) -> String {
    format!(
        "Failed to parse config file {}\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32m{}\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat {}\x1b[0m\n\n\
        2. Settings belong in a [client] table, e.g.:\n\
           \x1b[36m[client]\x1b[0m\n\
           \x1b[36mbase_url = \"https://school.example.com/api\"\x1b[0m",
        path,
        error,
        t("try"),
        path
    )
}

/// Wrap a generic error with a suggestion
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!("{}\n\n\x1b[1;33m{}:\x1b[0m {}", error, t("suggestion"), suggestion)
}

/// Message for an error returned by the client
pub fn describe_api_error(error: &ApiError, config: &ClientConfig) -> String {
    match error {
        ApiError::SessionExpired { .. } => session_expired_error(&config.login_route),
        ApiError::RequestFailed(failure) if failure.is_timeout() => {
            timeout_error(config.timeout_seconds)
        }
        ApiError::RequestFailed(failure) if failure.is_connect() => {
            connection_refused_error(&config.base_url)
        }
        ApiError::RequestFailed(RequestFailure::Status { status, body }) => {
            let detail = if body.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", body.trim())
            };
            format!("Request failed with HTTP {}{}", status, detail)
        }
        other => other.to_string(),
    }
}
