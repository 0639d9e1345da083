//! Credential and namespace resolution from the process environment
//!
//! Missing variables are never errors: the token falls back to an empty
//! string and the namespace to [`DEFAULT_NAMESPACE`].

use argo_core::config::env;
use argo_core::DEFAULT_NAMESPACE;

/// Reads `ARGO_TOKEN` verbatim; empty when unset.
pub fn get_auth_string() -> String {
    auth_string_from(process_env)
}

/// Same as [`get_auth_string`] with an injected variable lookup
pub fn auth_string_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(env::TOKEN).unwrap_or_default()
}

/// Active namespace with no command-level override
pub fn namespace() -> String {
    resolve_namespace(None)
}

/// Active namespace.
///
/// Explicit (non-empty) configuration wins over `ARGO_NAMESPACE`, which is
/// returned verbatim when set; otherwise `"default"`.
pub fn resolve_namespace(explicit: Option<&str>) -> String {
    resolve_namespace_from(explicit, process_env)
}

pub fn resolve_namespace_from(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    if let Some(ns) = explicit.filter(|ns| !ns.is_empty()) {
        return ns.to_string();
    }
    lookup(env::NAMESPACE).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
