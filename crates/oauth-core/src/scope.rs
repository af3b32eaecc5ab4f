//! Scope parsing and narrowing

use std::collections::BTreeSet;

use crate::error::OAuthError;

/// An ordered set of scope names.
pub type ScopeSet = BTreeSet<String>;

/// Parse a scope parameter.
///
/// Accepts the RFC 6749 space-delimited form as well as comma-separated
/// lists (`read,write,trust`).
pub fn parse_scopes(raw: &str) -> ScopeSet {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format scopes for a token or introspection response (space-delimited).
pub fn format_scopes(scopes: &ScopeSet) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Narrow the requested scopes to those the client may hold.
///
/// An absent or blank request grants every allowed scope. A non-empty request
/// sharing nothing with the allowed set is rejected.
pub fn narrow(requested: Option<&str>, allowed: &ScopeSet) -> Result<ScopeSet, OAuthError> {
    let requested = match requested.map(parse_scopes) {
        Some(set) if !set.is_empty() => set,
        _ => return Ok(allowed.clone()),
    };

    let granted: ScopeSet = requested.intersection(allowed).cloned().collect();
    if granted.is_empty() {
        return Err(OAuthError::InvalidScope(format_scopes(&requested)));
    }
    Ok(granted)
}
