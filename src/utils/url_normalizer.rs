//! URL validation and canonicalization.
//!
//! Conflict detection compares original URLs byte-for-byte, so
//! equivalent spellings must collapse to one canonical form before they
//! reach storage.

use url::Url;

use crate::error::AppError;

/// Normalizes a URL to its canonical form.
///
/// Rules: only `http`/`https` schemes are accepted, the host is
/// lowercased, default ports (80/443) and fragments are dropped, path
/// and query are preserved as-is.
///
/// # Errors
///
/// Returns [`AppError::InvalidUrl`] for malformed input or disallowed
/// schemes (`javascript:`, `data:`, `file:`, ...).
pub fn normalize_url(input: &str) -> Result<String, AppError> {
    let mut url = Url::parse(input.trim())
        .map_err(|e| AppError::invalid_url(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::invalid_url(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_ascii_lowercase();
        url.set_host(Some(&lowered))
            .map_err(|e| AppError::invalid_url(e.to_string()))?;
    } else {
        return Err(AppError::invalid_url("missing host"));
    }

    url.set_fragment(None);

    let default_port = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if default_port && url.set_port(None).is_err() {
        return Err(AppError::invalid_url("failed to drop default port"));
    }

    Ok(url.into())
}
