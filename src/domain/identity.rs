//! Caller identity.
//!
//! The limiter and the event log partition by a caller key. The HTTP layer
//! derives it from proxy headers; this module holds that derivation so every
//! endpoint agrees on it.

/// Key used when no forwarding header identifies the caller.
pub const UNKNOWN_CALLER: &str = "unknown";

/// Derive the caller key from `X-Forwarded-For` and `X-Real-IP` header values.
///
/// The first comma-separated entry of `X-Forwarded-For` wins, then
/// `X-Real-IP`, then [`UNKNOWN_CALLER`]. Blank values are skipped.
///
/// # Example
/// ```
/// use inference_governor::caller_key;
///
/// assert_eq!(caller_key(Some("198.51.100.4, 10.0.0.1"), None), "198.51.100.4");
/// assert_eq!(caller_key(None, Some("192.0.2.8")), "192.0.2.8");
/// assert_eq!(caller_key(None, None), "unknown");
/// ```
pub fn caller_key(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| real_ip.filter(|value| !value.is_empty()))
        .unwrap_or(UNKNOWN_CALLER)
        .to_string()
}
