//! Browser extension origins
//!
//! Chrome launches a native host with the caller's origin
//! (`chrome-extension://<id>/`) as an argument, and extension pages send
//! it in the `Origin` header. Only these origins may talk to the host.

const EXTENSION_SCHEMES: [&str; 2] = ["chrome-extension://", "moz-extension://"];

/// Extension id carried by an extension origin, if `origin` is one
pub fn extension_id_from_origin(origin: &str) -> Option<&str> {
    let rest = EXTENSION_SCHEMES
        .iter()
        .find_map(|scheme| origin.strip_prefix(scheme))?;
    let id = rest.strip_suffix('/').unwrap_or(rest);

    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id)
}

/// Whether `origin` belongs to a browser extension
pub fn is_extension_origin(origin: &str) -> bool {
    extension_id_from_origin(origin).is_some()
}
