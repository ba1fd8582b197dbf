//! Deterministic UUID to object-key mapping.
//!
//! A canonical hyphenated UUID expands into a nested key by replacing every
//! `-` with `/`, prefixed by the effective scope: the configured bucket
//! prefix wins over the per-request `path`, which wins over the empty
//! string. Recovery reverses the expansion so listings can be mapped back to
//! UUIDs.

/// The prefix that wins for a request: the configured `bucket_prefix` when
/// non-empty, otherwise the request `path`, otherwise empty.
pub fn effective_scope<'a>(bucket_prefix: &'a str, path: &'a str) -> &'a str {
    if !bucket_prefix.is_empty() {
        bucket_prefix
    } else {
        path
    }
}

/// Derive the bucket-relative key for a UUID.
///
/// With an empty effective prefix the key starts with `/`.
pub fn map_key(bucket_prefix: &str, path: &str, uuid: &str) -> String {
    format!(
        "{}/{}",
        effective_scope(bucket_prefix, path),
        uuid.replace('-', "/")
    )
}

/// Reconstruct the UUID from a listed key.
///
/// With a non-empty prefix the remainder after the first `prefix/` is taken;
/// with an empty prefix only a leading `/` is stripped. Every remaining `/`
/// becomes `-`.
pub fn uuid_from_key(bucket_prefix: &str, key: &str) -> String {
    let remainder = if bucket_prefix.is_empty() {
        key.strip_prefix('/').unwrap_or(key)
    } else {
        let marker = format!("{}/", bucket_prefix);
        match key.split_once(&marker) {
            Some((_, rest)) => rest,
            None => key,
        }
    };
    remainder.replace('/', "-")
}

/// The listing prefix matching [`map_key`] for a configured bucket prefix,
/// or `None` when listings should span the whole bucket.
pub fn list_prefix(bucket_prefix: &str) -> Option<String> {
    if bucket_prefix.is_empty() {
        None
    } else {
        Some(format!("{}/", bucket_prefix))
    }
}
