//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth resolver: token to `Actor`
//! 3. Audit logger: logs after auth, has user_id

pub mod audit;
pub mod auth;
pub mod rate;

/// Read the token from `Authorization: Token <t>` (or `Bearer <t>`).
pub(crate) fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("Authorization", HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(token_from_headers(&headers("Token abc")), Some("abc"));
        assert_eq!(token_from_headers(&headers("Bearer abc")), Some("abc"));
        assert_eq!(token_from_headers(&headers("Basic abc")), None);
        assert_eq!(token_from_headers(&headers("Token ")), None);
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
