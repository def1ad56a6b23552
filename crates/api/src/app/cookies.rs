//! Refresh-token cookie rendering and parsing.
//!
//! Cookies are built by hand on the `Set-Cookie`/`Cookie` headers; the
//! refresh value is the only cookie this service sets.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// SameSite cookie policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    /// Requires `Secure`.
    None,
}

impl SameSite {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl std::str::FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub domain: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "bsc_refresh".to_string(),
            path: "/".to_string(),
            secure: true,
            same_site: SameSite::Lax,
            domain: None,
        }
    }
}

/// Render the refresh cookie. `max_age` is set only for remembered
/// sessions; otherwise the cookie lives until the browser closes.
pub fn build_refresh_cookie(
    settings: &CookieSettings,
    value: &str,
    max_age: Option<chrono::Duration>,
) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path={}; SameSite={}",
        settings.name,
        value,
        settings.path,
        settings.same_site.as_str()
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &settings.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age.num_seconds()));
    }
    cookie
}

/// Render an expired refresh cookie (logout).
pub fn clear_refresh_cookie(settings: &CookieSettings) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; Path={}; SameSite={}; Max-Age=0",
        settings.name,
        settings.path,
        settings.same_site.as_str()
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &settings.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

/// Pull one cookie value out of the request's `Cookie` headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for pair in header.split(';') {
            let pair = pair.trim();
            if let Some((k, v)) = pair.split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn settings() -> CookieSettings {
        CookieSettings {
            name: "bsc_refresh".to_string(),
            path: "/".to_string(),
            secure: true,
            same_site: SameSite::Lax,
            domain: Some("example.com".to_string()),
        }
    }

    #[test]
    fn remembered_session_gets_max_age() {
        let cookie =
            build_refresh_cookie(&settings(), "tok123", Some(chrono::Duration::days(7)));
        assert!(cookie.starts_with("bsc_refresh=tok123; HttpOnly; Path=/; SameSite=Lax"));
        assert!(cookie.contains("; Secure"));
        assert!(cookie.contains("; Domain=example.com"));
        assert!(cookie.ends_with("; Max-Age=604800"));
    }

    #[test]
    fn plain_session_has_no_max_age() {
        let cookie = build_refresh_cookie(&settings(), "tok123", None);
        assert!(!cookie.contains("Max-Age"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie(&settings());
        assert!(cookie.starts_with("bsc_refresh=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!("strict".parse::<SameSite>(), Ok(SameSite::Strict));
        assert_eq!("Lax".parse::<SameSite>(), Ok(SameSite::Lax));
        assert_eq!("NONE".parse::<SameSite>(), Ok(SameSite::None));
        assert!("sometimes".parse::<SameSite>().is_err());
    }

    #[test]
    fn extract_finds_the_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; bsc_refresh=tok123; lang=en"),
        );
        assert_eq!(
            extract_cookie(&headers, "bsc_refresh").as_deref(),
            Some("tok123")
        );
        assert!(extract_cookie(&headers, "missing").is_none());
    }
}
