// Credential cookie access
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::models::{CredentialScope, SessionCredentials, TokenPair};
use crate::proxy::config::CookieConfig;

#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_seconds: i64,
    pub path: String,
}

impl CookieOptions {
    fn from_config(config: &CookieConfig, max_age_seconds: i64) -> Self {
        Self {
            http_only: true,
            secure: config.secure,
            same_site: parse_same_site(&config.same_site),
            max_age_seconds,
            path: config.path.clone(),
        }
    }

    pub fn access(config: &CookieConfig) -> Self {
        Self::from_config(config, config.access_max_age_secs)
    }

    pub fn refresh(config: &CookieConfig) -> Self {
        Self::from_config(config, config.refresh_max_age_secs)
    }
}

fn parse_same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

/// Read one scope's credential pair from the request cookies.
pub fn read_credentials(jar: &CookieJar, scope: CredentialScope) -> SessionCredentials {
    SessionCredentials::new(
        scope,
        jar.get(scope.access_cookie()).map(|c| c.value().to_string()),
        jar.get(scope.refresh_cookie()).map(|c| c.value().to_string()),
    )
}

/// Read/write access to the credential cookies of one response.
///
/// Writes only land in the `Set-Cookie` headers once the jar is returned as
/// part of the response, so they must happen before the body is produced.
pub struct CredentialStore {
    jar: CookieJar,
    config: CookieConfig,
}

impl CredentialStore {
    pub fn new(jar: CookieJar, config: &CookieConfig) -> Self {
        Self {
            jar,
            config: config.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.jar.get(name).map(|c| c.value().to_string())
    }

    pub fn set(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let cookie = Cookie::build((name.to_owned(), value.to_owned()))
            .path(options.path.clone())
            .http_only(options.http_only)
            .secure(options.secure)
            .same_site(options.same_site)
            .max_age(time::Duration::seconds(options.max_age_seconds))
            .build();
        let jar = std::mem::take(&mut self.jar);
        self.jar = jar.add(cookie);
    }

    /// Removing an absent cookie is not an error
    pub fn delete(&mut self, name: &str) {
        let removal = Cookie::build((name.to_owned(), "")).path(self.config.path.clone());
        let jar = std::mem::take(&mut self.jar);
        self.jar = jar.remove(removal);
    }

    pub fn read(&self, scope: CredentialScope) -> SessionCredentials {
        read_credentials(&self.jar, scope)
    }

    /// Store a freshly issued pair. A missing refresh token leaves the
    /// current refresh cookie untouched.
    pub fn store(&mut self, scope: CredentialScope, tokens: &TokenPair) {
        self.set(
            scope.access_cookie(),
            &tokens.access_token,
            &CookieOptions::access(&self.config),
        );
        if let Some(refresh) = &tokens.refresh_token {
            self.set(
                scope.refresh_cookie(),
                refresh,
                &CookieOptions::refresh(&self.config),
            );
        }
    }

    pub fn clear(&mut self, scope: CredentialScope) {
        self.delete(scope.access_cookie());
        self.delete(scope.refresh_cookie());
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};
    use axum::response::IntoResponse;

    fn jar_with(cookies: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookies).unwrap());
        CookieJar::from_headers(&headers)
    }

    fn set_cookie_headers(store: CredentialStore) -> Vec<String> {
        let response = store.into_jar().into_response();
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_read_keeps_scopes_apart() {
        let store = CredentialStore::new(
            jar_with("accessToken=abc; admin_refresh_token=staff-r"),
            &CookieConfig::default(),
        );

        let user = store.read(CredentialScope::User);
        assert_eq!(user.access_token(), Some("abc"));
        assert!(user.refresh_token().is_none());

        let admin = store.read(CredentialScope::Admin);
        assert!(admin.access_token().is_none());
        assert_eq!(admin.refresh_token(), Some("staff-r"));
    }

    #[test]
    fn test_set_writes_http_only_cookie() {
        let mut store = CredentialStore::new(CookieJar::new(), &CookieConfig::default());
        store.store(
            CredentialScope::User,
            &TokenPair {
                access_token: "new1".to_string(),
                refresh_token: None,
            },
        );
        assert_eq!(store.get("accessToken").as_deref(), Some("new1"));

        let headers = set_cookie_headers(store);
        assert_eq!(headers.len(), 1);
        let cookie = &headers[0];
        assert!(cookie.starts_with("accessToken=new1"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn test_double_delete_is_idempotent() {
        let mut store = CredentialStore::new(jar_with("accessToken=abc"), &CookieConfig::default());
        store.delete("accessToken");
        store.delete("accessToken");
        assert!(store.get("accessToken").is_none());

        let headers = set_cookie_headers(store);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("accessToken="));
        assert!(headers[0].contains("Max-Age=0"));
    }

    #[test]
    fn test_clear_only_touches_one_scope() {
        let mut store = CredentialStore::new(
            jar_with("accessToken=abc; refreshToken=r1; admin_access_token=s1"),
            &CookieConfig::default(),
        );
        store.clear(CredentialScope::User);
        assert!(store.read(CredentialScope::User).is_empty());
        assert_eq!(
            store.read(CredentialScope::Admin).access_token(),
            Some("s1")
        );
    }
}
