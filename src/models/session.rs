use serde::{Deserialize, Serialize};

/// Which credential pair a request runs under. The two pairs live in
/// separate cookies and are never cross-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialScope {
    User,
    Admin,
}

impl CredentialScope {
    pub fn access_cookie(&self) -> &'static str {
        match self {
            CredentialScope::User => "accessToken",
            CredentialScope::Admin => "admin_access_token",
        }
    }

    pub fn refresh_cookie(&self) -> &'static str {
        match self {
            CredentialScope::User => "refreshToken",
            CredentialScope::Admin => "admin_refresh_token",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialScope::User => "user",
            CredentialScope::Admin => "admin",
        }
    }
}

/// Credential pair read from the cookie jar at request entry.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub scope: CredentialScope,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCredentials {
    pub fn new(
        scope: CredentialScope,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        // Empty cookie values count as absent
        Self {
            scope,
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

// Token values stay out of logs
impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("scope", &self.scope)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Schema of the upstream login and reissue responses.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "access_token")]
    pub access_token: String,
    /// Absent when the upstream does not rotate refresh tokens
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Drop an empty refresh token; `None` when the access token is empty.
    pub fn into_usable(self) -> Option<Self> {
        if self.access_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("refresh_rotated", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}
