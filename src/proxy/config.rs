use serde::{Deserialize, Deserializer, Serialize};

/// 网关服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 是否允许局域网访问
    /// - false: 仅本机访问 127.0.0.1（默认）
    /// - true: 允许局域网访问 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 上游 REST API 根地址
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// 上游请求超时(秒)，未设置时沿用传输层默认值
    #[serde(default)]
    pub request_timeout: Option<u64>,

    /// 上游代理配置
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,

    #[serde(default)]
    pub cookies: CookieConfig,

    /// CORS 允许的来源，留空表示仅同源
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub public: PublicConfig,

    #[serde(default = "ScopeConfig::user", deserialize_with = "user_scope")]
    pub user: ScopeConfig,

    #[serde(default = "ScopeConfig::admin", deserialize_with = "admin_scope")]
    pub admin: ScopeConfig,
}

/// 上游代理配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamProxyConfig {
    /// 是否启用
    pub enabled: bool,
    /// 代理地址 (http://, https://, socks5://)
    pub url: String,
}

/// Attributes applied to every credential cookie the gateway sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_true")]
    pub secure: bool,
    /// "lax" | "strict" | "none"
    #[serde(default = "default_same_site")]
    pub same_site: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "default_access_max_age")]
    pub access_max_age_secs: i64,
    #[serde(default = "default_refresh_max_age")]
    pub refresh_max_age_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PublicConfig {
    #[serde(default)]
    pub upstream_prefix: String,
}

/// Upstream endpoints and browser entry points for one credential scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Prepended to `/{resource}/...` when forwarding
    pub upstream_prefix: String,
    pub login_path: String,
    pub logout_path: String,
    pub reissue_path: String,
    /// Where the browser is sent once both credentials are gone
    pub login_redirect: String,
    /// Allow-listed first path segments
    pub resources: Vec<String>,
}

impl ScopeConfig {
    pub fn user() -> Self {
        Self {
            upstream_prefix: String::new(),
            login_path: "/auth/login".to_string(),
            logout_path: "/auth/logout".to_string(),
            reissue_path: "/auth/reissue".to_string(),
            login_redirect: "/login".to_string(),
            resources: [
                "workers",
                "records",
                "resumes",
                "turnovers",
                "payments",
                "credits",
                "templates",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn admin() -> Self {
        Self {
            upstream_prefix: "/admin".to_string(),
            login_path: "/admin/auth/login".to_string(),
            logout_path: "/admin/auth/logout".to_string(),
            reissue_path: "/admin/auth/reissue".to_string(),
            login_redirect: "/admin/login".to_string(),
            resources: ["staff", "workers", "records", "payments", "credits", "templates"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn allows(&self, resource: &str) -> bool {
        self.resources.iter().any(|r| r == resource)
    }
}

/// Fields a config file may set for one scope; the rest keep that scope's
/// defaults.
#[derive(Debug, Default, Deserialize)]
struct ScopeOverrides {
    upstream_prefix: Option<String>,
    login_path: Option<String>,
    logout_path: Option<String>,
    reissue_path: Option<String>,
    login_redirect: Option<String>,
    resources: Option<Vec<String>>,
}

impl ScopeOverrides {
    fn apply(self, base: ScopeConfig) -> ScopeConfig {
        ScopeConfig {
            upstream_prefix: self.upstream_prefix.unwrap_or(base.upstream_prefix),
            login_path: self.login_path.unwrap_or(base.login_path),
            logout_path: self.logout_path.unwrap_or(base.logout_path),
            reissue_path: self.reissue_path.unwrap_or(base.reissue_path),
            login_redirect: self.login_redirect.unwrap_or(base.login_redirect),
            resources: self.resources.unwrap_or(base.resources),
        }
    }
}

fn user_scope<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScopeConfig, D::Error> {
    Ok(ScopeOverrides::deserialize(deserializer)?.apply(ScopeConfig::user()))
}

fn admin_scope<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScopeConfig, D::Error> {
    Ok(ScopeOverrides::deserialize(deserializer)?.apply(ScopeConfig::admin()))
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: default_same_site(),
            path: default_cookie_path(),
            access_max_age_secs: default_access_max_age(),
            refresh_max_age_secs: default_refresh_max_age(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false, // 默认仅本机访问
            port: default_port(),
            upstream_base_url: default_upstream_base_url(),
            request_timeout: None,
            upstream_proxy: UpstreamProxyConfig::default(),
            cookies: CookieConfig::default(),
            allowed_origins: Vec::new(),
            public: PublicConfig::default(),
            user: ScopeConfig::user(),
            admin: ScopeConfig::admin(),
        }
    }
}

fn default_port() -> u16 {
    8046
}

fn default_upstream_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> String {
    "lax".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_access_max_age() -> i64 {
    60 * 60
}

fn default_refresh_max_age() -> i64 {
    14 * 24 * 60 * 60
}

impl ProxyConfig {
    /// 获取实际的监听地址
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ProxyConfig =
            serde_json::from_str(r#"{ "port": 9000, "cookies": { "secure": false } }"#).unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.cookies.secure);
        assert_eq!(config.cookies.refresh_max_age_secs, 1_209_600);
        assert_eq!(config.admin.login_redirect, "/admin/login");
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_partial_scope_keeps_scope_defaults() {
        let config: ProxyConfig = serde_json::from_str(
            r#"{
                "user": { "resources": ["records"] },
                "admin": { "login_redirect": "/staff/login" },
                "upstream_proxy": { "enabled": false }
            }"#,
        )
        .unwrap();

        assert_eq!(config.user.resources, vec!["records".to_string()]);
        assert_eq!(config.user.reissue_path, "/auth/reissue");
        assert_eq!(config.user.login_redirect, "/login");

        assert_eq!(config.admin.login_redirect, "/staff/login");
        assert_eq!(config.admin.upstream_prefix, "/admin");
        assert!(config.admin.allows("staff"));

        assert!(!config.upstream_proxy.enabled);
        assert!(config.upstream_proxy.url.is_empty());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let saved = serde_json::to_string(&ProxyConfig::default()).unwrap();
        let loaded: ProxyConfig = serde_json::from_str(&saved).unwrap();
        assert_eq!(loaded.admin.reissue_path, "/admin/auth/reissue");
        assert_eq!(loaded.user.resources, ScopeConfig::user().resources);
    }

    #[test]
    fn test_scopes_allow_their_own_resources() {
        let config = ProxyConfig::default();
        assert!(config.user.allows("turnovers"));
        assert!(!config.user.allows("staff"));
        assert!(config.admin.allows("staff"));
        assert_eq!(config.get_bind_address(), "127.0.0.1");
    }
}
