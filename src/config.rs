use gotham_derive::StateData;

/// Application wide settings defined in configuration file.
#[derive(Deserialize, StateData, Clone)]
pub struct Settings {
    /// Postgres database url
    pub database_url: String,
    /// IP address to bind to
    pub host_address: String,
    /// Directory static assets are served from
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Maximum number of pooled database connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// What to do when a request handler fails
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// Session cookie settings
    #[serde(default)]
    pub session: Session,
    /// Post handling settings
    #[serde(default)]
    pub posts: Posts,
}

impl Settings {
    pub fn from_slice(data: &[u8]) -> Result<Self, toml::de::Error> {
        toml::from_slice(data)
    }
}

fn default_static_dir() -> String {
    String::from("static")
}

fn default_pool_size() -> u32 {
    10
}

/// Handling of errors returned by request handlers.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Render an error page and keep serving
    Recover,
    /// Log the error and terminate the process
    Fatal,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Recover
    }
}

/// Session cookie related settings
#[derive(Deserialize, Clone, Default)]
pub struct Session {
    /// Base64 encoded signing key, at least 32 bytes. Generated at startup if unset.
    pub key: Option<String>,
    /// Require HTTPS for cookies
    #[serde(default)]
    pub secure: bool,
    /// Restrict cookies to given domain if set
    pub domain: Option<String>,
    /// Lifetime of the cookie in days. Browser session cookie if unset.
    pub max_age_days: Option<i64>,
}

#[derive(Deserialize, Clone, Default)]
pub struct Posts {
    /// Reject deletion of a post by anyone but its owner
    #[serde(default)]
    pub owner_only_delete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_use_defaults() {
        let settings = Settings::from_slice(
            br#"
            database_url = "postgres://localhost/blog"
            host_address = "127.0.0.1:8080"
            "#,
        )
        .unwrap();
        assert_eq!(settings.static_dir, "static");
        assert_eq!(settings.pool_size, 10);
        assert_eq!(settings.error_policy, ErrorPolicy::Recover);
        assert!(settings.session.key.is_none());
        assert!(!settings.session.secure);
        assert!(!settings.posts.owner_only_delete);
    }

    #[test]
    fn full_settings() {
        let settings = Settings::from_slice(
            br#"
            database_url = "postgres://localhost/blog"
            host_address = "0.0.0.0:80"
            static_dir = "/usr/share/quill"
            error_policy = "fatal"

            [session]
            key = "c2VjcmV0"
            secure = true
            domain = "example.org"
            max_age_days = 30

            [posts]
            owner_only_delete = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.error_policy, ErrorPolicy::Fatal);
        assert_eq!(settings.session.key.as_ref().map(String::as_str), Some("c2VjcmV0"));
        assert_eq!(settings.session.domain.as_ref().map(String::as_str), Some("example.org"));
        assert_eq!(settings.session.max_age_days, Some(30));
        assert!(settings.posts.owner_only_delete);
    }
}
