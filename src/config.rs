use argon2::password_hash::PasswordHash;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Deployment environment. Controls the `Secure` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl std::str::FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Token signing
    pub jwt_secret: String,

    // Seeded administrator
    pub admin_email: String,
    pub admin_password_hash: String,
    pub admin_name: String,
    pub admin_surname: String,

    // Storage
    pub database_url: String,
    pub redis_url: Option<String>,
    pub upload_dir: PathBuf,

    // Server
    pub bind_addr: SocketAddr,
    pub app_env: AppEnv,
    pub public_base_url: String,

    // Limits
    pub max_upload_bytes: usize,
    pub rate_limit_auth_per_min: u32,

    // TTLs (in seconds)
    pub session_ttl_secs: u64,
    pub reset_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("admin_email", &self.admin_email)
            .field("admin_password_hash", &"[REDACTED]")
            .field("admin_name", &self.admin_name)
            .field("admin_surname", &self.admin_surname)
            .field("database_url", &self.database_url)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("upload_dir", &self.upload_dir)
            .field("bind_addr", &self.bind_addr)
            .field("app_env", &self.app_env)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("reset_ttl_secs", &self.reset_ttl_secs)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine, production sets the variables directly
        let _ = dotenvy::dotenv();

        // No built-in fallback secret: tokens signed with a public default
        // would be forgeable by anyone.
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} characters", MIN_JWT_SECRET_LEN),
            ));
        }

        let admin_email =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
        if !crate::routes::is_valid_email(&admin_email) {
            return Err(ConfigError::InvalidValue(
                "ADMIN_EMAIL".to_string(),
                "not a valid email address".to_string(),
            ));
        }

        let admin_password_hash = env::var("ADMIN_PASSWORD_HASH")
            .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD_HASH".to_string()))?;
        if admin_password_hash.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ADMIN_PASSWORD_HASH".to_string(),
                "cannot be empty".to_string(),
            ));
        }
        PasswordHash::new(&admin_password_hash).map_err(|e| {
            ConfigError::InvalidValue(
                "ADMIN_PASSWORD_HASH".to_string(),
                format!("not a PHC hash string: {}", e),
            )
        })?;

        let admin_name = env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string());
        let admin_surname = env::var("ADMIN_SURNAME").unwrap_or_else(|_| "User".to_string());

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://dashboard.db?mode=rwc".to_string());

        // Redis only backs the login rate limiter; without it the limiter is off
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());

        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));

        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let app_env = match env::var("APP_ENV") {
            Ok(val) => val
                .parse::<AppEnv>()
                .map_err(|e| ConfigError::InvalidValue("APP_ENV".to_string(), e))?,
            Err(_) => AppEnv::Development,
        };

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes = parse_env_or_default("MAX_UPLOAD_BYTES", 5_242_880)?;
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 5)?;

        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 3_600)?;
        let reset_ttl_secs = parse_env_or_default("RESET_TTL_SECS", 1_800)?;
        let cleanup_interval_secs = parse_env_or_default("CLEANUP_INTERVAL_SECS", 3_600)?;

        for (name, value) in [
            ("SESSION_TTL_SECS", session_ttl_secs),
            ("CLEANUP_INTERVAL_SECS", cleanup_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }

        Ok(Config {
            jwt_secret,
            admin_email,
            admin_password_hash,
            admin_name,
            admin_surname,
            database_url,
            redis_url,
            upload_dir,
            bind_addr,
            app_env,
            public_base_url,
            max_upload_bytes,
            rate_limit_auth_per_min,
            session_ttl_secs,
            reset_ttl_secs,
            cleanup_interval_secs,
        })
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
        admin_email: "admin@example.com".to_string(),
        admin_password_hash: String::new(),
        admin_name: "Admin".to_string(),
        admin_surname: "User".to_string(),
        database_url: "sqlite::memory:".to_string(),
        redis_url: None,
        upload_dir: std::env::temp_dir().join("school-dashboard-unit"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        app_env: AppEnv::Development,
        public_base_url: "http://localhost:3000".to_string(),
        max_upload_bytes: 5_242_880,
        rate_limit_auth_per_min: 5,
        session_ttl_secs: 3_600,
        reset_ttl_secs: 1_800,
        cleanup_interval_secs: 3_600,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests mutate process-wide env vars, so they run one at a time.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
    // Well-formed PHC string; the digest itself is arbitrary
    const TEST_HASH: &str =
        "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$LXEWQrcmsEQBYnyp+6wy9chTD7GQPMTbAiWHF5IaSIE";

    fn clear_test_env() {
        for key in [
            "JWT_SECRET",
            "ADMIN_EMAIL",
            "ADMIN_PASSWORD_HASH",
            "ADMIN_NAME",
            "ADMIN_SURNAME",
            "DATABASE_URL",
            "REDIS_URL",
            "UPLOAD_DIR",
            "BIND_ADDR",
            "APP_ENV",
            "PUBLIC_BASE_URL",
            "MAX_UPLOAD_BYTES",
            "RATE_LIMIT_AUTH_PER_MIN",
            "SESSION_TTL_SECS",
            "RESET_TTL_SECS",
            "CLEANUP_INTERVAL_SECS",
        ] {
            env::remove_var(key);
        }
    }

    fn set_required() {
        env::set_var("JWT_SECRET", TEST_SECRET);
        env::set_var("ADMIN_PASSWORD_HASH", TEST_HASH);
    }

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("JWT_SECRET", "too-short");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "JWT_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_admin_password_hash() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("ADMIN_PASSWORD_HASH", "master2025");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "ADMIN_PASSWORD_HASH"
        ));

        clear_test_env();
    }

    #[test]
    fn test_empty_admin_password_hash() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        // Empty rather than unset so a local .env cannot refill it
        env::set_var("ADMIN_PASSWORD_HASH", "");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "ADMIN_PASSWORD_HASH"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_invalid_app_env() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("APP_ENV", "staging");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "APP_ENV"
        ));

        clear_test_env();
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("CLEANUP_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "CLEANUP_INTERVAL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_production_sets_secure_cookies() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("APP_ENV", "production");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app_env, AppEnv::Production);
        assert!(config.secure_cookies());

        clear_test_env();
    }

    #[test]
    fn test_zero_session_ttl_rejected() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("SESSION_TTL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SESSION_TTL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        // Pin values a developer .env might override
        env::set_var("BIND_ADDR", "0.0.0.0:3000");
        env::set_var("APP_ENV", "development");
        env::set_var("ADMIN_EMAIL", "admin@example.com");
        env::set_var("REDIS_URL", "");

        let config = Config::from_env().unwrap();

        assert_eq!(config.jwt_secret, TEST_SECRET);
        assert_eq!(config.admin_email, "admin@example.com");
        assert_eq!(config.admin_password_hash, TEST_HASH);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.app_env, AppEnv::Development);
        assert!(!config.secure_cookies());
        assert!(config.redis_url.is_none());
        assert_eq!(config.session_ttl_secs, 3_600);
        assert_eq!(config.reset_ttl_secs, 1_800);
        assert_eq!(config.max_upload_bytes, 5_242_880);
        assert_eq!(config.rate_limit_auth_per_min, 5);

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        let config = Config::from_env().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(TEST_SECRET));
        assert!(!rendered.contains("argon2id"));

        clear_test_env();
    }
}
