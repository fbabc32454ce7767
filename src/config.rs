use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup and is
/// immutable afterwards; handlers pull it out of the shared `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls cookie hardening and fail-fast behaviour.
    pub env: Env,
    pub port: u16,
    // Postgres connection string, or the literal `memory` for the in-process store.
    pub db_url: String,

    // Token signing secrets (HS256).
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub reset_token_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,

    pub storage_backend: StorageBackend,
    // Local backend: filesystem root and the public URL prefix the root is served under.
    pub upload_dir: String,
    pub public_base_url: String,
    // S3 backend (MinIO locally).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
    // Public URL prefix for objects in the bucket, e.g. `http://localhost:9000/portal-uploads`.
    pub s3_public_url: String,

    // Explicit CORS allow-list. localhost/127.0.0.1 are always allowed on top of it.
    pub cors_origins: Vec<String>,

    pub smtp: Option<SmtpConfig>,

    pub content_cache_ttl_secs: u64,
    pub expose_reset_token: bool,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Env
///
/// Runtime context. Production requires every secret to be set explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum StorageBackend {
    Local,
    S3,
}

const LOCAL_ACCESS_SECRET: &str = "local-access-token-secret-change-me";
const LOCAL_REFRESH_SECRET: &str = "local-refresh-token-secret-change-me";
const LOCAL_RESET_SECRET: &str = "local-reset-token-secret-change-me";

impl Default for AppConfig {
    /// Safe, non-panicking configuration used by the test-suite.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 3000,
            db_url: "memory".to_string(),
            access_token_secret: LOCAL_ACCESS_SECRET.to_string(),
            refresh_token_secret: LOCAL_REFRESH_SECRET.to_string(),
            reset_token_secret: LOCAL_RESET_SECRET.to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            storage_backend: StorageBackend::Local,
            upload_dir: "./uploads".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "portal-test".to_string(),
            s3_public_url: "http://localhost:9000/portal-test".to_string(),
            cors_origins: Vec::new(),
            smtp: None,
            content_cache_ttl_secs: 300,
            expose_reset_token: true,
            max_upload_bytes: 50 * 1024 * 1024,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables.
    ///
    /// # Panics
    /// Panics in production when a required secret or connection string is missing, so the
    /// service never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let secret = |name: &str, fallback: &str| match env {
            Env::Production => env::var(name)
                .unwrap_or_else(|_| panic!("FATAL: {name} must be set in production.")),
            Env::Local => env::var(name).unwrap_or_else(|_| fallback.to_string()),
        };

        let access_token_secret = secret("ACCESS_TOKEN_SECRET", LOCAL_ACCESS_SECRET);
        let refresh_token_secret = secret("REFRESH_TOKEN_SECRET", LOCAL_REFRESH_SECRET);
        let reset_token_secret = secret("RESET_TOKEN_SECRET", LOCAL_RESET_SECRET);

        let db_url = match env {
            Env::Production => {
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")
            }
            Env::Local => env::var("DATABASE_URL").unwrap_or_else(|_| "memory".to_string()),
        };

        let storage_backend = match env::var("STORAGE_BACKEND").unwrap_or_default().as_str() {
            "s3" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };

        let (s3_key, s3_secret) = match (env.clone(), storage_backend) {
            (Env::Production, StorageBackend::S3) => (
                env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                env::var("S3_SECRET_KEY").expect("FATAL: S3_SECRET_KEY required in prod"),
            ),
            _ => (
                env::var("S3_ACCESS_KEY").unwrap_or(defaults.s3_key),
                env::var("S3_SECRET_KEY").unwrap_or(defaults.s3_secret),
            ),
        };
        let s3_endpoint = env::var("S3_ENDPOINT").unwrap_or(defaults.s3_endpoint);
        let s3_bucket = env::var("S3_BUCKET").unwrap_or_else(|_| "portal-uploads".to_string());
        let s3_public_url = env::var("S3_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket));

        let port = parse_var("PORT", defaults.port);

        Self {
            env,
            port,
            db_url,
            access_token_secret,
            refresh_token_secret,
            reset_token_secret,
            access_token_ttl_minutes: parse_var(
                "ACCESS_TOKEN_EXPIRY_MINUTES",
                defaults.access_token_ttl_minutes,
            ),
            refresh_token_ttl_days: parse_var(
                "REFRESH_TOKEN_EXPIRY_DAYS",
                defaults.refresh_token_ttl_days,
            ),
            storage_backend,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            s3_endpoint,
            s3_region: env::var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_key,
            s3_secret,
            s3_bucket,
            s3_public_url,
            cors_origins: collect_origins(&["CORS_ORIGINS", "FRONTEND_URL", "ADMIN_FRONTEND_URL"]),
            smtp: load_smtp(),
            content_cache_ttl_secs: parse_var(
                "CONTENT_CACHE_TTL_SECONDS",
                defaults.content_cache_ttl_secs,
            ),
            expose_reset_token: parse_var("EXPOSE_RESET_TOKEN", defaults.expose_reset_token),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(fallback)
}

/// collect_origins
///
/// Merges several comma-separated variables into one de-duplicated allow-list.
pub fn collect_origins(vars: &[&str]) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    for var in vars {
        let Ok(raw) = env::var(var) else { continue };
        for origin in raw.split(',') {
            let origin = origin.trim().trim_end_matches('/');
            if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
    }
    origins
}

fn load_smtp() -> Option<SmtpConfig> {
    let host = env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty())?;
    let username = env::var("SMTP_USERNAME").unwrap_or_default();
    Some(SmtpConfig {
        host,
        port: parse_var("SMTP_PORT", 587),
        from: env::var("MAIL_FROM").unwrap_or_else(|_| username.clone()),
        username,
        password: env::var("SMTP_PASSWORD").unwrap_or_default(),
    })
}
