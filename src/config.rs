use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDateTime, Offset, Timelike, Utc};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: i64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Face matching
    pub face_match_threshold: f32,
    pub reject_multiple_faces: bool,
    pub face_detector_model: PathBuf,
    pub face_recognizer_model: PathBuf,
    pub face_detection_confidence: f32,
    pub reference_cache_capacity: u64,
    pub max_image_bytes: usize,

    /// Minutes east of UTC that define the local calendar day of the ledger
    pub attendance_utc_offset_minutes: i32,

    pub log_dir: String,
    pub log_level: String,
}

fn var_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{key} has an invalid value"))
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", "10")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", "1800")?, // default 30 min

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: var_or("RATE_REGISTER_PER_MIN", "30")?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_default(),

            face_match_threshold: var_or("FACE_MATCH_THRESHOLD", "0.6")?,
            reject_multiple_faces: var_or("REJECT_MULTIPLE_FACES", "true")?,
            face_detector_model: var_or("FACE_DETECTOR_MODEL", "models/face_detector.onnx")?,
            face_recognizer_model: var_or("FACE_RECOGNIZER_MODEL", "models/face_recognizer.onnx")?,
            face_detection_confidence: var_or("FACE_DETECTION_CONFIDENCE", "0.5")?,
            reference_cache_capacity: var_or("REFERENCE_CACHE_CAPACITY", "1024")?,
            max_image_bytes: var_or("MAX_IMAGE_BYTES", "10485760")?,

            attendance_utc_offset_minutes: var_or("ATTENDANCE_UTC_OFFSET_MINUTES", "0")?,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
        };

        if config.jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 bytes");
        }
        if config.face_match_threshold.is_nan() || config.face_match_threshold <= 0.0 {
            anyhow::bail!("FACE_MATCH_THRESHOLD must be positive");
        }
        config.local_offset()?;

        Ok(config)
    }

    fn local_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.attendance_utc_offset_minutes * 60)
            .context("ATTENDANCE_UTC_OFFSET_MINUTES is out of range")
    }

    /// Wall-clock time in the attendance timezone, truncated to whole seconds.
    pub fn local_now(&self) -> NaiveDateTime {
        let offset = self.local_offset().unwrap_or_else(|_| Utc.fix());
        let now = Utc::now().with_timezone(&offset).naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }

    /// Request body cap for JSON payloads carrying a base64 image.
    pub fn json_limit(&self) -> usize {
        self.max_image_bytes / 3 * 4 + 4096
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/attendance_test".to_string(),
            db_max_connections: 1,
            jwt_secret: "test-secret-test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 1800,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: String::new(),
            face_match_threshold: 0.6,
            reject_multiple_faces: true,
            face_detector_model: PathBuf::from("models/face_detector.onnx"),
            face_recognizer_model: PathBuf::from("models/face_recognizer.onnx"),
            face_detection_confidence: 0.5,
            reference_cache_capacity: 16,
            max_image_bytes: 1024 * 1024,
            attendance_utc_offset_minutes: 0,
            log_dir: "logs".to_string(),
            log_level: "debug".to_string(),
        }
    }
}
