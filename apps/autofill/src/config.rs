use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::form::patterns::FormProfile;

/// Upper bound for `AUTOMATION_RETRIES`.
const MAX_AUTOMATION_RETRIES: u32 = 10;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,

    pub nav_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub visibility_timeout_ms: u64,
    pub question_wait_ms: u64,
    pub interstitial_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub submit_settle_timeout_ms: u64,
    pub typing_delay_ms: u64,
    pub automation_retries: u32,
    pub automation_backoff_ms: u64,

    pub screenshot_dir: PathBuf,
    pub browser_headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_size: (u32, u32),

    pub form_profile: FormProfile,
    pub ai_require_confidence: f32,
    pub applicant_context_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let ai_require_confidence: f32 = parse_env("AI_REQUIRE_CONFIDENCE", 0.65)?;
        if !(0.0..=1.0).contains(&ai_require_confidence) {
            return Err(anyhow!("AI_REQUIRE_CONFIDENCE must be between 0 and 1"));
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            nav_timeout_ms: parse_env("NAV_TIMEOUT_MS", 60_000)?,
            action_timeout_ms: parse_env("ACTION_TIMEOUT_MS", 30_000)?,
            visibility_timeout_ms: parse_env("VISIBILITY_TIMEOUT_MS", 5_000)?,
            question_wait_ms: parse_env("QUESTION_WAIT_MS", 10_000)?,
            interstitial_timeout_ms: parse_env("INTERSTITIAL_TIMEOUT_MS", 5_000)?,
            submit_timeout_ms: parse_env("SUBMIT_TIMEOUT_MS", 15_000)?,
            submit_settle_timeout_ms: parse_env("SUBMIT_SETTLE_TIMEOUT_MS", 60_000)?,
            typing_delay_ms: parse_env("TYPING_DELAY_MS", 20)?,
            automation_retries: check_retries(parse_env("AUTOMATION_RETRIES", 3)?)?,
            automation_backoff_ms: parse_env("AUTOMATION_BACKOFF_MS", 750)?,

            screenshot_dir: optional_env("SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("screenshots")),
            browser_headless: parse_bool(
                "BROWSER_HEADLESS",
                optional_env("BROWSER_HEADLESS").as_deref(),
                true,
            )?,
            chrome_path: optional_env("CHROME_PATH").map(PathBuf::from),
            window_size: match optional_env("WINDOW_SIZE") {
                Some(raw) => parse_window_size(&raw)
                    .with_context(|| format!("WINDOW_SIZE '{raw}' must look like 1280,900"))?,
                None => (1280, 900),
            },

            form_profile: parse_env("FORM_PROFILE", FormProfile::Workday)?,
            ai_require_confidence,
            applicant_context_file: optional_env("APPLICANT_CONTEXT_FILE").map(PathBuf::from),
        })
    }

    /// Reads the applicant context file, if one is configured.
    pub fn load_applicant_context(&self) -> Result<Option<String>> {
        let Some(path) = &self.applicant_context_file else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read applicant context {}", path.display()))?;
        Ok(Some(text).filter(|t| !t.trim().is_empty()))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Set and non-blank.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{key} has an invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: Option<&str>, default: bool) -> Result<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("{key} must be a boolean, got '{v}'")),
        },
    }
}

fn check_retries(retries: u32) -> Result<u32> {
    if (1..=MAX_AUTOMATION_RETRIES).contains(&retries) {
        Ok(retries)
    } else {
        Err(anyhow!(
            "AUTOMATION_RETRIES must be between 1 and {MAX_AUTOMATION_RETRIES}, got {retries}"
        ))
    }
}

fn parse_window_size(raw: &str) -> Result<(u32, u32)> {
    let (width, height) = raw
        .split_once([',', 'x'])
        .ok_or_else(|| anyhow!("missing separator"))?;
    Ok((width.trim().parse()?, height.trim().parse()?))
}
