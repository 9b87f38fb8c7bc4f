use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if the provider credential is missing or a value is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub extraction_temperature: f32,
    pub scoring_temperature: f32,
    pub llm_max_retries: u32,
    pub llm_max_concurrency: usize,
    pub request_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let llm_api_key = lookup("GROQ_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .context("Required environment variable 'GROQ_API_KEY' is not set")?;

        let extraction_temperature = parse_or(&lookup, "EXTRACTION_TEMPERATURE", 0.0_f32)?;
        let scoring_temperature = parse_or(&lookup, "SCORING_TEMPERATURE", 0.0_f32)?;
        for (key, value) in [
            ("EXTRACTION_TEMPERATURE", extraction_temperature),
            ("SCORING_TEMPERATURE", scoring_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                bail!("{key} must be between 0.0 and 2.0, got {value}");
            }
        }

        let llm_max_retries = parse_or(&lookup, "LLM_MAX_RETRIES", 3_u32)?;
        let llm_max_concurrency = parse_or(&lookup, "LLM_MAX_CONCURRENCY", 8_usize)?;
        let timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120_u64)?;
        if llm_max_retries == 0 || llm_max_concurrency == 0 || timeout_secs == 0 {
            bail!("LLM_MAX_RETRIES, LLM_MAX_CONCURRENCY and REQUEST_TIMEOUT_SECS must be at least 1");
        }

        Ok(Config {
            llm_api_key,
            llm_base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            extraction_temperature,
            scoring_temperature,
            llm_max_retries,
            llm_max_concurrency,
            request_timeout: Duration::from_secs(timeout_secs),
            port: parse_or(&lookup, "PORT", 8080_u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied_when_only_key_set() {
        let config = Config::from_lookup(lookup_from(&[("GROQ_API_KEY", "gsk_test")])).unwrap();
        assert_eq!(config.llm_api_key, "gsk_test");
        assert_eq!(config.llm_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm_model, DEFAULT_MODEL);
        assert_eq!(config.extraction_temperature, 0.0);
        assert_eq!(config.scoring_temperature, 0.0);
        assert_eq!(config.llm_max_retries, 3);
        assert_eq!(config.llm_max_concurrency, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_fails() {
        assert!(Config::from_lookup(lookup_from(&[("GROQ_API_KEY", "   ")])).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "k"),
            ("LLM_MODEL", "llama-3.3-70b-versatile"),
            ("SCORING_TEMPERATURE", "0.2"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.llm_model, "llama-3.3-70b-versatile");
        assert!((config.scoring_temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_malformed_port_is_rejected() {
        let err =
            Config::from_lookup(lookup_from(&[("GROQ_API_KEY", "k"), ("PORT", "eighty")]))
                .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_out_of_range_temperature_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "k"),
            ("EXTRACTION_TEMPERATURE", "3.5"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("EXTRACTION_TEMPERATURE"));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "k"),
            ("LLM_MAX_CONCURRENCY", "0"),
        ]))
        .is_err());
    }
}
