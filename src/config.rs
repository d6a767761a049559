//! Application-level configuration: round timing, bid rules, scoring and the LLM backend.

use std::{env, fmt::Display, fs, io::ErrorKind, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_BACK_CONFIG_PATH";
/// Separator used by the `ADVERSARIAL_PHRASES` environment variable.
const PHRASE_SEPARATOR: char = '|';

/// Settings of the OpenAI-compatible backend used to vet topics and write questions.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat completion API; no backend is used when absent.
    pub api_url: Option<String>,
    /// Bearer token sent with every request.
    pub api_key: Option<String>,
    /// Model name passed in the request body.
    pub model: String,
    /// Upper bound for a single call, in seconds.
    #[validate(range(min = 1))]
    pub timeout_sec: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "gpt-4o-mini".into(),
            timeout_sec: 30,
        }
    }
}

impl LlmConfig {
    /// Timeout applied around each validator or generator call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// Length of a round, in seconds.
    #[validate(range(min = 1))]
    pub question_countdown_sec: u64,
    /// How long a failed topic stays visible before removal, in seconds.
    pub keep_failed_topic_sec: u64,
    /// Maximum bid text length, in characters.
    #[validate(range(min = 1))]
    pub topic_max_length: usize,
    /// Pending low-water mark, also the size of one bank refill.
    #[validate(range(min = 1))]
    pub max_nr_topics_for_allow_more: usize,
    /// How many pending topics the broadcast list shows.
    #[validate(range(min = 1))]
    pub nr_topics_to_broadcast: usize,
    /// Smallest accepted stake.
    #[validate(range(min = 1))]
    pub bid_min_points: u32,
    /// Similarity ratio at or above which a bid duplicates a known topic.
    #[validate(range(min = 0.0, max = 1.0))]
    pub duplicate_topic_threshold: f64,
    /// Consecutive wins needed for the streak bonus.
    #[validate(range(min = 1))]
    pub combo_consecutive_nr_for_win: u32,
    /// Points granted when a streak completes.
    pub combo_win_points: i64,
    /// Number of pipeline lanes.
    #[validate(range(min = 1, max = 64))]
    pub pipeline_workers: usize,
    /// Balance given to a player on their first visit.
    pub initial_player_points: i64,
    /// Similarity ratio at or above which a bid is treated as a prompt injection.
    #[validate(range(min = 0.0, max = 1.0))]
    pub adversarial_threshold: f64,
    /// Phrases compared against every bid text.
    pub adversarial_phrases: Vec<String>,
    /// Operator token required by the admin routes.
    pub admin_token: Option<String>,
    /// LLM backend settings.
    #[validate(nested)]
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question_countdown_sec: 22,
            keep_failed_topic_sec: 5,
            topic_max_length: 25,
            max_nr_topics_for_allow_more: 20,
            nr_topics_to_broadcast: 5,
            bid_min_points: 3,
            duplicate_topic_threshold: 0.9,
            combo_consecutive_nr_for_win: 3,
            combo_win_points: 50,
            pipeline_workers: 2,
            initial_player_points: 20,
            adversarial_threshold: 0.5,
            adversarial_phrases: vec!["ignore previous instructions".into()],
            admin_token: None,
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to built-in defaults.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_overrides(|key| env::var(key).ok());

        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(error = %err, "invalid configuration; falling back to defaults");
                Self::default()
            }
        }
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Overlay values found through `lookup`, keyed by their environment variable names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_value(&lookup, "QUESTION_COUNTDOWN_SEC", &mut self.question_countdown_sec);
        override_value(&lookup, "KEEP_FAILED_TOPIC_SEC", &mut self.keep_failed_topic_sec);
        override_value(&lookup, "TOPIC_MAX_LENGTH", &mut self.topic_max_length);
        override_value(
            &lookup,
            "MAX_NR_TOPICS_FOR_ALLOW_MORE",
            &mut self.max_nr_topics_for_allow_more,
        );
        override_value(&lookup, "NR_TOPICS_TO_BROADCAST", &mut self.nr_topics_to_broadcast);
        override_value(&lookup, "BID_MIN_POINTS", &mut self.bid_min_points);
        override_value(
            &lookup,
            "DUPLICATE_TOPIC_THRESHOLD",
            &mut self.duplicate_topic_threshold,
        );
        override_value(
            &lookup,
            "COMBO_CONSECUTIVE_NR_FOR_WIN",
            &mut self.combo_consecutive_nr_for_win,
        );
        override_value(&lookup, "COMBO_WIN_POINTS", &mut self.combo_win_points);
        override_value(&lookup, "PIPELINE_WORKERS", &mut self.pipeline_workers);
        override_value(&lookup, "INITIAL_PLAYER_POINTS", &mut self.initial_player_points);
        override_value(&lookup, "ADVERSARIAL_THRESHOLD", &mut self.adversarial_threshold);
        override_value(&lookup, "LLM_TIMEOUT_SEC", &mut self.llm.timeout_sec);

        if let Some(phrases) = lookup("ADVERSARIAL_PHRASES") {
            self.adversarial_phrases = phrases
                .split(PHRASE_SEPARATOR)
                .map(str::trim)
                .filter(|phrase| !phrase.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(token) = non_empty(lookup("ADMIN_TOKEN")) {
            self.admin_token = Some(token);
        }
        if let Some(url) = non_empty(lookup("LLM_API_URL")) {
            self.llm.api_url = Some(url);
        }
        if let Some(key) = non_empty(lookup("LLM_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty(lookup("LLM_MODEL")) {
            self.llm.model = model;
        }
    }

    /// Round length.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.question_countdown_sec)
    }

    /// Grace period before a failed topic is dropped.
    pub fn failed_retention(&self) -> Duration {
        Duration::from_secs(self.keep_failed_topic_sec)
    }
}

fn override_value<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, target: &mut T)
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(err) => warn!(key, value = %raw, error = %err, "ignoring invalid configuration override"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.countdown(), Duration::from_secs(22));
        assert_eq!(config.failed_retention(), Duration::from_secs(5));
    }

    #[test]
    fn environment_overrides_known_keys() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[
            ("QUESTION_COUNTDOWN_SEC", "5"),
            ("BID_MIN_POINTS", " 7 "),
            ("DUPLICATE_TOPIC_THRESHOLD", "0.75"),
            ("ADVERSARIAL_PHRASES", "ignore previous instructions| disregard the above |"),
            ("LLM_API_URL", "http://localhost:11434/v1"),
            ("ADMIN_TOKEN", "  "),
        ]));

        assert_eq!(config.question_countdown_sec, 5);
        assert_eq!(config.bid_min_points, 7);
        assert_eq!(config.duplicate_topic_threshold, 0.75);
        assert_eq!(
            config.adversarial_phrases,
            vec!["ignore previous instructions", "disregard the above"]
        );
        assert_eq!(config.llm.api_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn unparsable_override_keeps_previous_value() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[("PIPELINE_WORKERS", "many")]));
        assert_eq!(config.pipeline_workers, 2);
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let config = AppConfig {
            duplicate_topic_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            pipeline_workers: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_keys() {
        let config: AppConfig =
            serde_json::from_str(r#"{"question_countdown_sec": 10, "llm": {"model": "local"}}"#)
                .unwrap();
        assert_eq!(config.question_countdown_sec, 10);
        assert_eq!(config.topic_max_length, 25);
        assert_eq!(config.llm.model, "local");
        assert_eq!(config.llm.timeout_sec, 30);
    }
}
