//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//!
//! Only timings and service endpoints are configurable.  The visual risk
//! weights and the PHQ-8 severity cut points live in [`crate::scoring`] as
//! constants because the scoring service expects them verbatim.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Conversational pacing of the interview stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pause between entering the interview and asking the first prompt.
    pub opening_delay_ms: u64,
    /// "Typing" pause before each prompt is shown and spoken.
    pub typing_delay_ms: u64,
    /// "Thinking" pause after the user sends an utterance.
    pub think_delay_ms: u64,
    /// "Typing" pause before the closing message.
    pub closing_typing_delay_ms: u64,
    /// Acknowledgement pause between the closing message and the
    /// questionnaire stage.
    pub closing_ack_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            opening_delay_ms: 600,
            typing_delay_ms: 1_200,
            think_delay_ms: 500,
            closing_typing_delay_ms: 1_500,
            closing_ack_delay_ms: 4_000,
        }
    }
}

impl SessionConfig {
    pub fn opening_delay(&self) -> Duration {
        Duration::from_millis(self.opening_delay_ms)
    }

    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn think_delay(&self) -> Duration {
        Duration::from_millis(self.think_delay_ms)
    }

    pub fn closing_typing_delay(&self) -> Duration {
        Duration::from_millis(self.closing_typing_delay_ms)
    }

    pub fn closing_ack_delay(&self) -> Duration {
        Duration::from_millis(self.closing_ack_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// SamplerConfig
// ---------------------------------------------------------------------------

/// Settings for the facial-expression sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Milliseconds between two sampling ticks.
    pub interval_ms: u64,
    /// Face confidence cutoff handed to the external detector (0.0 – 1.0).
    pub min_confidence: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_500,
            min_confidence: 0.4,
        }
    }
}

/// Shortest sampling interval honoured; smaller values (including a
/// hand-edited `0`) are raised to it.
pub const MIN_SAMPLER_INTERVAL_MS: u64 = 100;

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_SAMPLER_INTERVAL_MS))
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Speech synthesis, recognition and raw-recording settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 language tag used for recognition and as the voice fallback.
    pub language: String,
    /// Synthesis rate multiplier.
    pub rate: f32,
    /// Synthesis pitch multiplier.
    pub pitch: f32,
    /// Synthesis volume (0.0 – 1.0).
    pub volume: f32,
    /// Ranked voice-name fragments; the first available match wins.
    pub voice_priority: Vec<String>,
    /// Raw recordings stop growing once they reach `max_recording_secs`.
    pub max_recording_secs: u32,
    /// Number of bars produced by the live level meter.
    pub level_bars: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let voice_priority = [
            "Microsoft Jenny",
            "Google UK English Female",
            "Samantha",
            "Microsoft Zira",
            "Karen",
            "Moira",
            "Tessa",
            "Fiona",
            "Google US English",
            "Victoria",
            "Alex",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            language: "en-US".into(),
            rate: 0.9,
            pitch: 1.05,
            volume: 1.0,
            voice_priority,
            max_recording_secs: 300,
            level_bars: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// ScoringConfig
// ---------------------------------------------------------------------------

/// Where the scoring and sentiment services live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Base URL of the backend, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Maximum seconds to wait for either service.
    pub timeout_secs: u64,
    /// Request the sentiment breakdown after a successful scoring call.
    pub fetch_sentiment: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout_secs: 30,
            fetch_sentiment: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use mindscan::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interview pacing.
    pub session: SessionConfig,
    /// Expression sampler settings.
    pub sampler: SamplerConfig,
    /// Speech in/out settings.
    pub speech: SpeechConfig,
    /// Backend service settings.
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values_match_interview_pacing() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.session.opening_delay_ms, 600);
        assert_eq!(cfg.session.typing_delay_ms, 1_200);
        assert_eq!(cfg.session.think_delay_ms, 500);
        assert_eq!(cfg.session.closing_typing_delay_ms, 1_500);
        assert_eq!(cfg.session.closing_ack_delay_ms, 4_000);
        assert_eq!(cfg.sampler.interval(), Duration::from_millis(2_500));
        assert!((cfg.sampler.min_confidence - 0.4).abs() < f32::EPSILON);
        assert_eq!(cfg.speech.language, "en-US");
        assert_eq!(cfg.speech.voice_priority.first().map(String::as_str), Some("Microsoft Jenny"));
        assert_eq!(cfg.scoring.base_url, "http://localhost:5000");
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.sampler.interval_ms, SamplerConfig::default().interval_ms);
        assert_eq!(config.scoring.timeout_secs, 30);
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.session.think_delay_ms = 0;
        cfg.sampler.interval_ms = 1_000;
        cfg.speech.language = "en-GB".into();
        cfg.speech.voice_priority = vec!["Daniel".into()];
        cfg.scoring.base_url = "https://scoring.example".into();
        cfg.scoring.fetch_sentiment = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.session.think_delay_ms, 0);
        assert_eq!(loaded.sampler.interval_ms, 1_000);
        assert_eq!(loaded.speech.language, "en-GB");
        assert_eq!(loaded.speech.voice_priority, vec!["Daniel".to_string()]);
        assert_eq!(loaded.scoring.base_url, "https://scoring.example");
        assert!(!loaded.scoring.fetch_sentiment);
    }

    #[test]
    fn zero_sampler_interval_is_raised_to_minimum() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[sampler]\ninterval_ms = 0\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(
            loaded.sampler.interval(),
            Duration::from_millis(MIN_SAMPLER_INTERVAL_MS)
        );
    }

    /// Sections missing from a hand-edited file fall back to their defaults.
    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[scoring]\nbase_url = \"http://10.0.0.2:5000\"\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.scoring.base_url, "http://10.0.0.2:5000");
        assert_eq!(loaded.scoring.timeout_secs, 30);
        assert_eq!(loaded.session.closing_ack_delay_ms, 4_000);
    }
}
