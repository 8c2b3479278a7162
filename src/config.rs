use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::models::Proficiency;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub mastery: MasteryConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

/// Every mastery threshold and XP reward in one place. Percentages are
/// whole numbers in [0, 100].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MasteryConfig {
    pub initial_mastery: u8,
    pub correct_step: u8,
    pub incorrect_step: u8,
    pub quest_unlock_average: u8,
    pub boss_pass_percent: u8,
    pub proficient_threshold: u8,
    pub developing_threshold: u8,
    pub weak_concept_threshold: u8,
    pub xp_per_level: u64,
    pub quiz_correct_xp: u64,
    pub boss_question_xp: u64,
    pub boss_defeat_xp: u64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            initial_mastery: 25,
            correct_step: 12,
            incorrect_step: 6,
            quest_unlock_average: 60,
            boss_pass_percent: 80,
            proficient_threshold: 70,
            developing_threshold: 30,
            weak_concept_threshold: 40,
            xp_per_level: 1000,
            quiz_correct_xp: 50,
            boss_question_xp: 250,
            boss_defeat_xp: 1000,
        }
    }
}

impl MasteryConfig {
    pub fn proficiency(&self, mastery: u8) -> Proficiency {
        if mastery >= self.proficient_threshold {
            Proficiency::Proficient
        } else if mastery >= self.developing_threshold {
            Proficiency::Developing
        } else {
            Proficiency::Weak
        }
    }

    fn from_env() -> Result<Self> {
        let defaults = MasteryConfig::default();

        Ok(MasteryConfig {
            initial_mastery: env_or("MASTERY_INITIAL", defaults.initial_mastery)?,
            correct_step: env_or("MASTERY_CORRECT_STEP", defaults.correct_step)?,
            incorrect_step: env_or("MASTERY_INCORRECT_STEP", defaults.incorrect_step)?,
            quest_unlock_average: env_or("MASTERY_QUEST_UNLOCK", defaults.quest_unlock_average)?,
            boss_pass_percent: env_or("MASTERY_BOSS_PASS", defaults.boss_pass_percent)?,
            proficient_threshold: env_or("MASTERY_PROFICIENT", defaults.proficient_threshold)?,
            developing_threshold: env_or("MASTERY_DEVELOPING", defaults.developing_threshold)?,
            weak_concept_threshold: env_or("MASTERY_WEAK_CONCEPT", defaults.weak_concept_threshold)?,
            xp_per_level: env_or("MASTERY_XP_PER_LEVEL", defaults.xp_per_level)?,
            quiz_correct_xp: env_or("MASTERY_QUIZ_XP", defaults.quiz_correct_xp)?,
            boss_question_xp: env_or("MASTERY_BOSS_QUESTION_XP", defaults.boss_question_xp)?,
            boss_defeat_xp: env_or("MASTERY_BOSS_DEFEAT_XP", defaults.boss_defeat_xp)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let percentages = [
            ("initial_mastery", self.initial_mastery),
            ("correct_step", self.correct_step),
            ("incorrect_step", self.incorrect_step),
            ("quest_unlock_average", self.quest_unlock_average),
            ("boss_pass_percent", self.boss_pass_percent),
            ("proficient_threshold", self.proficient_threshold),
            ("developing_threshold", self.developing_threshold),
            ("weak_concept_threshold", self.weak_concept_threshold),
        ];
        for (name, value) in percentages {
            if value > 100 {
                return Err(anyhow!("{} must be within 0-100, got {}", name, value));
            }
        }

        if self.developing_threshold > self.proficient_threshold {
            return Err(anyhow!(
                "developing_threshold ({}) cannot exceed proficient_threshold ({})",
                self.developing_threshold,
                self.proficient_threshold
            ));
        }

        if self.xp_per_level == 0 {
            return Err(anyhow!("xp_per_level must be greater than 0"));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            mastery: MasteryConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            quest_unlock_average = self.mastery.quest_unlock_average,
            boss_pass_percent = self.mastery.boss_pass_percent,
            xp_per_level = self.mastery.xp_per_level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if let Err(e) = self.mastery.validate() {
            log_validation!(failure, "mastery", error = e);
            return Err(e);
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unrecognised log level '{}', the filter may fall back to defaults", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:mastery_system.db?mode=rwc".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,mastery_system=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging. Counts chars so
/// multi-byte input never splits a code point.
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
