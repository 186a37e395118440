use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub user_name: String,
    pub workspace_path: String,
    pub thinking_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Aigent".to_string(),
            user_name: String::new(),
            workspace_path: ".".to_string(),
            thinking_level: "balanced".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama_model: String,
    pub openrouter_model: String,
    pub ollama_local_first: bool,
    /// Base URL for the Ollama API.  Overridden at runtime by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "llama3.1:8b".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_local_first: true,
            ollama_base_url: "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub approval_required: bool,
    pub allow_shell: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            approval_required: true,
            allow_shell: false,
        }
    }
}

/// Knobs governing the plan-execute-adapt loop. Every field here
/// corresponds to an environment variable of the same name; `load_from`
/// applies env overrides on top of whatever the TOML file set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PealConfig {
    pub max_adaptation_attempts: u32,
    pub plan_min_confidence: f32,
    pub working_memory_reinforce_delta: f32,
    pub working_memory_max_weight: f32,
    pub skip_llm_for_obvious_intents: bool,
    pub use_cpms_for_procs: bool,
    pub use_cpms_for_forms: bool,
    pub pattern_reuse_min_score: f32,
    pub ask_user_fallback: bool,
}

impl Default for PealConfig {
    fn default() -> Self {
        Self {
            max_adaptation_attempts: 3,
            plan_min_confidence: 0.9,
            working_memory_reinforce_delta: 1.0,
            working_memory_max_weight: 100.0,
            skip_llm_for_obvious_intents: true,
            use_cpms_for_procs: false,
            use_cpms_for_forms: false,
            pattern_reuse_min_score: 2.0,
            ask_user_fallback: true,
        }
    }
}

impl PealConfig {
    fn apply_env_overrides(&mut self) {
        apply_env_u32(&mut self.max_adaptation_attempts, "MAX_ADAPTATION_ATTEMPTS");
        apply_env_f32(&mut self.plan_min_confidence, "PLAN_MIN_CONFIDENCE");
        apply_env_f32(&mut self.working_memory_reinforce_delta, "WORKING_MEMORY_REINFORCE_DELTA");
        apply_env_f32(&mut self.working_memory_max_weight, "WORKING_MEMORY_MAX_WEIGHT");
        apply_env_bool(&mut self.skip_llm_for_obvious_intents, "SKIP_LLM_FOR_OBVIOUS_INTENTS");
        apply_env_bool(&mut self.use_cpms_for_procs, "USE_CPMS_FOR_PROCS");
        apply_env_bool(&mut self.use_cpms_for_forms, "USE_CPMS_FOR_FORMS");
        apply_env_f32(&mut self.pattern_reuse_min_score, "PATTERN_REUSE_MIN_SCORE");
        apply_env_bool(&mut self.ask_user_fallback, "ASK_USER_FALLBACK");
    }
}

fn apply_env_u32(field: &mut u32, key: &str) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_f32(field: &mut f32, key: &str) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn apply_env_bool(field: &mut bool, key: &str) {
    if let Ok(value) = env::var(key) {
        *field = value == "1" || value.eq_ignore_ascii_case("true");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OnboardingConfig {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub telemetry: TelemetryConfig,
    pub onboarding: OnboardingConfig,
    pub peal: PealConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("OLLAMA_BASE_URL") {
            if !value.is_empty() {
                config.llm.provider = "ollama".to_string();
            }
        }

        config.peal.apply_env_overrides();

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn active_model(&self) -> &str {
        if self.llm.provider.eq_ignore_ascii_case("openrouter") {
            &self.llm.openrouter_model
        } else {
            &self.llm.ollama_model
        }
    }

    pub fn needs_onboarding(&self) -> bool {
        !self.onboarding.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peal_defaults_match_documented_values() {
        let peal = PealConfig::default();
        assert_eq!(peal.max_adaptation_attempts, 3);
        assert!((peal.plan_min_confidence - 0.9).abs() < f32::EPSILON);
        assert!((peal.pattern_reuse_min_score - 2.0).abs() < f32::EPSILON);
        assert!(peal.skip_llm_for_obvious_intents);
        assert!(!peal.use_cpms_for_procs);
    }

    #[test]
    fn env_override_parses_numeric_and_bool_knobs() {
        unsafe {
            env::set_var("MAX_ADAPTATION_ATTEMPTS", "5");
            env::set_var("USE_CPMS_FOR_FORMS", "1");
        }
        let mut peal = PealConfig::default();
        peal.apply_env_overrides();
        unsafe {
            env::remove_var("MAX_ADAPTATION_ATTEMPTS");
            env::remove_var("USE_CPMS_FOR_FORMS");
        }

        assert_eq!(peal.max_adaptation_attempts, 5);
        assert!(peal.use_cpms_for_forms);
    }

    #[test]
    fn malformed_env_value_is_ignored() {
        unsafe {
            env::set_var("PLAN_MIN_CONFIDENCE", "not-a-number");
        }
        let mut peal = PealConfig::default();
        peal.apply_env_overrides();
        unsafe {
            env::remove_var("PLAN_MIN_CONFIDENCE");
        }

        assert!((peal.plan_min_confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn save_then_load_round_trips_peal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.peal.max_adaptation_attempts = 7;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.peal.max_adaptation_attempts, 7);
    }
}
