//! Configuration and environment accessor recognition.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use docscope_core::config::ResolutionConfig;

const CONFIG_MARKERS: &[&str] = &[
    "iconfiguration",
    "configuration",
    "getsection",
    "getvalue<",
    "getconnectionstring",
    "appsettings",
    "settings",
    "options",
    "config",
];

const ENV_MARKERS: &[&str] = &[
    "environment.getenvironmentvariable",
    "getenvironmentvariable",
    "environment.",
    "env[",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Config,
    Environment,
}

/// Case-insensitive marker automatons. Environment markers win over config
/// markers (`config.Environment.GetEnvironmentVariable(..)` reads the env).
#[derive(Debug, Clone)]
pub struct AccessorMarkers {
    config: Option<AhoCorasick>,
    env: Option<AhoCorasick>,
}

fn automaton(defaults: &[&str], extra: &[String]) -> Option<AhoCorasick> {
    let patterns: Vec<String> = defaults
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().map(|s| s.to_ascii_lowercase()))
        .collect();
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(&patterns)
        .map_err(|e| tracing::warn!(error = %e, "accessor marker automaton failed to build"))
        .ok()
}

impl AccessorMarkers {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self {
            config: automaton(CONFIG_MARKERS, &config.config_markers),
            env: automaton(ENV_MARKERS, &config.env_markers),
        }
    }

    pub fn classify(&self, text: &str) -> Option<AccessorKind> {
        let hit = |ac: &Option<AhoCorasick>| ac.as_ref().is_some_and(|ac| ac.is_match(text));
        if hit(&self.env) {
            Some(AccessorKind::Environment)
        } else if hit(&self.config) {
            Some(AccessorKind::Config)
        } else {
            None
        }
    }
}

impl Default for AccessorMarkers {
    fn default() -> Self {
        Self::new(&ResolutionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_accessors() {
        let m = AccessorMarkers::default();
        assert_eq!(
            m.classify("Environment.GetEnvironmentVariable(\"ORDERS\")"),
            Some(AccessorKind::Environment)
        );
        assert_eq!(
            m.classify("_configuration[\"Mongo:Orders\"]"),
            Some(AccessorKind::Config)
        );
        assert_eq!(m.classify("_settings.Value.OrdersCollection"), Some(AccessorKind::Config));
        assert_eq!(m.classify("CollectionNames.Orders"), None);
    }

    #[test]
    fn extra_markers_extend_defaults() {
        let config = ResolutionConfig {
            config_markers: vec!["Vault".into()],
            ..Default::default()
        };
        let m = AccessorMarkers::new(&config);
        assert_eq!(m.classify("vault.Read(\"x\")"), Some(AccessorKind::Config));
    }
}
