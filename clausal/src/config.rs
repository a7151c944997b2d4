use crate::error::ClausalError;
use crate::schema::ArgumentSchema;
use crate::ClausalResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for a query runner
///
/// ```json
/// {
///   "rule_sources": ["family.pl"],
///   "default_predicate": "partner",
///   "query_schema": { "predicate_name": "partner", "arg_names": ["X", "Y"] },
///   "engine_flags": { "unknown": "error" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Rule files consulted, in order, when a runner is built
    #[serde(default)]
    pub rule_sources: Vec<PathBuf>,

    /// Predicate used for absent input and bare argument lists
    #[serde(default)]
    pub default_predicate: Option<String>,

    /// Named arguments for mapping and record input
    #[serde(default)]
    pub query_schema: Option<ArgumentSchema>,

    /// Engine flags applied when a runner is built. Flags belong to the engine
    /// session, not the runner, so every runner on that session sees them.
    #[serde(default)]
    pub engine_flags: BTreeMap<String, String>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, path: impl Into<PathBuf>) -> Self {
        self.rule_sources.push(path.into());
        self
    }

    pub fn with_default_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.default_predicate = Some(predicate.into());
        self
    }

    pub fn with_schema(mut self, schema: ArgumentSchema) -> Self {
        self.query_schema = Some(schema);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.engine_flags.insert(name.into(), value.into());
        self
    }

    pub fn from_json(json: &str) -> ClausalResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ClausalError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Read a JSON configuration file. Relative rule paths are resolved against
    /// the directory containing the configuration file.
    pub fn from_json_file(path: &Path) -> ClausalResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ClausalError::Config(format!("Cannot read configuration {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            for source in &mut config.rule_sources {
                if source.is_relative() {
                    *source = base.join(&*source);
                }
            }
        }
        Ok(config)
    }
}
