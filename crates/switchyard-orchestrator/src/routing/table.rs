//! Static routing table: task type to ordered candidate list.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use switchyard_abstraction::ProviderKind;

/// Caller-supplied tag selecting a routing policy.
///
/// Normalised to trimmed lower-case, so `SIMPLE` and `simple` are the same route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TaskType(String);

impl TaskType {
    /// Name of the fallback route used for unlisted task types.
    pub const DEFAULT: &'static str = "default";

    /// Creates a normalised task type.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// The normalised name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the fallback route.
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.0
    }
}

/// A (provider, model) pair eligible to serve a task type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Candidate {
    /// Backend to call.
    pub provider: ProviderKind,
    /// Model identifier passed to the backend.
    pub model: String,
}

impl Candidate {
    /// Creates a candidate.
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }

    /// Parses a `provider:model` spec, splitting on the first `:` only.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` for a missing separator, an unknown
    /// provider or an empty model.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (provider, model) = spec.trim().split_once(':').ok_or_else(|| {
            ConfigError::Validation(format!(
                "Invalid candidate '{spec}'. Expected format: provider:model (e.g. openai:gpt-4o-mini)"
            ))
        })?;
        let provider = provider
            .parse::<ProviderKind>()
            .map_err(|e| ConfigError::Validation(format!("Invalid candidate '{spec}': {e}")))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Invalid candidate '{spec}': model cannot be empty"
            )));
        }
        Ok(Self::new(provider, model))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for Candidate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Candidate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Candidate> for String {
    fn from(value: Candidate) -> Self {
        value.to_string()
    }
}

/// Mapping from task type to an ordered candidate list. First listed is tried first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    routes: BTreeMap<TaskType, Vec<Candidate>>,
}

impl RoutingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a route.
    #[must_use]
    pub fn with_route(mut self, task_type: impl Into<TaskType>, candidates: Vec<Candidate>) -> Self {
        self.insert(task_type, candidates);
        self
    }

    /// Adds or replaces a route, returning the previous candidates.
    pub fn insert(
        &mut self,
        task_type: impl Into<TaskType>,
        candidates: Vec<Candidate>,
    ) -> Option<Vec<Candidate>> {
        self.routes.insert(task_type.into(), candidates)
    }

    /// Builds a table from `task -> ["provider:model", ...]` specs.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` for any malformed spec or empty route.
    pub fn from_specs<'a, I, S>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<S>)>,
        S: AsRef<str> + 'a,
    {
        let mut table = Self::new();
        for (task, models) in specs {
            let candidates = models
                .iter()
                .map(|spec| Candidate::parse(spec.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            table.insert(task.as_str(), candidates);
        }
        table.validate()?;
        Ok(table)
    }

    /// Candidates for `task_type`, without the default fallback.
    pub fn get(&self, task_type: &TaskType) -> Option<&[Candidate]> {
        self.routes.get(task_type).map(Vec::as_slice)
    }

    /// Candidates for `task_type`, falling back to the `default` route.
    pub fn lookup(&self, task_type: &TaskType) -> Option<&[Candidate]> {
        self.get(task_type)
            .or_else(|| self.routes.get(&TaskType::new(TaskType::DEFAULT)).map(Vec::as_slice))
            .filter(|candidates| !candidates.is_empty())
    }

    /// Iterates routes in task-type order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskType, &[Candidate])> {
        self.routes.iter().map(|(task, candidates)| (task, candidates.as_slice()))
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Rejects empty routes.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` naming the first empty route.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((task, _)) = self.routes.iter().find(|(_, c)| c.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Route '{task}' must list at least one candidate"
            )));
        }
        Ok(())
    }

    /// A reasonable starting table: cheap fast models first for simple work,
    /// stronger models first for complex work, a local model last.
    #[must_use]
    pub fn default_table() -> Self {
        use ProviderKind::{Anthropic, Gemini, Groq, Ollama, OpenAi};

        Self::new()
            .with_route(
                "simple",
                vec![
                    Candidate::new(Groq, "llama-3.1-8b-instant"),
                    Candidate::new(Gemini, "gemini-1.5-flash"),
                    Candidate::new(OpenAi, "gpt-4o-mini"),
                    Candidate::new(Ollama, "llama3"),
                ],
            )
            .with_route(
                "complex",
                vec![
                    Candidate::new(Anthropic, "claude-3-5-sonnet-latest"),
                    Candidate::new(OpenAi, "gpt-4o"),
                    Candidate::new(Gemini, "gemini-1.5-pro"),
                ],
            )
            .with_route(
                "creative",
                vec![
                    Candidate::new(OpenAi, "gpt-4o"),
                    Candidate::new(Anthropic, "claude-3-5-sonnet-latest"),
                    Candidate::new(Gemini, "gemini-1.5-pro"),
                ],
            )
            .with_route(
                "code",
                vec![
                    Candidate::new(Anthropic, "claude-3-5-sonnet-latest"),
                    Candidate::new(OpenAi, "gpt-4o"),
                    Candidate::new(Groq, "llama-3.1-70b-versatile"),
                ],
            )
            .with_route(
                TaskType::DEFAULT,
                vec![
                    Candidate::new(OpenAi, "gpt-4o-mini"),
                    Candidate::new(Gemini, "gemini-1.5-flash"),
                    Candidate::new(Ollama, "llama3"),
                ],
            )
    }
}
