use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ScrapeTarget;

/// How the target URL is placed into an actor's input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// `{"startUrls": [{"url": "<target>"}]}`
    StartUrls,
    /// `{"<field>": ["<target>"]}`
    UrlList { field: String },
    /// `{"<field>": "<target>"}`
    UrlField { field: String },
}

/// Input builder for one actor: the URL shape plus static extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorInput {
    pub shape: InputShape,
    /// When set, the target's "City, ST" context is written to this field.
    #[serde(default)]
    pub location_field: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl ActorInput {
    pub fn start_urls() -> Self {
        Self {
            shape: InputShape::StartUrls,
            location_field: None,
            extra: Map::new(),
        }
    }

    pub fn url_list(field: impl Into<String>) -> Self {
        Self {
            shape: InputShape::UrlList {
                field: field.into(),
            },
            location_field: None,
            extra: Map::new(),
        }
    }

    pub fn url_field(field: impl Into<String>) -> Self {
        Self {
            shape: InputShape::UrlField {
                field: field.into(),
            },
            location_field: None,
            extra: Map::new(),
        }
    }

    pub fn with_location_field(mut self, field: impl Into<String>) -> Self {
        self.location_field = Some(field.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Builds the JSON input document for `target`. Extra fields never
    /// overwrite the URL or location fields.
    pub fn build(&self, target: &ScrapeTarget, limits: &ResourceLimits) -> Value {
        let mut doc = self.extra.clone();
        match &self.shape {
            InputShape::StartUrls => {
                doc.insert("startUrls".into(), json!([{ "url": target.url }]));
            }
            InputShape::UrlList { field } => {
                doc.insert(field.clone(), json!([target.url]));
            }
            InputShape::UrlField { field } => {
                doc.insert(field.clone(), json!(target.url));
            }
        }
        if let (Some(field), Some(location)) =
            (self.location_field.as_ref(), target.context.describe())
        {
            doc.insert(field.clone(), Value::String(location));
        }
        if let Some(max_items) = limits.max_items {
            doc.entry("maxItems").or_insert(json!(max_items));
        }
        Value::Object(doc)
    }
}

/// Per-run resource limits forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub memory_mbytes: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    #[serde(default)]
    pub max_items: Option<u32>,
}

/// Static configuration of one scraping backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDescriptor {
    /// Backend actor id, `owner~name`.
    pub id: String,
    pub input: ActorInput,
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Lower runs first.
    #[serde(default)]
    pub priority: u8,
}

impl ActorDescriptor {
    pub fn new(id: impl Into<String>, input: ActorInput) -> Self {
        Self {
            id: id.into(),
            input,
            limits: ResourceLimits::default(),
            priority: 0,
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn build_input(&self, target: &ScrapeTarget) -> Value {
        self.input.build(target, &self.limits)
    }
}

/// Lifecycle of one backend run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl RunStatus {
    /// Maps a backend status string. Transitional states count as running and
    /// unknown strings are treated as still running so the poll budget decides.
    pub fn from_backend(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "READY" | "PENDING" => RunStatus::Pending,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            "ABORTED" => RunStatus::Aborted,
            "TIMED_OUT" => RunStatus::TimedOut,
            _ => RunStatus::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }

    /// Applies an observed status. A terminal status is final: later
    /// observations are ignored.
    pub fn advance(self, observed: RunStatus) -> RunStatus {
        if self.is_terminal() {
            self
        } else {
            observed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::Aborted => "ABORTED",
            RunStatus::TimedOut => "TIMED_OUT",
        }
    }
}
