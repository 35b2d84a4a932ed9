//! ActionOutput: the uniform result record of every action run.

use serde::{Deserialize, Serialize};

/// Opaque key-value bag used for `extra` and `memory_fragments`.
///
/// Producers are arbitrary action variants, so the contents are not typed.
pub type ExtraMap = serde_json::Map<String, serde_json::Value>;

/// Outcome of a single action invocation.
///
/// Optional fields that are `None` are omitted from the serialized form, so a
/// map round-trip keeps absent fields absent. Deserializing a failed output
/// without `observations` fills them from `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct ActionOutput {
    pub content: String,

    #[serde(default = "default_true")]
    pub success: bool,

    /// Rendering shown to humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Rendering fed back to the model on the next turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_view: Option<String>,

    /// Lineage id, e.g. `2.4-1.5` (parent round 2 action 4, child round 1 action 5).
    /// Opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,

    /// Diagnostic text. Defaults to `content` for failed outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,

    #[serde(default = "default_true")]
    pub have_retry: bool,

    #[serde(default)]
    pub ask_user: bool,

    /// Explicit routing hint for the next turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_speakers: Option<Vec<String>>,

    /// Stops the surrounding conversation loop when `Some(true)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate: Option<bool>,

    /// Snapshot data used to recover the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_fragments: Option<ExtraMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMap>,
}

fn default_true() -> bool {
    true
}

impl Serialize for ActionOutput {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ActionOutput::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for ActionOutput {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut output = ActionOutput::deserialize(deserializer)?;
        output.fill_observations();
        Ok(output)
    }
}

impl ActionOutput {
    /// A successful output carrying `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
            view: None,
            model_view: None,
            action_id: None,
            intention: None,
            reason: None,
            resource_type: None,
            resource_value: None,
            action: None,
            action_name: None,
            action_input: None,
            thoughts: None,
            observations: None,
            have_retry: true,
            ask_user: false,
            next_speakers: None,
            terminate: None,
            memory_fragments: None,
            extra: None,
        }
    }

    /// A failed output. `observations` is filled from `content`.
    pub fn failure(content: impl Into<String>) -> Self {
        Self::new(content).with_success(false)
    }

    /// A failed output with explicit diagnostic text.
    pub fn failure_with(content: impl Into<String>, observations: impl Into<String>) -> Self {
        let mut output = Self::new(content);
        output.success = false;
        output.observations = Some(observations.into());
        output
    }

    /// Set the success flag. Flipping to `false` fills `observations` from
    /// `content` when no diagnostic text was supplied.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self.fill_observations();
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn with_model_view(mut self, model_view: impl Into<String>) -> Self {
        self.model_view = Some(model_view.into());
        self
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_provenance(mut self, intention: Option<String>, reason: Option<String>) -> Self {
        self.intention = intention;
        self.reason = reason;
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_value: serde_json::Value,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_value = Some(resource_value);
        self
    }

    pub fn with_trace(
        mut self,
        action: Option<String>,
        action_name: Option<String>,
        action_input: Option<String>,
    ) -> Self {
        self.action = action;
        self.action_name = action_name;
        self.action_input = action_input;
        self
    }

    pub fn with_thoughts(mut self, thoughts: impl Into<String>) -> Self {
        self.thoughts = Some(thoughts.into());
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn with_have_retry(mut self, have_retry: bool) -> Self {
        self.have_retry = have_retry;
        self
    }

    pub fn with_ask_user(mut self, ask_user: bool) -> Self {
        self.ask_user = ask_user;
        self
    }

    pub fn with_next_speakers(mut self, speakers: Vec<String>) -> Self {
        self.next_speakers = Some(speakers);
        self
    }

    pub fn with_terminate(mut self, terminate: bool) -> Self {
        self.terminate = Some(terminate);
        self
    }

    pub fn with_memory_fragments(mut self, fragments: ExtraMap) -> Self {
        self.memory_fragments = Some(fragments);
        self
    }

    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = Some(extra);
        self
    }

    /// True when the conversation loop must stop after this output.
    pub fn is_terminal(&self) -> bool {
        self.terminate.unwrap_or(false)
    }

    /// Convert to a plain key-value map. Absent optional fields are omitted.
    pub fn to_map(&self) -> ExtraMap {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => ExtraMap::new(),
        }
    }

    /// Build an output from a key-value map.
    ///
    /// An empty map yields `Ok(None)`. A failed output without
    /// `observations` gets them from `content`.
    pub fn from_map(map: ExtraMap) -> Result<Option<Self>, serde_json::Error> {
        if map.is_empty() {
            return Ok(None);
        }
        serde_json::from_value(serde_json::Value::Object(map)).map(Some)
    }

    fn fill_observations(&mut self) {
        if !self.success && self.observations.is_none() {
            self.observations = Some(self.content.clone());
        }
    }
}
