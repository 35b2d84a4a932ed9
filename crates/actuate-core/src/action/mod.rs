//! Actions: the executable unit of an agent turn.
//!
//! An action turns free-form model text into a domain effect and an
//! [`ActionOutput`]:
//!
//! ```text
//! raw model text ──► extract_payload::<T>() ──► domain logic ──► ActionOutput
//!                        │                                          ▲
//!                        └── NoStructuredOutput / Validation ───────┘ (caller re-prompts)
//! ```
//!
//! Shared per-action state (language, explicit name, bound resource, view tag,
//! provenance, renderer) lives in [`ActionCore`]. Concrete actions embed one
//! and implement [`Action`].

pub mod blank;
pub mod extract;
pub mod output;
pub mod render;
pub mod resource;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ActionError;

pub use blank::BlankAction;
pub use extract::{extract_payload, find_structured_objects};
pub use output::{ActionOutput, ExtraMap};
pub use render::{FencedRenderer, Renderer};
pub use resource::{NamedResource, Resource, ResourceRef, ResourceType};
pub use schema::{
    build_schema_example, schema_example_text, schema_instructions, FieldSpec, PayloadType,
    SchemaDescriptor, StructSchema, StructuredPayload,
};

// ─── Shared State ─────────────────────────────────────────────────────────

/// State every action carries.
///
/// Bound once (`init_action`, `init_resource`) before the first run and then
/// reused; nothing is reset between runs.
#[derive(Clone)]
pub struct ActionCore {
    language: String,
    name: Option<String>,
    resource: Option<ResourceRef>,
    view_tag: Option<String>,
    intention: Option<String>,
    reason: Option<String>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Default for ActionCore {
    fn default() -> Self {
        Self::new("en")
    }
}

impl ActionCore {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            name: None,
            resource: None,
            view_tag: None,
            intention: None,
            reason: None,
            renderer: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_view_tag(mut self, tag: impl Into<String>) -> Self {
        self.view_tag = Some(tag.into());
        self
    }

    /// Bind the renderer used for this action's views.
    pub fn init_action(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    pub fn init_resource(&mut self, resource: Option<ResourceRef>) {
        self.resource = resource;
    }

    pub fn set_provenance(&mut self, intention: Option<String>, reason: Option<String>) {
        self.intention = intention;
        self.reason = reason;
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        self.resource.as_ref()
    }

    pub fn view_tag(&self) -> Option<&str> {
        self.view_tag.as_deref()
    }

    pub fn intention(&self) -> Option<&str> {
        self.intention.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// View for `output`. `None` without both a view tag and a renderer.
    pub fn render(&self, output: &ActionOutput) -> Option<String> {
        let tag = self.view_tag.as_deref()?;
        self.renderer.as_ref()?.render(tag, output)
    }

    pub fn render_prompt(&self) -> Option<String> {
        let tag = self.view_tag.as_deref()?;
        self.renderer.as_ref()?.render_prompt(tag)
    }

    /// Stamp provenance, resource and (optionally) the rendered view onto a
    /// freshly built output.
    ///
    /// The resource passed to the run wins over the one bound at init time.
    /// Fields the action already set are left alone.
    pub fn complete(&self, mut output: ActionOutput, ctx: &RunContext) -> ActionOutput {
        if output.intention.is_none() {
            output.intention = self.intention.clone();
        }
        if output.reason.is_none() {
            output.reason = self.reason.clone();
        }
        if output.resource_type.is_none() {
            if let Some(resource) = ctx.resource.as_ref().or(self.resource.as_ref()) {
                output.resource_type = Some(resource.resource_type().to_string());
                output.resource_value = Some(resource.value());
            }
        }
        if ctx.needs_render && output.view.is_none() {
            output.view = self.render(&output);
        }
        output
    }
}

impl std::fmt::Debug for ActionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCore")
            .field("language", &self.language)
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("view_tag", &self.view_tag)
            .field("intention", &self.intention)
            .field("reason", &self.reason)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Per-invocation arguments of [`Action::run`].
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Resource for this run, overriding the bound one
    pub resource: Option<ResourceRef>,
    /// Result of the action this one depends on
    pub prior: Option<ActionOutput>,
    pub needs_render: bool,
    /// Free-form options for concrete actions
    pub options: ExtraMap,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            resource: None,
            prior: None,
            needs_render: true,
            options: ExtraMap::new(),
        }
    }
}

impl RunContext {
    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_prior(mut self, prior: ActionOutput) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn without_render(mut self) -> Self {
        self.needs_render = false;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

// ─── Action Trait ─────────────────────────────────────────────────────────

/// An executable unit that turns model text into an [`ActionOutput`].
///
/// `run` returns `Ok` with `success = false` for failures the model can fix
/// on a re-prompt, and `Err` when the action could not run at all.
#[async_trait]
pub trait Action: Send + Sync {
    fn core(&self) -> &ActionCore;

    fn core_mut(&mut self) -> &mut ActionCore;

    /// Fully qualified type name of the concrete action.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Explicit name if set, else the type name minus a trailing "Action".
    fn name(&self) -> String {
        match self.core().name() {
            Some(name) => name.to_string(),
            None => derive_action_name(self.type_name()),
        }
    }

    fn description(&self) -> &str {
        ""
    }

    fn resource_need(&self) -> Option<ResourceType> {
        None
    }

    /// Structured payload the model must emit. `None` for free-text actions.
    fn payload_type(&self) -> Option<PayloadType> {
        None
    }

    /// Pretty-printed example of the payload; `None` for free-text actions.
    fn output_schema_text(&self) -> Result<Option<String>, ActionError> {
        self.payload_type().map(schema_example_text).transpose()
    }

    /// The example wrapped in reply-format instructions for the model.
    fn output_schema_instructions(&self) -> Result<Option<String>, ActionError> {
        self.payload_type().map(schema_instructions).transpose()
    }

    /// Pick the action that should handle `raw_text`.
    ///
    /// Always returns `default_action`. Deployments with several candidate
    /// actions override this to inspect the text, or return `None` to skip
    /// the turn.
    fn select_default(
        &self,
        _raw_text: &str,
        default_action: Arc<dyn Action>,
        _resource: Option<&ResourceRef>,
    ) -> Option<Arc<dyn Action>> {
        Some(default_action)
    }

    async fn run(&self, raw_text: &str, ctx: RunContext) -> Result<ActionOutput, ActionError>;
}

/// Last path segment of a type name with generics and a trailing
/// case-insensitive "Action" removed. A bare `Action` keeps its name.
pub fn derive_action_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let short = base.rsplit("::").next().unwrap_or(base);
    let cut = short.len().saturating_sub("action".len());
    match short.get(cut..) {
        Some(suffix) if cut > 0 && suffix.eq_ignore_ascii_case("action") => short[..cut].to_string(),
        _ => short.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Chart {
        /// Chart type, e.g. line or bar
        kind: String,
        /// SQL that produces the series
        sql: String,
    }

    impl StructuredPayload for Chart {}

    struct ChartAction {
        core: ActionCore,
    }

    #[async_trait]
    impl Action for ChartAction {
        fn core(&self) -> &ActionCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ActionCore {
            &mut self.core
        }

        fn description(&self) -> &str {
            "Render query results as a chart"
        }

        fn resource_need(&self) -> Option<ResourceType> {
            Some(ResourceType::Database)
        }

        fn payload_type(&self) -> Option<PayloadType> {
            Some(PayloadType::of::<Vec<Chart>>())
        }

        async fn run(&self, raw_text: &str, ctx: RunContext) -> Result<ActionOutput, ActionError> {
            let charts: Vec<Chart> = extract_payload(raw_text)?;
            if charts.iter().any(|c| c.sql.is_empty()) {
                return Ok(self.core.complete(ActionOutput::failure("empty sql"), &ctx));
            }
            let content = charts
                .iter()
                .map(|c| c.kind.as_str())
                .collect::<Vec<_>>()
                .join(",");
            Ok(self.core.complete(ActionOutput::new(content), &ctx))
        }
    }

    fn chart_action() -> ChartAction {
        ChartAction {
            core: ActionCore::default().with_view_tag("vis-chart"),
        }
    }

    #[test]
    fn test_derive_action_name() {
        assert_eq!(derive_action_name("my_crate::actions::ChartAction"), "Chart");
        assert_eq!(derive_action_name("ToolACTION"), "Tool");
        assert_eq!(derive_action_name("crate::Planner"), "Planner");
        assert_eq!(derive_action_name("crate::Action"), "Action");
        assert_eq!(derive_action_name("crate::Wrap<crate::InnerAction>"), "Wrap");
    }

    #[test]
    fn test_name_prefers_explicit() {
        let mut action = chart_action();
        assert_eq!(action.name(), "Chart");
        action.core = action.core.clone().with_name("draw_chart");
        assert_eq!(action.name(), "draw_chart");
        assert_eq!(action.description(), "Render query results as a chart");
        assert_eq!(action.core().language(), "en");
    }

    #[test]
    fn test_schema_text_for_list_payload() {
        let action = chart_action();
        let text = action.output_schema_text().unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{
                "kind": "Chart type, e.g. line or bar",
                "sql": "SQL that produces the series"
            }])
        );
        let instructions = action.output_schema_instructions().unwrap().unwrap();
        assert!(instructions.contains(&text));
    }

    #[test]
    fn test_free_text_action_has_no_schema() {
        let action = BlankAction::new();
        assert!(action.output_schema_text().unwrap().is_none());
        assert!(action.output_schema_instructions().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_renders_and_stamps() {
        let mut action = chart_action();
        action.core_mut().init_action(Arc::new(FencedRenderer));
        action
            .core_mut()
            .init_resource(Some(Arc::new(NamedResource::new(ResourceType::Database, "sales"))));
        action
            .core_mut()
            .set_provenance(Some("show trend".into()), Some("user asked".into()));

        let output = action
            .run(r#"[{"kind": "line", "sql": "select 1"}]"#, RunContext::default())
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.content, "line");
        assert_eq!(output.intention.as_deref(), Some("show trend"));
        assert_eq!(output.resource_type.as_deref(), Some("database"));
        assert_eq!(output.resource_value, Some(serde_json::json!("sales")));
        assert!(output.view.unwrap().starts_with("```vis-chart\n"));
    }

    #[tokio::test]
    async fn test_run_without_render() {
        let mut action = chart_action();
        action.core_mut().init_action(Arc::new(FencedRenderer));
        let output = action
            .run(
                r#"[{"kind": "bar", "sql": "select 2"}]"#,
                RunContext::default().without_render(),
            )
            .await
            .unwrap();
        assert!(output.view.is_none());
    }

    #[tokio::test]
    async fn test_run_recoverable_failure() {
        let action = chart_action();
        let output = action
            .run(r#"[{"kind": "bar", "sql": ""}]"#, RunContext::default())
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.observations.as_deref(), Some("empty sql"));
    }

    #[tokio::test]
    async fn test_run_extraction_errors_propagate() {
        let action = chart_action();
        let err = action.run("I need more context.", RunContext::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::NoStructuredOutput));
        let err = action.run(r#"[{"kind": "bar"}]"#, RunContext::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn test_select_default_returns_default() {
        let action = chart_action();
        let default: Arc<dyn Action> = Arc::new(BlankAction::new());
        let chosen = action.select_default("anything", default.clone(), None).unwrap();
        assert!(Arc::ptr_eq(&chosen, &default));
    }

    #[test]
    fn test_render_requires_tag_and_renderer() {
        let output = ActionOutput::new("x");
        let mut core = ActionCore::default();
        core.init_action(Arc::new(FencedRenderer));
        assert!(core.render(&output).is_none());
        let core = ActionCore::default().with_view_tag("vis-text");
        assert!(core.render(&output).is_none());
        assert!(core.render_prompt().is_none());
    }
}
