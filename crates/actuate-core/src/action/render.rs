//! Renderers turn an action result into a presentation string.
//!
//! An action carries an optional view tag. When both a tag and a renderer are
//! bound, the renderer produces the `view` of each result; otherwise nothing
//! is rendered.

use crate::action::output::ActionOutput;

pub trait Renderer: Send + Sync {
    /// Presentation string for `output` under `tag`.
    fn render(&self, tag: &str, output: &ActionOutput) -> Option<String>;

    /// Prompt fragment that teaches the model about `tag`, if any.
    fn render_prompt(&self, _tag: &str) -> Option<String> {
        None
    }
}

/// Renders results as fenced blocks: `` ```<tag>\n<json>\n``` ``.
///
/// The JSON body is the model view when present, else the content.
#[derive(Debug, Default, Clone, Copy)]
pub struct FencedRenderer;

impl Renderer for FencedRenderer {
    fn render(&self, tag: &str, output: &ActionOutput) -> Option<String> {
        let body = serde_json::json!({
            "content": output.model_view.as_deref().unwrap_or(&output.content),
            "success": output.success,
        });
        let json = serde_json::to_string(&body).ok()?;
        Some(format!("```{}\n{}\n```", tag, json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_render() {
        let output = ActionOutput::new("42 rows");
        let view = FencedRenderer.render("vis-text", &output).unwrap();
        assert_eq!(view, "```vis-text\n{\"content\":\"42 rows\",\"success\":true}\n```");
        assert!(FencedRenderer.render_prompt("vis-text").is_none());
    }

    #[test]
    fn test_fenced_render_prefers_model_view() {
        let output = ActionOutput::failure("raw").with_model_view("summary");
        let view = FencedRenderer.render("vis-code", &output).unwrap();
        assert!(view.contains("\"content\":\"summary\""));
        assert!(view.contains("\"success\":false"));
    }
}
