//! BlankAction: passes the model reply through as the result.

use async_trait::async_trait;

use crate::action::{Action, ActionCore, ActionOutput, RunContext};
use crate::error::ActionError;

/// Plain-text reply with no structured payload.
///
/// Used when an agent only talks: the reply becomes the content, and an empty
/// reply is reported as a recoverable failure.
#[derive(Debug, Clone, Default)]
pub struct BlankAction {
    core: ActionCore,
}

impl BlankAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core(core: ActionCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Action for BlankAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    fn description(&self) -> &str {
        "Reply directly in natural language without calling any tool"
    }

    async fn run(&self, raw_text: &str, ctx: RunContext) -> Result<ActionOutput, ActionError> {
        let reply = raw_text.trim();
        let output = if reply.is_empty() {
            tracing::debug!("[Action:{}] empty reply", self.name());
            ActionOutput::failure("The reply was empty")
        } else {
            ActionOutput::new(reply).with_model_view(reply)
        };
        Ok(self.core.complete(output, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_passes_text_through() {
        let action = BlankAction::new();
        let output = action.run("  The disk is full.  ", RunContext::default()).await.unwrap();
        assert!(output.success);
        assert_eq!(output.content, "The disk is full.");
        assert_eq!(action.name(), "Blank");
    }

    #[tokio::test]
    async fn test_blank_empty_reply_is_recoverable() {
        let output = BlankAction::new().run("   ", RunContext::default()).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.observations.as_deref(), Some("The reply was empty"));
    }
}
