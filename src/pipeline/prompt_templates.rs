//! Clinical query template shared by every task and provider.
//!
//! The task preamble travels only as the system instruction. The prompt wraps
//! the case context in `<context>` tags, followed by the answering rules and
//! the task query.

use super::taxonomy::TaskDefinition;

const ANSWERING_RULES: &str = "When answering the user:\n\
- If you don't know, just say that you don't know.\n\
- If the context doesn't give you the information asked for, say so.\n\
Avoid mentioning that you obtained the information from the context.\n\
Always strictly stand by the information given in the context.";

/// A fully rendered request: system instruction plus context-bearing prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub prompt: String,
}

/// Render the query for one case.
pub fn build_query(context: &str, instructions: &str) -> String {
    format!(
        "Use the following context as your learned knowledge, inside \
<context></context> XML tags.\n<context>\n{context}\n</context>\n\n{ANSWERING_RULES}\n\n\
Given the context information, answer the query.\nQuery: {instructions}"
    )
}

pub fn render_for_task(task: &TaskDefinition, context: &str) -> RenderedPrompt {
    RenderedPrompt {
        system: task.preamble.clone(),
        prompt: build_query(context, &task.instructions),
    }
}
