//! Post-LLM output sanitization.
//!
//! Strips reasoning-model artifacts before an answer is normalized, so that
//! draft bullets inside a hidden reasoning block cannot leak into the record.
//! The unsanitized text is what gets stored as provenance.

use std::sync::LazyLock;

use regex::Regex;

/// Strip model-specific artifacts from raw LLM output.
///
/// Handles:
/// 1. Closed `<think>…</think>` reasoning blocks (DeepSeek-R1, Qwen3)
/// 2. Gemma-style thinking prefixes (`<unusedN>thought\n…`)
/// 3. Stray `<unusedN>` tokens
///
/// An unterminated `<think>` block is kept: dropping it would drop the whole answer.
pub fn sanitize_llm_output(raw: &str) -> String {
    static THINK_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));
    static THOUGHT_PREFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>thought\r?\n").expect("valid regex"));
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

    let mut text = THINK_BLOCK_RE.replace_all(raw, "").to_string();

    // Only a token immediately followed by "thought" opens a thinking prefix.
    if let Some(m) = THOUGHT_PREFIX_RE.find(&text) {
        text = text[m.end()..].to_string();
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();
    text = text.replace("<think>", "");

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_block() {
        let raw = "<think>\n- Vertigo: Yes (draft)\n</think>\nFinal answer:\n- Vertigo: No";
        assert_eq!(sanitize_llm_output(raw), "Final answer:\n- Vertigo: No");
    }

    #[test]
    fn strips_multiple_think_blocks_case_insensitive() {
        let raw = "<THINK>a</THINK>keep<think>b</think> this";
        assert_eq!(sanitize_llm_output(raw), "keep this");
    }

    #[test]
    fn unterminated_think_keeps_text() {
        let raw = "<think>\nreasoning cut off\n- Infection: No";
        assert_eq!(sanitize_llm_output(raw), "reasoning cut off\n- Infection: No");
    }

    #[test]
    fn strips_gemma_thinking_prefix() {
        let raw = "<unused94>thought\nLet me check the notes.\n- CSF Leak: No";
        assert_eq!(sanitize_llm_output(raw), "Let me check the notes.\n- CSF Leak: No");
    }

    #[test]
    fn stray_token_does_not_open_thinking_prefix() {
        let raw = "- Vertigo: Yes <unused3>\nThis is what I thought\n- Lacrimation: No";
        assert_eq!(
            sanitize_llm_output(raw),
            "- Vertigo: Yes \nThis is what I thought\n- Lacrimation: No"
        );
    }

    #[test]
    fn strips_unused_tokens() {
        let raw = "Some text <unused12> and more <unused0> end.";
        assert_eq!(sanitize_llm_output(raw), "Some text  and more  end.");
    }

    #[test]
    fn clean_text_unchanged() {
        let text = "- Vertigo: Yes\n- Lacrimation: No";
        assert_eq!(sanitize_llm_output(text), text);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_llm_output(""), "");
        assert_eq!(sanitize_llm_output("   \n\t  "), "");
    }
}
