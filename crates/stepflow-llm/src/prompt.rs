//! Prompt assembly for each provider's request shape.
//!
//! OpenAI and Cohere take the context in a system message; Gemini takes a
//! single user prompt with the context inlined above the question.

const DEFAULT_SYSTEM: &str = "You are a helpful assistant.";

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Instruction line followed by the context block, one part per line. The
/// context part starts with its own newline, leaving a blank line between.
fn instruction_with_context(custom_prompt: Option<&str>, context_part: Option<String>) -> String {
    let mut parts = vec![present(custom_prompt).unwrap_or(DEFAULT_SYSTEM).to_string()];
    parts.extend(context_part);
    parts.join("\n")
}

pub fn openai_system_prompt(custom_prompt: Option<&str>, context: Option<&str>) -> String {
    instruction_with_context(
        custom_prompt,
        present(context).map(|c| {
            format!(
                "\nUse the following context to answer the question. Answer based on this context:\n\n{}",
                c
            )
        }),
    )
}

pub fn cohere_preamble(custom_prompt: Option<&str>, context: Option<&str>) -> String {
    instruction_with_context(
        custom_prompt,
        present(context)
            .map(|c| format!("\nUse the following context to answer questions:\n\n{}", c)),
    )
}

/// Gemini takes one user prompt: optional instruction, optional context
/// block, then the question.
pub fn gemini_prompt(custom_prompt: Option<&str>, context: Option<&str>, query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(present(custom_prompt).map(str::to_string));
    parts.extend(present(context).map(|c| format!("\nContext to use for answering:\n{}\n", c)));
    parts.push(format!(
        "Question: {}\n\nAnswer based on the context above:",
        query
    ));
    parts.join("\n")
}
