use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};

pub const ANSWER_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Placeholders: `{grounding_instruction}`, `{context_block}`, `{question}`.
pub const ANSWER_PROMPT_TEMPLATE: &str = r#"You are filling in a job application on behalf of an applicant.
Answer the application question below the way the applicant would: first person,
concise (at most three sentences), no greetings or sign-offs. For yes/no or
multiple-choice questions answer with the bare choice only (for example "Yes").

{grounding_instruction}

{context_block}

Question: {question}

Return exactly this JSON shape:
{
  "answer": "<the text to put in the form>",
  "confidence": <number between 0 and 1>,
  "reasoning": "<one sentence on why this answer fits>"
}"#;

pub fn build_answer_prompt(question: &str, applicant_context: Option<&str>) -> String {
    let context_block = match applicant_context.map(str::trim) {
        Some(context) if !context.is_empty() => format!("Applicant context:\n{context}"),
        _ => "No applicant context was provided.".to_string(),
    };

    ANSWER_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{context_block}", &context_block)
        .replace("{question}", question)
}
