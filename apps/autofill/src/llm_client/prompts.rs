// Cross-cutting prompt fragments. Each caller keeps its own prompts.rs
// alongside it and pulls shared pieces from here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps generated answers to what the applicant context supports.
pub const GROUNDING_INSTRUCTION: &str = "\
    Answer only from the applicant context when one is provided. \
    Do NOT invent employers, dates, degrees, certifications or numbers. \
    If the context does not support an answer, say so briefly and lower your confidence.";
