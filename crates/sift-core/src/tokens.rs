/// Approximate characters per token for English prose and code.
pub const CHARS_PER_TOKEN: usize = 4;

/// Rough token estimate used for logging and budgeting, never for splitting.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
