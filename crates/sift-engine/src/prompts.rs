//! Prompt text for each kind of model call.

/// System prompt used when the caller does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You analyze long content one part at a time. \
Answer only from the content you are shown and the notes carried from earlier parts. \
Be concise and keep concrete facts, names and numbers.";

/// Task used when the caller does not state one.
pub const DEFAULT_TASK: &str = "Analyze the content and extract the relevant information.";

/// The caller's task, or [`DEFAULT_TASK`] when it is blank.
pub fn effective_task(task: &str) -> &str {
    let task = task.trim();
    if task.is_empty() {
        DEFAULT_TASK
    } else {
        task
    }
}

/// Prompt for chunk `index` of `total`. The carried summary is omitted for the
/// first chunk and whenever it is empty.
pub fn chunk_prompt(index: usize, total: usize, task: &str, summary: &str, chunk: &str) -> String {
    let mut prompt = format!("You are reading part {} of {}.\n\nTask: {}\n\n", index + 1, total, task);
    if index > 0 && !summary.is_empty() {
        prompt.push_str("Notes from earlier parts:\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Content of this part:\n");
    prompt.push_str(chunk);
    prompt.push_str(
        "\n\nExtract what in this part is relevant to the task. \
         Do not repeat the earlier notes.",
    );
    prompt
}

/// Ask the model to condense the running notes to at most `limit` characters.
pub fn compaction_prompt(task: &str, summary: &str, limit: usize) -> String {
    format!(
        "Task: {task}\n\nThe notes below were collected while reading a long document in parts. \
         Rewrite them as one condensed set of notes of at most {limit} characters. \
         Keep every fact that matters for the task; drop repetition.\n\nNotes:\n{summary}"
    )
}

/// The consolidation call: notes, the final part and the model's first pass
/// over it, combined into one answer.
pub fn synthesis_prompt(
    task: &str,
    summary: &str,
    final_chunk: &str,
    final_partial: Option<&str>,
) -> String {
    let mut prompt = format!("Task: {task}\n\n");
    if !summary.is_empty() {
        prompt.push_str("Notes from the earlier parts of the content:\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Final part of the content:\n");
    prompt.push_str(final_chunk);
    prompt.push_str("\n\n");
    if let Some(partial) = final_partial {
        prompt.push_str("Your first reading of the final part:\n");
        prompt.push_str(partial);
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "Combine everything above into one coherent answer to the task. \
         Do not describe the parts or the reading process; answer directly.",
    );
    prompt
}

/// Prompt for content small enough to send whole.
pub fn single_shot_prompt(task: &str, content: &str) -> String {
    format!("Task: {task}\n\nContent:\n{content}")
}
