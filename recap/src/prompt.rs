//! Prompt composition for transcript summaries.

/// Instruction placed ahead of every transcript.
pub const SUMMARY_INSTRUCTION: &str = "Summarize the video transcript into bulletpoints, \
choose an appropriate emoji and keyword for each point, like the template:\n\n\
- Emoji ***Keyword*** Bulletpoint\n\n";

/// Compose the summary prompt for `transcript`.
pub fn summary_prompt(transcript: &str) -> String {
    let mut prompt = String::with_capacity(SUMMARY_INSTRUCTION.len() + transcript.len());
    prompt.push_str(SUMMARY_INSTRUCTION);
    prompt.push_str(transcript.trim());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt() {
        let prompt = summary_prompt("  we talk about rust\n");

        assert!(prompt.starts_with("Summarize the video transcript into bulletpoints"));
        assert!(prompt.contains("- Emoji ***Keyword*** Bulletpoint\n\nwe talk about rust"));
        assert!(prompt.ends_with("rust"));
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(summary_prompt(""), SUMMARY_INSTRUCTION);
    }
}
