// Typed pipeline state threaded through the stages, plus the small value
// types the stages exchange.

use crate::knowledge::ScoredChunk;

/// One prior exchange in a chat, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub human: String,
    pub agent: String,
}

/// Languages the localizer distinguishes. The working language of the
/// pipeline is English; anything else gets the answer translated back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Japanese,
}

impl Language {
    /// Parse the detector's free-text label, defaulting to English.
    pub fn parse(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("japanese") || label.contains("日本語") {
            Language::Japanese
        } else {
            Language::English
        }
    }

    /// The canonical working language needs no localization pass.
    pub fn is_canonical(self) -> bool {
        self == Language::English
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Japanese => "Japanese",
        }
    }
}

/// State accumulated across the stage graph. Stages only ever read fields
/// filled by earlier stages and write their own; the orchestrator owns the
/// order.
#[derive(Debug)]
pub struct PipelineContext {
    /// Raw user input, untouched; language detection runs on this.
    pub raw_question: String,
    pub agent_name: String,
    /// The agent's persona / free-form user instructions.
    pub user_instructions: String,
    /// Stage 1 output: English, punctuation-corrected.
    pub normalized_question: Option<String>,
    /// Stage 2 output: retrieval query form.
    pub compact_query: Option<String>,
    /// Stage 3 output: rendered transcript, empty for a first turn.
    pub transcript: String,
    /// Stage 4 output; `None` when the agent has no knowledge store (the
    /// branch is skipped entirely, not given an empty block).
    pub context_block: Option<String>,
    /// Stage 5 output: the English answer.
    pub answer: Option<String>,
    /// Stage 6 output.
    pub detected_language: Option<Language>,
}

impl PipelineContext {
    pub fn new(raw_question: &str, agent_name: &str, user_instructions: &str) -> Self {
        Self {
            raw_question: raw_question.to_string(),
            agent_name: agent_name.to_string(),
            user_instructions: user_instructions.to_string(),
            normalized_question: None,
            compact_query: None,
            transcript: String::new(),
            context_block: None,
            answer: None,
            detected_language: None,
        }
    }
}

/// Render prior turns as an alternating transcript; the empty string for a
/// first turn.
pub fn format_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("Human: {}\nAI: {}", turn.human, turn.agent))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Concatenate retrieved chunks, ranked order preserved, into the single
/// context block the answer prompt receives.
pub fn combine_chunks(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_renders_empty_transcript() {
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn test_transcript_alternates_roles() {
        let turns = vec![
            Turn {
                human: "Hi".to_string(),
                agent: "Hello, I'm Sales!".to_string(),
            },
            Turn {
                human: "What do you sell?".to_string(),
                agent: "Widgets.".to_string(),
            },
        ];
        assert_eq!(
            format_transcript(&turns),
            "Human: Hi\nAI: Hello, I'm Sales!\n\nHuman: What do you sell?\nAI: Widgets."
        );
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("English"), Language::English);
        assert_eq!(Language::parse("  japanese\n"), Language::Japanese);
        assert_eq!(Language::parse("日本語"), Language::Japanese);
        // Unknown labels fall back to the canonical language
        assert_eq!(Language::parse("French"), Language::English);
    }

    #[test]
    fn test_combine_chunks_keeps_rank_order() {
        let chunks = vec![
            ScoredChunk {
                content: "first".to_string(),
                metadata: serde_json::json!({}),
                similarity: 0.9,
            },
            ScoredChunk {
                content: "second".to_string(),
                metadata: serde_json::json!({}),
                similarity: 0.7,
            },
        ];
        assert_eq!(combine_chunks(&chunks), "first\n\nsecond");
    }
}
