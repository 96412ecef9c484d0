//! Prompt template registry.
//!
//! Stages (and the chat-name and blog generators) address templates by id
//! and supply named variables; `{variable}` slots are filled at render
//! time. Keeping the text here in one place keeps the stage code free of
//! prompt plumbing.

/// What the agent says when the answer is not determinable from the
/// available material. Localization leaves the meaning intact; tests pin
/// the English wording.
pub const FALLBACK_PHRASE: &str = "I don't have that information right now.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptId {
    Normalize,
    Compact,
    AnswerWithContext,
    AnswerWithoutContext,
    DetectLanguage,
    Localize,
    ChatName,
    BlogHeading,
    BlogSubheadings,
    BlogSection,
}

impl PromptId {
    pub fn template(self) -> &'static str {
        match self {
            PromptId::Normalize => {
                "Translate the following question into English if it is written in another \
                 language. If it is already English, only correct its punctuation and leave \
                 the content unchanged.\n\
                 question: {question}\n\
                 translated question:"
            }
            PromptId::Compact => {
                "Rewrite the following question as a compact search query that keeps every \
                 key term.\n\
                 question: {question}\n\
                 compact query:"
            }
            PromptId::AnswerWithContext => {
                "You are a friendly and enthusiastic AI agent who responds politely to both \
                 questions and casual conversation.\n\
                 If the user doesn't ask a question, provide a friendly, engaging response to \
                 keep the conversation going.\n\
                 If the user asks a question, try to find the answer in the provided context \
                 or the conversation history.\n\
                 If the information isn't available, politely say: \"I don't have that \
                 information right now.\"\n\
                 Introduce yourself by your name, but only if you have not already done so \
                 earlier in the conversation history.\n\
                 your name: {agent_name}\n\
                 context: {context}\n\
                 user instructions: {user_instructions}\n\
                 conversation history: {history}\n\
                 question: {question}\n\
                 answer:"
            }
            PromptId::AnswerWithoutContext => {
                "You are a friendly and enthusiastic AI agent who responds politely to both \
                 questions and casual conversation.\n\
                 If the user doesn't ask a question, provide a friendly, engaging response to \
                 keep the conversation going.\n\
                 If the user asks a question, try to find the answer in the conversation \
                 history.\n\
                 If the information isn't available, politely say: \"I don't have that \
                 information right now.\"\n\
                 Introduce yourself by your name, but only if you have not already done so \
                 earlier in the conversation history.\n\
                 your name: {agent_name}\n\
                 user instructions: {user_instructions}\n\
                 conversation history: {history}\n\
                 question: {question}\n\
                 answer:"
            }
            PromptId::DetectLanguage => {
                "Detect the language of the question given below. Reply with exactly one \
                 word, English or Japanese.\n\
                 question: {question}\n\
                 language:"
            }
            PromptId::Localize => {
                "If the language mentioned below is Japanese, translate the answer into \
                 Japanese, but never translate or alter your own name ({agent_name}), in \
                 whichever language it appears. If the language is English, output the \
                 answer exactly as it is.\n\
                 your name: {agent_name}\n\
                 language: {language}\n\
                 answer: {answer}\n\
                 translated answer:"
            }
            PromptId::ChatName => {
                "This is a chat between a human and an AI. Analyze the user input and the \
                 AI response and generate a short, suitable name for the chat. Reply with \
                 the name only.\n\
                 user input: {user}\n\
                 ai response: {ai}\n\
                 chat name:"
            }
            PromptId::BlogHeading => {
                "Given the user instructions about a blog the user wants to write, generate \
                 a proper blog heading. Reply with the heading only.\n\
                 user instructions: {instructions}\n\
                 blog heading:"
            }
            PromptId::BlogSubheadings => {
                "Given the user instructions about a blog and its heading, list the \
                 subheadings the blog should cover, one per line, with no extra text.\n\
                 user instructions: {instructions}\n\
                 blog heading: {heading}\n\
                 subheadings:"
            }
            PromptId::BlogSection => {
                "Given the user instructions about a blog, its heading and one subheading, \
                 write the content for that subheading in at least 500 words. Reply with \
                 the section content only.\n\
                 user instructions: {instructions}\n\
                 blog heading: {heading}\n\
                 subheading: {subheading}\n\
                 section content:"
            }
        }
    }

    /// Fill `{name}` slots with the given variables.
    pub fn render(self, variables: &[(&str, &str)]) -> String {
        let mut text = self.template().to_string();
        for (name, value) in variables {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_slots() {
        let prompt = PromptId::Normalize.render(&[("question", "what is rust")]);
        assert!(prompt.contains("question: what is rust"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_render_handles_multiple_slots() {
        let prompt = PromptId::Localize.render(&[
            ("agent_name", "Sales"),
            ("language", "Japanese"),
            ("answer", "Hello from Sales"),
        ]);
        assert!(prompt.contains("your name: Sales"));
        assert!(prompt.contains("language: Japanese"));
        assert!(prompt.contains("answer: Hello from Sales"));
    }

    #[test]
    fn test_answer_templates_differ_only_by_context() {
        let with = PromptId::AnswerWithContext.template();
        let without = PromptId::AnswerWithoutContext.template();
        assert!(with.contains("context: {context}"));
        assert!(!without.contains("{context}"));
    }

    #[test]
    fn test_fallback_phrase_is_pinned_in_templates() {
        assert!(PromptId::AnswerWithContext.template().contains(FALLBACK_PHRASE));
        assert!(PromptId::AnswerWithoutContext.template().contains(FALLBACK_PHRASE));
    }
}
