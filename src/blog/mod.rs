//! Blog generation.
//!
//! Same prompt-chaining pattern as the chat pipeline: heading from the
//! instructions, subheadings from the heading, then one content section
//! per subheading. Sections are independent, so they fan out concurrently
//! behind a bounded worker pool; results come back in subheading order.

use crate::llm::TextGenerator;
use crate::pipeline::PromptId;
use crate::types::{AppError, AppResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, serde::Serialize)]
pub struct BlogSection {
    pub subheading: String,
    pub content: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BlogPost {
    pub heading: String,
    pub sections: Vec<BlogSection>,
}

pub struct BlogGenerator {
    generator: Arc<dyn TextGenerator>,
    concurrency: usize,
}

impl BlogGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn generate(&self, instructions: &str) -> AppResult<BlogPost> {
        if instructions.trim().is_empty() {
            return Err(AppError::Validation(
                "no blog instructions supplied".to_string(),
            ));
        }

        let heading_prompt = PromptId::BlogHeading.render(&[("instructions", instructions)]);
        let heading = self.generator.generate(&heading_prompt).await?;

        let subheadings_prompt = PromptId::BlogSubheadings
            .render(&[("instructions", instructions), ("heading", &heading)]);
        let raw_subheadings = self.generator.generate(&subheadings_prompt).await?;
        let subheadings = parse_subheadings(&raw_subheadings);
        if subheadings.is_empty() {
            return Err(AppError::external("llm", "no subheadings generated"));
        }

        let sections: Vec<BlogSection> = stream::iter(subheadings)
            .map(|subheading| self.section(instructions, &heading, subheading))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        info!(
            heading = %heading,
            sections = sections.len(),
            "Generated blog post"
        );
        Ok(BlogPost { heading, sections })
    }

    async fn section(
        &self,
        instructions: &str,
        heading: &str,
        subheading: String,
    ) -> AppResult<BlogSection> {
        let prompt = PromptId::BlogSection.render(&[
            ("instructions", instructions),
            ("heading", heading),
            ("subheading", &subheading),
        ]);
        let content = self.generator.generate(&prompt).await?;
        Ok(BlogSection {
            subheading,
            content,
        })
    }
}

/// One subheading per line, with list markers and numbering stripped.
fn parse_subheadings(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AppError::Internal("script exhausted".to_string()))
        }
    }

    #[test]
    fn test_parse_subheadings_strips_markers() {
        let parsed = parse_subheadings("1. Intro\n- Body\n* Extras\n\n2) Closing\n");
        assert_eq!(parsed, vec!["Intro", "Body", "Extras", "Closing"]);
    }

    #[tokio::test]
    async fn test_sections_come_back_in_order() {
        let generator = ScriptedGenerator::new(&[
            "Rust for Web",
            "Intro\nMiddle\nEnd",
            "intro text",
            "middle text",
            "end text",
        ]);
        let blog = BlogGenerator::new(generator, 2);

        let post = blog.generate("write about rust on the web").await.unwrap();

        assert_eq!(post.heading, "Rust for Web");
        let subheadings: Vec<&str> = post
            .sections
            .iter()
            .map(|s| s.subheading.as_str())
            .collect();
        assert_eq!(subheadings, vec!["Intro", "Middle", "End"]);
    }

    #[tokio::test]
    async fn test_empty_instructions_rejected() {
        let generator = ScriptedGenerator::new(&[]);
        let blog = BlogGenerator::new(generator, 2);
        let error = blog.generate("  ").await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }
}
