//! Pipeline orchestrator.
//!
//! `respond` turns one raw user message into a grounded, language-consistent
//! answer. Stage order is fixed by data dependencies:
//!
//! 1. Normalize    - translate to English / correct punctuation
//! 2. Compact      - rewrite as a retrieval query (always runs)
//! 3. History      - render prior turns as a transcript
//! 4. Retrieve     - only when the agent has a knowledge store
//! 5. Answer       - grounded generation in the working language
//! 6. Detect       - language of the original raw input
//! 7. Localize     - translate back unless already English
//!
//! Any stage error propagates immediately; callers never see a partial
//! answer.

use crate::knowledge::{Retriever, DEFAULT_TOP_K};
use crate::llm::TextGenerator;
use crate::pipeline::context::{combine_chunks, format_transcript, Language, PipelineContext, Turn};
use crate::pipeline::prompts::PromptId;
use crate::types::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RespondRequest<'a> {
    pub user_input: &'a str,
    pub agent_name: &'a str,
    /// Persona / free-form instructions stored on the agent.
    pub agent_context: &'a str,
    pub prior_turns: &'a [Turn],
    /// Present iff the agent has a provisioned knowledge store.
    pub retriever: Option<&'a dyn Retriever>,
}

pub struct ChatPipeline {
    generator: Arc<dyn TextGenerator>,
}

impl ChatPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn respond(&self, request: RespondRequest<'_>) -> AppResult<String> {
        if request.user_input.trim().is_empty() {
            return Err(AppError::Validation("no input from user".to_string()));
        }

        info!(
            agent = request.agent_name,
            prior_turns = request.prior_turns.len(),
            has_store = request.retriever.is_some(),
            "Running response pipeline"
        );

        let mut ctx =
            PipelineContext::new(request.user_input, request.agent_name, request.agent_context);

        ctx.normalized_question = Some(self.normalize(&ctx).await?);
        ctx.compact_query = Some(self.compact(&ctx).await?);
        ctx.transcript = format_transcript(request.prior_turns);
        if let Some(retriever) = request.retriever {
            ctx.context_block = Some(self.retrieve_context(retriever, &ctx).await?);
        }
        ctx.answer = Some(self.answer(&ctx).await?);
        ctx.detected_language = Some(self.detect_language(&ctx).await?);
        self.localize(&ctx).await
    }

    /// Stage 1: canonical working-language form of the question. English
    /// input only gets punctuation fixed.
    async fn normalize(&self, ctx: &PipelineContext) -> AppResult<String> {
        let prompt = PromptId::Normalize.render(&[("question", &ctx.raw_question)]);
        let normalized = self.generator.generate(&prompt).await?;
        debug!(stage = "normalize", "Stage complete");
        Ok(normalized)
    }

    /// Stage 2: compact retrieval-query form. Runs whether or not the
    /// retrieval branch will consume it, keeping the stage graph uniform.
    async fn compact(&self, ctx: &PipelineContext) -> AppResult<String> {
        let normalized = ctx
            .normalized_question
            .as_deref()
            .ok_or_else(|| AppError::Internal("compact ran before normalize".to_string()))?;
        let prompt = PromptId::Compact.render(&[("question", normalized)]);
        let compact = self.generator.generate(&prompt).await?;
        debug!(stage = "compact", "Stage complete");
        Ok(compact)
    }

    /// Stage 4 (branch): ranked chunks for the compacted query, joined into
    /// one context block.
    async fn retrieve_context(
        &self,
        retriever: &dyn Retriever,
        ctx: &PipelineContext,
    ) -> AppResult<String> {
        let query = ctx
            .compact_query
            .as_deref()
            .ok_or_else(|| AppError::Internal("retrieve ran before compact".to_string()))?;
        let chunks = retriever.retrieve(query, DEFAULT_TOP_K).await?;
        debug!(stage = "retrieve", hits = chunks.len(), "Stage complete");
        Ok(combine_chunks(&chunks))
    }

    /// Stage 5: the grounded answer, in the working language. The template
    /// with a context slot is only used when the retrieval branch ran.
    async fn answer(&self, ctx: &PipelineContext) -> AppResult<String> {
        let question = ctx
            .normalized_question
            .as_deref()
            .ok_or_else(|| AppError::Internal("answer ran before normalize".to_string()))?;

        let prompt = match &ctx.context_block {
            Some(context) => PromptId::AnswerWithContext.render(&[
                ("agent_name", &ctx.agent_name),
                ("context", context),
                ("user_instructions", &ctx.user_instructions),
                ("history", &ctx.transcript),
                ("question", question),
            ]),
            None => PromptId::AnswerWithoutContext.render(&[
                ("agent_name", &ctx.agent_name),
                ("user_instructions", &ctx.user_instructions),
                ("history", &ctx.transcript),
                ("question", question),
            ]),
        };

        let answer = self.generator.generate(&prompt).await?;
        debug!(stage = "answer", "Stage complete");
        Ok(answer)
    }

    /// Stage 6: language of the raw input, not the normalized form.
    async fn detect_language(&self, ctx: &PipelineContext) -> AppResult<Language> {
        let prompt = PromptId::DetectLanguage.render(&[("question", &ctx.raw_question)]);
        let label = self.generator.generate(&prompt).await?;
        let language = Language::parse(&label);
        debug!(stage = "detect_language", language = language.as_str(), "Stage complete");
        Ok(language)
    }

    /// Stage 7: translate the answer back into the user's language. The
    /// canonical language passes through without a generation call, and the
    /// agent's name is never translated.
    async fn localize(&self, ctx: &PipelineContext) -> AppResult<String> {
        let answer = ctx
            .answer
            .as_deref()
            .ok_or_else(|| AppError::Internal("localize ran before answer".to_string()))?;
        let language = ctx
            .detected_language
            .ok_or_else(|| AppError::Internal("localize ran before detect".to_string()))?;

        if language.is_canonical() {
            debug!(stage = "localize", "Canonical language, passing through");
            return Ok(answer.to_string());
        }

        let prompt = PromptId::Localize.render(&[
            ("agent_name", &ctx.agent_name),
            ("language", language.as_str()),
            ("answer", answer),
        ]);
        let localized = self.generator.generate(&prompt).await?;
        debug!(stage = "localize", "Stage complete");
        Ok(localized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ScoredChunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Generator that replays scripted responses and records every prompt.
    struct ScriptedGenerator {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> AppResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AppError::Internal("script exhausted".to_string()))
        }
    }

    struct CountingRetriever {
        calls: AtomicUsize,
        chunks: Vec<ScoredChunk>,
    }

    impl CountingRetriever {
        fn with_chunk(content: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                chunks: vec![ScoredChunk {
                    content: content.to_string(),
                    metadata: serde_json::json!({}),
                    similarity: 0.92,
                }],
            }
        }
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> AppResult<Vec<ScoredChunk>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.chunks.clone())
        }
    }

    fn request<'a>(
        user_input: &'a str,
        prior_turns: &'a [Turn],
        retriever: Option<&'a dyn Retriever>,
    ) -> RespondRequest<'a> {
        RespondRequest {
            user_input,
            agent_name: "Sales",
            agent_context: "You are a sales assistant",
            prior_turns,
            retriever,
        }
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_any_stage() {
        let generator = ScriptedGenerator::new(&[]);
        let pipeline = ChatPipeline::new(generator.clone());

        let error = pipeline.respond(request("   ", &[], None)).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_first_turn_without_store_makes_no_retrieval_call() {
        // normalize, compact, answer, detect; English detection skips localize
        let generator =
            ScriptedGenerator::new(&["Hi", "greeting", "Hello! I'm Sales.", "English"]);
        let pipeline = ChatPipeline::new(generator.clone());

        let answer = pipeline.respond(request("Hi", &[], None)).await.unwrap();

        assert_eq!(answer, "Hello! I'm Sales.");
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 4);
        // answer prompt has no context section and an empty history
        assert!(!prompts[2].contains("context:"));
        assert!(prompts[2].contains("conversation history: \n"));
        assert!(prompts[2].contains("your name: Sales"));
    }

    #[tokio::test]
    async fn test_retrieved_chunk_reaches_answer_prompt() {
        let generator = ScriptedGenerator::new(&[
            "What is your return policy?",
            "return policy",
            "Our return policy is 30 days.",
            "English",
        ]);
        let retriever = CountingRetriever::with_chunk("Our return policy is 30 days");
        let pipeline = ChatPipeline::new(generator.clone());

        let answer = pipeline
            .respond(request("What is your return policy?", &[], Some(&retriever)))
            .await
            .unwrap();

        assert_eq!(answer, "Our return policy is 30 days.");
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        let prompts = generator.prompts();
        assert!(prompts[2].contains("context: Our return policy is 30 days"));
    }

    #[tokio::test]
    async fn test_compact_runs_even_without_retrieval() {
        let generator = ScriptedGenerator::new(&["normalized", "compacted", "answer", "English"]);
        let pipeline = ChatPipeline::new(generator.clone());

        pipeline.respond(request("Hi there", &[], None)).await.unwrap();

        let prompts = generator.prompts();
        assert!(prompts[1].contains("compact search query"));
        assert!(prompts[1].contains("question: normalized"));
    }

    #[tokio::test]
    async fn test_japanese_input_localizes_answer() {
        let generator = ScriptedGenerator::new(&[
            "What are your opening hours?",
            "opening hours",
            "We open at 9am. I'm Sales!",
            "Japanese",
            "午前9時に開店します。I'm Sales!",
        ]);
        let pipeline = ChatPipeline::new(generator.clone());

        let answer = pipeline
            .respond(request("営業時間は何時からですか", &[], None))
            .await
            .unwrap();

        assert_eq!(answer, "午前9時に開店します。I'm Sales!");
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 5);
        // detection looks at the raw input, not the normalized question
        assert!(prompts[3].contains("営業時間は何時からですか"));
        // the localize prompt pins the agent name
        assert!(prompts[4].contains("your name: Sales"));
        assert!(prompts[4].contains("answer: We open at 9am. I'm Sales!"));
    }

    #[tokio::test]
    async fn test_english_detection_skips_localize_call() {
        let generator = ScriptedGenerator::new(&["n", "c", "the answer", "English"]);
        let pipeline = ChatPipeline::new(generator.clone());

        let answer = pipeline.respond(request("hello", &[], None)).await.unwrap();

        assert_eq!(answer, "the answer");
        // exactly four generation calls: normalize, compact, answer, detect
        assert_eq!(generator.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_history_reaches_answer_prompt() {
        let generator = ScriptedGenerator::new(&["n", "c", "a", "English"]);
        let pipeline = ChatPipeline::new(generator.clone());
        let turns = vec![Turn {
            human: "Hi".to_string(),
            agent: "Hello, I'm Sales!".to_string(),
        }];

        pipeline
            .respond(request("What next?", &turns, None))
            .await
            .unwrap();

        let prompts = generator.prompts();
        assert!(prompts[2].contains("Human: Hi\nAI: Hello, I'm Sales!"));
    }

    #[tokio::test]
    async fn test_stage_failure_propagates_without_partial_answer() {
        // Script runs dry after compact, so the answer stage fails.
        let generator = ScriptedGenerator::new(&["n", "c"]);
        let pipeline = ChatPipeline::new(generator.clone());

        let error = pipeline.respond(request("hello", &[], None)).await.unwrap_err();
        assert!(matches!(error, AppError::Internal(_)));
    }
}
