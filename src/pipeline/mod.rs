//! Conversational response pipeline.
//!
//! A chat request flows through a fixed sequence of named stages, each a
//! function of the typed [`PipelineContext`](context::PipelineContext):
//! normalize -> compact -> format history -> (retrieve) -> answer ->
//! detect language -> localize. The orchestrator runs them in declared
//! order and short-circuits on the first failure; there is no partial
//! answer.

pub mod context;
pub mod orchestrator;
pub mod prompts;

pub use context::*;
pub use orchestrator::*;
pub use prompts::*;
