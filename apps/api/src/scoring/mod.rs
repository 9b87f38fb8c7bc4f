// Resume scoring pipeline.
// Implements: prompt assembly, stage 1 extraction, stage 2 scoring, reply parsing, orchestration.
// All model calls go through the llm_client::ModelGateway trait.

pub mod engine;
pub mod extractor;
pub mod handlers;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod schema;
