//! DocAssist Answer Pipeline
//!
//! The staged question-answering flow
//! (plan → retrieve → reason → validate → respond) and the confidence
//! assessor it uses. Consumes the vector store and completion service
//! through the abstractions in `docassist-common`.

pub mod confidence;
pub mod pipeline;

pub use confidence::{assess_confidence, HEDGING_PHRASES};
pub use pipeline::{AgentPipeline, PipelineOptions, NO_INFO_PHRASES};
