//! Agent answer pipeline
//!
//! Orchestrates one question through five strictly ordered stages:
//! 1. Planner: injection gate, knowledge-base and question sanity checks
//! 2. Retriever: vector search (failures degrade to zero results)
//! 3. Reasoner: grounded draft answer from the completion service
//! 4. Validator: grounding and safety checks on the draft
//! 5. Responder: final answer with citations
//!
//! Every failure path terminates in a well-formed `PipelineResult`; the
//! pipeline itself never returns an error.

use crate::confidence::assess_confidence;
use docassist_common::models::{
    AnswerStyle, Citation, Confidence, PipelineResult, RetrievedChunk,
};
use docassist_common::providers::CompletionModel;
use docassist_common::safety::InjectionDetector;
use docassist_common::store::VectorStore;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Questions shorter than this (trimmed) are rejected as too vague.
const MIN_QUESTION_CHARS: usize = 10;

/// Draft answers shorter than this are rejected unless they are an
/// explicit "no information" statement.
const MIN_ANSWER_CHARS: usize = 20;

/// Per-chunk character budget when assembling the reasoning context.
const CONTEXT_CHARS_PER_CHUNK: usize = 500;

/// Phrases that mark a legitimate "nothing found" answer, which may be
/// short without being a degenerate completion.
pub const NO_INFO_PHRASES: &[&str] = &[
    "do not contain",
    "don't contain",
    "no information",
    "cannot answer",
    "not found in",
];

const INJECTION_REFUSAL: &str =
    "I cannot process this question as it contains potentially unsafe patterns.";
const EMPTY_KB_MESSAGE: &str =
    "No documents have been uploaded yet. Please upload documents before asking questions.";
const VAGUE_QUESTION_MESSAGE: &str =
    "Your question seems too short. Could you provide more details?";
const NO_RESULTS_MESSAGE: &str =
    "I don't have any documents to answer this question. Please upload relevant documents first.";
const ANSWER_TOO_SHORT_FALLBACK: &str =
    "I couldn't generate a proper answer. Could you rephrase your question?";
const LLM_ERROR_FALLBACK: &str = "I encountered a technical issue. Please try again.";
const REASONER_APOLOGY: &str = "I encountered an error while processing your question.";

/// Planner decision: continue into retrieval, or stop with a fixed
/// refusal.
enum PlanOutcome {
    Proceed,
    ShortCircuit {
        message: &'static str,
        safety_flags: Vec<String>,
    },
}

/// Reasoner output: the draft answer, with any generation failure
/// captured instead of propagated.
struct Draft {
    answer: String,
    generation_error: Option<String>,
}

/// Validator decision over a draft.
enum Verdict {
    Accepted {
        confidence: Confidence,
        safety_flags: Vec<String>,
    },
    Rejected {
        fallback: &'static str,
        safety_flags: Vec<String>,
        reason: &'static str,
    },
}

/// Generation options for the Reasoner stage.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bound on generated answer length, in tokens.
    pub max_answer_tokens: usize,
    /// Sampling temperature; low favors grounded, deterministic output.
    pub temperature: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_answer_tokens: 500,
            temperature: 0.3,
        }
    }
}

/// The question-answering pipeline.
///
/// Stateless over its inputs: holds only shared handles to the two
/// external services and the compiled injection pattern table, so one
/// instance can serve concurrent questions.
pub struct AgentPipeline {
    store: Arc<dyn VectorStore>,
    completion: Arc<dyn CompletionModel>,
    detector: InjectionDetector,
    options: PipelineOptions,
}

impl AgentPipeline {
    pub fn new(store: Arc<dyn VectorStore>, completion: Arc<dyn CompletionModel>) -> Self {
        Self::with_options(store, completion, PipelineOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn VectorStore>,
        completion: Arc<dyn CompletionModel>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            completion,
            detector: InjectionDetector::new(),
            options,
        }
    }

    /// Process a question through the full pipeline.
    #[instrument(skip(self, question), fields(top_k = top_k))]
    pub async fn process_question(
        &self,
        question: &str,
        top_k: usize,
        style: AnswerStyle,
    ) -> PipelineResult {
        info!(question_chars = question.chars().count(), "Processing question");

        // 1. Planner
        if let PlanOutcome::ShortCircuit {
            message,
            safety_flags,
        } = self.plan(question).await
        {
            return short_circuit(message.to_string(), safety_flags, "No retrieval needed");
        }

        // 2. Retriever
        let chunks = self.retrieve(question, top_k).await;
        if chunks.is_empty() {
            return short_circuit(
                NO_RESULTS_MESSAGE.to_string(),
                Vec::new(),
                "No chunks retrieved",
            );
        }

        // 3. Reasoner
        let draft = self.reason(question, &chunks, style).await;

        // 4. Validator
        match self.validate(&draft, &chunks) {
            Verdict::Rejected {
                fallback,
                safety_flags,
                reason,
            } => short_circuit(fallback.to_string(), safety_flags, reason),
            // 5. Responder
            Verdict::Accepted {
                confidence,
                safety_flags,
            } => respond(draft, &chunks, confidence, safety_flags),
        }
    }

    /// Planner: decides whether retrieval should run at all.
    async fn plan(&self, question: &str) -> PlanOutcome {
        let scan = self.detector.detect(question);
        if scan.flagged {
            warn!(patterns = ?scan.matched, "Potential prompt injection detected");
            return PlanOutcome::ShortCircuit {
                message: INJECTION_REFUSAL,
                safety_flags: vec!["prompt_injection".to_string()],
            };
        }

        let total_chunks = match self.store.stats().await {
            Ok(stats) => stats.total_chunks,
            Err(e) => {
                warn!(error = %e, "Stats lookup failed, treating knowledge base as empty");
                0
            }
        };
        if total_chunks == 0 {
            return PlanOutcome::ShortCircuit {
                message: EMPTY_KB_MESSAGE,
                safety_flags: vec!["empty_knowledge_base".to_string()],
            };
        }

        if question.trim().chars().count() < MIN_QUESTION_CHARS {
            return PlanOutcome::ShortCircuit {
                message: VAGUE_QUESTION_MESSAGE,
                safety_flags: vec!["vague_question".to_string()],
            };
        }

        PlanOutcome::Proceed
    }

    /// Retriever: vector search, degrading any failure to zero results.
    async fn retrieve(&self, question: &str, top_k: usize) -> Vec<RetrievedChunk> {
        match self.store.search(question, top_k).await {
            Ok(chunks) => {
                info!(retrieved = chunks.len(), "Retrieved chunks");
                chunks
            }
            Err(e) => {
                error!(error = %e, "Retrieval error");
                Vec::new()
            }
        }
    }

    /// Reasoner: synthesize a draft answer from the retrieved context.
    async fn reason(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        style: AnswerStyle,
    ) -> Draft {
        let context = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let excerpt: String = chunk.text.chars().take(CONTEXT_CHARS_PER_CHUNK).collect();
                format!("[Source {}] {}", i + 1, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "You are a helpful assistant answering questions based only on the provided document context.\n\
             \n\
             Question: {question}\n\
             \n\
             Context from documents:\n\
             {context}\n\
             \n\
             Instructions:\n\
             - Answer ONLY based on the provided context\n\
             - {style_instruction}\n\
             - If the context doesn't contain the answer, say \"The provided documents do not contain information about this.\"\n\
             - Cite which source(s) support each claim using [Source N] notation\n\
             \n\
             Answer:",
            question = question,
            context = context,
            style_instruction = style.instruction(),
        );

        match self
            .completion
            .generate(&prompt, self.options.max_answer_tokens, self.options.temperature)
            .await
        {
            Ok(answer) => {
                info!("Reasoner generated draft answer");
                Draft {
                    answer,
                    generation_error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Reasoner error");
                Draft {
                    answer: REASONER_APOLOGY.to_string(),
                    generation_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Validator: grounding and safety checks over the draft answer.
    fn validate(&self, draft: &Draft, chunks: &[RetrievedChunk]) -> Verdict {
        let mut safety_flags = Vec::new();

        // Retrieved context is attacker-adjacent; scan each chunk.
        for chunk in chunks {
            if self.detector.detect(&chunk.text).flagged {
                safety_flags.push("injection_in_context".to_string());
            }
        }

        let answer = draft.answer.trim();
        let answer_lower = answer.to_lowercase();
        let has_no_info = NO_INFO_PHRASES
            .iter()
            .any(|phrase| answer_lower.contains(phrase));

        if answer.chars().count() < MIN_ANSWER_CHARS && !has_no_info {
            safety_flags.push("answer_too_short".to_string());
            return Verdict::Rejected {
                fallback: ANSWER_TOO_SHORT_FALLBACK,
                safety_flags,
                reason: "Answer validation failed: too short",
            };
        }

        if draft.generation_error.is_some() {
            safety_flags.push("llm_error".to_string());
            return Verdict::Rejected {
                fallback: LLM_ERROR_FALLBACK,
                safety_flags,
                reason: "LLM error during reasoning",
            };
        }

        Verdict::Accepted {
            confidence: assess_confidence(&draft.answer, chunks),
            safety_flags,
        }
    }
}

/// Build the fixed result for any early exit.
fn short_circuit(answer: String, safety_flags: Vec<String>, reasoning: &str) -> PipelineResult {
    PipelineResult {
        answer,
        citations: Vec::new(),
        confidence: Confidence::Low,
        safety_flags,
        reasoning: reasoning.to_string(),
    }
}

/// Responder: final answer with one citation per retrieved chunk, in
/// retrieval order.
fn respond(
    draft: Draft,
    chunks: &[RetrievedChunk],
    confidence: Confidence,
    safety_flags: Vec<String>,
) -> PipelineResult {
    let citations = chunks.iter().map(Citation::from_retrieved).collect();

    PipelineResult {
        answer: draft.answer,
        citations,
        confidence,
        safety_flags,
        reasoning: format!("Used {} source chunks", chunks.len()),
    }
}
