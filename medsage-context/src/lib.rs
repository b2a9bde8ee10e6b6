//! MedSage Context
//!
//! The question answering pipeline over a user's health data.
//!
//! - [`isolate`]: runs one context source with a timeout and panic shield
//! - [`ContextAggregator`]: gathers profile, lifestyle, report and knowledge blocks
//! - [`PromptTemplate`]: deterministic prompt composition
//! - [`QueryOrchestrator`]: context, generation or fallback, recording
//! - [`ConversationRecorder`]: best-effort persistence of exchanges

mod aggregator;
mod fallback;
mod isolate;
mod orchestrator;
mod prompt;
mod recorder;

pub use aggregator::{
    format_lifestyle, format_profile, format_reports, truncate_chars, AggregatedContext,
    ContextAggregator, NO_PATIENT_CONTEXT, NO_REPORTS,
};
pub use fallback::{error_response, fallback_response};
pub use isolate::{isolate, ContextSource, Isolated};
pub use orchestrator::{Collaborators, QueryOrchestrator};
pub use prompt::{PromptInputs, PromptTemplate, Slot, DEFAULT_TEMPLATE};
pub use recorder::ConversationRecorder;
