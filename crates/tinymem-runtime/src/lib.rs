//! tinymem-runtime: the Promotion Engine and Hydration Engine -- the only
//! crate permitted to mutate the StateMap.

pub mod diagnostics;
pub mod error;
pub mod hydration;
pub mod promotion;
pub mod runtime;
pub mod seams;

pub use diagnostics::{Diagnostics, DoctorReport};
pub use error::{Result, RuntimeError};
pub use hydration::{HydrationBlock, HydrationEngine, StateNoticeEntry, StateNoticeReason};
pub use promotion::{evaluate as evaluate_promotion, tombstoned_symbols, Candidate, PromotionOutcome};
pub use runtime::{CodeBlock, Runtime};
pub use seams::{ChatMessage, ForwardOptions, NullShadowAuditClient, ShadowAuditClient, UpstreamClient};
