//! Context window management: token budget, squashing, knowledge bases.
//!
//! - **[`budget`]**: [`ContextBudgetManager`] estimates usage of the
//!   conversation plus loaded knowledge and plans squashes above 80%.
//! - **[`squash`]**: builds the summarization request and the summary
//!   message that replaces the squashed span.
//! - **[`knowledge`]**: named reference documents that count toward the
//!   budget while loaded.

pub mod budget;
pub mod knowledge;
pub mod squash;

pub use budget::{
    ContextBudgetManager, ContextUsage, DEFAULT_CHARS_PER_TOKEN, SQUASH_THRESHOLD, SquashPlan,
};
pub use knowledge::{DirKnowledgeStore, KnowledgeBase, KnowledgeSet, KnowledgeStore};
