//! Validation pipeline components

pub mod batch_validator;
pub mod deduplicator;
pub mod membership_committer;
pub mod project_normalizer;
pub mod validation_orchestrator;

pub use batch_validator::{canonical_user_name, BatchOutcome, BatchValidator};
pub use deduplicator::deduplicate_by_key;
pub use membership_committer::{CommitOutcome, MembershipCommitter};
pub use project_normalizer::{NormalizedProject, ProjectNormalizer, UnknownProject};
pub use validation_orchestrator::{OrchestratorSettings, ValidationOrchestrator};
