pub mod access;
pub mod audit;
pub mod mediator;
pub mod variant;

pub use access::{normalize, AccessDecision, AccessPolicy, DecisionKind, DenyReason, PolicyError};
pub use audit::{AuditAction, AuditError, AuditRecord, AuditSink, JsonlAuditSink, TracingAuditSink};
pub use mediator::{
    AccessError, DirectoryListing, FileContents, PathMediator, DEFAULT_MAX_READ_BYTES,
    MAX_LIST_ENTRIES,
};
pub use variant::Variant;
