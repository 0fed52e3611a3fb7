//! Distillation pipeline: content addressing, policy pre-processing, the
//! extractor ensemble, confidence scoring, and the distiller orchestrator.

pub mod adapters;
pub mod addressing;
pub mod confidence;
pub mod distiller;
pub mod document;
pub mod dom_heuristic;
pub mod ensemble;
pub mod external;
pub mod extractor;
pub mod html_meta;
pub mod llm;
pub mod policy;
pub mod readability;

pub use adapters::{AdapterRegistry, DomainAdapter};
pub use addressing::{AddressMeta, canonicalize, fingerprint, is_valid_fingerprint, sha256_hex, verify};
pub use confidence::ConfidenceBreakdown;
pub use distiller::Distiller;
pub use document::{DistilledDocument, DocumentNode, NodeType, SourceSpan};
pub use dom_heuristic::DomHeuristicExtractor;
pub use ensemble::{CandidateScore, Selection, select_best};
pub use external::{ExternalArticle, ExternalExtractorClient, ExternalLibraryExtractor};
pub use extractor::{Candidate, CandidateBlock, CandidateMetadata, ExtractionMethod, Extractor};
pub use llm::{LlmArticle, LlmExtractor, LlmProvider};
pub use policy::{Policy, PolicyEngine, PolicyFields, PolicyOutcome, PolicyRule, TransformRule};
pub use readability::ReadabilityExtractor;
