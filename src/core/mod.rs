//! Core data model: documents, chunks, topic indexes, analysis records
//! and reports.
//!
//! Nothing in this module talks to the generation service.

pub mod analysis;
pub mod chunk;
pub mod document;
pub mod report;
pub mod topic;

pub use analysis::{
    AggregatedAnalysis, AnalysisRecord, AnalysisSchema, ErrorMarker, FieldKind, FieldSpec,
    FieldValue, PartialAnalysis, UNKNOWN,
};
pub use chunk::Chunk;
pub use document::{Document, DocumentBody, ImageAttachment, Location, Page};
pub use report::{Contribution, FinalReport, ReportStatus};
pub use topic::{TopicIndex, filter_locations};
