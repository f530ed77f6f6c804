//! Marginalia Domain Layer
//!
//! Core data model shared by every other Marginalia crate. It defines the
//! records the service produces (books, characters, analyses) and the task
//! snapshots clients poll or subscribe to.
//!
//! ## Key Concepts
//!
//! - **BookId**: Opaque key correlating every cache and task
//! - **BookRecord**: Metadata plus cleaned text, published once per book
//! - **AnalysisRecord**: Characters, relationship graph, themes, sentiment, quotes
//! - **TaskSnapshot**: Full state of a fetch or analysis task at one instant
//! - **TaskKey**: Identifies a background worker for duplicate suppression
//!
//! ## Architecture
//!
//! This crate holds no I/O. Infrastructure (content source, model adapter,
//! HTTP) lives in other crates and depends on these types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod book;
pub mod character;
pub mod error;
pub mod task;

// Re-exports for convenience
pub use analysis::{AnalysisRecord, PartialResults, Quote, Sentiment, Theme};
pub use book::{BookId, BookMetadata, BookRecord, BookSummary, PREVIEW_LENGTH};
pub use character::{Character, CharacterRelationship, Graph, GraphLink, GraphNode};
pub use error::DomainError;
pub use task::{FetchTimings, TaskKey, TaskSnapshot, TaskStatus};
