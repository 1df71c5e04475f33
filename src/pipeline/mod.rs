//! Conversion Pipeline
//!
//! Turns an uploaded PDF into an XML document:
//!
//! - **TextExtractor**: fetches the stored upload and returns per-page text
//! - **TransformClient**: one request to the generative service per pass
//! - **Sanitizer**: trims model chatter around the document and checks tag balance
//! - **Orchestrator**: runs the stages in order and reports progress
//!
//! ## Stages
//!
//! ```text
//!  Submission
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Upload    │  → object store, 20%
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Extract    │  → lopdf, 40%
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Transform  │  → initial pass + sanitize, 60%
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Refine    │  → optional second pass, 75%
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Persist    │  → one completed row, 90% then 100%
//! └─────────────┘
//! ```

pub mod extractor;
pub mod orchestrator;
pub mod prompts;
pub mod sanitizer;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use extractor::{ExtractedText, PdfTextExtractor, TextExtractor};
pub use orchestrator::{Orchestrator, OrchestratorSettings, Submission};
pub use prompts::Purpose;
pub use sanitizer::{sanitize, validate, ValidationError};
pub use transform::{TransformClient, TransformOutput, TransformSettings};
