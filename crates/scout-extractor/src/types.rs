//! Request and result types for extraction

use scout_domain::{QueryTemplate, RawSearchResult};
use std::collections::BTreeMap;

/// Marker stored for a requested field the model could not fill
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Requested field name → extracted value (or [`NOT_FOUND`])
pub type ExtractedFields = BTreeMap<String, String>;

/// Everything one extraction call needs
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Search payload the answer must come from
    pub raw_result: &'a RawSearchResult,
    /// Instruction template rendered against the entity's attributes
    pub prompt_template: &'a QueryTemplate,
    /// The entity's attributes
    pub attributes: &'a BTreeMap<String, String>,
    /// Field names to extract; every one is present in the result map, which
    /// orders them by name
    pub fields: &'a [String],
}
