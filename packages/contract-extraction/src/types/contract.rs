//! Contract types - parties, clauses and the assembled document.
//!
//! Field names on the wire follow the record layout consumers already use
//! (`contract_title`, `parties_involved`, `clause_text`, ...). Model output is
//! parsed leniently: amounts and dates may arrive as strings or numbers, and
//! optional lists may arrive as `null`.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::types::stage::Stage;

/// A contracting party. Identity is the `(party_name, role)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub party_name: String,
    #[serde(default)]
    pub role: String,
}

impl Party {
    /// Create a party, trimming surrounding whitespace.
    pub fn new(party_name: impl AsRef<str>, role: impl AsRef<str>) -> Self {
        Self {
            party_name: party_name.as_ref().trim().to_string(),
            role: role.as_ref().trim().to_string(),
        }
    }

    /// Copy with whitespace trimmed, so identical parties compare equal.
    pub fn normalized(&self) -> Self {
        Self::new(&self.party_name, &self.role)
    }
}

/// Legal function of a clause.
///
/// Known categories are matched loosely against the model's label; anything
/// else is kept verbatim in [`ClauseCategory::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClauseCategory {
    FinancialTerms,
    Confidentiality,
    Termination,
    Indemnification,
    DisputeResolution,
    RightsAndRestrictions,
    Miscellaneous,
    /// Not classified yet
    #[default]
    Uncategorized,
    Other(String),
}

impl ClauseCategory {
    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            ClauseCategory::FinancialTerms => "Financial Terms",
            ClauseCategory::Confidentiality => "Confidentiality & NDA",
            ClauseCategory::Termination => "Termination & Breach",
            ClauseCategory::Indemnification => "Indemnification & Liability",
            ClauseCategory::DisputeResolution => "Dispute Resolution & Governing Law",
            ClauseCategory::RightsAndRestrictions => "Rights & Restrictions",
            ClauseCategory::Miscellaneous => "Miscellaneous",
            ClauseCategory::Uncategorized => "",
            ClauseCategory::Other(label) => label,
        }
    }
}

impl From<String> for ClauseCategory {
    fn from(label: String) -> Self {
        let lower = label.trim().to_lowercase();
        if lower.is_empty() {
            ClauseCategory::Uncategorized
        } else if lower.starts_with("financ") || lower.starts_with("payment") {
            ClauseCategory::FinancialTerms
        } else if lower.starts_with("confidential") || lower == "nda" {
            ClauseCategory::Confidentiality
        } else if lower.starts_with("termination") {
            ClauseCategory::Termination
        } else if lower.starts_with("indemn") || lower.starts_with("liability") {
            ClauseCategory::Indemnification
        } else if lower.starts_with("dispute") || lower.starts_with("governing law") {
            ClauseCategory::DisputeResolution
        } else if lower.starts_with("rights") {
            ClauseCategory::RightsAndRestrictions
        } else if lower.starts_with("misc") {
            ClauseCategory::Miscellaneous
        } else {
            ClauseCategory::Other(label.trim().to_string())
        }
    }
}

impl From<ClauseCategory> for String {
    fn from(category: ClauseCategory) -> Self {
        category.label().to_string()
    }
}

impl fmt::Display for ClauseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-clause provenance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClauseMetadata {
    /// Model confidence, clamped to `[0, 1]`
    #[serde(default)]
    pub confidence_score: f32,

    /// Stage agent that last produced the clause
    #[serde(default)]
    pub extracted_by: Option<String>,
}

/// A discrete contractual provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// 1-based position in document order
    #[serde(rename = "clause", alias = "sequence_number", default)]
    pub sequence_number: u32,

    #[serde(
        rename = "clause_category",
        alias = "category",
        default,
        deserialize_with = "lenient_category"
    )]
    pub category: ClauseCategory,

    #[serde(default)]
    pub section_name: Option<String>,

    #[serde(rename = "clause_text", alias = "text")]
    pub text: String,

    #[serde(default, deserialize_with = "lenient_strings")]
    pub related_dates: Vec<String>,

    #[serde(default, deserialize_with = "lenient_optional_strings")]
    pub related_amounts: Option<Vec<String>>,

    #[serde(default)]
    pub metadata: ClauseMetadata,

    #[serde(
        default,
        alias = "improved_clause_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub improved_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_reason: Option<String>,

    /// Review flags raised by the model
    #[serde(default, deserialize_with = "lenient_strings", skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Clause {
    /// Create a clause with the given number and text.
    pub fn new(sequence_number: u32, text: impl Into<String>) -> Self {
        Self {
            sequence_number,
            category: ClauseCategory::Uncategorized,
            section_name: None,
            text: text.into(),
            related_dates: Vec::new(),
            related_amounts: None,
            metadata: ClauseMetadata::default(),
            improved_text: None,
            modification_reason: None,
            warnings: Vec::new(),
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: ClauseCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the section name.
    pub fn with_section(mut self, section_name: impl Into<String>) -> Self {
        self.section_name = Some(section_name.into());
        self
    }

    /// Set the confidence score.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.metadata.confidence_score = confidence;
        self
    }

    /// Clamp confidence into `[0, 1]` and record the producing stage if the
    /// model did not.
    pub fn normalize(&mut self, stage: Stage) {
        let score = self.metadata.confidence_score;
        self.metadata.confidence_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        if self.metadata.extracted_by.is_none() {
            self.metadata.extracted_by = Some(stage.agent_name().to_string());
        }
    }
}

/// The final structured contract.
///
/// `clauses` are ordered by `sequence_number`; `parties` and `amounts` hold
/// no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDocument {
    #[serde(rename = "pdf_name")]
    pub source_name: String,

    #[serde(rename = "contract_title")]
    pub title: String,

    #[serde(rename = "contract_date")]
    pub effective_date: Option<String>,

    #[serde(rename = "parties_involved")]
    pub parties: IndexSet<Party>,

    pub clauses: Vec<Clause>,

    pub summary: String,

    pub amounts: IndexSet<String>,
}

impl ContractDocument {
    /// Number of clauses per category label, in first-seen order.
    pub fn category_counts(&self) -> IndexMap<String, usize> {
        let mut counts = IndexMap::new();
        for clause in &self.clauses {
            *counts.entry(clause.category.label().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Mean clause confidence, `None` when there are no clauses.
    pub fn average_confidence(&self) -> Option<f32> {
        if self.clauses.is_empty() {
            return None;
        }
        let total: f32 = self.clauses.iter().map(|c| c.metadata.confidence_score).sum();
        Some(total / self.clauses.len() as f32)
    }
}

/// A scalar the model may emit as either a JSON string or a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Text(String),
    Number(serde_json::Number),
}

impl Lenient {
    fn into_string(self) -> String {
        match self {
            Lenient::Text(s) => s,
            Lenient::Number(n) => n.to_string(),
        }
    }
}

/// Deserialize a category label, treating `null` as not yet classified.
fn lenient_category<'de, D>(deserializer: D) -> Result<ClauseCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.map(ClauseCategory::from).unwrap_or_default())
}

/// Deserialize a list of strings, accepting `null` and numeric items.
pub(crate) fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_strings(deserializer)?.unwrap_or_default())
}

/// Like [`lenient_strings`] but keeps `null` distinct from an empty list.
pub(crate) fn lenient_optional_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<Option<Lenient>>> = Option::deserialize(deserializer)?;
    Ok(items.map(|items| {
        items
            .into_iter()
            .flatten()
            .map(Lenient::into_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }))
}
