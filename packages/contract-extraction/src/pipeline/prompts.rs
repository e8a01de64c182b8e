//! LLM prompts for the contract pipeline.
//!
//! Each stage gets one template with `{placeholder}` slots. Every template
//! asks for a single JSON object so the invoker can normalize the response
//! without stage-specific parsing.

use sha2::{Digest, Sha256};

use crate::types::chunk::Chunk;

/// Prompt for extracting metadata from one chunk.
pub const METADATA_PROMPT: &str = r#"You are a legal document parsing specialist. You are reading chunk {sequence_num} of {total_chunks} of a contract.

Extract whatever contract metadata appears in this chunk:
- "contract_title": the full title exactly as written, or null if this chunk has none
- "contract_date": the effective or start date, or null
- "parties_involved": every party named, as {"party_name": "...", "role": "..."}
- "clauses": clauses that begin in this chunk, as {"clause_category": "...", "section_name": "...", "clause_text": "...", "metadata": {"confidence_score": 0.0-1.0}}
- "amounts": every monetary amount, as written

Add a "warnings" list to a clause when the text looks truncated, garbled by OCR, or misnumbered.
Do not invent values that are not in the text.

Output JSON:
{
    "contract_title": "...",
    "contract_date": "...",
    "parties_involved": [],
    "clauses": [],
    "amounts": []
}

Text chunk:
{text}"#;

/// Prompt for producing the numbered clause list.
pub const CLAUSE_EXTRACTION_PROMPT: &str = r#"You are a contract clause extraction specialist. From the contract metadata below, produce the definitive list of clauses.

For each clause return:
- "clause": sequential number starting at 1
- "section_name": the section heading, or null
- "clause_text": the complete clause text, never truncated
- "related_dates": every date mentioned in the clause
- "related_amounts": every monetary amount mentioned in the clause
- "metadata": {"confidence_score": 0.0-1.0}

Output JSON:
{
    "clauses": [
        {
            "clause": 1,
            "section_name": "PAYMENT TERMS",
            "clause_text": "...",
            "related_dates": ["2025-03-01"],
            "related_amounts": ["$50,000"],
            "metadata": {"confidence_score": 0.95}
        }
    ]
}

Input metadata:
{metadata}"#;

/// Prompt for assigning categories.
pub const CLASSIFICATION_PROMPT: &str = r#"You are a contract clause classification specialist. Assign each clause exactly one "clause_category" based on its primary legal function:

- Financial Terms (payments, fees, penalties, late payments)
- Confidentiality & NDA (data protection, trade secrets, non-disclosure)
- Termination & Breach (exit rights, renewals, breach consequences)
- Indemnification & Liability (risk allocation, damages, liability caps)
- Dispute Resolution & Governing Law (arbitration, mediation, jurisdiction)
- Rights & Restrictions (ownership, IP, exclusivity, licensing, non-compete)
- Miscellaneous (anything that fits none of the above)

When unsure, use Miscellaneous and add an entry to the clause's "warnings" list.

Return every input clause with its original "clause" number and "clause_text" unchanged, plus the category.

Output JSON:
{
    "clauses": [ ... ]
}

Input clauses:
{clauses}"#;

/// Prompt for entity enrichment.
pub const ENTITY_ENRICHMENT_PROMPT: &str = r#"You are a named entity recognition specialist for legal contracts. For each clause, fill in:

- "related_dates": dates, deadlines and renewal periods (convert relative dates to explicit ones where possible)
- "related_amounts": monetary values and percentages, keeping currency symbols
- "parties_involved": parties the clause refers to, as {"party_name": "...", "role": "..."}

Flag anything unclear in the clause's "warnings" list.

Return every input clause with its original "clause" number, "clause_text" and "clause_category" unchanged.

Output JSON:
{
    "clauses": [ ... ]
}

Input clauses:
{clauses}"#;

/// Prompt for suggesting improved clause wording.
pub const CLAUSE_IMPROVEMENT_PROMPT: &str = r#"You are a legal drafting assistant. For each clause, suggest clearer and more enforceable wording that keeps the original meaning.

For each clause add:
- "improved_clause_text": the improved wording (repeat the original if no change is needed)
- "modification_reason": what changed and why, or why no change was needed

Flag references to sections whose text is not available in the clause's "warnings" list.

Return every input clause with all of its existing fields, including the original "clause" number and "clause_text".

Output JSON:
{
    "clauses": [ ... ]
}

Input clauses:
{clauses}"#;

/// Prompt for the whole-contract summary.
pub const SUMMARIZATION_PROMPT: &str = r#"You are a contract summarization specialist. Write a concise summary of the contract covering:

1. Contract type, purpose and parties
2. Core obligations of each party
3. Financial terms and deadlines
4. Termination, renewal and dispute resolution
5. Confidentiality and IP terms
6. Risks worth reviewing (vague or one-sided terms), rated low, medium or high

Output JSON:
{
    "summary": "..."
}

Contract metadata:
{metadata}

Processed clauses:
{clauses}"#;

/// SHA-256 over every template, for tagging runs with the prompt revision.
pub fn prompt_set_hash() -> String {
    let mut hasher = Sha256::new();
    for template in [
        METADATA_PROMPT,
        CLAUSE_EXTRACTION_PROMPT,
        CLASSIFICATION_PROMPT,
        ENTITY_ENRICHMENT_PROMPT,
        CLAUSE_IMPROVEMENT_PROMPT,
        SUMMARIZATION_PROMPT,
    ] {
        hasher.update(template.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Format the metadata prompt for one chunk.
pub fn format_metadata_prompt(chunk: &Chunk, total_chunks: usize) -> String {
    fill(
        METADATA_PROMPT,
        &[
            ("sequence_num", &(chunk.sequence + 1).to_string()),
            ("total_chunks", &total_chunks.to_string()),
            ("text", &chunk.text),
        ],
    )
}

/// Format the clause extraction prompt.
pub fn format_clause_extraction_prompt(metadata: &str) -> String {
    CLAUSE_EXTRACTION_PROMPT.replace("{metadata}", metadata)
}

/// Format the classification prompt.
pub fn format_classification_prompt(clauses: &str) -> String {
    CLASSIFICATION_PROMPT.replace("{clauses}", clauses)
}

/// Format the entity enrichment prompt.
pub fn format_entity_enrichment_prompt(clauses: &str) -> String {
    ENTITY_ENRICHMENT_PROMPT.replace("{clauses}", clauses)
}

/// Format the clause improvement prompt.
pub fn format_clause_improvement_prompt(clauses: &str) -> String {
    CLAUSE_IMPROVEMENT_PROMPT.replace("{clauses}", clauses)
}

/// Format the summarization prompt.
pub fn format_summarization_prompt(metadata: &str, clauses: &str) -> String {
    fill(SUMMARIZATION_PROMPT, &[("metadata", metadata), ("clauses", clauses)])
}

/// Substitute `{name}` placeholders in one pass over the template.
///
/// Substituted values are never rescanned, so placeholder-like text inside
/// model output or contract text is left as is.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            after
                .strip_prefix(name)
                .and_then(|tail| tail.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });
        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
