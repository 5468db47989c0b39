//! Domain Models
//!
//! Normalized shapes of the upstream records handed back to the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdvisorError, Result};

/// Flat summary of one ClinVar assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalRecordSummary {
    /// `DateLastUpdated` of the reference assertion
    pub last_update: String,

    /// RCV accession
    pub accession: String,

    /// Clinical significance description, when the record has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinvar_sig: Option<String>,

    /// Observation method type
    pub source_type: String,

    /// Comma-joined functional consequences, or "None"
    pub functional_consq: String,

    /// Comma-joined molecular consequences, or "None"
    pub molecular_consq: String,

    /// Comma-joined disease mechanisms, or "None"
    pub disease_mech: String,
}

/// Every assertion found in one ClinVar response, in document order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalRecordAnalysis {
    entries: Vec<ClinicalRecordSummary>,
}

impl ClinicalRecordAnalysis {
    pub const fn new(entries: Vec<ClinicalRecordSummary>) -> Self {
        Self { entries }
    }

    /// All assertions, in document order
    pub fn entries(&self) -> &[ClinicalRecordSummary] {
        &self.entries
    }

    /// The last assertion in the document
    pub fn latest(&self) -> Option<&ClinicalRecordSummary> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One MutationTaster prediction row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTasterEntry {
    pub id: String,
    pub chr: String,
    pub pos: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub alt: String,
    pub transcript_stable: String,
    #[serde(rename = "NCBI_geneid")]
    pub ncbi_gene_id: String,
    pub prediction: String,
    pub model: String,
    /// Field 9 split on `|`; a blank field gives one empty vote
    pub tree_vote: Vec<String>,
    pub note: String,
    pub splicesite: String,
    pub distance_from_splicesite: String,
    pub disease_mutation: String,
    pub polymorphism: String,
}

/// Search result from the NLM Clinical Tables API.
///
/// The wire format is a positional array:
/// `[total, codes, extra, display, code_systems?]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTablesHits {
    /// Total matches on the server (capped upstream at 10,000)
    pub total: u64,

    /// Codes of the returned items
    pub codes: Vec<String>,

    /// Extra fields requested through `ef`, keyed by field name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    /// Display strings for each returned code
    pub display: Vec<Vec<String>>,
}

impl ClinicalTablesHits {
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| AdvisorError::invalid("Clinical Tables", "expected a JSON array"))?;

        let total = items.first().and_then(Value::as_u64).unwrap_or_default();
        let codes = items
            .get(1)
            .and_then(Value::as_array)
            .map(|codes| codes.iter().map(cell_text).collect())
            .unwrap_or_default();
        let extra = items.get(2).filter(|v| !v.is_null()).cloned();
        let display = items
            .get(3)
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| match row.as_array() {
                        Some(cells) => cells.iter().map(cell_text).collect(),
                        None => vec![cell_text(row)],
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            total,
            codes,
            extra,
            display,
        })
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
