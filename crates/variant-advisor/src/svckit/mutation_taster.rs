//! MutationTaster
//!
//! Fetches MutationTaster 2021 predictions, which come back as tab-delimited
//! text with a header line.

use std::sync::Arc;

use crate::config::ANNOTATION_TIMEOUT;
use crate::error::Result;
use crate::model::MutationTasterEntry;
use crate::transport::{HttpRequest, HttpTransport, fetch};

const FIELD_COUNT: usize = 15;

/// Parse a MutationTaster response body. The first line is a header.
pub fn parse_predictions(body: &str) -> Vec<MutationTasterEntry> {
    body.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> MutationTasterEntry {
    let mut fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    fields.resize(FIELD_COUNT.max(fields.len()), "");

    let owned = |i: usize| fields[i].to_owned();
    let tree_vote = fields[9].split('|').map(str::to_owned).collect();

    MutationTasterEntry {
        id: owned(0),
        chr: owned(1),
        pos: owned(2),
        reference: owned(3),
        alt: owned(4),
        transcript_stable: owned(5),
        ncbi_gene_id: owned(6),
        prediction: owned(7),
        model: owned(8),
        tree_vote,
        note: owned(10),
        splicesite: owned(11),
        distance_from_splicesite: owned(12),
        disease_mutation: owned(13),
        polymorphism: owned(14),
    }
}

/// MutationTaster API client
pub struct MutationTasterClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
}

impl MutationTasterClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    /// Predictions for one or more comma-separated variants, e.g.
    /// `21:33039603A>C,2:233391374T>C`
    pub async fn predictions(&self, variants: &str) -> Result<Vec<MutationTasterEntry>> {
        let request = HttpRequest::get(format!("{}?variants={variants}", self.endpoint))
            .timeout(ANNOTATION_TIMEOUT);

        let response = fetch(self.transport.as_ref(), &request).await?;
        let entries = parse_predictions(&response.body);
        tracing::debug!(variants, entries = entries.len(), "MutationTaster predictions");
        Ok(entries)
    }
}
