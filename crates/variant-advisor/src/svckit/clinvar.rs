//! ClinVar
//!
//! Retrieves `clinvarset` records through NCBI E-utilities and hands them to
//! the record analyzer.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::ANNOTATION_TIMEOUT;
use crate::error::Result;
use crate::model::ClinicalRecordAnalysis;
use crate::record_analyzer;
use crate::transport::{HttpRequest, HttpTransport, fetch};

/// NCBI E-utilities client for ClinVar
pub struct ClinVarClient {
    transport: Arc<dyn HttpTransport>,
    eutils: String,
}

impl ClinVarClient {
    pub fn new(transport: Arc<dyn HttpTransport>, eutils: impl Into<String>) -> Self {
        Self {
            transport,
            eutils: eutils.into(),
        }
    }

    /// Fetch and analyze the record set for an RCV accession
    pub async fn record(&self, rcv: &str) -> Result<ClinicalRecordAnalysis> {
        let url = format!(
            "{}/efetch.fcgi?db=clinvar&rettype=clinvarset&id={rcv}",
            self.eutils.trim_end_matches('/')
        );
        let request = HttpRequest::get(url).timeout(ANNOTATION_TIMEOUT);

        let response = fetch(self.transport.as_ref(), &request).await?;
        let analysis = record_analyzer::analyze(&response.body)?;

        if analysis.is_empty() {
            tracing::warn!(rcv, "ClinVar response contained no assertions");
        }
        Ok(analysis)
    }

    /// Record summary shaped for the model
    pub async fn summary(&self, rcv: &str) -> Result<Value> {
        let analysis = self.record(rcv).await?;
        Ok(json!({
            "requested": rcv,
            "summary": analysis.latest(),
            "assertions": analysis.entries(),
        }))
    }
}
