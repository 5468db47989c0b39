//! Ensembl Variant Effect Predictor
//!
//! Three lookups against the VEP REST endpoints: by identifier, by HGVS
//! notation, and by region plus allele. Geno2MP annotations are always
//! requested.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ANNOTATION_TIMEOUT;
use crate::error::Result;
use crate::transport::{HttpRequest, HttpTransport, fetch};

/// Ensembl VEP client
pub struct VepClient {
    transport: Arc<dyn HttpTransport>,
    server: String,
}

impl VepClient {
    pub fn new(transport: Arc<dyn HttpTransport>, server: impl Into<String>) -> Self {
        Self {
            transport,
            server: server.into(),
        }
    }

    /// Consequences for a dbSNP, COSMIC or HGMD identifier
    pub async fn by_id(&self, id: &str) -> Result<Value> {
        self.get(&format!("id/{id}")).await
    }

    /// Consequences for an HGVS notation
    pub async fn by_hgvs(&self, hgvs_code: &str) -> Result<Value> {
        self.get(&format!("hgvs/{hgvs_code}")).await
    }

    /// Consequences for a genomic region and alternate allele
    pub async fn by_region(&self, region: &str, allele: &str) -> Result<Value> {
        self.get(&format!("region/{region}/{allele}")).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}/vep/human/{path}?Geno2MP=1", self.server.trim_end_matches('/'));
        let request = HttpRequest::get(url)
            .header("Content-Type", "application/json")
            .timeout(ANNOTATION_TIMEOUT);

        fetch(self.transport.as_ref(), &request).await?.json()
    }
}
