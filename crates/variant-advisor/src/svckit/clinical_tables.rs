//! NLM Clinical Tables
//!
//! dbSNP and dbVar searches through the Clinical Tables search API.

use std::sync::Arc;

use serde_json::Value;

use crate::config::SEARCH_TIMEOUT;
use crate::error::Result;
use crate::model::ClinicalTablesHits;
use crate::transport::{HttpRequest, HttpTransport, fetch};

/// Display fields requested for dbSNP hits (GRCh38 coordinates)
const SNP_DISPLAY_FIELDS: &str = "rsNum,38.chr,38.pos,38.alleles,38.gene";

/// Clinical Tables search client
pub struct ClinicalTablesClient {
    transport: Arc<dyn HttpTransport>,
    base: String,
}

impl ClinicalTablesClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    /// dbSNP polymorphisms matching an rsID
    pub async fn snps(&self, rsid: &str) -> Result<ClinicalTablesHits> {
        self.search(&format!("snps/v3/search?terms={rsid}&df={SNP_DISPLAY_FIELDS}"))
            .await
    }

    /// dbVar structural variants matching free-text terms
    pub async fn structural_variants(&self, terms: &str) -> Result<ClinicalTablesHits> {
        self.search(&format!("dbvar/v3/search?terms={terms}")).await
    }

    async fn search(&self, path: &str) -> Result<ClinicalTablesHits> {
        let url = format!("{}/{path}", self.base.trim_end_matches('/'));
        let request = HttpRequest::get(url).timeout(SEARCH_TIMEOUT);

        let body: Value = fetch(self.transport.as_ref(), &request).await?.json()?;
        ClinicalTablesHits::from_value(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const BASE: &str = "https://tables.test/api";

    #[tokio::test]
    async fn test_snp_search() {
        let transport = Arc::new(MockTransport::new().with_route(
            BASE,
            200,
            r#"[1,["rs334"],null,[["rs334","11","5227002","T/A","HBB"]]]"#,
        ));
        let client = ClinicalTablesClient::new(transport.clone(), BASE);

        let hits = client.snps("rs334").await.unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.display[0][4], "HBB");

        let request = &transport.requests().await[0];
        assert_eq!(
            request.url,
            "https://tables.test/api/snps/v3/search?terms=rs334&df=rsNum,38.chr,38.pos,38.alleles,38.gene"
        );
        assert_eq!(request.timeout, SEARCH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_dbvar_search() {
        let transport = Arc::new(MockTransport::new().with_route(
            BASE,
            200,
            r#"[2,["nsv1","nsv2"],null,[["nsv1"],["nsv2"]]]"#,
        ));
        let client = ClinicalTablesClient::new(transport.clone(), BASE);

        let hits = client.structural_variants("BRCA1").await.unwrap();
        assert_eq!(hits.codes, vec!["nsv1", "nsv2"]);
        assert_eq!(transport.requests().await[0].url, "https://tables.test/api/dbvar/v3/search?terms=BRCA1");
    }

    #[tokio::test]
    async fn test_unexpected_body() {
        let transport = Arc::new(MockTransport::new().with_route(BASE, 200, r#"{"error":"x"}"#));
        let client = ClinicalTablesClient::new(transport, BASE);
        assert!(client.snps("rs1").await.is_err());
    }
}
