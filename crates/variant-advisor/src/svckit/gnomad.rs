//! gnomAD Population Frequency
//!
//! Queries the gnomAD GraphQL API for a variant by rsID.

use std::sync::{Arc, LazyLock};

use serde_json::{Value, json};

use crate::config::GNOMAD_TIMEOUT;
use crate::error::{AdvisorError, Result};
use crate::transport::{HttpRequest, HttpTransport, fetch};

const RSID_PLACEHOLDER: &str = "{{RSID}}";

const HISTOGRAM: &str = "bin_edges bin_freq n_smaller n_larger";

/// The GraphQL document, with `{{RSID}}` standing in for the identifier
static VARIANT_QUERY: LazyLock<String> = LazyLock::new(|| {
    let sequencing = format!(
        "ac an ac_hemi ac_hom \
         faf95 {{ popmax popmax_population }} \
         filters \
         populations {{ id ac an ac_hemi ac_hom }} \
         age_distribution {{ het {{ {HISTOGRAM} }} hom {{ {HISTOGRAM} }} }} \
         qualityMetrics {{ \
           alleleBalance {{ alt {{ {HISTOGRAM} }} }} \
           genotypeDepth {{ all {{ {HISTOGRAM} }} alt {{ {HISTOGRAM} }} }} \
           genotypeQuality {{ all {{ {HISTOGRAM} }} alt {{ {HISTOGRAM} }} }} \
         }}"
    );

    format!(
        "{{ variant(rsid: \"{RSID_PLACEHOLDER}\", dataset: gnomad_r2_1) {{ \
           variantId reference_genome chrom pos ref alt colocatedVariants \
           multiNucleotideVariants {{ combined_variant_id changes_amino_acids n_individuals other_constituent_snvs }} \
           exome {{ {sequencing} }} \
           genome {{ {sequencing} }} \
           flags rsid \
           sortedTranscriptConsequences {{ \
             canonical gene_id gene_version gene_symbol hgvs hgvsc hgvsp lof lof_flags lof_filter \
             major_consequence polyphen_prediction sift_prediction transcript_id transcript_version \
           }} \
         }} }}"
    )
});

/// Build the variant query for an rsID. The identifier is lowercased first.
pub fn variant_query(rsid: &str) -> String {
    VARIANT_QUERY.replace(RSID_PLACEHOLDER, &rsid.trim().to_lowercase())
}

/// gnomAD GraphQL client
pub struct GnomadClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
}

impl GnomadClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    /// Population frequency record for `rsid`; the payload is the whole
    /// GraphQL response body
    pub async fn variant_by_rsid(&self, rsid: &str) -> Result<Value> {
        let request = HttpRequest::post_json(&self.endpoint, json!({ "query": variant_query(rsid) }))
            .timeout(GNOMAD_TIMEOUT);

        let body: Value = fetch(self.transport.as_ref(), &request).await?.json()?;

        if body.pointer("/data/variant").is_none_or(Value::is_null) {
            if let Some(errors) = body.get("errors").and_then(Value::as_array) {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect();
                tracing::warn!(rsid, errors = messages.len(), "gnomAD returned GraphQL errors");
                return Err(AdvisorError::invalid("gnomAD", messages.join("; ")));
            }
        }

        Ok(body)
    }
}
