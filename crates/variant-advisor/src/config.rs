//! Upstream endpoint configuration.

use std::time::Duration;

/// Timeout for the gnomAD GraphQL endpoint, which can be very slow
pub const GNOMAD_TIMEOUT: Duration = Duration::from_secs(1000);

/// Timeout for Ensembl VEP, MutationTaster and ClinVar
pub const ANNOTATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for the Clinical Tables search API
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Base URLs of the public services
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// gnomAD GraphQL endpoint
    pub gnomad: String,

    /// Ensembl REST server
    pub ensembl: String,

    /// MutationTaster API script
    pub mutation_taster: String,

    /// NCBI E-utilities
    pub eutils: String,

    /// NLM Clinical Tables API
    pub clinical_tables: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gnomad: "https://gnomad.broadinstitute.org/api/".into(),
            ensembl: "https://rest.ensembl.org".into(),
            mutation_taster: "https://www.genecascade.org/MT2021/MT_API102.cgi".into(),
            eutils: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".into(),
            clinical_tables: "https://clinicaltables.nlm.nih.gov/api".into(),
        }
    }
}

impl Endpoints {
    /// Defaults, overridden by `GNOMAD_API_URL`, `ENSEMBL_REST_URL`,
    /// `MUTATION_TASTER_URL`, `NCBI_EUTILS_URL` and `CLINICAL_TABLES_URL`
    pub fn from_env() -> Self {
        let mut endpoints = Self::default();
        let overrides = [
            ("GNOMAD_API_URL", &mut endpoints.gnomad),
            ("ENSEMBL_REST_URL", &mut endpoints.ensembl),
            ("MUTATION_TASTER_URL", &mut endpoints.mutation_taster),
            ("NCBI_EUTILS_URL", &mut endpoints.eutils),
            ("CLINICAL_TABLES_URL", &mut endpoints.clinical_tables),
        ];
        for (var, slot) in overrides {
            if let Ok(url) = std::env::var(var) {
                tracing::debug!(var, %url, "endpoint override");
                *slot = url;
            }
        }
        endpoints
    }

    /// Every endpoint rooted at one base URL, for tests and local mirrors
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            gnomad: format!("{base}/gnomad/"),
            ensembl: format!("{base}/ensembl"),
            mutation_taster: format!("{base}/mt"),
            eutils: format!("{base}/eutils"),
            clinical_tables: format!("{base}/clinical-tables"),
        }
    }
}
