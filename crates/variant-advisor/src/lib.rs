//! # variant-advisor
//!
//! Genetic variant interpretation assistant built on public bioinformatics
//! services.
//!
//! ## Data Sources
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  tool                                    upstream           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  tool_query_gnomad_by_rsid               gnomAD GraphQL     │
//! │  tool_query_single_nucleotide_...        dbSNP  (NLM)       │
//! │  tool_query_structural_variants_db       dbVar  (NLM)       │
//! │  tool_get_variant_consequences_by_*      Ensembl VEP  x3    │
//! │  tool_get_mutation_tester_result         MutationTaster     │
//! │  tool_get_clinvar_data_by_rcv_code       ClinVar (E-utils)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every lookup is a single attempt. Upstream failures come back to the
//! model as `ok: false` results so it can explain or try another source.

pub mod config;
pub mod error;
pub mod model;
pub mod record_analyzer;
pub mod svckit;
pub mod transport;

use std::sync::Arc;

use agent_core::{SessionConfig, ToolRegistry};

pub use config::Endpoints;
pub use error::{AdvisorError, Result};
pub use model::{ClinicalRecordAnalysis, ClinicalRecordSummary, ClinicalTablesHits, MutationTasterEntry};
pub use svckit::{VariantTool, VariantToolbox};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        ClinVarClient,
        ClinicalTablesClient,
        GnomadClient,
        MutationTasterClient,
        VepClient,
    };
}

/// System prompt for the variant analysis assistant
pub const SYSTEM_PROMPT: &str =
    "You are an expert in genomic medicine here to help me with my tasks in genetic variant analysis. ";

/// First assistant message shown to the user
pub const GREETING: &str = "Hello 👋. I'm your personal assistant for genetic variant analysis. \
I have access to all the tools listed in the widely accepted framework from Richards et al 2015. \
Please explain the task you would like me to help with:";

/// Chat models offered to the user
pub const MODEL_OPTIONS: [&str; 3] = ["mistral-small-latest", "mistral-medium-latest", "mistral-large-latest"];

/// Model used when none is chosen
pub const DEFAULT_MODEL: &str = "mistral-large-latest";

/// Session settings for the assistant
pub fn session_config(model: impl Into<String>) -> SessionConfig {
    SessionConfig {
        system_prompt: SYSTEM_PROMPT.into(),
        greeting: GREETING.into(),
        model: model.into(),
    }
}

/// Registry of all variant tools over the given transport
pub fn tool_registry(transport: Arc<dyn HttpTransport>, endpoints: &Endpoints) -> ToolRegistry<VariantToolbox> {
    let registry = ToolRegistry::new(VariantToolbox::new(transport, endpoints));
    tracing::info!(tools = registry.len(), "variant tool registry ready");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_offered() {
        assert!(MODEL_OPTIONS.contains(&DEFAULT_MODEL));
    }

    #[test]
    fn test_registry_covers_every_tool() {
        let registry = tool_registry(Arc::new(MockTransport::new()), &Endpoints::default());
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.catalogue().len(), 8);
        assert!(registry.resolve("tool_get_clinvar_data_by_rcv_code").is_ok());
    }

    #[test]
    fn test_session_config_bootstraps_prompt() {
        let config = session_config(DEFAULT_MODEL);
        assert!(config.system_prompt.starts_with("You are an expert in genomic medicine"));
        assert!(config.greeting.contains("Richards et al 2015"));
    }
}
