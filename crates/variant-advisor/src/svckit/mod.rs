//! Service Kit - Variant Tools
//!
//! The closed set of lookups the model may request, and the toolbox that
//! dispatches them to the upstream adapters.

mod clinical_tables;
mod clinvar;
mod gnomad;
mod mutation_taster;
mod vep;

pub use clinical_tables::ClinicalTablesClient;
pub use clinvar::ClinVarClient;
pub use gnomad::{GnomadClient, variant_query};
pub use mutation_taster::{MutationTasterClient, parse_predictions};
pub use vep::VepClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use agent_core::{LookupResult, ParameterSchema, ToolArguments, ToolKind, ToolSpec, Toolbox};

use crate::config::Endpoints;
use crate::error::Result;
use crate::transport::HttpTransport;

/// Every tool the assistant can call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantTool {
    GnomadByRsid,
    SnpByRsid,
    StructuralVariants,
    ConsequencesById,
    ConsequencesByHgvs,
    ConsequencesByRegion,
    MutationTaster,
    ClinVarByRcv,
}

impl ToolKind for VariantTool {
    fn all() -> &'static [Self] {
        &[
            Self::GnomadByRsid,
            Self::SnpByRsid,
            Self::StructuralVariants,
            Self::ConsequencesById,
            Self::ConsequencesByHgvs,
            Self::ConsequencesByRegion,
            Self::MutationTaster,
            Self::ClinVarByRcv,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::GnomadByRsid => "tool_query_gnomad_by_rsid",
            Self::SnpByRsid => "tool_query_single_nucleotide_polymorphisms_db_by_rsid",
            Self::StructuralVariants => "tool_query_structural_variants_db",
            Self::ConsequencesById => "tool_get_variant_consequences_by_id",
            Self::ConsequencesByHgvs => "tool_get_variant_consequences_by_hgvs",
            Self::ConsequencesByRegion => "tool_get_variant_consequences_by_region_and_allele",
            Self::MutationTaster => "tool_get_mutation_tester_result",
            Self::ClinVarByRcv => "tool_get_clinvar_data_by_rcv_code",
        }
    }

    fn spec(self) -> ToolSpec {
        let (description, parameters) = match self {
            Self::GnomadByRsid => (
                "Query the gnomAD population database by the rsID of a variant. Returns allele \
                 counts and frequencies for exomes and genomes, per-population breakdowns, quality \
                 metrics, flags and transcript consequences.",
                vec![ParameterSchema::required_string("rsid", "dbSNP reference SNP id, e.g. 'rs80357906'")],
            ),
            Self::SnpByRsid => (
                "Look up a single nucleotide polymorphism in dbSNP by rsID. Returns the GRCh38 \
                 chromosome, position, alleles and gene.",
                vec![ParameterSchema::required_string("rsid", "dbSNP reference SNP id, e.g. 'rs334'")],
            ),
            Self::StructuralVariants => (
                "Search the dbVar database of structural variants (large insertions, deletions, \
                 duplications, inversions) by free-text terms such as a gene symbol.",
                vec![ParameterSchema::required_string("terms", "search terms, e.g. 'BRCA1'")],
            ),
            Self::ConsequencesById => (
                "Predict the molecular consequences of a variant with Ensembl VEP, given a dbSNP, \
                 COSMIC or HGMD identifier.",
                vec![ParameterSchema::required_string("id", "variant identifier, e.g. 'rs56116432'")],
            ),
            Self::ConsequencesByHgvs => (
                "Predict the molecular consequences of a variant with Ensembl VEP, given its HGVS \
                 notation.",
                vec![ParameterSchema::required_string(
                    "hgvs_code",
                    "HGVS notation, e.g. 'ENST00000366667:c.803C>T'",
                )],
            ),
            Self::ConsequencesByRegion => (
                "Predict the molecular consequences of a variant with Ensembl VEP, given a genomic \
                 region and the alternate allele.",
                vec![
                    ParameterSchema::required_string("region", "region as chr:start-end:strand, e.g. '9:22125503-22125502:1'"),
                    ParameterSchema::required_string("allele", "alternate allele, e.g. 'C'"),
                ],
            ),
            Self::MutationTaster => (
                "Get MutationTaster disease-causing predictions for one or more variants.",
                vec![ParameterSchema::required_string(
                    "id",
                    "comma-separated variants as chr:posREF>ALT, e.g. '21:33039603A>C'",
                )],
            ),
            Self::ClinVarByRcv => (
                "Get the ClinVar clinical significance record for an RCV accession: significance, \
                 evidence source, functional and molecular consequences and disease mechanism.",
                vec![ParameterSchema::required_string("rcv", "ClinVar RCV accession, e.g. 'RCV000009910'")],
            ),
        };

        ToolSpec {
            name: self.name().into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Executes variant tools against the upstream services
pub struct VariantToolbox {
    gnomad: GnomadClient,
    vep: VepClient,
    mutation_taster: MutationTasterClient,
    clinvar: ClinVarClient,
    clinical_tables: ClinicalTablesClient,
}

impl VariantToolbox {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: &Endpoints) -> Self {
        Self {
            gnomad: GnomadClient::new(transport.clone(), &endpoints.gnomad),
            vep: VepClient::new(transport.clone(), &endpoints.ensembl),
            mutation_taster: MutationTasterClient::new(transport.clone(), &endpoints.mutation_taster),
            clinvar: ClinVarClient::new(transport.clone(), &endpoints.eutils),
            clinical_tables: ClinicalTablesClient::new(transport, &endpoints.clinical_tables),
        }
    }

    async fn dispatch(&self, kind: VariantTool, args: &ToolArguments) -> agent_core::Result<LookupResult> {
        let result = match kind {
            VariantTool::GnomadByRsid => normalize(self.gnomad.variant_by_rsid(args.require_str("rsid")?).await),
            VariantTool::SnpByRsid => normalize(self.clinical_tables.snps(args.require_str("rsid")?).await),
            VariantTool::StructuralVariants => {
                normalize(self.clinical_tables.structural_variants(args.require_str("terms")?).await)
            }
            VariantTool::ConsequencesById => normalize(self.vep.by_id(args.require_str("id")?).await),
            VariantTool::ConsequencesByHgvs => normalize(self.vep.by_hgvs(args.require_str("hgvs_code")?).await),
            VariantTool::ConsequencesByRegion => normalize(
                self.vep
                    .by_region(args.require_str("region")?, args.require_str("allele")?)
                    .await,
            ),
            VariantTool::MutationTaster => {
                normalize(self.mutation_taster.predictions(args.require_str("id")?).await)
            }
            VariantTool::ClinVarByRcv => normalize(self.clinvar.summary(args.require_str("rcv")?).await),
        };
        Ok(result)
    }
}

#[async_trait]
impl Toolbox for VariantToolbox {
    type Kind = VariantTool;

    async fn invoke(&self, kind: VariantTool, args: &ToolArguments) -> LookupResult {
        let result = self
            .dispatch(kind, args)
            .await
            .unwrap_or_else(|e| LookupResult::failure(e.to_string()));

        if let Some(error) = &result.error {
            tracing::warn!(tool = kind.name(), %error, "lookup failed");
        } else {
            tracing::debug!(tool = kind.name(), "lookup succeeded");
        }
        result
    }
}

/// Fold an adapter outcome into the uniform result shape
pub fn normalize<T: Serialize>(outcome: Result<T>) -> LookupResult {
    match outcome.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(payload) => LookupResult::success(payload),
        Err(e) => LookupResult::failure(e.to_string()),
    }
}
