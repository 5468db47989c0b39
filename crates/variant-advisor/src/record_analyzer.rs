//! ClinVar Record Analyzer
//!
//! Reduces a ClinVar `clinvarset` XML document to one flat summary per
//! `ClinVarSet` entry.

use roxmltree::{Document, Node};

use crate::error::{AdvisorError, Result};
use crate::model::{ClinicalRecordAnalysis, ClinicalRecordSummary};

const REFERENCE: &str = "ReferenceClinVarAssertion";
const NONE: &str = "None";

/// Parse and analyze a raw ClinVar XML body
pub fn analyze(xml: &str) -> Result<ClinicalRecordAnalysis> {
    let document = Document::parse(xml)?;
    Ok(analyze_document(&document))
}

/// Analyze an already parsed document
pub fn analyze_document(document: &Document<'_>) -> ClinicalRecordAnalysis {
    let entries = document
        .root_element()
        .children()
        .filter(Node::is_element)
        .filter_map(summarize_entry)
        .collect();

    ClinicalRecordAnalysis::new(entries)
}

fn summarize_entry(entry: Node<'_, '_>) -> Option<ClinicalRecordSummary> {
    let Some(reference) = child(entry, REFERENCE) else {
        tracing::warn!(tag = entry.tag_name().name(), "ClinVar entry has no reference assertion, skipped");
        return None;
    };

    let last_update = required_attribute(Some(reference), "DateLastUpdated");
    let accession = required_attribute(find_path(reference, "ClinVarAccession"), "Acc");

    let clinvar_sig = find_path(reference, "ClinicalSignificance/Description")
        .and_then(|n| n.text())
        .map(str::to_owned);

    let source_type = match find_path(reference, "ObservedIn/Method/MethodType").and_then(|n| n.text()) {
        Some(text) => text.to_owned(),
        None => {
            let missing = AdvisorError::MissingRequiredField("ObservedIn/Method/MethodType");
            tracing::warn!(%accession, error = %missing, "defaulting source type");
            NONE.to_owned()
        }
    };

    let measure = find_path(reference, "MeasureSet/Measure");
    let functional = collect_attributes(measure, "FunctionalConsequence");
    let molecular = collect_attributes(measure, "MolecularConsequence");

    let trait_node = find_path(reference, "TraitSet/Trait");
    let mechanisms = collect_attributes(trait_node, "disease mechanism");

    Some(ClinicalRecordSummary {
        last_update,
        accession,
        clinvar_sig,
        source_type,
        functional_consq: join_or_none(&functional),
        molecular_consq: join_or_none(&molecular),
        disease_mech: join_or_none(&mechanisms),
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
}

/// First element reached by a slash-separated path of child tags, searching
/// every matching branch in document order.
fn find_path<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Option<Node<'a, 'input>> {
    match path.split_once('/') {
        None => child(node, path),
        Some((head, rest)) => node
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == head)
            .find_map(|c| find_path(c, rest)),
    }
}

fn required_attribute(node: Option<Node<'_, '_>>, name: &'static str) -> String {
    if let Some(value) = node.and_then(|n| n.attribute(name)) {
        return value.to_owned();
    }
    tracing::warn!(attribute = name, "ClinVar attribute missing, defaulting to None");
    NONE.to_owned()
}

/// Text of the first `Attribute[@Type=kind]` in each `AttributeSet` under `parent`
fn collect_attributes(parent: Option<Node<'_, '_>>, kind: &str) -> Vec<String> {
    let Some(parent) = parent else {
        return Vec::new();
    };

    parent
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "AttributeSet")
        .filter_map(|set| {
            set.children().find(|a| {
                a.is_element() && a.tag_name().name() == "Attribute" && a.attribute("Type") == Some(kind)
            })
        })
        .filter_map(|a| a.text())
        .map(str::to_owned)
        .collect()
}

fn join_or_none(values: &[String]) -> String {
    let mut joined = values.join(",");
    if joined.ends_with(',') {
        joined.pop();
    }
    if joined.is_empty() {
        NONE.to_owned()
    } else {
        joined
    }
}
