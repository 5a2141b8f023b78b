use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::warn;

use crate::domain::Species;
use crate::error::KiraError;
use crate::gene::{GeneLookup, GeneRecord};
use crate::http::{build_client, send_with_retries};

const ENSEMBL_REST_BASE: &str = "https://rest.ensembl.org";

#[derive(Clone)]
pub struct EnsemblHttpClient {
    client: Client,
    base_url: String,
}

impl EnsemblHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(30), KiraError::EnsemblHttp)?;
        Ok(Self {
            client,
            base_url: ENSEMBL_REST_BASE.to_string(),
        })
    }

    fn lookup_url(&self, ensembl: &str) -> String {
        format!("{}/lookup/id/{ensembl}", self.base_url)
    }

    fn xrefs_url(&self, ensembl: &str) -> String {
        format!("{}/xrefs/id/{ensembl}?external_db=EntrezGene", self.base_url)
    }

    fn get_json(&self, url: &str) -> Result<Option<Value>, KiraError> {
        let response = send_with_retries(
            || self.client.get(url).header(ACCEPT, "application/json"),
            KiraError::EnsemblHttp,
        )?;
        let status = response.status().as_u16();
        if matches!(status, 400 | 404) {
            return Ok(None);
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Ensembl request failed".to_string());
            return Err(KiraError::EnsemblStatus { status, message });
        }
        response
            .json()
            .map(Some)
            .map_err(|err| KiraError::EnsemblHttp(err.to_string()))
    }
}

impl GeneLookup for EnsemblHttpClient {
    fn name(&self) -> &str {
        "ensembl"
    }

    fn by_ensembl(
        &self,
        ensembl: &str,
        _species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        let Some(payload) = self.get_json(&self.lookup_url(ensembl))? else {
            return Ok(None);
        };
        let Some(mut record) = parse_lookup_json(&payload, ensembl) else {
            return Ok(None);
        };
        if record.geneid.is_none() {
            match self.get_json(&self.xrefs_url(ensembl)) {
                Ok(Some(xrefs)) => record.geneid = parse_entrez_xref(&xrefs),
                Ok(None) => {}
                Err(err) => warn!(ensembl, error = %err, "Ensembl xref lookup failed"),
            }
        }
        Ok(Some(record))
    }
}

/// Converts an Ensembl REST `lookup/id` answer into a gene record. The NCBI
/// GeneID is filled only when the answer embeds an EntrezGene cross reference.
pub fn parse_lookup_json(payload: &Value, requested: &str) -> Option<GeneRecord> {
    if payload.get("error").is_some() {
        return None;
    }
    let symbol = payload["display_name"].as_str()?.trim().to_string();
    let ensembl = payload["id"]
        .as_str()
        .unwrap_or(requested)
        .to_ascii_uppercase();
    let species = payload["species"].as_str().map(binomial_species);
    let geneid = parse_entrez_xref(&payload["xrefs"]);
    Some(GeneRecord {
        symbol: Some(symbol),
        ensembl: Some(ensembl),
        geneid,
        species,
    })
}

/// NCBI GeneID from an Ensembl xref list, as returned by `xrefs/id` or
/// embedded under `xrefs` in a lookup answer.
pub fn parse_entrez_xref(xrefs: &Value) -> Option<String> {
    xrefs.as_array()?.iter().find_map(|xref| {
        let db = xref["dbname"].as_str().unwrap_or_default().to_ascii_lowercase();
        if !matches!(
            db.as_str(),
            "entrezgene" | "ncbi_gene" | "ncbigene" | "ncbi_geneid"
        ) {
            return None;
        }
        xref["primary_id"]
            .as_str()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// `homo_sapiens` becomes `Homo sapiens`.
fn binomial_species(raw: &str) -> String {
    let joined = raw
        .split('_')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
