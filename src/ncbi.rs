use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::domain::Species;
use crate::error::KiraError;
use crate::gene::{GeneLookup, GeneRecord};
use crate::http::{build_client, build_query_url, send_with_retries};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

static GENBANK_GENE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/db_xref="GeneID:(\d+)""#).expect("static GenBank regex")
});
static GENE_TRACK_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Gene-track_geneid>(\d+)</Gene-track_geneid>").expect("static gene id regex")
});
static GENE_LOCUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Gene-ref_locus>([^<]+)</Gene-ref_locus>").expect("static locus regex")
});
static GENE_TAXNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Org-ref_taxname>([^<]+)</Org-ref_taxname>").expect("static taxname regex")
});
static GENE_ENSEMBL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<Dbtag>\s*<Dbtag_db>ENSEMBL</Dbtag_db>\s*<Dbtag_tag>\s*<Object-id>\s*<Object-id_str>([^<]+)</Object-id_str>",
    )
    .expect("static Ensembl dbtag regex")
});

/// Gene lookups against NCBI E-utilities (nuccore and gene databases).
#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NcbiHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(60), KiraError::NcbiHttp)?;
        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Ok(Self {
            client,
            base_url: EUTILS_BASE.to_string(),
            api_key,
        })
    }

    fn get_text(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, KiraError> {
        let mut params = params.to_vec();
        if let Some(key) = self.api_key.as_deref() {
            params.push(("api_key", key));
        }
        let url = build_query_url(&format!("{}/{endpoint}", self.base_url), &params);
        let response = send_with_retries(|| self.client.get(&url), KiraError::NcbiHttp)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NCBI request failed".to_string());
            return Err(KiraError::NcbiStatus { status, message });
        }
        response
            .text()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))
    }

    fn esearch(&self, db: &str, term: &str) -> Result<Vec<String>, KiraError> {
        let body = self.get_text(
            "esearch.fcgi",
            &[("db", db), ("term", term), ("retmode", "json")],
        )?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|err| KiraError::NcbiHttp(err.to_string()))?;
        Ok(parse_esearch_ids(&payload))
    }

    fn gene_details(&self, geneid: &str) -> Result<Option<GeneRecord>, KiraError> {
        let xml = self.get_text(
            "efetch.fcgi",
            &[("db", "gene"), ("id", geneid), ("retmode", "xml")],
        )?;
        Ok(parse_gene_xml(&xml))
    }

    fn search_gene(&self, term: &str) -> Result<Option<GeneRecord>, KiraError> {
        match self.esearch("gene", term)?.first() {
            Some(geneid) => self.gene_details(geneid),
            None => Ok(None),
        }
    }
}

impl GeneLookup for NcbiHttpClient {
    fn name(&self) -> &str {
        "ncbi"
    }

    fn by_refseq(&self, refseq: &str) -> Result<Option<GeneRecord>, KiraError> {
        let Some(uid) = self.esearch("nuccore", refseq)?.into_iter().next() else {
            return Ok(None);
        };
        let genbank = self.get_text(
            "efetch.fcgi",
            &[
                ("db", "nuccore"),
                ("id", uid.as_str()),
                ("rettype", "gb"),
                ("retmode", "text"),
            ],
        )?;
        let Some(geneid) = parse_genbank_gene_id(&genbank) else {
            return Ok(None);
        };
        let details = self.gene_details(&geneid)?;
        Ok(Some(details.unwrap_or(GeneRecord {
            geneid: Some(geneid),
            ..GeneRecord::default()
        })))
    }

    fn by_gene_id(&self, geneid: &str) -> Result<Option<GeneRecord>, KiraError> {
        self.gene_details(geneid)
    }

    fn by_symbol(
        &self,
        symbol: &str,
        species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        self.search_gene(&organism_term(&format!("{symbol}[Gene Name]"), species))
    }

    fn by_ensembl(
        &self,
        ensembl: &str,
        species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        self.search_gene(&organism_term(&format!("{ensembl}[Accession]"), species))
    }
}

fn organism_term(term: &str, species: Option<&Species>) -> String {
    match species {
        Some(species) => format!("{term} AND \"{}\"[Organism]", species.name),
        None => term.to_string(),
    }
}

pub fn parse_esearch_ids(payload: &Value) -> Vec<String> {
    payload["esearchresult"]["idlist"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_genbank_gene_id(genbank: &str) -> Option<String> {
    GENBANK_GENE_ID
        .captures(genbank)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts the first gene from an efetch `db=gene` XML document. A record
/// without both a GeneID and a locus symbol is treated as absent.
pub fn parse_gene_xml(xml: &str) -> Option<GeneRecord> {
    let capture = |re: &Regex| {
        re.captures(xml)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    };
    let geneid = capture(&GENE_TRACK_ID)?;
    let symbol = capture(&GENE_LOCUS)?.to_ascii_uppercase();
    Some(GeneRecord {
        symbol: Some(symbol),
        ensembl: capture(&GENE_ENSEMBL_TAG).map(|id| id.to_ascii_uppercase()),
        geneid: Some(geneid),
        species: capture(&GENE_TAXNAME),
    })
}
