use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::domain::Species;
use crate::error::KiraError;
use crate::gene::{GeneLookup, GeneRecord};
use crate::http::{build_client, send_with_retries};

const UNIPROT_BASE: &str = "https://rest.uniprot.org";
const MAX_POLLS: usize = 10;
const POLL_DELAY_MS: u64 = 1_000;

static GN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Name=([^;{]+)").expect("static GN regex"));
static OS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^OS   (.*?)(?: \(.*|$)").expect("static OS regex"));
static DR_GENE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GeneID;\s*(\d+);").expect("static GeneID regex"));
static DR_ENSEMBL_GENE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(ENS[A-Z]*G\d+)(?:\.\d+)?").expect("static ENSG regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Finished,
    Running,
    Failed(String),
}

/// Resolves Ensembl gene ids through the UniProt ID-mapping service and the
/// matching UniProtKB flat-file entry.
#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    base_url: String,
}

impl UniprotHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let client = build_client(Duration::from_secs(30), KiraError::UniprotHttp)?;
        Ok(Self {
            client,
            base_url: UNIPROT_BASE.to_string(),
        })
    }

    fn handle_status(response: Response) -> Result<Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "UniProt request failed".to_string());
        Err(KiraError::UniprotStatus { status, message })
    }

    fn get_json(&self, url: &str) -> Result<Value, KiraError> {
        let response = send_with_retries(
            || self.client.get(url).header(ACCEPT, "application/json"),
            KiraError::UniprotHttp,
        )?;
        Self::handle_status(response)?
            .json()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))
    }

    fn map_ensembl(&self, ensembl: &str) -> Result<Option<String>, KiraError> {
        let run_url = format!("{}/idmapping/run", self.base_url);
        let response = send_with_retries(
            || {
                self.client
                    .post(&run_url)
                    .header(ACCEPT, "application/json")
                    .form(&[("from", "Ensembl"), ("to", "UniProtKB"), ("ids", ensembl)])
            },
            KiraError::UniprotHttp,
        )?;
        let submitted: Value = Self::handle_status(response)?
            .json()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))?;
        let Some(job_id) = submitted["jobId"].as_str().map(|id| id.to_string()) else {
            return Ok(None);
        };

        let status_url = format!("{}/idmapping/status/{job_id}", self.base_url);
        for attempt in 0..MAX_POLLS {
            match parse_job_status(&self.get_json(&status_url)?) {
                JobStatus::Finished => break,
                JobStatus::Running if attempt + 1 < MAX_POLLS => {
                    thread::sleep(Duration::from_millis(POLL_DELAY_MS * (attempt as u64 + 1)));
                }
                JobStatus::Running => {
                    return Err(KiraError::UniprotHttp(format!(
                        "id mapping job {job_id} did not finish"
                    )));
                }
                JobStatus::Failed(reason) => {
                    return Err(KiraError::UniprotHttp(format!(
                        "id mapping job {job_id} failed: {reason}"
                    )));
                }
            }
        }

        let results_url = format!(
            "{}/idmapping/stream/{job_id}?format=tsv&fields=accession&size=1",
            self.base_url
        );
        let response = send_with_retries(|| self.client.get(&results_url), KiraError::UniprotHttp)?;
        let tsv = Self::handle_status(response)?
            .text()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))?;
        Ok(parse_idmapping_accession(&tsv))
    }

    fn fetch_entry(&self, accession: &str) -> Result<String, KiraError> {
        let url = format!("{}/uniprotkb/{accession}.txt", self.base_url);
        let response = send_with_retries(|| self.client.get(&url), KiraError::UniprotHttp)?;
        Self::handle_status(response)?
            .text()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))
    }
}

impl GeneLookup for UniprotHttpClient {
    fn name(&self) -> &str {
        "uniprot"
    }

    fn by_ensembl(
        &self,
        ensembl: &str,
        _species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        let Some(accession) = self.map_ensembl(ensembl)? else {
            return Ok(None);
        };
        let entry = self.fetch_entry(&accession)?;
        Ok(parse_entry_text(&entry, Some(ensembl)))
    }
}

pub fn parse_job_status(payload: &Value) -> JobStatus {
    // Finished jobs sometimes answer with the results instead of a status.
    if payload.get("results").is_some() {
        return JobStatus::Finished;
    }
    match payload["jobStatus"].as_str() {
        Some("FINISHED") => JobStatus::Finished,
        Some("RUNNING") | Some("QUEUED") | Some("NEW") => JobStatus::Running,
        Some(other) => JobStatus::Failed(other.to_string()),
        None => JobStatus::Failed("missing jobStatus".to_string()),
    }
}

/// First accession of an ID-mapping TSV stream. The header names the
/// `Entry` column; streams without one carry the accession after `From`.
pub fn parse_idmapping_accession(tsv: &str) -> Option<String> {
    let mut lines = tsv.lines();
    let header = lines.next()?;
    let column = header
        .split('\t')
        .position(|name| name.trim().eq_ignore_ascii_case("entry"))
        .unwrap_or(1);
    lines
        .filter_map(|line| line.split('\t').nth(column))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(|value| value.to_string())
}

pub fn parse_entry_text(entry: &str, requested_ensembl: Option<&str>) -> Option<GeneRecord> {
    let mut record = GeneRecord {
        ensembl: requested_ensembl.map(|id| id.to_ascii_uppercase()),
        ..GeneRecord::default()
    };
    let mut ensembl_from_entry = false;
    for line in entry.lines() {
        if line.starts_with("OS   ") && record.species.is_none() {
            record.species = OS_NAME
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().trim_end_matches('.').to_string());
        } else if line.starts_with("GN   ") && record.symbol.is_none() {
            record.symbol = GN_NAME
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_ascii_uppercase());
        } else if line.starts_with("DR   GeneID;") && record.geneid.is_none() {
            record.geneid = DR_GENE_ID
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
        } else if line.starts_with("DR   Ensembl;") && !ensembl_from_entry {
            if let Some(gene) = DR_ENSEMBL_GENE
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_ascii_uppercase())
            {
                record.ensembl = Some(gene);
                ensembl_from_entry = true;
            }
        }
    }
    record.symbol.as_ref()?;
    Some(record)
}
