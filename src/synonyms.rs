//! Ontology synonyms as enum aliases
//!
//! Synonyms are extracted from the ontology terms enum values point at
//! (`meaning`), kept in a `Term,URLs,Synonyms` CSV, and injected back into
//! the schema as `aliases` after near-duplicates are filtered out.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::Client;
use serde::Deserialize;
use similar::TextDiff;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::Result;
use crate::linkml::SchemaDocument;

pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Lowercase, ASCII letters and digits only
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Similarity of the normalized strings, 0.0..=1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
}

/// Synonyms worth keeping as aliases of `term`, in input order
pub fn filter_synonyms(term: &str, synonyms: &[String], threshold: f64) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for synonym in synonyms {
        if synonym == term {
            continue;
        }
        if normalize(synonym) == normalize(term) {
            tracing::debug!(term, synonym = %synonym, "case-only difference");
            continue;
        }
        if let Some(existing) = kept.iter().find(|k| similarity(synonym, k) >= threshold) {
            tracing::debug!(synonym = %synonym, existing = %existing, "near-duplicate synonym");
            continue;
        }
        if similarity(synonym, term) >= threshold {
            tracing::debug!(term, synonym = %synonym, "near-duplicate of term");
            continue;
        }
        kept.push(synonym.clone());
    }
    kept
}

#[derive(Debug, Deserialize)]
struct SynonymRecord {
    #[serde(rename = "Term")]
    term: String,
    #[serde(rename = "Synonyms", default)]
    synonyms: String,
}

/// Read `Term`/`Synonyms` columns; synonyms are `;` separated. Terms with
/// no synonyms are left out.
pub fn load_synonyms_csv(path: impl AsRef<Path>) -> Result<IndexMap<String, Vec<String>>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut synonyms = IndexMap::new();
    for record in reader.deserialize() {
        let record: SynonymRecord = record?;
        let values: Vec<String> = record
            .synonyms
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !values.is_empty() {
            synonyms.insert(record.term, values);
        }
    }
    Ok(synonyms)
}

/// Replace `aliases` of every listed term with its filtered synonyms.
/// Returns how many terms changed.
pub fn inject_synonyms(doc: &mut SchemaDocument, synonyms: &IndexMap<String, Vec<String>>, threshold: f64) -> usize {
    let mut modified = 0;
    for enum_def in doc.enums.values_mut() {
        for (term, value) in enum_def.permissible_values.iter_mut() {
            let Some(candidates) = synonyms.get(term) else {
                continue;
            };
            let kept = filter_synonyms(term, candidates, threshold);
            if kept.is_empty() {
                continue;
            }
            tracing::debug!(term = %term, aliases = kept.len(), "added aliases");
            value.aliases = kept;
            modified += 1;
        }
    }
    modified
}

/// Where exact synonyms of an ontology term come from
pub trait SynonymSource {
    fn exact_synonyms(&self, term_iri: &str) -> Result<Vec<String>>;
}

/// `oboInOwl:hasExactSynonym` values of the element describing `term_iri`
/// (`rdf:about`) in an RDF/XML document
pub fn parse_exact_synonyms(rdf_xml: &str, term_iri: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(rdf_xml);
    reader.trim_text(true);

    let mut depth = 0usize;
    let mut subject_depth: Option<usize> = None;
    let mut in_synonym = false;
    let mut synonyms = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if subject_depth.is_none() && describes(&e, term_iri)? {
                    subject_depth = Some(depth);
                } else if subject_depth.is_some() && e.local_name().as_ref() == b"hasExactSynonym" {
                    in_synonym = true;
                }
            }
            Event::Text(t) if in_synonym => synonyms.push(t.unescape()?.into_owned()),
            Event::CData(c) if in_synonym => {
                synonyms.push(String::from_utf8_lossy(&c.into_inner()).into_owned())
            }
            Event::End(_) => {
                if subject_depth == Some(depth) {
                    subject_depth = None;
                }
                in_synonym = false;
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(synonyms)
}

fn describes(element: &BytesStart<'_>, term_iri: &str) -> Result<bool> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"about" && attr.unescape_value()? == term_iri {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fetches RDF/XML over HTTP. Each document is fetched at most once.
pub struct OntologySynonymSource {
    http: Client,
    cache: RefCell<HashMap<String, Option<String>>>,
}

impl OntologySynonymSource {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("nf-dictionary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Cached body of `url`; failures are cached as `None`
    fn fetch(&self, url: &str) -> Option<String> {
        if let Some(cached) = self.cache.borrow().get(url) {
            return cached.clone();
        }
        let body = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/rdf+xml")
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| tracing::warn!(url, error = %e, "could not fetch ontology document"))
            .ok();
        self.cache.borrow_mut().insert(url.to_string(), body.clone());
        body
    }
}

/// Whole-ontology fallback: `http://purl.obolibrary.org/obo/EFO_0008896`
/// → `http://purl.obolibrary.org/obo/EFO.owl`
pub fn ontology_url(term_iri: &str) -> String {
    let base = term_iri.rsplit_once('_').map(|(b, _)| b).unwrap_or(term_iri);
    format!("{}.owl", base)
}

impl SynonymSource for OntologySynonymSource {
    fn exact_synonyms(&self, term_iri: &str) -> Result<Vec<String>> {
        if let Some(rdf) = self.fetch(term_iri) {
            match parse_exact_synonyms(&rdf, term_iri) {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => {}
                // Content negotiation sometimes returns HTML
                Err(e) => tracing::debug!(term = term_iri, error = %e, "term document is not RDF/XML"),
            }
        }
        match self.fetch(&ontology_url(term_iri)) {
            Some(rdf) => parse_exact_synonyms(&rdf, term_iri),
            None => Ok(Vec::new()),
        }
    }
}

/// One output row of synonym extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymRow {
    pub term: String,
    pub urls: Vec<String>,
    pub synonyms: Vec<String>,
}

fn is_web_url(text: &str) -> bool {
    Url::parse(text)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Ask `source` for synonyms of every enum value whose `meaning` is a web
/// URL. Terms with no synonyms are left out; lookup errors are logged.
pub fn extract_synonyms(doc: &SchemaDocument, source: &dyn SynonymSource) -> Vec<SynonymRow> {
    let mut rows = Vec::new();
    for (term, value) in doc.enums.values().flat_map(|e| e.permissible_values.iter()) {
        let Some(meaning) = value.meaning.as_deref().filter(|m| is_web_url(m)) else {
            continue;
        };
        match source.exact_synonyms(meaning) {
            Ok(synonyms) if !synonyms.is_empty() => rows.push(SynonymRow {
                term: term.clone(),
                urls: vec![meaning.to_string()],
                synonyms,
            }),
            Ok(_) => {}
            Err(e) => tracing::warn!(term = %term, error = %e, "synonym lookup failed"),
        }
    }
    rows
}

pub fn write_synonyms_csv(path: impl AsRef<Path>, rows: &[SynonymRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["Term", "URLs", "Synonyms"])?;
    for row in rows {
        writer.write_record([
            row.term.as_str(),
            row.urls.join("; ").as_str(),
            row.synonyms.join("; ").as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
