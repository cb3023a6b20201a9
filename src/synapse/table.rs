//! Paged Synapse table queries

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{start_job, wait_for_job, JobPolling, SynapseApi};
use crate::error::{DictionaryError, Result};

const QUERY_BUNDLE_REQUEST: &str = "org.sagebionetworks.repo.model.table.QueryBundleRequest";
/// Query results only
const PART_MASK_RESULTS: u64 = 0x1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub name: String,
    #[serde(default)]
    pub column_type: String,
}

impl ColumnHeader {
    pub fn is_list(&self) -> bool {
        self.column_type.ends_with("_LIST")
    }
}

#[derive(Debug, Deserialize)]
struct RowSet {
    #[serde(default)]
    headers: Vec<ColumnHeader>,
    #[serde(default)]
    rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    values: Vec<Option<String>>,
}

pub type Row = IndexMap<String, Value>;

/// All rows of a query, keyed by column name
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Text value of a cell; null and empty cells are `None`
pub fn cell_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Decode one cell. List columns arrive as JSON-encoded strings.
fn decode_cell(header: &ColumnHeader, raw: Option<String>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) if header.is_list() => {
            serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
        }
        Some(text) => Value::String(text),
    }
}

fn run_page(
    api: &dyn SynapseApi,
    table_id: &str,
    sql: &str,
    offset: u64,
    limit: u64,
    polling: JobPolling,
) -> Result<RowSet> {
    let path = format!("/entity/{}/table/query/async/start", table_id);
    let body = json!({
        "concreteType": QUERY_BUNDLE_REQUEST,
        "entityId": table_id,
        "query": {"sql": sql, "offset": offset, "limit": limit},
        "partMask": PART_MASK_RESULTS,
    });
    let token = start_job(api, &path, &body)?;
    let response = wait_for_job(api, &token, polling)?;

    let rows = response
        .pointer("/queryResult/queryResults")
        .cloned()
        .ok_or_else(|| DictionaryError::Synapse {
            path,
            status: 200,
            message: "query response has no queryResult".to_string(),
        })?;
    Ok(serde_json::from_value(rows)?)
}

/// Run `sql` against `table_id`, fetching `page_size` rows at a time until
/// a short page comes back
pub fn query_table(
    api: &dyn SynapseApi,
    table_id: &str,
    sql: &str,
    page_size: u64,
    polling: JobPolling,
) -> Result<QueryResult> {
    let page_size = page_size.max(1);
    let mut result = QueryResult::default();
    let mut offset = 0;

    loop {
        let page = run_page(api, table_id, sql, offset, page_size, polling)?;
        if result.headers.is_empty() {
            result.headers = page.headers.clone();
        }
        let fetched = page.rows.len() as u64;

        for raw in page.rows {
            let row: Row = page
                .headers
                .iter()
                .zip(raw.values.into_iter().chain(std::iter::repeat(None)))
                .map(|(header, value)| (header.name.clone(), decode_cell(header, value)))
                .collect();
            result.rows.push(row);
        }

        tracing::debug!(table = %table_id, offset, fetched, "fetched table page");
        if fetched < page_size {
            break;
        }
        offset += fetched;
    }

    Ok(result)
}
