//! Metadata curation tasks
//!
//! A file-based task ties an upload folder to a template: the template's
//! schema is bound to the folder, a file view exposes the schema's
//! annotations as columns, and the task itself points contributors at both.
//!
//! A record-based task collects metadata as rows instead: a RecordSet inside
//! the folder holds the records, the schema is bound to it, and a grid
//! session opens it for editing.

use serde::Serialize;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::views::{bind_schema, columns_from_schema, create_entity_view, ColumnDefaults};
use super::{start_job, wait_for_job, JobPolling, SynapseApi};
use crate::error::{DictionaryError, Result};
use crate::uri::SchemaUri;

const PROJECT: &str = "org.sagebionetworks.repo.model.Project";
const RECORD_SET: &str = "org.sagebionetworks.repo.model.RecordSet";
const FILE_BASED_TASK: &str = "org.sagebionetworks.repo.model.curation.metadata.FileBasedMetadataTaskProperties";
const RECORD_BASED_TASK: &str = "org.sagebionetworks.repo.model.curation.metadata.RecordBasedMetadataTaskProperties";
const CREATE_GRID: &str = "org.sagebionetworks.repo.model.grid.CreateGridRequest";
pub const DEFAULT_INSTRUCTIONS: &str = "Please add metadata for your files";
pub const DEFAULT_RECORD_INSTRUCTIONS: &str = "Please update records";

#[derive(Debug, Clone)]
pub struct CurationTaskRequest {
    pub folder_id: String,
    /// Template class name or a full registered schema URL
    pub template: String,
    pub instructions: String,
    pub bind_schema: bool,
    /// Where local template schemas live
    pub schema_dir: PathBuf,
}

impl CurationTaskRequest {
    pub fn new(folder_id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            template: template.into(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            bind_schema: true,
            schema_dir: PathBuf::from("registered-json-schemas"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurationTaskResult {
    pub task_id: String,
    pub fileview_id: String,
    pub data_type: String,
    pub schema_uri: String,
    pub project_id: String,
}

impl CurationTaskResult {
    /// `key=value` lines in the GitHub Actions output format
    pub fn github_output(&self) -> String {
        format!(
            "task_id={}\nfileview_id={}\ndata_type={}\nschema_uri={}\n",
            self.task_id, self.fileview_id, self.data_type, self.schema_uri
        )
    }

    /// Append to the file named by `$GITHUB_OUTPUT`
    pub fn append_github_output(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.github_output().as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordSetTaskRequest {
    pub folder_id: String,
    pub record_set_name: String,
    /// Template class name or a full registered schema URL
    pub template: String,
    /// Default: `RecordSet for <name>`
    pub description: Option<String>,
    /// Default: the record set name
    pub task_name: Option<String>,
    /// Fields that identify a record
    pub upsert_keys: Vec<String>,
    pub instructions: String,
    pub bind_schema: bool,
    pub schema_dir: PathBuf,
}

impl RecordSetTaskRequest {
    pub fn new(folder_id: impl Into<String>, record_set_name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            record_set_name: record_set_name.into(),
            template: template.into(),
            description: None,
            task_name: None,
            upsert_keys: Vec::new(),
            instructions: DEFAULT_RECORD_INSTRUCTIONS.to_string(),
            bind_schema: true,
            schema_dir: PathBuf::from("registered-json-schemas"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSetTaskResult {
    pub recordset_id: String,
    pub task_id: String,
    pub data_grid_session_id: String,
    /// Short registered name, e.g. `org.synapse.nf-datalandscape-0.2.0`
    pub schema_uri: String,
    pub project_id: String,
    pub folder_id: String,
    pub record_set_name: String,
}

impl RecordSetTaskResult {
    pub fn github_output(&self) -> String {
        format!(
            "recordset_id={}\ntask_id={}\ndata_grid_session_id={}\nschema_uri={}\nproject_id={}\nfolder_id={}\nrecord_set_name={}\n",
            self.recordset_id,
            self.task_id,
            self.data_grid_session_id,
            self.schema_uri,
            self.project_id,
            self.folder_id,
            self.record_set_name
        )
    }

    pub fn append_github_output(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.github_output().as_bytes())?;
        Ok(())
    }
}

fn is_url(template: &str) -> bool {
    template.starts_with("http://") || template.starts_with("https://")
}

/// `ImagingAssayTemplate` + `syn123` → `ImagingAssay-syn123`
pub fn generate_data_type(template: &str, folder_id: &str) -> String {
    let base = template.strip_suffix("Template").unwrap_or(template);
    format!("{}-{}", base, folder_id)
}

/// Template name inside a registered schema URL, e.g.
/// `.../sage.schemas.v2571-nf.ChIPSeqTemplate.schema-9.14.0` → `ChIPSeqTemplate`.
/// Falls back to the URL's host.
pub fn template_name_from_uri(uri: &str) -> String {
    let last = uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri);
    if let Some(part) = last.split('.').find(|p| p.contains("Template")) {
        return part.to_string();
    }
    let without_scheme = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri);
    without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
}

/// Schema `$id` and body for a template. Local templates are read from
/// `schema_dir/<Template>.json`; URLs are returned without a body.
pub fn resolve_template(template: &str, schema_dir: &Path) -> Result<(String, Option<Value>)> {
    if is_url(template) {
        return Ok((template.to_string(), None));
    }
    let path = schema_dir.join(format!("{}.json", template));
    let schema: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let id = schema
        .get("$id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DictionaryError::InvalidFormat(format!("{} has no $id", path.display())))?;
    Ok((id, Some(schema)))
}

/// Walk `parentId` from an entity up to its project
pub fn find_project(api: &dyn SynapseApi, entity_id: &str) -> Result<String> {
    let mut current = entity_id.to_string();
    let mut visited = Vec::new();

    loop {
        if visited.contains(&current) {
            return Err(DictionaryError::InvalidFormat(format!(
                "entity hierarchy of {} loops at {}",
                entity_id, current
            )));
        }
        let entity = api.get_json(&format!("/entity/{}", current))?;
        if entity.get("concreteType").and_then(Value::as_str) == Some(PROJECT) {
            return Ok(entity
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(current));
        }
        let parent = entity
            .get("parentId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DictionaryError::InvalidFormat(format!("could not find project for {}", entity_id)))?;
        visited.push(current);
        current = parent;
    }
}

/// Schema body for the file view columns. Remote schemas are fetched;
/// a failed fetch falls back to the local template, then to no columns.
fn view_schema(api: &dyn SynapseApi, request: &CurationTaskRequest, uri: &str, template: &str) -> Value {
    let fetched = SchemaUri::parse(uri)
        .and_then(|u| api.get_json(&u.registered_path()))
        .map_err(|e| tracing::warn!(uri, error = %e, "could not fetch schema"))
        .ok();
    fetched
        .or_else(|| resolve_template(template, &request.schema_dir).ok().and_then(|(_, s)| s))
        .unwrap_or_else(|| json!({}))
}

/// Bind a schema, logging instead of failing; an existing binding is fine
fn try_bind(api: &dyn SynapseApi, entity_id: &str, schema_uri: &str) {
    match bind_schema(api, entity_id, schema_uri) {
        Ok(_) => tracing::info!(entity = %entity_id, "schema bound"),
        Err(e) if e.to_string().to_lowercase().contains("already") => {
            tracing::warn!(entity = %entity_id, "schema already bound")
        }
        Err(e) => tracing::warn!(entity = %entity_id, error = %e, "could not bind schema"),
    }
}

/// String or numeric id field of a created object
fn response_id(response: &Value, key: &str, path: &str) -> Result<String> {
    match response.get(key) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(DictionaryError::Synapse {
            path: path.to_string(),
            status: 200,
            message: format!("response has no {}", key),
        }),
    }
}

/// Bind (optionally), create the file view, then create the task
pub fn create_curation_task(
    api: &dyn SynapseApi,
    request: &CurationTaskRequest,
    defaults: ColumnDefaults,
) -> Result<CurationTaskResult> {
    let project_id = find_project(api, &request.folder_id)?;
    tracing::info!(folder = %request.folder_id, project = %project_id, "resolved project");

    let (schema_uri, local_schema) = resolve_template(&request.template, &request.schema_dir)?;
    let template_name = if is_url(&request.template) {
        template_name_from_uri(&schema_uri)
    } else {
        request.template.clone()
    };
    let data_type = generate_data_type(&template_name, &request.folder_id);

    if request.bind_schema {
        try_bind(api, &request.folder_id, &schema_uri);
    }

    let schema = match local_schema {
        Some(schema) => schema,
        None => view_schema(api, request, &schema_uri, &template_name),
    };
    let columns = columns_from_schema(&schema, defaults).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "schema has no properties; view gets default columns only");
        Vec::new()
    });

    let fileview_id = create_entity_view(
        api,
        &format!("{}_FileView", data_type),
        &project_id,
        &[request.folder_id.clone()],
        &columns,
    )?;

    let task = api.post_json(
        "/curation/task",
        &json!({
            "projectId": project_id,
            "dataType": data_type,
            "instructions": request.instructions,
            "taskProperties": {
                "concreteType": FILE_BASED_TASK,
                "uploadFolderId": request.folder_id,
                "fileViewId": fileview_id,
            },
        }),
    )?;
    let task_id = response_id(&task, "taskId", "/curation/task")?;

    Ok(CurationTaskResult {
        task_id,
        fileview_id,
        data_type,
        schema_uri,
        project_id,
    })
}

/// Create the RecordSet, bind the schema to it (optionally), create the
/// record-based task and open a grid session on the records
pub fn create_recordset_task(
    api: &dyn SynapseApi,
    request: &RecordSetTaskRequest,
    polling: JobPolling,
) -> Result<RecordSetTaskResult> {
    let project_id = find_project(api, &request.folder_id)?;
    tracing::info!(folder = %request.folder_id, project = %project_id, "resolved project");

    let (schema_id, _) = resolve_template(&request.template, &request.schema_dir)?;
    let schema_uri = SchemaUri::parse(&schema_id)?.to_string();

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("RecordSet for {}", request.record_set_name));
    let record_set = api.post_json(
        "/entity",
        &json!({
            "concreteType": RECORD_SET,
            "name": request.record_set_name,
            "description": description,
            "parentId": request.folder_id,
            "upsertKey": request.upsert_keys,
        }),
    )?;
    let recordset_id = response_id(&record_set, "id", "/entity")?;
    tracing::info!(recordset = %recordset_id, "created record set");

    if request.bind_schema {
        try_bind(api, &recordset_id, &schema_uri);
    }

    let task_name = request.task_name.as_deref().unwrap_or(&request.record_set_name);
    let task = api.post_json(
        "/curation/task",
        &json!({
            "projectId": project_id,
            "dataType": task_name,
            "instructions": request.instructions,
            "taskProperties": {
                "concreteType": RECORD_BASED_TASK,
                "recordSetId": recordset_id,
            },
        }),
    )?;
    let task_id = response_id(&task, "taskId", "/curation/task")?;

    let token = start_job(
        api,
        "/grid/session/async/start",
        &json!({
            "concreteType": CREATE_GRID,
            "initialQuery": {"sql": format!("select * from {}", recordset_id)},
        }),
    )?;
    let grid = wait_for_job(api, &token, polling)?;
    let session = grid.get("gridSession").unwrap_or(&grid);
    let data_grid_session_id = response_id(session, "sessionId", "/grid/session/async/start")?;

    Ok(RecordSetTaskResult {
        recordset_id,
        task_id,
        data_grid_session_id,
        schema_uri,
        project_id,
        folder_id: request.folder_id.clone(),
        record_set_name: request.record_set_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::fake::FakeSynapse;
    use tempfile::tempdir;

    const REMOTE: &str =
        "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/sage.schemas.v2571-nf.ChIPSeqTemplate.schema-9.14.0";

    fn hierarchy(api: &FakeSynapse) {
        api.respond(
            "GET",
            "/entity/syn3",
            json!({"id": "syn3", "parentId": "syn2", "concreteType": "org.sagebionetworks.repo.model.Folder"}),
        )
        .respond(
            "GET",
            "/entity/syn2",
            json!({"id": "syn2", "parentId": "syn1", "concreteType": "org.sagebionetworks.repo.model.Folder"}),
        )
        .respond("GET", "/entity/syn1", json!({"id": "syn1", "concreteType": PROJECT}));
    }

    fn view_and_task(api: &FakeSynapse) {
        api.respond("POST", "/column/batch", json!({"list": [{"id": "1"}, {"id": "2"}, {"id": "3"}]}))
            .respond("POST", "/entity", json!({"id": "syn900"}))
            .respond("POST", "/curation/task", json!({"taskId": 77}));
    }

    #[test]
    fn test_data_type_and_template_names() {
        assert_eq!(generate_data_type("ImagingAssayTemplate", "syn123"), "ImagingAssay-syn123");
        assert_eq!(generate_data_type("Biospecimen", "syn1"), "Biospecimen-syn1");
        assert_eq!(template_name_from_uri(REMOTE), "ChIPSeqTemplate");
        assert_eq!(template_name_from_uri("https://example.org/schemas/x-y"), "example.org");
    }

    #[test]
    fn test_find_project_walks_parents() {
        let api = FakeSynapse::new();
        hierarchy(&api);
        assert_eq!(find_project(&api, "syn3").unwrap(), "syn1");

        let orphan = FakeSynapse::new();
        orphan.respond("GET", "/entity/syn5", json!({"id": "syn5"}));
        assert!(find_project(&orphan, "syn5").is_err());
    }

    #[test]
    fn test_create_task_with_local_template() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("BiospecimenTemplate.json"),
            r#"{"$id": "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/org.synapse.nf-biospecimentemplate",
                "properties": {"specimenID": {"type": "string"}}}"#,
        )
        .unwrap();

        let api = FakeSynapse::new();
        hierarchy(&api);
        view_and_task(&api);
        api.fail("PUT", "/entity/syn3/schema/binding", 400, "Schema already bound");

        let mut request = CurationTaskRequest::new("syn3", "BiospecimenTemplate");
        request.schema_dir = dir.path().to_path_buf();
        let result = create_curation_task(&api, &request, ColumnDefaults::default()).unwrap();

        assert_eq!(result.task_id, "77");
        assert_eq!(result.fileview_id, "syn900");
        assert_eq!(result.data_type, "Biospecimen-syn3");
        assert_eq!(result.project_id, "syn1");

        let view = api.requests_to("/entity")[0].body.clone().unwrap();
        assert_eq!(view["name"], "Biospecimen-syn3_FileView");
        assert_eq!(view["parentId"], "syn1");

        let task = api.requests_to("/curation/task")[0].body.clone().unwrap();
        assert_eq!(task["instructions"], DEFAULT_INSTRUCTIONS);
        assert_eq!(task["taskProperties"]["fileViewId"], "syn900");
        assert_eq!(task["taskProperties"]["uploadFolderId"], "syn3");
    }

    #[test]
    fn test_create_task_with_remote_uri_without_binding() {
        let dir = tempdir().unwrap();
        let api = FakeSynapse::new();
        hierarchy(&api);
        view_and_task(&api);
        api.respond(
            "GET",
            "/schema/type/registered/sage.schemas.v2571-nf.ChIPSeqTemplate.schema-9.14.0",
            json!({"properties": {"assay": {"enum": ["ChIP-seq"]}}}),
        );

        let mut request = CurationTaskRequest::new("syn3", REMOTE);
        request.bind_schema = false;
        request.schema_dir = dir.path().to_path_buf();
        let result = create_curation_task(&api, &request, ColumnDefaults::default()).unwrap();

        assert_eq!(result.data_type, "ChIPSeq-syn3");
        assert_eq!(result.schema_uri, REMOTE);
        assert!(api.requests_to("/entity/syn3/schema/binding").is_empty());
        let columns = api.requests_to("/column/batch")[0].body.clone().unwrap();
        assert_eq!(columns["list"][2]["name"], "assay");
    }

    #[test]
    fn test_github_output_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("output");
        fs::write(&path, "existing=1\n").unwrap();
        let result = CurationTaskResult {
            task_id: "77".to_string(),
            fileview_id: "syn900".to_string(),
            data_type: "Biospecimen-syn3".to_string(),
            schema_uri: "org.synapse.nf-biospecimentemplate".to_string(),
            project_id: "syn1".to_string(),
        };
        result.append_github_output(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("existing=1\ntask_id=77\nfileview_id=syn900\n"));
        assert!(written.ends_with("schema_uri=org.synapse.nf-biospecimentemplate\n"));
    }

    #[test]
    fn test_create_recordset_task() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("DataLandscape.json"),
            r#"{"$id": "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/org.synapse.nf-datalandscape-0.2.0"}"#,
        )
        .unwrap();

        let api = FakeSynapse::new();
        hierarchy(&api);
        api.respond("POST", "/entity", json!({"id": "syn950"}))
            .respond("PUT", "/entity/syn950/schema/binding", json!({}))
            .respond("POST", "/curation/task", json!({"taskId": 81}))
            .respond("POST", "/grid/session/async/start", json!({"token": "t9"}))
            .respond(
                "GET",
                "/asynchronous/job/t9",
                json!({"jobState": "COMPLETE", "responseBody": {"gridSession": {"sessionId": "grid-1"}}}),
            );

        let mut request = RecordSetTaskRequest::new("syn3", "YIA_Smith_2025", "DataLandscape");
        request.upsert_keys = vec!["study".to_string(), "name".to_string()];
        request.schema_dir = dir.path().to_path_buf();
        let polling = JobPolling {
            interval: std::time::Duration::from_millis(1),
            max_wait: std::time::Duration::from_secs(1),
        };
        let result = create_recordset_task(&api, &request, polling).unwrap();

        assert_eq!(result.recordset_id, "syn950");
        assert_eq!(result.task_id, "81");
        assert_eq!(result.data_grid_session_id, "grid-1");
        assert_eq!(result.schema_uri, "org.synapse.nf-datalandscape-0.2.0");
        assert_eq!(result.project_id, "syn1");

        let record_set = api.requests_to("/entity")[0].body.clone().unwrap();
        assert_eq!(record_set["concreteType"], RECORD_SET);
        assert_eq!(record_set["parentId"], "syn3");
        assert_eq!(record_set["description"], "RecordSet for YIA_Smith_2025");
        assert_eq!(record_set["upsertKey"], json!(["study", "name"]));

        let binding = api.requests_to("/entity/syn950/schema/binding")[0].body.clone().unwrap();
        assert_eq!(binding["schema$id"], "org.synapse.nf-datalandscape-0.2.0");

        let task = api.requests_to("/curation/task")[0].body.clone().unwrap();
        assert_eq!(task["dataType"], "YIA_Smith_2025");
        assert_eq!(task["instructions"], DEFAULT_RECORD_INSTRUCTIONS);
        assert_eq!(task["taskProperties"]["concreteType"], RECORD_BASED_TASK);
        assert_eq!(task["taskProperties"]["recordSetId"], "syn950");

        let grid = api.requests_to("/grid/session/async/start")[0].body.clone().unwrap();
        assert_eq!(grid["initialQuery"]["sql"], "select * from syn950");
        assert!(result.github_output().starts_with("recordset_id=syn950\ntask_id=81\n"));
    }

    #[test]
    fn test_recordset_task_fails_without_session() {
        let api = FakeSynapse::new();
        hierarchy(&api);
        api.respond("POST", "/entity", json!({"id": "syn950"}))
            .respond("POST", "/curation/task", json!({"taskId": 81}))
            .respond("POST", "/grid/session/async/start", json!({"token": "t9"}))
            .respond("GET", "/asynchronous/job/t9", json!({"jobState": "COMPLETE", "responseBody": {}}));

        let mut request = RecordSetTaskRequest::new(
            "syn3",
            "Publication",
            "https://repo-prod.prod.sagebase.org/repo/v1/schema/type/registered/org.synapse.nf-publication",
        );
        request.bind_schema = false;
        let polling = JobPolling {
            interval: std::time::Duration::from_millis(1),
            max_wait: std::time::Duration::from_secs(1),
        };
        assert!(matches!(
            create_recordset_task(&api, &request, polling),
            Err(DictionaryError::Synapse { .. })
        ));
        assert!(api.requests_to("/entity/syn950/schema/binding").is_empty());
    }
}
