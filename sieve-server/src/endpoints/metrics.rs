//! Lists the metrics catalog and updates the blocking state of metrics.

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::State;
use bytes::Bytes;
use serde::Deserialize;
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_catalog::{BlockingStatus, CatalogEntry};
use sieve_visibility::BlockingOperation;

use crate::endpoints::common::{self, BadMetricsRequest};
use crate::extractors::{Path, Query, ReadAccess};
use crate::service::ServiceState;

#[derive(Debug, Deserialize)]
pub struct ListMetricsQuery {
    #[serde(default)]
    project: Vec<ProjectId>,
    #[serde(default, rename = "useCase")]
    use_case: Vec<String>,
}

pub async fn list(
    _access: ReadAccess,
    State(state): State<ServiceState>,
    Path(org): Path<OrganizationId>,
    Query(query): Query<ListMetricsQuery>,
) -> Result<Json<Vec<CatalogEntry>>, BadMetricsRequest> {
    let use_cases = common::parse_use_cases(&query.use_case)?;
    let projects = common::normalize_projects(query.project);

    let mut entries = Vec::new();
    for use_case in use_cases {
        let metrics = state
            .catalog()
            .list_metrics(org, &projects, use_case)
            .await?;
        entries.extend(metrics);
    }

    entries.sort_by_cached_key(|entry| entry.mri.to_string());
    Ok(Json(entries))
}

/// Body of a blocking update.
///
/// The operation is flattened into the body, for example:
///
/// ```json
/// {"project": [1], "metric_mri": "c:custom/clicks@none", "operationType": "blockTags", "tags": ["release"]}
/// ```
#[derive(Debug, Deserialize)]
struct MetricsUpdate {
    #[serde(default)]
    project: Vec<ProjectId>,
    metric_mri: String,
    #[serde(flatten)]
    operation: BlockingOperation,
}

pub async fn update(
    _access: ReadAccess,
    State(state): State<ServiceState>,
    Path(_org): Path<OrganizationId>,
    body: Bytes,
) -> Result<Json<Vec<BlockingStatus>>, BadMetricsRequest> {
    let update: MetricsUpdate =
        serde_json::from_slice(&body).map_err(BadMetricsRequest::InvalidJson)?;

    let mri = common::parse_mri(&update.metric_mri)?;
    if let Some(tags) = update.operation.tags() {
        validate_tags(tags)?;
    }

    let projects = common::normalize_projects(update.project);
    if projects.is_empty() {
        return Err(BadMetricsRequest::MissingProjects);
    }

    let block_store = state.catalog().block_store();
    block_store.apply(&projects, &mri, &update.operation).await?;

    sieve_log::debug!(
        operation = update.operation.name(),
        mri = %mri,
        projects = projects.len(),
        "updated blocked metrics"
    );

    let blocked = block_store.get_blocked_metrics(&projects).await?;
    let key = mri.to_string();

    let statuses = projects
        .iter()
        .map(|&project| BlockingStatus::new(project, &key, blocked.get(&project)))
        .collect();

    Ok(Json(statuses))
}

/// Tag keys must not be empty or consist of whitespace only.
fn validate_tags(tags: &BTreeSet<String>) -> Result<(), BadMetricsRequest> {
    if tags.is_empty() {
        return Err(BadMetricsRequest::MissingTags);
    }

    match tags.iter().find(|tag| tag.trim().is_empty()) {
        Some(tag) => Err(BadMetricsRequest::InvalidTag(tag.clone())),
        None => Ok(()),
    }
}
