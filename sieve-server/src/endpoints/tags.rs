//! Tag keys and tag values of a metric.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;

use crate::endpoints::common::{self, BadMetricsRequest};
use crate::extractors::{Path, Query, ReadAccess};
use crate::service::ServiceState;

#[derive(Debug, Deserialize)]
pub struct TagsQuery {
    metric: Option<String>,
    #[serde(default)]
    project: Vec<ProjectId>,
    #[serde(default, rename = "useCase")]
    use_case: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TagKey {
    key: String,
}

impl TagKey {
    pub fn new(key: String) -> Self {
        Self { key }
    }
}

#[derive(Debug, Serialize)]
pub struct TagValue {
    key: String,
    value: String,
}

pub async fn list_tags(
    _access: ReadAccess,
    State(state): State<ServiceState>,
    Path(org): Path<OrganizationId>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<TagKey>>, BadMetricsRequest> {
    let mri = query.metric.ok_or(BadMetricsRequest::MissingMetric)?;
    let mri = common::parse_mri(&mri)?;
    let use_case = common::metric_use_case(&mri, &query.use_case)?;
    let projects = common::normalize_projects(query.project);

    let tags = state
        .catalog()
        .list_tags(org, &projects, use_case, &mri)
        .await?;

    Ok(Json(tags.into_iter().map(TagKey::new).collect()))
}

pub async fn list_tag_values(
    _access: ReadAccess,
    State(state): State<ServiceState>,
    Path((org, tag)): Path<(OrganizationId, String)>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<TagValue>>, BadMetricsRequest> {
    let mri = query.metric.ok_or(BadMetricsRequest::MissingMetric)?;
    let mri = common::parse_mri(&mri)?;
    let use_case = common::metric_use_case(&mri, &query.use_case)?;
    let projects = common::normalize_projects(query.project);

    let values = state
        .catalog()
        .list_tag_values(org, &projects, use_case, &mri, &tag)
        .await?;

    let values = values
        .into_iter()
        .map(|value| TagValue {
            key: tag.clone(),
            value,
        })
        .collect();

    Ok(Json(values))
}
