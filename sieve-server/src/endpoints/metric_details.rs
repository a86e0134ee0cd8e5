//! Details of a single metric.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_catalog::CatalogEntry;
use sieve_common::UnixTimestamp;

use crate::endpoints::common::{self, BadMetricsRequest};
use crate::endpoints::tags::TagKey;
use crate::extractors::{Path, Query, ReadAccess};
use crate::service::ServiceState;

#[derive(Debug, Deserialize)]
pub struct MetricDetailsQuery {
    #[serde(default)]
    project: Vec<ProjectId>,
    #[serde(default, rename = "useCase")]
    use_case: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MetricDetailsResponse {
    #[serde(flatten)]
    entry: CatalogEntry,
    tags: Vec<TagKey>,
    #[serde(rename = "lastSeen")]
    last_seen: Option<UnixTimestamp>,
}

pub async fn handle(
    _access: ReadAccess,
    State(state): State<ServiceState>,
    Path((org, mri)): Path<(OrganizationId, String)>,
    Query(query): Query<MetricDetailsQuery>,
) -> Result<Json<MetricDetailsResponse>, BadMetricsRequest> {
    let mri = common::parse_mri(&mri)?;
    let use_case = common::metric_use_case(&mri, &query.use_case)?;
    let projects = common::normalize_projects(query.project);

    let details = state
        .catalog()
        .get_metric(org, &projects, use_case, &mri)
        .await?;

    Ok(Json(MetricDetailsResponse {
        entry: details.entry,
        tags: details.tags.into_iter().map(TagKey::new).collect(),
        last_seen: details.last_seen,
    }))
}
