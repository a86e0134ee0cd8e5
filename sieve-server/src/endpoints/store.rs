//! Internal endpoint to write metric observations into storage.

use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;
use serde::Deserialize;
use sieve_base_schema::metrics::UseCaseId;
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_catalog::MetricObservation;

use crate::endpoints::common::BadMetricsRequest;
use crate::extractors::WriteAccess;
use crate::service::ServiceState;

#[derive(Debug, Deserialize)]
struct StoreRequest {
    org_id: OrganizationId,
    project_id: ProjectId,
    #[serde(rename = "useCase")]
    use_case: UseCaseId,
    observations: Vec<MetricObservation>,
}

pub async fn handle(
    _access: WriteAccess,
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<StatusCode, BadMetricsRequest> {
    let request: StoreRequest =
        serde_json::from_slice(&body).map_err(BadMetricsRequest::InvalidJson)?;

    // Storage is partitioned by use case, so every observation must belong to the request's.
    if let Some(observation) = request
        .observations
        .iter()
        .find(|observation| observation.mri.namespace != request.use_case)
    {
        return Err(BadMetricsRequest::UseCaseMismatch {
            use_case: request.use_case,
            namespace: observation.mri.namespace,
        });
    }

    state
        .catalog()
        .storage()
        .store(
            request.org_id,
            request.project_id,
            request.use_case,
            &request.observations,
        )
        .await?;

    sieve_log::trace!(
        count = request.observations.len(),
        "stored metric observations"
    );

    Ok(StatusCode::ACCEPTED)
}
