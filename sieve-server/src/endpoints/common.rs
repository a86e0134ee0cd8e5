//! Validation and errors shared by the metrics endpoints.

use std::error::Error;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use itertools::Itertools;
use sieve_base_schema::metrics::{
    MetricResourceIdentifier, ParseMetricError, ParseUseCaseError, UseCaseId,
};
use sieve_base_schema::project::ProjectId;
use sieve_catalog::{CatalogError, StorageError};
use sieve_visibility::BlockStoreError;

use crate::utils::ApiErrorResponse;

/// An error while handling a metrics request.
#[derive(Debug, thiserror::Error)]
pub enum BadMetricsRequest {
    #[error("invalid request parameters")]
    InvalidParameters(String),

    #[error("invalid JSON body")]
    InvalidJson(#[source] serde_json::Error),

    #[error("at least one useCase is required")]
    MissingUseCase,

    #[error("invalid useCase")]
    InvalidUseCase(#[source] ParseUseCaseError),

    #[error("useCase {use_case} does not match the metric namespace {namespace}")]
    UseCaseMismatch {
        use_case: UseCaseId,
        namespace: UseCaseId,
    },

    #[error("a metric is required")]
    MissingMetric,

    #[error("invalid metric {mri:?}")]
    InvalidMri {
        mri: String,
        #[source]
        source: ParseMetricError,
    },

    #[error("at least one project is required")]
    MissingProjects,

    #[error("at least one tag is required")]
    MissingTags,

    #[error("invalid tag key {0:?}")]
    InvalidTag(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to update blocked metrics")]
    BlockStore(#[from] BlockStoreError),

    #[error("failed to store metrics")]
    Storage(#[from] StorageError),
}

impl BadMetricsRequest {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Catalog(CatalogError::UnknownMetric(_) | CatalogError::UnknownTag(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Catalog(CatalogError::Integrity(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(error) if error.is_integrity() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(_) | Self::BlockStore(_) | Self::Storage(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for BadMetricsRequest {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            // The catalog logs its own integrity errors.
            Self::Storage(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                sieve_log::error!(error = &self as &dyn Error, "metrics index is inconsistent");
            }
            _ if status == StatusCode::SERVICE_UNAVAILABLE => {
                sieve_log::warn!(
                    error = &self as &dyn Error,
                    "metrics backend unavailable"
                );
            }
            _ => (),
        }

        let mut body = ApiErrorResponse::from_error(&self);
        if let Self::InvalidParameters(ref reason) = self {
            body = ApiErrorResponse::with_detail(format!("{self}: {reason}"));
        }

        (status, body).into_response()
    }
}

/// Parses the use cases of a request.
///
/// At least one use case is required. Duplicates are removed and the result is sorted.
pub fn parse_use_cases(raw: &[String]) -> Result<Vec<UseCaseId>, BadMetricsRequest> {
    if raw.is_empty() {
        return Err(BadMetricsRequest::MissingUseCase);
    }

    let use_cases: Vec<UseCaseId> = raw
        .iter()
        .map(|s| s.parse().map_err(BadMetricsRequest::InvalidUseCase))
        .collect::<Result<_, _>>()?;

    Ok(use_cases.into_iter().sorted().dedup().collect())
}

/// Parses an MRI strictly.
pub fn parse_mri(raw: &str) -> Result<MetricResourceIdentifier<'static>, BadMetricsRequest> {
    MetricResourceIdentifier::parse(raw)
        .map(MetricResourceIdentifier::into_owned)
        .map_err(|source| BadMetricsRequest::InvalidMri {
            mri: raw.to_owned(),
            source,
        })
}

/// Returns the use case of a metric, checking it against the requested use cases.
///
/// Requests for a single metric may omit the use case, since it is the namespace of the MRI.
pub fn metric_use_case(
    mri: &MetricResourceIdentifier<'_>,
    raw: &[String],
) -> Result<UseCaseId, BadMetricsRequest> {
    for s in raw {
        let use_case: UseCaseId = s.parse().map_err(BadMetricsRequest::InvalidUseCase)?;
        if use_case != mri.namespace {
            return Err(BadMetricsRequest::UseCaseMismatch {
                use_case,
                namespace: mri.namespace,
            });
        }
    }

    Ok(mri.namespace)
}

/// Sorts projects and removes duplicates.
pub fn normalize_projects(mut projects: Vec<ProjectId>) -> Vec<ProjectId> {
    projects.sort_unstable();
    projects.dedup();
    projects
}

#[cfg(test)]
mod tests {
    use sieve_base_schema::organization::OrganizationId;
    use sieve_indexer::{IndexScope, IndexerError};

    use super::*;

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_parse_use_cases() {
        let use_cases = parse_use_cases(&strings(&["spans", "custom", "spans"])).unwrap();
        assert_eq!(use_cases, vec![UseCaseId::Spans, UseCaseId::Custom]);

        assert!(matches!(
            parse_use_cases(&[]),
            Err(BadMetricsRequest::MissingUseCase)
        ));
        assert!(matches!(
            parse_use_cases(&strings(&["custom", "nope"])),
            Err(BadMetricsRequest::InvalidUseCase(_))
        ));
    }

    #[test]
    fn test_metric_use_case() {
        let mri = parse_mri("c:custom/clicks@none").unwrap();

        assert_eq!(metric_use_case(&mri, &[]).unwrap(), UseCaseId::Custom);
        assert_eq!(
            metric_use_case(&mri, &strings(&["custom"])).unwrap(),
            UseCaseId::Custom
        );
        assert!(matches!(
            metric_use_case(&mri, &strings(&["spans"])),
            Err(BadMetricsRequest::UseCaseMismatch { .. })
        ));
    }

    #[test]
    fn test_status_codes() {
        let unknown = BadMetricsRequest::Catalog(CatalogError::UnknownMetric("x".to_owned()));
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            BadMetricsRequest::MissingTags.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_mri("c:custom/clicks").unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BadMetricsRequest::InvalidTag(" ".to_owned()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_integrity_is_internal_error() {
        let scope = IndexScope::new(UseCaseId::Custom, OrganizationId::new(1));

        let conflict = StorageError::from(IndexerError::Conflict { scope });
        assert_eq!(
            BadMetricsRequest::Storage(conflict).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let unbound = StorageError::from(IndexerError::Unbound { scope, id: 7 });
        assert_eq!(
            BadMetricsRequest::Storage(unbound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_integrity_response() {
        let scope = IndexScope::new(UseCaseId::Custom, OrganizationId::new(1));
        let error = BadMetricsRequest::from(StorageError::from(IndexerError::Conflict { scope }));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
