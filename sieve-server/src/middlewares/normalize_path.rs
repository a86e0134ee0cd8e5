use std::borrow::Cow;
use std::sync::LazyLock;
use std::task::{Context, Poll};

use axum::http::{Request, Uri};
use regex::Regex;
use tower::Service;

/// Folds repeated slashes in the request path before routing.
///
/// `//organizations//1/metrics/` is routed like `/organizations/1/metrics/`.
#[derive(Clone, Debug)]
pub struct NormalizePath<S> {
    inner: S,
}

impl<S> NormalizePath<S> {
    /// Wraps a service.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, B> Service<Request<B>> for NormalizePath<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        fold_duplicate_slashes(req.uri_mut());
        self.inner.call(req)
    }
}

fn fold_duplicate_slashes(uri: &mut Uri) {
    static REPLACE: LazyLock<Regex> = LazyLock::new(|| Regex::new("/{2,}").unwrap());

    let Cow::Owned(new_path) = REPLACE.replace_all(uri.path(), "/") else {
        return;
    };

    let path_and_query = match uri.query() {
        Some(query) => format!("{new_path}?{query}"),
        None => new_path,
    };

    let mut builder = Uri::builder().path_and_query(path_and_query);
    if let Some(scheme) = uri.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = uri.authority() {
        builder = builder.authority(authority.clone());
    }

    if let Ok(new_uri) = builder.build() {
        *uri = new_uri;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(s: &str) -> String {
        let mut uri: Uri = s.parse().unwrap();
        fold_duplicate_slashes(&mut uri);
        uri.to_string()
    }

    #[test]
    fn test_fold_duplicate_slashes() {
        assert_eq!(fold("/organizations/1/metrics/"), "/organizations/1/metrics/");
        assert_eq!(
            fold("//organizations///1/metrics/?project=1"),
            "/organizations/1/metrics/?project=1"
        );
        assert_eq!(
            fold("http://localhost:3000//healthcheck//live/"),
            "http://localhost:3000/healthcheck/live/"
        );
    }
}
