use crate::exception::{Caught, ExceptionFilters};
use axum::{body::Body, http::Request, response::IntoResponse, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower Layer handing exceptions returned by handlers to the app's
/// exception filters
#[derive(Clone)]
pub struct ReportableLayer {
    filters: ExceptionFilters,
}

impl ReportableLayer {
    pub fn new(filters: ExceptionFilters) -> Self {
        Self { filters }
    }
}

impl<S> Layer<S> for ReportableLayer {
    type Service = ReportableMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReportableMiddleware {
            inner,
            filters: self.filters.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ReportableMiddleware<S> {
    inner: S,
    filters: ExceptionFilters,
}

impl<S> Service<Request<Body>> for ReportableMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let filters = self.filters.clone();
        // Keep the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            let Some(Caught(exception)) = response.extensions_mut().remove::<Caught>() else {
                return Ok(response);
            };

            match filters.dispatch(&exception) {
                Some(Ok(handled)) => Ok(handled),
                Some(Err(e)) => Ok(e.into_response()),
                None => {
                    tracing::warn!(
                        "No exception filter for {}; was init() called?",
                        exception.type_name()
                    );
                    Ok(response)
                }
            }
        })
    }
}
