//! The interface to whatever actually sends queries.  The address
//! store never talks to the network itself: when it needs the
//! addresses of a nameserver it asks a `Resolver`, and carries on
//! when the resolver calls back.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::protocol::types::{DomainName, ResourceRecord};
use crate::settings::Settings;

/// Called with the answer to an `AddressRequest`: the A and AAAA
/// records found for the name (other records are ignored, as are
/// address records for other names), or the reason there is no
/// answer.
pub type AddressCompletion =
    Box<dyn FnOnce(Result<Vec<ResourceRecord>, ResolutionError>) + Send>;

/// A request for the IP addresses of a nameserver.  Nameservers are
/// shared between zones of every class, so the request has none.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AddressRequest {
    pub name: DomainName,
}

/// Something which can find the addresses of a name.
///
/// `resolve_address` must not block: it starts the work and returns.
/// `on_complete` is called at most once, from any thread, possibly
/// before `resolve_address` returns.  Requests should be bounded in
/// time, with a timeout reported as `ResolutionError::Timeout`.
pub trait Resolver: Send + Sync {
    fn resolve_address(&self, request: AddressRequest, on_complete: AddressCompletion);
}

impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    fn resolve_address(&self, request: AddressRequest, on_complete: AddressCompletion) {
        (**self).resolve_address(request, on_complete);
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn resolve_address(&self, request: AddressRequest, on_complete: AddressCompletion) {
        (**self).resolve_address(request, on_complete);
    }
}

/// Why a nameserver's addresses could not be found.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionError {
    /// The request did not complete in time.
    Timeout,

    /// The request completed but there is no answer.
    DeadEnd,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionError::Timeout => write!(f, "timed out"),
            ResolutionError::DeadEnd => write!(f, "no answer"),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A `Resolver` which runs an async lookup function on a tokio
/// runtime, giving up after a timeout.
pub struct TokioResolver<F> {
    handle: Handle,
    timeout: Duration,
    lookup: F,
}

impl<F, Fut> TokioResolver<F>
where
    F: Fn(AddressRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<ResourceRecord>, ResolutionError>> + Send + 'static,
{
    pub fn new(handle: Handle, timeout: Duration, lookup: F) -> Self {
        Self {
            handle,
            timeout,
            lookup,
        }
    }

    /// Use the `resolve_timeout` from the settings.
    pub fn from_settings(handle: Handle, settings: &Settings, lookup: F) -> Self {
        Self::new(handle, settings.resolve_timeout(), lookup)
    }
}

impl<F, Fut> Resolver for TokioResolver<F>
where
    F: Fn(AddressRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<ResourceRecord>, ResolutionError>> + Send + 'static,
{
    fn resolve_address(&self, request: AddressRequest, on_complete: AddressCompletion) {
        let name = request.name.clone();
        let lookup = (self.lookup)(request);
        let limit = self.timeout;
        self.handle.spawn(async move {
            let result = if let Ok(res) = timeout(limit, lookup).await {
                res
            } else {
                tracing::debug!(%name, "timed out");
                Err(ResolutionError::Timeout)
            };
            on_complete(result);
        });
    }
}

impl<F> fmt::Debug for TokioResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
