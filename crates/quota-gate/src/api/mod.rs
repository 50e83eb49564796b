//! Network layer: the [`QuotaApi`] seam and its HTTP implementation.
//!
//! - [`client`]: [`HttpApi`], a `reqwest` client for the estimate, search,
//!   step1 and refresh endpoints.
//! - `wire`: decoding of response bodies into [`Estimate`], [`ProbeOutcome`]
//!   and [`OperationResult`].
//!
//! Every method issues at most one request and never retries.

pub mod client;
mod wire;

pub use client::HttpApi;

use std::future::Future;
use std::pin::Pin;

use crate::cache::ProbeOutcome;
use crate::error::GateError;
use crate::estimate::Estimate;
use crate::request::OperationRequest;
use crate::result::OperationResult;

/// Boxed future returned by [`QuotaApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GateError>> + Send + 'a>>;

/// Boxed future returned by [`QuotaApi::probe`]. Failures are folded into
/// [`ProbeOutcome::Failed`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;

/// The remote, quota-bearing API as seen by the orchestrator.
///
/// Implementations validate the request before any network call and return
/// [`GateError::Validation`] without touching the network when it fails.
pub trait QuotaApi: Send + Sync {
    /// Preflight cost estimate for the request's operation kind.
    fn estimate<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, Estimate>;

    /// Send an unconfirmed search and classify the reply.
    fn probe<'a>(&'a self, request: &'a OperationRequest) -> ProbeFuture<'a>;

    /// Issue the costed call. The request must carry `confirmed=true`.
    fn execute<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult>;

    /// Re-issue a search annotated `cache_choice=use_cache`. No quota cost.
    fn use_cache<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult>;
}

impl<T: QuotaApi + ?Sized> QuotaApi for std::sync::Arc<T> {
    fn estimate<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, Estimate> {
        (**self).estimate(request)
    }

    fn probe<'a>(&'a self, request: &'a OperationRequest) -> ProbeFuture<'a> {
        (**self).probe(request)
    }

    fn execute<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult> {
        (**self).execute(request)
    }

    fn use_cache<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult> {
        (**self).use_cache(request)
    }
}
