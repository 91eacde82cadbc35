//! bankrecon API client
//!
//! Token-managed access to the bank's REST API with classified retry, plus
//! the account and transaction harvest used for reconciliation.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod harvest;
pub mod retry;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{unwrap_transactions, ApiClient, ClientState};
pub use error::{ApiError, ApiResult};
pub use harvest::{harvest, ApiHarvest};
pub use retry::{HttpRetryPolicy, AUTH_MAX_RETRIES, DATA_MAX_RETRIES};
pub use token::{Clock, ManualClock, SystemClock, Token};
pub use transport::{
    HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError,
    TransportErrorKind,
};
