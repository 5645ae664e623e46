//! Resilient execution of outbound calls
//!
//! Every call runs under an operation-level timeout budget that bounds all
//! of its attempts, with jittered retries inside it. Provider outages trip
//! a per-provider circuit breaker and key-level failures are reported to
//! the credential-health collaborator.

mod executor;
mod retry;
mod timeout;

pub use executor::{CallContext, ResilienceExecutor};
pub use retry::{Backoff, RetryPolicy};
pub use timeout::{OperationKind, TimeoutPolicy};
