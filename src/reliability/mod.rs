//! Reliability primitives
//!
//! Usable independently of the queue: a circuit breaker for any async
//! operation and the shared semaphore that caps globally concurrent event
//! handlers.

pub mod circuit_breaker;
pub mod semaphore;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, ExecutionOutcome,
};
pub use semaphore::FlowSemaphore;
