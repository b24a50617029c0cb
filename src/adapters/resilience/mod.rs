//! Resilience adapters - failure isolation for the generation path.

mod in_memory_circuit_breaker;

pub use in_memory_circuit_breaker::InMemoryCircuitBreaker;
