//! Generative service client: rate gate, transport, retry and reply parsing.

pub mod invoker;
pub mod parse;
pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use invoker::ResilientApiInvoker;
pub use parse::{LlmReply, ResponseFormat};
pub use rate_limit::{GateSnapshot, RateLimitedGate, RateLimits};
pub use retry::{AttemptError, RetryDecision, RetryPolicy};
pub use transport::{
    GeminiTransport, GenerateRequest, LlmTransport, TransportError, TransportResponse,
};
