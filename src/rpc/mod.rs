//! Endpoint pools, probing and resilient request execution

pub mod defaults;
mod executor;
mod outcome;
mod pool;
mod probe;
mod request;
pub(crate) mod transport;

pub use defaults::RequestProfile;
pub use executor::Executor;
pub use outcome::Outcome;
pub use pool::{EndpointPool, EndpointStats};
pub use probe::{Probe, ProbeResult};
pub use request::{Method, RequestSpec, RequestTemplate};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};
