//! Port definitions (trait abstractions) for infrastructure collaborators.

mod http_transport;

pub use http_transport::{BodyStream, ByteRange, HttpTransport, TransportResponse};
