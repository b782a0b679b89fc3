//! Remote API access: transport seam, refresh protocol, and the gateway
//! that combines them.

mod coordinator;
mod gateway;
mod refresh;
mod request;
mod transport;

pub use gateway::{Gateway, GatewayOptions};
pub use refresh::{RefreshedTokens, DEFAULT_REFRESH_PATH};
pub use request::{ApiResponse, Attempt, RequestDescriptor};
pub use transport::{HttpTransport, Transport};
