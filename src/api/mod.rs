//! HTTP API.
//!
//! Routes are nested under `/api/`. Protected routes run behind the
//! middleware stack Rate Limit → Auth → Audit → Handler; account and
//! health routes are rate-limited only.

pub mod endpoints;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerInfo};
pub use types::ApiContext;
