//! Authentication: signed session tokens, the page gate and API extractors.

pub mod cookie;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;

pub use gate::session_gate;
pub use middleware::{check_rate_limit, AdminSession, AppState};
pub use session::Session;
pub use token::{decode_unverified, Identity, TokenService};
