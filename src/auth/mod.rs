//! Authentication Module
//! Mission: Issue session tokens, gate every protected request, revoke on logout

pub mod api;
pub mod clock;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;
pub mod session;
pub mod user_store;

pub use api::AuthState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use session::{AuthError, SessionGate};
pub use user_store::UserStore;
