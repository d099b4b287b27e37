pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::AuthUser;
pub use cors::setup_cors;
pub use rate_limit::{rate_limit, RateLimiter};
