//! Sessions, auth cookies and the handlers for registering, logging in and logging out.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod register;
mod session;
mod token;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie};
pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use middleware::auth_guard;
pub use register::{get_availability, register_user};
pub use session::{AuthEvent, SessionId, SessionRegistry, Subscription};
pub(crate) use token::Token;

#[cfg(test)]
pub use cookie::COOKIE_TOKEN;
