mod client;
mod session;

pub use client::{AuthClient, AuthError, SignUpOutcome};
pub use session::{AuthUser, Session, SessionStore};
