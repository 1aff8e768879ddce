//! Authentication: credential schemes, session lifecycle, keep-alive, PKCE
//!
//! The credentials bag ([`crate::config::Credentials`]) is resolved once by
//! the variant factory into a concrete scheme; the [`Session`] runs the
//! lifecycle (login, extend, verify, logoff) against that scheme and hosts
//! the background keep-alive loop.

mod keep_alive;
pub mod pkce;
mod session;
mod variants;

pub use session::Session;
pub(crate) use variants::AuthVariant;
