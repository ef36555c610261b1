//! OAuth 2.0 authorization code flow with PKCE.
//!
//! The pieces are used in order by [`crate::flow::SmartAuth`]: generate a
//! [`PkceChallenge`], build the authorization URL, wait on a
//! [`CallbackServer`] for the redirect, then trade the code at the token
//! endpoint through [`TokenExchangeClient`].

mod pkce;
mod server;

pub mod authorize;
pub mod exchange;

pub use authorize::{AuthorizationRequest, generate_state, logout_url};
pub use exchange::{TokenExchangeClient, TokenResponse};
pub use pkce::PkceChallenge;
pub use server::{CallbackServer, RedirectResult, await_redirect};
