//! Bearer-token verification
//!
//! Tokens are issued by the account service; this crate only verifies them
//! and turns their claims into a [`crate::models::Principal`].

mod jwt;

pub use jwt::{issue_token, verify_token, Claims, JwtError, TokenKeys};
