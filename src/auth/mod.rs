//! Authentication
//!
//! - [`auth::jwt`](crate::auth::jwt) - HS256 token issue and verification
//! - [`auth::middleware`](crate::auth::middleware) - Axum middleware guarding `/mm/v1`
//!
//! Requests authenticate with either header:
//!
//! ```text
//! api-key: <one of the keys in $MINDMATRIX_API_KEYS>
//! Authorization: Bearer <token>
//! ```
//!
//! Bearer tokens are verified against `$MINDMATRIX_JWT_SECRET` when it is
//! set; otherwise only their presence is checked.

/// JWT token generation and validation.
pub mod jwt;
/// Authentication middleware for protected routes.
pub mod middleware;
