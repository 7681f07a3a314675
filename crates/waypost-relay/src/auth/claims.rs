//! JWT claims for Waypost bearer tokens.

use serde::{Deserialize, Serialize};

/// Claims embedded in issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    /// Account email at issue time.
    pub email: String,
    /// Issued at (unix timestamp, seconds).
    pub iat: i64,
    /// Expiration (unix timestamp, seconds).
    pub exp: i64,
}
