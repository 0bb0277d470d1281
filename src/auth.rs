//! Auth
//!
//! Authentication itself is a black box upstream of this crate; the session
//! only ever sees an already-authenticated profile carrying the loyalty
//! balance that drives tier pricing.

use serde::{Deserialize, Serialize};

/// Profile supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Accumulated loyalty points, for tier resolution.
    pub loyalty_points: u64,
}
