use db::models::user::Role;
use serde::{Deserialize, Serialize};

/// JWT claims: the account id, its role and the expiry timestamp. The role
/// travels in the token so guards never need a user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
}

/// Verified claims of the calling user, inserted into request extensions by
/// the guards and read by handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
