use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps API tokens to users. User/API-key provisioning is explicitly out of
/// scope for this service (see PURPOSE & SCOPE); this section is the minimal
/// concrete mechanism by which "a token maps to a user and a permission
/// scope" is satisfied for a standalone deployment. A real deployment would
/// replace this with a call to an external identity service and is free to
/// do so without touching any other module — callers only depend on the
/// `(user_id, max_concurrent_bots)` pair this section resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Env var holding the shared internal secret for bot callback endpoints.
    #[serde(default = "d_internal_secret_env")]
    pub internal_secret_env: String,
    /// Known users keyed by their bearer token.
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub user_id: uuid::Uuid,
    /// Concurrent bot cap for this user. `0` means uncapped.
    #[serde(default)]
    pub max_concurrent_bots: u32,
}

fn d_internal_secret_env() -> String {
    "MB_INTERNAL_SECRET".into()
}
