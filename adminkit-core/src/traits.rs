//! Core trait definitions
//!
//! These are the seams between the state containers and the outside world: the
//! backend, the durable store, and the session as seen by other components.

use crate::error::{ApiResult, ConsoleResult};
use crate::types::*;
use async_trait::async_trait;

/// Logical backend operations the console consumes
///
/// `credential` is the bearer token of the current session. `None` means the call is
/// made without a credential and the backend decides whether to reject it.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// identity-login
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginGrant>;

    /// identity-logout
    async fn logout(&self, token: &str) -> ApiResult<()>;

    /// role-get
    async fn get_role(&self, credential: Option<&str>, id: RoleId) -> ApiResult<Role>;

    /// role-get-all
    async fn get_all_roles(&self, credential: Option<&str>) -> ApiResult<Vec<Role>>;

    /// identity-role-get
    async fn get_identity_roles(
        &self,
        credential: Option<&str>,
        identity_id: IdentityId,
    ) -> ApiResult<Vec<IdentityRoleAssignment>>;

    /// identity-role-get-all
    async fn get_all_identity_roles(
        &self,
        credential: Option<&str>,
    ) -> ApiResult<Vec<IdentityRoleAssignment>>;

    /// module-get
    async fn get_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<Module>;

    /// module-get-active; reachable without a credential
    async fn get_active_modules(&self) -> ApiResult<Vec<Module>>;

    /// module-get-all
    async fn get_all_modules(&self, credential: Option<&str>) -> ApiResult<Vec<Module>>;

    /// module-install
    async fn install_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()>;

    /// module-uninstall
    async fn uninstall_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()>;

    /// module-upgrade
    async fn upgrade_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()>;

    /// identity-create; the backend accepts it without a credential
    async fn create_identity(
        &self,
        credential: Option<&str>,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity>;

    /// identity-get
    async fn get_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<Identity>;

    /// identity-get-all
    async fn get_all_identities(&self, credential: Option<&str>) -> ApiResult<Vec<Identity>>;

    /// identity-update; only the fields set in `draft` change
    async fn update_identity(
        &self,
        credential: Option<&str>,
        id: IdentityId,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity>;

    /// identity-delete
    async fn delete_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<()>;

    /// identity-delete-all
    async fn delete_all_identities(&self, credential: Option<&str>) -> ApiResult<()>;
}

/// Read-only view of the current session for components that build
/// authenticated requests
pub trait CredentialSource: Send + Sync {
    /// Token to attach to authenticated calls
    fn bearer_token(&self) -> Option<String>;

    /// Identity the session belongs to
    fn identity_id(&self) -> Option<IdentityId>;
}

/// Durable key-value slot store
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> ConsoleResult<Option<String>>;

    fn save(&self, key: &str, value: &str) -> ConsoleResult<()>;

    fn remove(&self, key: &str) -> ConsoleResult<()>;

    /// Drop every slot
    fn clear(&self) -> ConsoleResult<()>;
}
