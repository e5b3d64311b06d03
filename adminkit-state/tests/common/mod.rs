//! Shared test utilities: an in-memory backend implementing `ConsoleApi`

#![allow(dead_code)]

use adminkit_core::{
    ApiError, ApiResult, ConsoleApi, CredentialSource, Credentials, GrantedIdentity, Identity,
    IdentityDraft, IdentityId, IdentityRoleAssignment, LoginGrant, Module, ModuleId, Role, RoleId,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Once};
use tokio::sync::Notify;

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = adminkit_core::init_logging(&adminkit_core::LoggingConfig {
            level: "debug".to_string(),
            ..Default::default()
        });
    });
}

pub const UNAUTHORIZED: &str = "Authentication credentials were not provided";

pub fn role(id: RoleId, name: &str) -> Role {
    Role {
        id,
        name: name.to_string(),
        created_at: None,
        updated_at: None,
    }
}

pub fn module(id: ModuleId, name: &str, installed: bool) -> Module {
    Module {
        id,
        name: name.to_string(),
        version: "1.0.0".to_string(),
        installed,
        created_at: None,
        updated_at: None,
    }
}

pub fn identity(id: IdentityId, username: &str) -> Identity {
    Identity {
        id,
        username: username.to_string(),
        email: Some(format!("{}@example.com", username)),
        is_active: true,
        roles: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

/// Credential source with a settable token
#[derive(Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
    identity_id: RwLock<Option<IdentityId>>,
}

impl StaticCredentials {
    pub fn signed_in(identity_id: IdentityId) -> Arc<Self> {
        Arc::new(Self {
            token: RwLock::new(Some(format!("token-{}", identity_id))),
            identity_id: RwLock::new(Some(identity_id)),
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn identity_id(&self) -> Option<IdentityId> {
        *self.identity_id.read()
    }
}

/// Scripted backend
///
/// Operations are named after the `ConsoleApi` method they serve; failures and
/// operation gates are keyed by those names, login gates by username.
#[derive(Default)]
pub struct FakeApi {
    accounts: Mutex<HashMap<String, (String, IdentityId)>>,
    roles: Mutex<HashMap<RoleId, Role>>,
    assignments: Mutex<Vec<IdentityRoleAssignment>>,
    modules: Mutex<Vec<Module>>,
    /// Active modules the catalog listing does not return
    hidden_active: Mutex<Vec<Module>>,
    failures: Mutex<HashMap<String, Option<String>>>,
    failing_roles: Mutex<HashSet<RoleId>>,
    empty_tokens: Mutex<bool>,
    identities: Mutex<Vec<Identity>>,
    login_gates: Mutex<HashMap<String, Arc<Notify>>>,
    operation_gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self::default())
    }

    /// Backend with two accounts, three roles and three modules
    ///
    /// - `admin` (identity 1) holds `administrator`
    /// - `multi` (identity 2) holds `manager` and `editor`
    /// - `nobody` (identity 3) holds no role
    pub fn seeded() -> Arc<Self> {
        let api = Self::new();
        api.add_account("admin", "secret", 1);
        api.add_account("multi", "secret", 2);
        api.add_account("nobody", "secret", 3);
        api.add_identity(identity(1, "admin"));
        api.add_identity(identity(2, "multi"));
        api.add_identity(identity(3, "nobody"));

        api.add_role(role(1, "administrator"));
        api.add_role(role(2, "manager"));
        api.add_role(role(3, "editor"));

        api.assign(1, 1);
        api.assign(2, 2);
        api.assign(2, 3);

        api.add_module(module(1, "inventory", true));
        api.add_module(module(2, "billing", false));
        api.add_module(module(3, "reports", false));
        api
    }

    pub fn add_account(&self, username: &str, password: &str, identity_id: IdentityId) {
        self.accounts
            .lock()
            .insert(username.to_string(), (password.to_string(), identity_id));
    }

    pub fn add_identity(&self, identity: Identity) {
        self.identities.lock().push(identity);
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.identities.lock().clone()
    }

    pub fn add_role(&self, role: Role) {
        self.roles.lock().insert(role.id, role);
    }

    pub fn assign(&self, identity_id: IdentityId, role_id: RoleId) {
        let mut assignments = self.assignments.lock();
        let id = assignments.len() as u64 + 1;
        assignments.push(IdentityRoleAssignment {
            id,
            identity_id,
            role_id,
            created_at: None,
            updated_at: None,
        });
    }

    pub fn add_module(&self, module: Module) {
        self.modules.lock().push(module);
    }

    pub fn add_hidden_active(&self, module: Module) {
        self.hidden_active.lock().push(module);
    }

    /// Make `operation` fail; `message` is the backend's `messages` field
    pub fn fail(&self, operation: &str, message: Option<&str>) {
        self.failures
            .lock()
            .insert(operation.to_string(), message.map(str::to_string));
    }

    pub fn recover(&self, operation: &str) {
        self.failures.lock().remove(operation);
    }

    pub fn fail_role(&self, role_id: RoleId) {
        self.failing_roles.lock().insert(role_id);
    }

    /// Successful logins return a grant without a token
    pub fn issue_empty_tokens(&self) {
        *self.empty_tokens.lock() = true;
    }

    /// Hold logins of `username` until [`Self::release_login`]
    pub fn gate_login(&self, username: &str) {
        self.login_gates
            .lock()
            .insert(username.to_string(), Arc::new(Notify::new()));
    }

    pub fn release_login(&self, username: &str) {
        if let Some(gate) = self.login_gates.lock().get(username) {
            gate.notify_one();
        }
    }

    /// Hold every call of `operation` until [`Self::release`]
    pub fn gate(&self, operation: &str) {
        self.operation_gates
            .lock()
            .insert(operation.to_string(), Arc::new(Notify::new()));
    }

    /// Open the gate: held calls proceed and later calls are not held
    pub fn release(&self, operation: &str) {
        if let Some(gate) = self.operation_gates.lock().remove(operation) {
            gate.notify_waiters();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    async fn pass(&self, operation: &str) {
        let gate = self.operation_gates.lock().get(operation).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn check(&self, operation: &str) -> ApiResult<()> {
        match self.failures.lock().get(operation) {
            Some(Some(message)) => Err(ApiError::backend(500, message.as_str())),
            Some(None) => Err(ApiError::Network("connection reset".to_string())),
            None => Ok(()),
        }
    }

    fn authorize(&self, credential: Option<&str>) -> ApiResult<()> {
        match credential {
            Some(token) if token.starts_with("token-") => Ok(()),
            _ => Err(ApiError::backend(401, UNAUTHORIZED)),
        }
    }

    fn active(&self) -> Vec<Module> {
        let mut active: Vec<Module> = self
            .modules
            .lock()
            .iter()
            .filter(|m| m.installed)
            .cloned()
            .collect();
        active.extend(self.hidden_active.lock().iter().cloned());
        active
    }

    fn set_installed(&self, id: ModuleId, installed: bool) -> ApiResult<()> {
        let mut modules = self.modules.lock();
        let module = modules
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::backend(404, "Module not found"))?;
        module.installed = installed;
        Ok(())
    }
}

#[async_trait]
impl ConsoleApi for FakeApi {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginGrant> {
        self.record(format!("login:{}", credentials.username));

        let gate = self.login_gates.lock().get(&credentials.username).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.check("login")?;
        let identity_id = match self.accounts.lock().get(&credentials.username) {
            Some((password, id)) if password == &credentials.password => *id,
            _ => return Err(ApiError::backend(401, "Invalid username or password")),
        };

        let token = if *self.empty_tokens.lock() {
            String::new()
        } else {
            format!("token-{}", identity_id)
        };

        Ok(LoginGrant {
            id: identity_id,
            token,
            refresh_token: format!("refresh-{}", identity_id),
            user: GrantedIdentity { id: identity_id },
            created_at: None,
            updated_at: None,
        })
    }

    async fn logout(&self, token: &str) -> ApiResult<()> {
        self.record(format!("logout:{}", token));
        self.check("logout")
    }

    async fn get_role(&self, credential: Option<&str>, id: RoleId) -> ApiResult<Role> {
        self.record(format!("get_role:{}", id));
        self.pass("get_role").await;
        self.check("get_role")?;
        self.authorize(credential)?;

        if self.failing_roles.lock().contains(&id) {
            return Err(ApiError::Network("timed out".to_string()));
        }
        self.roles
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::backend(404, "Role not found"))
    }

    async fn get_all_roles(&self, credential: Option<&str>) -> ApiResult<Vec<Role>> {
        self.record("get_all_roles".to_string());
        self.pass("get_all_roles").await;
        self.check("get_all_roles")?;
        self.authorize(credential)?;

        let mut roles: Vec<Role> = self.roles.lock().values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn get_identity_roles(
        &self,
        credential: Option<&str>,
        identity_id: IdentityId,
    ) -> ApiResult<Vec<IdentityRoleAssignment>> {
        self.record(format!("get_identity_roles:{}", identity_id));
        self.pass("get_identity_roles").await;
        self.check("get_identity_roles")?;
        self.authorize(credential)?;

        Ok(self
            .assignments
            .lock()
            .iter()
            .filter(|a| a.identity_id == identity_id)
            .cloned()
            .collect())
    }

    async fn get_all_identity_roles(
        &self,
        credential: Option<&str>,
    ) -> ApiResult<Vec<IdentityRoleAssignment>> {
        self.record("get_all_identity_roles".to_string());
        self.pass("get_all_identity_roles").await;
        self.check("get_all_identity_roles")?;
        self.authorize(credential)?;

        Ok(self.assignments.lock().clone())
    }

    async fn get_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<Module> {
        self.record(format!("get_module:{}", id));
        self.pass("get_module").await;
        self.check("get_module")?;
        self.authorize(credential)?;

        self.modules
            .lock()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ApiError::backend(404, "Module not found"))
    }

    async fn get_active_modules(&self) -> ApiResult<Vec<Module>> {
        self.record("get_active_modules".to_string());
        self.pass("get_active_modules").await;
        self.check("get_active_modules")?;
        Ok(self.active())
    }

    async fn get_all_modules(&self, credential: Option<&str>) -> ApiResult<Vec<Module>> {
        self.record("get_all_modules".to_string());
        self.pass("get_all_modules").await;
        self.check("get_all_modules")?;
        self.authorize(credential)?;

        Ok(self.modules.lock().clone())
    }

    async fn install_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.record(format!("install_module:{}", id));
        self.pass("install_module").await;
        self.check("install_module")?;
        self.authorize(credential)?;
        self.set_installed(id, true)
    }

    async fn uninstall_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.record(format!("uninstall_module:{}", id));
        self.pass("uninstall_module").await;
        self.check("uninstall_module")?;
        self.authorize(credential)?;
        self.set_installed(id, false)
    }

    async fn upgrade_module(&self, credential: Option<&str>, id: ModuleId) -> ApiResult<()> {
        self.record(format!("upgrade_module:{}", id));
        self.pass("upgrade_module").await;
        self.check("upgrade_module")?;
        self.authorize(credential)?;

        let mut modules = self.modules.lock();
        let module = modules
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::backend(404, "Module not found"))?;
        module.version = "2.0.0".to_string();
        Ok(())
    }

    async fn create_identity(
        &self,
        _credential: Option<&str>,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity> {
        self.record("create_identity".to_string());
        self.pass("create_identity").await;
        self.check("create_identity")?;

        let username = draft
            .username
            .clone()
            .ok_or_else(|| ApiError::backend(400, "Username is required"))?;
        let mut identities = self.identities.lock();
        let id = identities.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let created = Identity {
            id,
            username,
            email: draft.email.clone(),
            is_active: draft.is_active.unwrap_or(true),
            roles: draft.roles.clone().unwrap_or_default(),
            created_at: None,
            updated_at: None,
        };
        identities.push(created.clone());
        Ok(created)
    }

    async fn get_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<Identity> {
        self.record(format!("get_identity:{}", id));
        self.pass("get_identity").await;
        self.check("get_identity")?;
        self.authorize(credential)?;

        self.identities
            .lock()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| ApiError::backend(404, "User not found"))
    }

    async fn get_all_identities(&self, credential: Option<&str>) -> ApiResult<Vec<Identity>> {
        self.record("get_all_identities".to_string());
        self.pass("get_all_identities").await;
        self.check("get_all_identities")?;
        self.authorize(credential)?;

        Ok(self.identities.lock().clone())
    }

    async fn update_identity(
        &self,
        credential: Option<&str>,
        id: IdentityId,
        draft: &IdentityDraft,
    ) -> ApiResult<Identity> {
        self.record(format!("update_identity:{}", id));
        self.pass("update_identity").await;
        self.check("update_identity")?;
        self.authorize(credential)?;

        let mut identities = self.identities.lock();
        let identity = identities
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ApiError::backend(404, "User not found"))?;
        if let Some(username) = &draft.username {
            identity.username = username.clone();
        }
        if let Some(email) = &draft.email {
            identity.email = Some(email.clone());
        }
        if let Some(is_active) = draft.is_active {
            identity.is_active = is_active;
        }
        if let Some(roles) = &draft.roles {
            identity.roles = roles.clone();
        }
        Ok(identity.clone())
    }

    async fn delete_identity(&self, credential: Option<&str>, id: IdentityId) -> ApiResult<()> {
        self.record(format!("delete_identity:{}", id));
        self.pass("delete_identity").await;
        self.check("delete_identity")?;
        self.authorize(credential)?;

        let mut identities = self.identities.lock();
        let before = identities.len();
        identities.retain(|i| i.id != id);
        if identities.len() == before {
            return Err(ApiError::backend(404, "User not found"));
        }
        Ok(())
    }

    async fn delete_all_identities(&self, credential: Option<&str>) -> ApiResult<()> {
        self.record("delete_all_identities".to_string());
        self.pass("delete_all_identities").await;
        self.check("delete_all_identities")?;
        self.authorize(credential)?;

        self.identities.lock().clear();
        Ok(())
    }
}
