//! Role resolution
//!
//! Resolves the viewer's own role(s) and, in bulk, the roles of arbitrary
//! identities. The role catalog and the per-identity assignment cache only ever
//! grow between resets, so concurrent bulk resolutions commute.

use crate::access;
use crate::generation::Generation;
use crate::status::StatusBeacon;
use adminkit_core::{
    log_operation_start, log_operation_success, ApiError, ApiResult, ConsoleApi, ConsoleError,
    ConsoleResult, CredentialSource, IdentityId, IdentityRoleAssignment, Role, RoleId,
};
use futures::future::{join_all, try_join_all};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "role_resolver";

const FAILED_ROLE: &str = "Failed Fetching Role";
const FAILED_ROLES: &str = "Failed Fetching Roles";
const FAILED_ALL_ROLES: &str = "Failed Fetching All Roles";
const FAILED_IDENTITY_ROLE: &str = "Failed Fetching User Role";
const FAILED_IDENTITY_ROLES: &str = "Failed Fetching User Roles";
const FAILED_ALL_IDENTITY_ROLES: &str = "Failed Fetching All User Roles";

/// Everything the resolver knows
///
/// At most one of `single_role` and `multi_roles` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleSnapshot {
    /// The viewer's role when exactly one is held
    pub single_role: Option<Role>,
    /// The viewer's roles when more than one is held
    pub multi_roles: Option<Vec<Role>>,
    /// Every role resolved so far, by id
    pub catalog: BTreeMap<RoleId, Role>,
    pub all_roles: Option<Vec<Role>>,
    pub own_assignments: Option<Vec<IdentityRoleAssignment>>,
    pub all_assignments: Option<Vec<IdentityRoleAssignment>>,
    /// Assignments fetched per identity; an identity is never fetched twice
    pub assignments_by_identity: HashMap<IdentityId, Vec<IdentityRoleAssignment>>,
}

impl RoleSnapshot {
    /// The viewer's roles, whichever slot holds them
    pub fn held_roles(&self) -> Vec<&Role> {
        match (&self.single_role, &self.multi_roles) {
            (Some(role), _) => vec![role],
            (None, Some(roles)) => roles.iter().collect(),
            (None, None) => Vec::new(),
        }
    }

    /// Catalog roles held by `identity_id`, as far as they are resolved
    pub fn roles_for(&self, identity_id: IdentityId) -> Vec<Role> {
        self.assignments_by_identity
            .get(&identity_id)
            .map(|assignments| {
                assignments
                    .iter()
                    .filter_map(|a| self.catalog.get(&a.role_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_administrator(&self) -> bool {
        access::is_administrator(self)
    }

    pub fn is_administrator_or_manager(&self) -> bool {
        access::is_administrator_or_manager(self)
    }

    fn merge_catalog<'a>(&mut self, roles: impl IntoIterator<Item = &'a Role>) {
        for role in roles {
            self.catalog.insert(role.id, role.clone());
        }
    }
}

/// How the viewer's role slots end up after resolution
enum OwnRoles {
    None,
    Single(Role),
    Multi(Vec<Role>),
}

pub struct RoleResolver {
    api: Arc<dyn ConsoleApi>,
    credentials: Arc<dyn CredentialSource>,
    status: StatusBeacon,
    state: RwLock<RoleSnapshot>,
    own_generation: Generation,
    /// Bumped by [`Self::reset`]; operations started before it never write
    epoch: Generation,
}

impl RoleResolver {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        credentials: Arc<dyn CredentialSource>,
        status: StatusBeacon,
    ) -> Self {
        Self {
            api,
            credentials,
            status,
            state: RwLock::new(RoleSnapshot::default()),
            own_generation: Generation::default(),
            epoch: Generation::default(),
        }
    }

    pub fn status(&self) -> &StatusBeacon {
        &self.status
    }

    pub fn snapshot(&self) -> RoleSnapshot {
        self.state.read().clone()
    }

    pub fn is_administrator(&self) -> bool {
        access::is_administrator(&self.state.read())
    }

    pub fn is_administrator_or_manager(&self) -> bool {
        access::is_administrator_or_manager(&self.state.read())
    }

    pub fn roles_for(&self, identity_id: IdentityId) -> Vec<Role> {
        self.state.read().roles_for(identity_id)
    }

    /// Fetch one role and make it the viewer's single role
    pub async fn resolve_role(&self, role_id: RoleId) -> ConsoleResult<Role> {
        let epoch = self.begin();
        let ticket = self.own_generation.next();
        log_operation_start!("resolve_role", role_id = role_id);

        let role = self
            .fetch_role(role_id)
            .await
            .map_err(|e| self.fail(epoch, e, FAILED_ROLE, "resolve_role"))?;

        let Some(mut state) = self.write_within(epoch) else {
            return Ok(role);
        };
        state.merge_catalog([&role]);
        if self.own_generation.is_current(ticket) {
            state.single_role = Some(role.clone());
            state.multi_roles = None;
        } else {
            debug!(role_id, "Dropping superseded role resolution");
        }

        Ok(role)
    }

    /// Fetch several roles in parallel and make them the viewer's multi roles
    pub async fn resolve_roles(&self, role_ids: &[RoleId]) -> ConsoleResult<Vec<Role>> {
        let epoch = self.begin();
        let ticket = self.own_generation.next();
        log_operation_start!("resolve_roles", count = role_ids.len());

        let roles = self
            .fetch_roles(&dedup(role_ids))
            .await
            .map_err(|e| self.fail(epoch, e, FAILED_ROLES, "resolve_roles"))?;

        let Some(mut state) = self.write_within(epoch) else {
            return Ok(roles);
        };
        state.merge_catalog(&roles);
        if self.own_generation.is_current(ticket) {
            state.single_role = None;
            state.multi_roles = Some(roles.clone());
        } else {
            debug!("Dropping superseded roles resolution");
        }

        Ok(roles)
    }

    /// Resolve the roles `identity_id` holds into the viewer's role slots
    ///
    /// No assignment leaves both slots empty, one fills `single_role`, more than
    /// one fill `multi_roles`.
    pub async fn resolve_own_role(&self, identity_id: IdentityId) -> ConsoleResult<()> {
        let epoch = self.begin();
        let ticket = self.own_generation.next();
        log_operation_start!("resolve_own_role", identity_id = identity_id);

        let token = self.credentials.bearer_token();
        let assignments = self
            .api
            .get_identity_roles(token.as_deref(), identity_id)
            .await
            .map_err(|e| self.fail(epoch, e, FAILED_IDENTITY_ROLE, "resolve_own_role"))?;

        let role_ids = dedup(&assignments.iter().map(|a| a.role_id).collect::<Vec<_>>());
        let own = match assignments.len() {
            0 => OwnRoles::None,
            1 => OwnRoles::Single(
                self.fetch_role(role_ids[0])
                    .await
                    .map_err(|e| self.fail(epoch, e, FAILED_ROLE, "resolve_own_role"))?,
            ),
            _ => OwnRoles::Multi(
                self.fetch_roles(&role_ids)
                    .await
                    .map_err(|e| self.fail(epoch, e, FAILED_ROLES, "resolve_own_role"))?,
            ),
        };

        let Some(mut state) = self.write_within(epoch) else {
            return Ok(());
        };
        // Catalog and cache entries stay valid for a superseded resolution; the
        // viewer's slots do not.
        match &own {
            OwnRoles::None => {}
            OwnRoles::Single(role) => state.merge_catalog([role]),
            OwnRoles::Multi(roles) => state.merge_catalog(roles),
        }
        state
            .assignments_by_identity
            .insert(identity_id, assignments.clone());

        if !self.own_generation.is_current(ticket) {
            debug!(identity_id, "Dropping superseded own role resolution");
            return Ok(());
        }

        state.own_assignments = Some(assignments);
        let held = match own {
            OwnRoles::None => {
                state.single_role = None;
                state.multi_roles = None;
                0
            }
            OwnRoles::Single(role) => {
                state.single_role = Some(role);
                state.multi_roles = None;
                1
            }
            OwnRoles::Multi(roles) => {
                let held = roles.len();
                state.single_role = None;
                state.multi_roles = Some(roles);
                held
            }
        };
        drop(state);

        log_operation_success!("resolve_own_role", identity_id = identity_id, roles = held);
        Ok(())
    }

    /// [`Self::resolve_own_role`] for the identity of the current session
    pub async fn resolve_current(&self) -> ConsoleResult<()> {
        match self.credentials.identity_id() {
            Some(identity_id) => self.resolve_own_role(identity_id).await,
            None => {
                debug!("No identity in session, skipping own role resolution");
                Ok(())
            }
        }
    }

    /// Resolve the roles of many identities
    ///
    /// Identities already in the assignment cache and roles already in the
    /// catalog are not fetched again. Successful fetches are kept even when a
    /// sibling fails; the first failure is reported. A failed assignment phase
    /// skips the role phase.
    pub async fn resolve_bulk(&self, identity_ids: &[IdentityId]) -> ConsoleResult<()> {
        let epoch = self.begin();
        log_operation_start!("resolve_bulk", identities = identity_ids.len());

        let token = self.credentials.bearer_token();
        let token = token.as_deref();
        let api = self.api.as_ref();
        let requested = dedup(identity_ids);

        let missing: Vec<IdentityId> = {
            let state = self.state.read();
            requested
                .iter()
                .copied()
                .filter(|id| !state.assignments_by_identity.contains_key(id))
                .collect()
        };

        let fetched = join_all(missing.iter().map(|&identity_id| async move {
            (identity_id, api.get_identity_roles(token, identity_id).await)
        }))
        .await;

        let mut first_error = None;
        let mut resolved = Vec::with_capacity(fetched.len());
        for (identity_id, result) in fetched {
            match result {
                Ok(assignments) => resolved.push((identity_id, assignments)),
                Err(e) => {
                    debug!(identity_id, "Assignment fetch failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(mut state) = self.write_within(epoch) {
            state.assignments_by_identity.extend(resolved);
        }
        if let Some(e) = first_error {
            return Err(self.fail(epoch, e, FAILED_IDENTITY_ROLES, "resolve_bulk"));
        }
        if !self.epoch.is_current(epoch) {
            return Ok(());
        }

        let unresolved: BTreeSet<RoleId> = {
            let state = self.state.read();
            requested
                .iter()
                .filter_map(|id| state.assignments_by_identity.get(id))
                .flatten()
                .map(|a| a.role_id)
                .filter(|role_id| !state.catalog.contains_key(role_id))
                .collect()
        };

        let fetched = join_all(
            unresolved
                .iter()
                .map(|&role_id| async move { api.get_role(token, role_id).await }),
        )
        .await;

        let mut first_error = None;
        let mut roles = Vec::with_capacity(fetched.len());
        for result in fetched {
            match result {
                Ok(role) => roles.push(role),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(mut state) = self.write_within(epoch) {
            state.merge_catalog(&roles);
        }
        if let Some(e) = first_error {
            return Err(self.fail(epoch, e, FAILED_IDENTITY_ROLES, "resolve_bulk"));
        }

        log_operation_success!(
            "resolve_bulk",
            identities_fetched = missing.len(),
            roles_fetched = unresolved.len()
        );
        Ok(())
    }

    pub async fn fetch_all_roles(&self) -> ConsoleResult<Vec<Role>> {
        let epoch = self.begin();
        log_operation_start!("fetch_all_roles");

        let token = self.credentials.bearer_token();
        let roles = self
            .api
            .get_all_roles(token.as_deref())
            .await
            .map_err(|e| self.fail(epoch, e, FAILED_ALL_ROLES, "fetch_all_roles"))?;

        if let Some(mut state) = self.write_within(epoch) {
            state.merge_catalog(&roles);
            state.all_roles = Some(roles.clone());
        }

        Ok(roles)
    }

    /// Fetch every assignment; identities present in the listing replace their
    /// cached entries
    pub async fn fetch_all_assignments(&self) -> ConsoleResult<Vec<IdentityRoleAssignment>> {
        let epoch = self.begin();
        log_operation_start!("fetch_all_assignments");

        let token = self.credentials.bearer_token();
        let assignments = self
            .api
            .get_all_identity_roles(token.as_deref())
            .await
            .map_err(|e| {
                self.fail(epoch, e, FAILED_ALL_IDENTITY_ROLES, "fetch_all_assignments")
            })?;

        let mut grouped: HashMap<IdentityId, Vec<IdentityRoleAssignment>> = HashMap::new();
        for assignment in &assignments {
            grouped
                .entry(assignment.identity_id)
                .or_default()
                .push(assignment.clone());
        }

        if let Some(mut state) = self.write_within(epoch) {
            state.assignments_by_identity.extend(grouped);
            state.all_assignments = Some(assignments.clone());
        }

        Ok(assignments)
    }

    /// Drop all role state and idle the beacon
    ///
    /// Operations still in flight finish without writing.
    pub fn reset(&self) {
        self.epoch.invalidate();
        self.own_generation.invalidate();
        *self.state.write() = RoleSnapshot::default();
        self.status.reset();
        debug!("Role state reset");
    }

    /// Clear the error slot and take the current reset epoch
    fn begin(&self) -> u64 {
        self.status.set_error(None);
        self.epoch.current()
    }

    /// Write access to the state, unless a reset happened since `epoch`
    fn write_within(&self, epoch: u64) -> Option<RwLockWriteGuard<'_, RoleSnapshot>> {
        let state = self.state.write();
        if self.epoch.is_current(epoch) {
            Some(state)
        } else {
            debug!("Dropping role result that outlived a reset");
            None
        }
    }

    async fn fetch_role(&self, role_id: RoleId) -> ApiResult<Role> {
        let token = self.credentials.bearer_token();
        self.api.get_role(token.as_deref(), role_id).await
    }

    async fn fetch_roles(&self, role_ids: &[RoleId]) -> ApiResult<Vec<Role>> {
        try_join_all(role_ids.iter().map(|&role_id| self.fetch_role(role_id))).await
    }

    fn fail(&self, epoch: u64, error: ApiError, fallback: &str, operation: &str) -> ConsoleError {
        let error = ConsoleError::fetch(error.message_or(fallback), COMPONENT, operation);
        if self.epoch.is_current(epoch) {
            self.status.report(&error);
        }
        error
    }
}

/// Drop repeated ids, keeping first-seen order
fn dedup(ids: &[u64]) -> Vec<u64> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
