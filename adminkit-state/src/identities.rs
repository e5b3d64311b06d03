//! Identity directory
//!
//! Lists and edits console accounts. A failed operation reports on the beacon
//! and leaves the directory as it was. The listing is what bulk role resolution
//! decorates; see [`crate::AdminConsole::load_identity_table`].

use crate::generation::Generation;
use crate::status::StatusBeacon;
use adminkit_core::{
    log_operation_start, log_operation_success, ApiError, ConsoleApi, ConsoleError,
    ConsoleResult, CredentialSource, Identity, IdentityDraft, IdentityId,
};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "identity_directory";

const FAILED_CREATE: &str = "Failed create user";
const FAILED_FETCH: &str = "Failed fetching user";
const FAILED_FETCH_ALL: &str = "Failed fetch all user";
const FAILED_UPDATE: &str = "Failed update user";
const FAILED_DELETE: &str = "Failed delete user";
const FAILED_DELETE_ALL: &str = "Failed delete All user";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentitySnapshot {
    /// Identity last created, fetched or updated
    pub selected: Option<Identity>,
    /// Last full listing, kept in step with single-identity edits
    pub identities: Vec<Identity>,
}

impl IdentitySnapshot {
    pub fn find(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id == id)
    }

    pub fn ids(&self) -> Vec<IdentityId> {
        self.identities.iter().map(|i| i.id).collect()
    }
}

pub struct IdentityDirectory {
    api: Arc<dyn ConsoleApi>,
    credentials: Arc<dyn CredentialSource>,
    status: StatusBeacon,
    state: RwLock<IdentitySnapshot>,
    selected_generation: Generation,
    list_generation: Generation,
    epoch: Generation,
}

impl IdentityDirectory {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        credentials: Arc<dyn CredentialSource>,
        status: StatusBeacon,
    ) -> Self {
        Self {
            api,
            credentials,
            status,
            state: RwLock::new(IdentitySnapshot::default()),
            selected_generation: Generation::default(),
            list_generation: Generation::default(),
            epoch: Generation::default(),
        }
    }

    pub fn status(&self) -> &StatusBeacon {
        &self.status
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        self.state.read().clone()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.state.read().identities.clone()
    }

    pub fn selected(&self) -> Option<Identity> {
        self.state.read().selected.clone()
    }

    /// Create an identity and select it
    ///
    /// The listing is left alone until the next [`Self::fetch_all`].
    pub async fn create(&self, draft: &IdentityDraft) -> ConsoleResult<Identity> {
        let epoch = self.begin();
        let ticket = self.selected_generation.next();
        log_operation_start!("create_identity", username = ?draft.username);

        let token = self.credentials.bearer_token();
        let created = self
            .api
            .create_identity(token.as_deref(), draft)
            .await
            .map_err(|e| self.fail(epoch, self.mutation(e, FAILED_CREATE, "create_identity")))?;

        if let Some(mut state) = self.write_within(epoch) {
            if self.selected_generation.is_current(ticket) {
                state.selected = Some(created.clone());
            }
        }

        log_operation_success!("create_identity", identity_id = created.id);
        Ok(created)
    }

    pub async fn fetch(&self, id: IdentityId) -> ConsoleResult<Identity> {
        let epoch = self.begin();
        let ticket = self.selected_generation.next();
        log_operation_start!("fetch_identity", identity_id = id);

        let token = self.credentials.bearer_token();
        let identity = self.api.get_identity(token.as_deref(), id).await.map_err(|e| {
            let error = ConsoleError::fetch(e.message_or(FAILED_FETCH), COMPONENT, "fetch_identity")
                .with_metadata("identity_id", id);
            self.fail(epoch, error)
        })?;

        if let Some(mut state) = self.write_within(epoch) {
            if self.selected_generation.is_current(ticket) {
                state.selected = Some(identity.clone());
            } else {
                debug!(identity_id = id, "Dropping superseded identity fetch");
            }
        }

        Ok(identity)
    }

    /// Replace the listing with the backend's
    pub async fn fetch_all(&self) -> ConsoleResult<Vec<Identity>> {
        let epoch = self.begin();
        let ticket = self.list_generation.next();
        log_operation_start!("fetch_all_identities");

        let token = self.credentials.bearer_token();
        let identities = self
            .api
            .get_all_identities(token.as_deref())
            .await
            .map_err(|e| {
                let error = ConsoleError::fetch(
                    e.message_or(FAILED_FETCH_ALL),
                    COMPONENT,
                    "fetch_all_identities",
                );
                self.fail(epoch, error)
            })?;

        if let Some(mut state) = self.write_within(epoch) {
            if self.list_generation.is_current(ticket) {
                state.identities = identities.clone();
            } else {
                debug!("Dropping superseded identity listing");
            }
        }

        log_operation_success!("fetch_all_identities", count = identities.len());
        Ok(identities)
    }

    /// Update an identity, select the result and replace it in the listing
    pub async fn update(&self, id: IdentityId, draft: &IdentityDraft) -> ConsoleResult<Identity> {
        let epoch = self.begin();
        let ticket = self.selected_generation.next();
        log_operation_start!("update_identity", identity_id = id);

        let token = self.credentials.bearer_token();
        let updated = self
            .api
            .update_identity(token.as_deref(), id, draft)
            .await
            .map_err(|e| {
                let error = self.mutation(e, FAILED_UPDATE, "update_identity");
                self.fail(epoch, error.with_metadata("identity_id", id))
            })?;

        if let Some(mut state) = self.write_within(epoch) {
            for listed in state.identities.iter_mut().filter(|i| i.id == id) {
                *listed = updated.clone();
            }
            if self.selected_generation.is_current(ticket) {
                state.selected = Some(updated.clone());
            }
        }

        log_operation_success!("update_identity", identity_id = id);
        Ok(updated)
    }

    /// Delete an identity, clear the selection and drop it from the listing
    pub async fn delete(&self, id: IdentityId) -> ConsoleResult<()> {
        let epoch = self.begin();
        self.selected_generation.invalidate();
        log_operation_start!("delete_identity", identity_id = id);

        let token = self.credentials.bearer_token();
        self.api
            .delete_identity(token.as_deref(), id)
            .await
            .map_err(|e| {
                let error = self.mutation(e, FAILED_DELETE, "delete_identity");
                self.fail(epoch, error.with_metadata("identity_id", id))
            })?;

        if let Some(mut state) = self.write_within(epoch) {
            state.selected = None;
            state.identities.retain(|i| i.id != id);
        }

        log_operation_success!("delete_identity", identity_id = id);
        Ok(())
    }

    pub async fn delete_all(&self) -> ConsoleResult<()> {
        let epoch = self.begin();
        self.selected_generation.invalidate();
        self.list_generation.invalidate();
        log_operation_start!("delete_all_identities");

        let token = self.credentials.bearer_token();
        self.api
            .delete_all_identities(token.as_deref())
            .await
            .map_err(|e| {
                let error = self.mutation(e, FAILED_DELETE_ALL, "delete_all_identities");
                self.fail(epoch, error)
            })?;

        if let Some(mut state) = self.write_within(epoch) {
            *state = IdentitySnapshot::default();
        }

        log_operation_success!("delete_all_identities");
        Ok(())
    }

    /// Drop the directory and idle the beacon
    ///
    /// Operations still in flight finish without writing.
    pub fn reset(&self) {
        self.epoch.invalidate();
        self.selected_generation.invalidate();
        self.list_generation.invalidate();
        *self.state.write() = IdentitySnapshot::default();
        self.status.reset();
        debug!("Identity directory reset");
    }

    fn begin(&self) -> u64 {
        self.status.set_error(None);
        self.epoch.current()
    }

    fn write_within(&self, epoch: u64) -> Option<RwLockWriteGuard<'_, IdentitySnapshot>> {
        let state = self.state.write();
        if self.epoch.is_current(epoch) {
            Some(state)
        } else {
            debug!("Dropping identity result that outlived a reset");
            None
        }
    }

    fn mutation(&self, error: ApiError, fallback: &str, operation: &str) -> ConsoleError {
        ConsoleError::mutation(error.message_or(fallback), COMPONENT, operation)
    }

    fn fail(&self, epoch: u64, error: ConsoleError) -> ConsoleError {
        if self.epoch.is_current(epoch) {
            self.status.report(&error);
        }
        error
    }
}
