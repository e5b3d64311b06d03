//! Module registry
//!
//! Tracks the module catalog and the active module list. Install and uninstall
//! patch the active list locally as soon as the backend accepts the command; the
//! patched list is tagged unconfirmed and replaced wholesale by the refetch that
//! follows.

use crate::generation::Generation;
use crate::status::StatusBeacon;
use adminkit_core::{
    log_operation_start, log_operation_success, ApiError, ApiResult, ConsoleApi, ConsoleError,
    ConsoleResult, CredentialSource, Module, ModuleId,
};
use futures::future::join;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "module_registry";

const FAILED_ALL_MODULE: &str = "Failed Fetching All Module";
const FAILED_ACTIVE_MODULE: &str = "Failed Fetching Active Module";
const FAILED_MODULE: &str = "Failed Fetching Module";
const FAILED_INSTALL: &str = "Failed Install Module";
const FAILED_UNINSTALL: &str = "Failed Uninstall Module";
const FAILED_UPGRADE: &str = "Failed Upgrade Module";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSnapshot {
    /// Module catalog
    pub modules: Vec<Module>,
    /// Modules currently active
    pub active_modules: Vec<Module>,
    /// `false` while `active_modules` carries a local patch the backend has not
    /// confirmed yet
    pub active_confirmed: bool,
}

impl ModuleSnapshot {
    pub fn is_active(&self, name: &str) -> bool {
        self.active_modules.iter().any(|m| m.name == name)
    }

    pub fn find(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Every active module also appears in the catalog
    pub fn is_consistent(&self) -> bool {
        self.active_modules
            .iter()
            .all(|active| self.modules.iter().any(|m| m.id == active.id))
    }

    /// Add active modules the catalog is missing
    fn reconcile(&mut self) {
        let missing: Vec<Module> = self
            .active_modules
            .iter()
            .filter(|active| !self.modules.iter().any(|m| m.id == active.id))
            .cloned()
            .collect();

        if !missing.is_empty() {
            debug!(count = missing.len(), "Adding active modules missing from catalog");
            self.modules.extend(missing);
        }
    }

    fn upsert(&mut self, module: Module) {
        match self.modules.iter_mut().find(|m| m.id == module.id) {
            Some(existing) => *existing = module,
            None => self.modules.push(module),
        }
    }
}

pub struct ModuleRegistry {
    api: Arc<dyn ConsoleApi>,
    credentials: Arc<dyn CredentialSource>,
    status: StatusBeacon,
    state: RwLock<ModuleSnapshot>,
    catalog_generation: Generation,
    active_generation: Generation,
    /// Bumped by [`Self::reset`]; operations started before it never write
    epoch: Generation,
}

impl ModuleRegistry {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        credentials: Arc<dyn CredentialSource>,
        status: StatusBeacon,
    ) -> Self {
        Self {
            api,
            credentials,
            status,
            state: RwLock::new(ModuleSnapshot {
                active_confirmed: true,
                ..Default::default()
            }),
            catalog_generation: Generation::default(),
            active_generation: Generation::default(),
            epoch: Generation::default(),
        }
    }

    pub fn status(&self) -> &StatusBeacon {
        &self.status
    }

    pub fn snapshot(&self) -> ModuleSnapshot {
        self.state.read().clone()
    }

    pub fn modules(&self) -> Vec<Module> {
        self.state.read().modules.clone()
    }

    pub fn active_modules(&self) -> Vec<Module> {
        self.state.read().active_modules.clone()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state.read().is_active(name)
    }

    /// Replace the catalog with the backend's
    pub async fn fetch_catalog(&self) -> ConsoleResult<()> {
        let epoch = self.begin();
        log_operation_start!("fetch_catalog");

        self.load_catalog(epoch)
            .await
            .map_err(|e| self.fetch_failed(epoch, e, FAILED_ALL_MODULE, "fetch_catalog"))
    }

    /// Replace the active list with the backend's
    pub async fn fetch_active(&self) -> ConsoleResult<()> {
        let epoch = self.begin();
        log_operation_start!("fetch_active");

        self.load_active(epoch)
            .await
            .map_err(|e| self.fetch_failed(epoch, e, FAILED_ACTIVE_MODULE, "fetch_active"))
    }

    /// Fetch one module and upsert it into the catalog
    pub async fn fetch_module(&self, id: ModuleId) -> ConsoleResult<Module> {
        let epoch = self.begin();
        log_operation_start!("fetch_module", module_id = id);

        let token = self.credentials.bearer_token();
        let module = self
            .api
            .get_module(token.as_deref(), id)
            .await
            .map_err(|e| {
                self.fetch_failed(epoch, e, FAILED_MODULE, "fetch_module")
                    .with_metadata("module_id", id)
            })?;

        if let Some(mut state) = self.write_within(epoch) {
            state.upsert(module.clone());
        }
        Ok(module)
    }

    pub async fn install(&self, id: ModuleId) -> ConsoleResult<()> {
        let epoch = self.begin();
        let _busy = self.status.busy_guard();
        log_operation_start!("install_module", module_id = id);

        let token = self.credentials.bearer_token();
        self.api
            .install_module(token.as_deref(), id)
            .await
            .map_err(|e| self.mutation_failed(epoch, e, FAILED_INSTALL, "install_module", id))?;

        {
            let Some(mut state) = self.write_within(epoch) else {
                return Ok(());
            };
            let already_active = state.active_modules.iter().any(|m| m.id == id);
            match state.find(id).cloned() {
                Some(mut module) if !already_active => {
                    module.installed = true;
                    state.active_modules.push(module);
                    state.active_confirmed = false;
                }
                Some(_) => {}
                None => debug!(module_id = id, "Installed module not in catalog, awaiting refetch"),
            }
        }

        self.refresh(epoch)
            .await
            .map_err(|e| self.mutation_failed(epoch, e, FAILED_INSTALL, "install_module", id))?;

        log_operation_success!("install_module", module_id = id);
        Ok(())
    }

    pub async fn uninstall(&self, id: ModuleId) -> ConsoleResult<()> {
        let epoch = self.begin();
        let _busy = self.status.busy_guard();
        log_operation_start!("uninstall_module", module_id = id);

        let token = self.credentials.bearer_token();
        self.api
            .uninstall_module(token.as_deref(), id)
            .await
            .map_err(|e| {
                self.mutation_failed(epoch, e, FAILED_UNINSTALL, "uninstall_module", id)
            })?;

        {
            let Some(mut state) = self.write_within(epoch) else {
                return Ok(());
            };
            let before = state.active_modules.len();
            state.active_modules.retain(|m| m.id != id);
            if state.active_modules.len() != before {
                state.active_confirmed = false;
            }
        }

        self.refresh(epoch).await.map_err(|e| {
            self.mutation_failed(epoch, e, FAILED_UNINSTALL, "uninstall_module", id)
        })?;

        log_operation_success!("uninstall_module", module_id = id);
        Ok(())
    }

    /// Upgrade a module; nothing is patched locally
    pub async fn upgrade(&self, id: ModuleId) -> ConsoleResult<()> {
        let epoch = self.begin();
        let _busy = self.status.busy_guard();
        log_operation_start!("upgrade_module", module_id = id);

        let token = self.credentials.bearer_token();
        self.api
            .upgrade_module(token.as_deref(), id)
            .await
            .map_err(|e| self.mutation_failed(epoch, e, FAILED_UPGRADE, "upgrade_module", id))?;

        self.refresh(epoch)
            .await
            .map_err(|e| self.mutation_failed(epoch, e, FAILED_UPGRADE, "upgrade_module", id))?;

        log_operation_success!("upgrade_module", module_id = id);
        Ok(())
    }

    /// Drop all module state and idle the beacon
    ///
    /// Operations still in flight finish without writing.
    pub fn reset(&self) {
        self.epoch.invalidate();
        self.catalog_generation.invalidate();
        self.active_generation.invalidate();
        *self.state.write() = ModuleSnapshot {
            active_confirmed: true,
            ..Default::default()
        };
        self.status.reset();
        debug!("Module state reset");
    }

    /// Clear the error slot and take the current reset epoch
    fn begin(&self) -> u64 {
        self.status.set_error(None);
        self.epoch.current()
    }

    /// Write access to the state, unless a reset happened since `epoch`
    fn write_within(&self, epoch: u64) -> Option<RwLockWriteGuard<'_, ModuleSnapshot>> {
        let state = self.state.write();
        if self.epoch.is_current(epoch) {
            Some(state)
        } else {
            debug!("Dropping module result that outlived a reset");
            None
        }
    }

    /// Refetch catalog and active list concurrently
    async fn refresh(&self, epoch: u64) -> ApiResult<()> {
        let (catalog, active) = join(self.load_catalog(epoch), self.load_active(epoch)).await;
        catalog.and(active)
    }

    async fn load_catalog(&self, epoch: u64) -> ApiResult<()> {
        let ticket = self.catalog_generation.next();
        let token = self.credentials.bearer_token();
        let modules = self.api.get_all_modules(token.as_deref()).await?;

        let Some(mut state) = self.write_within(epoch) else {
            return Ok(());
        };
        if !self.catalog_generation.is_current(ticket) {
            debug!("Dropping superseded module catalog");
            return Ok(());
        }
        state.modules = modules;
        state.reconcile();
        Ok(())
    }

    async fn load_active(&self, epoch: u64) -> ApiResult<()> {
        let ticket = self.active_generation.next();
        let active = self.api.get_active_modules().await?;

        let Some(mut state) = self.write_within(epoch) else {
            return Ok(());
        };
        if !self.active_generation.is_current(ticket) {
            debug!("Dropping superseded active module list");
            return Ok(());
        }
        state.active_modules = active;
        state.active_confirmed = true;
        state.reconcile();
        Ok(())
    }

    fn fetch_failed(
        &self,
        epoch: u64,
        error: ApiError,
        fallback: &str,
        operation: &str,
    ) -> ConsoleError {
        let error = ConsoleError::fetch(error.message_or(fallback), COMPONENT, operation);
        self.report(epoch, error)
    }

    fn mutation_failed(
        &self,
        epoch: u64,
        error: ApiError,
        fallback: &str,
        operation: &str,
        id: ModuleId,
    ) -> ConsoleError {
        let error = ConsoleError::mutation(error.message_or(fallback), COMPONENT, operation)
            .with_metadata("module_id", id);
        self.report(epoch, error)
    }

    /// Surface the error on the beacon unless a reset superseded the operation
    fn report(&self, epoch: u64, error: ConsoleError) -> ConsoleError {
        if self.epoch.is_current(epoch) {
            self.status.report(&error);
        }
        error
    }
}
