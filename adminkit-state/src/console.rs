//! Composition root wiring the state containers together

use crate::access::{self, MenuItem};
use crate::identities::IdentityDirectory;
use crate::modules::ModuleRegistry;
use crate::roles::RoleResolver;
use crate::session::SessionController;
use crate::status::StatusBeacon;
use adminkit_core::{ConsoleApi, ConsoleResult, Identity, IdentityId, KeyValueStore};
use futures::join;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One admin console: a shared beacon, the session, and the role, module and
/// identity state that depend on it
pub struct AdminConsole {
    status: StatusBeacon,
    session: Arc<SessionController>,
    roles: RoleResolver,
    modules: ModuleRegistry,
    identities: IdentityDirectory,
    store: Arc<dyn KeyValueStore>,
}

impl AdminConsole {
    /// Build the console and restore any persisted session
    pub fn new(api: Arc<dyn ConsoleApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let status = StatusBeacon::new();
        let session = Arc::new(SessionController::restore(
            api.clone(),
            status.clone(),
            store.clone(),
        ));
        let roles = RoleResolver::new(api.clone(), session.clone(), status.clone());
        let modules = ModuleRegistry::new(api.clone(), session.clone(), status.clone());
        let identities = IdentityDirectory::new(api, session.clone(), status.clone());

        Self {
            status,
            session,
            roles,
            modules,
            identities,
            store,
        }
    }

    pub fn status(&self) -> &StatusBeacon {
        &self.status
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn identities(&self) -> &IdentityDirectory {
        &self.identities
    }

    /// Load what the landing view needs
    ///
    /// The active module list is fetched for anonymous viewers too; own roles
    /// and the catalog only with a session. All fetches run concurrently and
    /// the first failure is returned.
    pub async fn bootstrap(&self) -> ConsoleResult<()> {
        let authenticated = self.session.is_authenticated();
        debug!(authenticated, "Bootstrapping console state");

        let own_roles = async {
            if authenticated {
                self.roles.resolve_current().await
            } else {
                Ok(())
            }
        };
        let catalog = async {
            if authenticated {
                self.modules.fetch_catalog().await
            } else {
                Ok(())
            }
        };

        let (own_roles, catalog, active) = join!(own_roles, catalog, self.modules.fetch_active());
        own_roles.and(catalog).and(active)
    }

    /// List every identity and resolve the roles each holds
    ///
    /// Roles are read back per identity through [`RoleResolver::roles_for`].
    pub async fn load_identity_table(&self) -> ConsoleResult<Vec<Identity>> {
        let identities = self.identities.fetch_all().await?;
        let ids: Vec<IdentityId> = identities.iter().map(|i| i.id).collect();
        self.roles.resolve_bulk(&ids).await?;
        Ok(identities)
    }

    /// Log out and tear down every piece of console state
    pub async fn logout(&self) -> ConsoleResult<()> {
        self.session.logout().await?;
        self.teardown();
        info!("Logged out");
        Ok(())
    }

    /// Local teardown without contacting the backend
    pub fn force_logout(&self) {
        self.session.reset();
        self.teardown();
        info!("Session discarded locally");
    }

    /// Menu for the current state
    pub fn navigation(&self) -> Vec<MenuItem> {
        access::navigation(
            &self.session.snapshot(),
            &self.roles.snapshot(),
            &self.modules.active_modules(),
        )
    }

    fn teardown(&self) {
        self.roles.reset();
        self.modules.reset();
        self.identities.reset();
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear console storage: {}", e);
        }
    }
}
