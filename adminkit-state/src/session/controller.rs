//! Session controller
//!
//! Owns the authenticated session, persists it to the `auth-storage` slot and
//! restores it on startup. Login failures always leave a fully anonymous session;
//! logout always clears local state even when the backend call fails.

use crate::generation::Generation;
use crate::status::StatusBeacon;
use adminkit_core::{
    log_operation_error, log_operation_start, log_operation_success, ConsoleApi, ConsoleError,
    ConsoleResult, CredentialSource, Credentials, IdentityId, KeyValueStore, Session,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Slot the session is persisted under
pub const SESSION_STORAGE_KEY: &str = "auth-storage";

const COMPONENT: &str = "session_controller";
const LOGIN_FAILED: &str = "Login Failed";

pub struct SessionController {
    api: Arc<dyn ConsoleApi>,
    status: StatusBeacon,
    store: Arc<dyn KeyValueStore>,
    session: RwLock<Session>,
    login_generation: Generation,
}

impl SessionController {
    /// Controller with an empty session; the store is only written to
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        status: StatusBeacon,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            api,
            status,
            store,
            session: RwLock::new(Session::default()),
            login_generation: Generation::default(),
        }
    }

    /// Controller initialized from the persisted slot
    ///
    /// A missing, unreadable or inconsistent slot yields an empty session.
    pub fn restore(
        api: Arc<dyn ConsoleApi>,
        status: StatusBeacon,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let session = load_session(store.as_ref());
        if session.authenticated {
            info!(identity_id = ?session.identity_id, "Restored persisted session");
        }

        let controller = Self::new(api, status, store);
        *controller.session.write() = session;
        controller
    }

    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().token.clone()
    }

    pub fn identity_id(&self) -> Option<IdentityId> {
        self.session.read().identity_id
    }

    pub fn status(&self) -> &StatusBeacon {
        &self.status
    }

    /// Exchange credentials for a session
    ///
    /// Only the most recently started login may write the session; a superseded
    /// one returns its own outcome without touching any state.
    pub async fn login(&self, username: &str, password: &str) -> ConsoleResult<()> {
        self.status.set_error(None);
        let _busy = self.status.busy_guard();
        let ticket = self.login_generation.next();

        log_operation_start!("login", username = username);

        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let outcome = match self.api.login(&credentials).await {
            Ok(grant) if !grant.token.is_empty() => Ok(Session::from_grant(&grant)),
            Ok(_) => {
                warn!("Login grant carried no token");
                Err(ConsoleError::auth(LOGIN_FAILED, COMPONENT, "login"))
            }
            Err(e) => {
                debug!("Login rejected: {}", e);
                Err(ConsoleError::auth(e.message_or(LOGIN_FAILED), COMPONENT, "login"))
            }
        };

        let mut session = self.session.write();
        if !self.login_generation.is_current(ticket) {
            debug!("Dropping superseded login response");
            return outcome.map(|_| ());
        }

        match outcome {
            Ok(granted) => {
                *session = granted;
                self.persist(&session);
                let identity_id = session.identity_id;
                drop(session);

                log_operation_success!("login", identity_id = ?identity_id);
                Ok(())
            }
            Err(error) => {
                *session = Session::default();
                self.persist(&session);
                drop(session);

                self.status.report(&error);
                Err(error)
            }
        }
    }

    /// End the session
    ///
    /// The backend is told when a token is held; its failure is logged and
    /// otherwise ignored. Local state is cleared in every case.
    pub async fn logout(&self) -> ConsoleResult<()> {
        self.status.set_error(None);
        let _busy = self.status.busy_guard();

        log_operation_start!("logout");

        if let Some(token) = self.token() {
            if let Err(e) = self.api.logout(&token).await {
                log_operation_error!("logout", e, local_teardown = true);
            }
        } else {
            debug!("No token held, skipping backend logout");
        }

        self.clear();

        log_operation_success!("logout");
        Ok(())
    }

    /// Clear the session and the beacon without contacting the backend
    pub fn reset(&self) {
        self.clear();
        self.status.reset();
        debug!("Session reset");
    }

    fn clear(&self) {
        // In-flight logins must not resurrect the session
        self.login_generation.invalidate();

        let mut session = self.session.write();
        *session = Session::default();
        self.persist(&session);
    }

    fn persist(&self, session: &Session) {
        let result = if session.is_empty() {
            self.store.remove(SESSION_STORAGE_KEY)
        } else {
            serde_json::to_string(session)
                .map_err(ConsoleError::from)
                .and_then(|json| self.store.save(SESSION_STORAGE_KEY, &json))
        };

        if let Err(e) = result {
            warn!("Failed to persist session: {}", e);
        }
    }
}

impl CredentialSource for SessionController {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn identity_id(&self) -> Option<IdentityId> {
        SessionController::identity_id(self)
    }
}

fn load_session(store: &dyn KeyValueStore) -> Session {
    let data = match store.load(SESSION_STORAGE_KEY) {
        Ok(Some(data)) => data,
        Ok(None) => return Session::default(),
        Err(e) => {
            warn!("Failed to read persisted session: {}", e);
            return Session::default();
        }
    };

    match serde_json::from_str::<Session>(&data) {
        Ok(session) if session.is_consistent() => session,
        Ok(_) => {
            warn!("Persisted session is inconsistent, starting anonymous");
            Session::default()
        }
        Err(e) => {
            warn!("Persisted session is unreadable, starting anonymous: {}", e);
            Session::default()
        }
    }
}
