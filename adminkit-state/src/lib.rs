//! adminkit state - session, role and module state for the admin console
//!
//! The containers here hold everything the console knows about who is logged
//! in, which roles they hold and which modules are installed. They talk to the
//! backend only through [`adminkit_core::ConsoleApi`] and report progress and
//! failures through one shared [`StatusBeacon`].
//!
//! ## Architecture
//!
//! - [`SessionController`] owns the session and persists it
//! - [`RoleResolver`], [`ModuleRegistry`] and [`IdentityDirectory`] read the
//!   session as a [`adminkit_core::CredentialSource`]
//! - [`access`] derives predicates and navigation from snapshots
//! - [`AdminConsole`] wires them together and owns logout teardown

pub mod access;
pub mod console;
mod generation;
pub mod identities;
pub mod modules;
pub mod roles;
pub mod session;
pub mod status;

pub use access::{
    is_administrator, is_administrator_or_manager, navigation, MenuItem, MenuTarget,
};
pub use console::AdminConsole;
pub use identities::{IdentityDirectory, IdentitySnapshot};
pub use modules::{ModuleRegistry, ModuleSnapshot};
pub use roles::{RoleResolver, RoleSnapshot};
pub use session::{FileStore, MemoryStore, SessionController, SESSION_STORAGE_KEY};
pub use status::{BusyGuard, StatusBeacon, StatusSnapshot};
