//! Backend endpoint paths, relative to the configured base URL

use adminkit_core::{IdentityId, ModuleId, RoleId};

pub const LOGIN: &str = "services/users/login";
pub const LOGOUT: &str = "services/users/logout";

pub const CREATE_IDENTITY: &str = "services/users/create";
pub const ALL_IDENTITIES: &str = "services/users/get/all";
pub const DELETE_ALL_IDENTITIES: &str = "services/users/delete/all";

pub const ALL_ROLES: &str = "services/roles/get/all";
pub const ALL_IDENTITY_ROLES: &str = "services/user-roles/get/all";

pub const ACTIVE_MODULES: &str = "services/modules/active";
pub const ALL_MODULES: &str = "services/modules/all";

pub fn role(id: RoleId) -> String {
    format!("services/roles/get/{}", id)
}

pub fn identity(id: IdentityId) -> String {
    format!("services/users/get/{}", id)
}

pub fn update_identity(id: IdentityId) -> String {
    format!("services/users/update/{}", id)
}

pub fn delete_identity(id: IdentityId) -> String {
    format!("services/users/delete/{}", id)
}

pub fn identity_roles(identity_id: IdentityId) -> String {
    format!("services/user-roles/get/{}", identity_id)
}

pub fn module(id: ModuleId) -> String {
    format!("services/modules/{}", id)
}

pub fn install_module(id: ModuleId) -> String {
    format!("services/modules/install/{}", id)
}

pub fn uninstall_module(id: ModuleId) -> String {
    format!("services/modules/uninstall/{}", id)
}

pub fn upgrade_module(id: ModuleId) -> String {
    format!("services/modules/upgrade/{}", id)
}
