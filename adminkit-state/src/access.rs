//! Access predicates and navigation derived from state snapshots
//!
//! Everything here is a pure function of the snapshots passed in; nothing
//! triggers a fetch.

use crate::roles::RoleSnapshot;
use adminkit_core::{Module, Role, Session};
use serde::Serialize;

pub fn is_administrator(roles: &RoleSnapshot) -> bool {
    holds_any(roles, Role::is_administrator)
}

pub fn is_administrator_or_manager(roles: &RoleSnapshot) -> bool {
    holds_any(roles, |role| role.is_administrator() || role.is_manager())
}

fn holds_any(roles: &RoleSnapshot, grants: impl Fn(&Role) -> bool) -> bool {
    roles.held_roles().into_iter().any(grants)
}

/// Where a menu entry leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum MenuTarget {
    Page(String),
    /// Expands to its children
    Group,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    pub target: MenuTarget,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    fn page(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: MenuTarget::Page(path.into()),
            children: Vec::new(),
        }
    }

    /// Path of a page entry
    pub fn path(&self) -> Option<&str> {
        match &self.target {
            MenuTarget::Page(path) => Some(path.as_str()),
            _ => None,
        }
    }
}

/// Console menu for the given snapshots
pub fn navigation(
    session: &Session,
    roles: &RoleSnapshot,
    active_modules: &[Module],
) -> Vec<MenuItem> {
    let mut menu = vec![MenuItem::page("Dashboard", "/dashboard")];
    let can_configure = is_administrator_or_manager(roles);

    for module in active_modules {
        let title = capitalize(&module.name);
        let base = format!("/dashboard/module/{}", module.name);

        let mut children = vec![MenuItem::page(format!("{} List", title), base.clone())];
        if can_configure {
            children.push(MenuItem::page(
                format!("{} Setting", title),
                format!("{}/setting", base),
            ));
        }

        menu.push(MenuItem {
            label: title,
            target: MenuTarget::Group,
            children,
        });
    }

    menu.push(MenuItem::page("Module Setting", "/dashboard/module"));
    if is_administrator(roles) {
        menu.push(MenuItem::page("User Setting", "/dashboard/user"));
    }

    if session.authenticated {
        menu.push(MenuItem {
            label: "Logout".to_string(),
            target: MenuTarget::Logout,
            children: Vec::new(),
        });
    } else {
        menu.push(MenuItem::page("Login", "/login"));
    }

    menu
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
