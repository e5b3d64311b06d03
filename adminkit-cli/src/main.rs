//! adminkit CLI - command-line front end for the admin console
//!
//! Drives the same state containers a graphical console would: the session is
//! persisted between invocations and every command bootstraps from it.

use adminkit_client::HttpConsoleApi;
use adminkit_core::{
    init_logging, ConsoleConfig, Identity, IdentityDraft, IdentityId, LoggingConfig, ModuleId,
    RoleId,
};
use adminkit_state::{AdminConsole, FileStore, MenuItem, MenuTarget};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "adminkit")]
#[command(about = "Session, role and module administration for the admin console")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// End the session
    Logout {
        /// Discard the local session without contacting the backend
        #[arg(long)]
        local: bool,
    },

    /// Show the current identity and its roles
    Whoami,

    /// Inspect roles
    Roles {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Inspect and manage modules
    Modules {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// List and manage console accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Print the navigation menu for the current session
    Nav {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// List every role
    All,

    /// List every identity-role assignment
    Assignments,

    /// Show the roles held by the given identities
    Of {
        #[arg(required = true)]
        identities: Vec<u64>,
    },
}

#[derive(Subcommand)]
enum ModuleCommands {
    /// Show the catalog with active markers
    List,
    /// Show active modules; works without a session
    Active,
    /// Show one module
    Show { id: ModuleId },
    Install { id: ModuleId },
    Uninstall { id: ModuleId },
    Upgrade { id: ModuleId },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List every account with the roles it holds
    List,
    Show { id: IdentityId },
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        password: String,

        /// Role id to grant; repeat for several
        #[arg(long = "role")]
        roles: Vec<RoleId>,
    },
    /// Change the given fields of an account
    Update {
        id: IdentityId,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        active: Option<bool>,

        /// Replacement role ids; repeat for several
        #[arg(long = "role")]
        roles: Option<Vec<RoleId>>,
    },
    Delete { id: IdentityId },
    /// Delete every account
    DeleteAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        config.logging.clone()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting adminkit CLI v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Config {
        show,
        init,
        validate,
    } = cli.command
    {
        return handle_config(&config, show, init, validate);
    }

    let console = build_console(&config)?;
    run(&console, cli.command).await
}

/// Load configuration from the given path or the default locations
fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<ConsoleConfig> {
    if let Some(path) = config_path {
        return ConsoleConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let default_paths = [
        Some(ConsoleConfig::default_path()),
        dirs::home_dir().map(|d| d.join(".adminkit").join("config.toml")),
        Some(PathBuf::from("adminkit.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return ConsoleConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()));
        }
    }

    Ok(ConsoleConfig::default())
}

fn build_console(config: &ConsoleConfig) -> anyhow::Result<AdminConsole> {
    let api = Arc::new(HttpConsoleApi::new(&config.api)?);
    let store = Arc::new(FileStore::new(&config.storage.session_dir)?);
    Ok(AdminConsole::new(api, store))
}

async fn run(console: &AdminConsole, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            console.session().login(&username, &password).await?;
            if let Err(e) = console.roles().resolve_current().await {
                warn!("Logged in, but roles could not be resolved: {}", e);
            }
            println!("✅ Logged in as {}", username);
            print_identity(console);
        }
        Commands::Logout { local } => {
            if local {
                console.force_logout();
            } else {
                console.logout().await?;
            }
            println!("👋 Logged out");
        }
        Commands::Whoami => {
            require_session(console)?;
            console.roles().resolve_current().await?;
            print_identity(console);
        }
        Commands::Roles { command } => {
            require_session(console)?;
            handle_roles(console, command).await?;
        }
        Commands::Modules { command } => handle_modules(console, command).await?,
        Commands::Users { command } => {
            require_session(console)?;
            handle_users(console, command).await?;
        }
        Commands::Nav { json } => {
            console.bootstrap().await?;
            let menu = console.navigation();
            if json {
                println!("{}", serde_json::to_string_pretty(&menu)?);
            } else {
                print_menu(&menu, 0);
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn handle_roles(console: &AdminConsole, command: RoleCommands) -> anyhow::Result<()> {
    let roles = console.roles();

    match command {
        RoleCommands::All => {
            for role in roles.fetch_all_roles().await? {
                println!("{:>6}  {}", role.id, role.name);
            }
        }
        RoleCommands::Assignments => {
            roles.fetch_all_roles().await?;
            let assignments = roles.fetch_all_assignments().await?;
            let catalog = roles.snapshot().catalog;
            for assignment in assignments {
                let name = catalog
                    .get(&assignment.role_id)
                    .map(|r| r.name.clone())
                    .unwrap_or_else(|| format!("#{}", assignment.role_id));
                println!("{:>6}  {}", assignment.identity_id, name);
            }
        }
        RoleCommands::Of { identities } => {
            roles.resolve_bulk(&identities).await?;
            for identity_id in identities {
                let names: Vec<String> = roles
                    .roles_for(identity_id)
                    .into_iter()
                    .map(|r| r.name)
                    .collect();
                let shown = if names.is_empty() {
                    "(no role)".to_string()
                } else {
                    names.join(", ")
                };
                println!("{:>6}  {}", identity_id, shown);
            }
        }
    }

    Ok(())
}

async fn handle_modules(console: &AdminConsole, command: ModuleCommands) -> anyhow::Result<()> {
    let modules = console.modules();

    match command {
        ModuleCommands::List => {
            require_session(console)?;
            modules.fetch_catalog().await?;
            modules.fetch_active().await?;

            let snapshot = modules.snapshot();
            for module in &snapshot.modules {
                let marker = if snapshot.is_active(&module.name) { "*" } else { " " };
                println!(
                    "{} {:>4}  {:<20} {:<10} installed={}",
                    marker, module.id, module.name, module.version, module.installed
                );
            }
        }
        ModuleCommands::Active => {
            modules.fetch_active().await?;
            for module in modules.active_modules() {
                println!("{:>4}  {:<20} {}", module.id, module.name, module.version);
            }
        }
        ModuleCommands::Show { id } => {
            require_session(console)?;
            let module = modules.fetch_module(id).await?;
            println!("{}", serde_json::to_string_pretty(&module)?);
        }
        ModuleCommands::Install { id } => {
            require_session(console)?;
            modules.install(id).await?;
            println!("✅ Module {} installed", id);
        }
        ModuleCommands::Uninstall { id } => {
            require_session(console)?;
            modules.uninstall(id).await?;
            println!("✅ Module {} uninstalled", id);
        }
        ModuleCommands::Upgrade { id } => {
            require_session(console)?;
            modules.upgrade(id).await?;
            println!("✅ Module {} upgraded", id);
        }
    }

    Ok(())
}

async fn handle_users(console: &AdminConsole, command: UserCommands) -> anyhow::Result<()> {
    let identities = console.identities();

    match command {
        UserCommands::List => {
            let listed = console.load_identity_table().await?;
            for identity in &listed {
                print_identity_row(console, identity);
            }
        }
        UserCommands::Show { id } => {
            let identity = identities.fetch(id).await?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        UserCommands::Create {
            username,
            email,
            password,
            roles,
        } => {
            let draft = IdentityDraft {
                username: Some(username),
                email,
                password: Some(password),
                is_active: None,
                roles: (!roles.is_empty()).then_some(roles),
            };
            let created = identities.create(&draft).await?;
            println!("✅ User {} created with id {}", created.username, created.id);
        }
        UserCommands::Update {
            id,
            username,
            email,
            password,
            active,
            roles,
        } => {
            let draft = IdentityDraft {
                username,
                email,
                password,
                is_active: active,
                roles,
            };
            if draft.is_empty() {
                bail!("Nothing to update; pass at least one field");
            }
            let updated = identities.update(id, &draft).await?;
            println!("✅ User {} updated", updated.username);
        }
        UserCommands::Delete { id } => {
            identities.delete(id).await?;
            println!("✅ User {} deleted", id);
        }
        UserCommands::DeleteAll { yes } => {
            if !yes {
                bail!("Refusing to delete every user without --yes");
            }
            identities.delete_all().await?;
            println!("✅ All users deleted");
        }
    }

    Ok(())
}

fn print_identity_row(console: &AdminConsole, identity: &Identity) {
    let roles: Vec<String> = console
        .roles()
        .roles_for(identity.id)
        .into_iter()
        .map(|r| r.name)
        .collect();
    let shown = if roles.is_empty() {
        "(no role)".to_string()
    } else {
        roles.join(", ")
    };
    println!(
        "{:>6}  {:<20} {:<30} {:<8} {}",
        identity.id,
        identity.username,
        identity.email.as_deref().unwrap_or("-"),
        if identity.is_active { "active" } else { "inactive" },
        shown
    );
}

fn handle_config(
    config: &ConsoleConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        let config_path = ConsoleConfig::default_path();
        if config_path.exists() {
            bail!("Configuration already exists at {}", config_path.display());
        }
        ConsoleConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {}", config_path.display());
    }

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        config.validate()?;
        println!("✅ Configuration is valid");
    }

    Ok(())
}

fn require_session(console: &AdminConsole) -> anyhow::Result<()> {
    if !console.session().is_authenticated() {
        bail!("Not logged in. Run `adminkit login` first");
    }
    Ok(())
}

fn print_identity(console: &AdminConsole) {
    let session = console.session().snapshot();
    let roles = console.roles().snapshot();

    match session.identity_id {
        Some(identity_id) => println!("Identity: {}", identity_id),
        None => println!("Identity: anonymous"),
    }

    let held: Vec<&str> = roles.held_roles().into_iter().map(|r| r.name.as_str()).collect();
    if held.is_empty() {
        println!("Roles:    (none)");
    } else {
        println!("Roles:    {}", held.join(", "));
    }
    println!("Administrator: {}", roles.is_administrator());
}

fn print_menu(menu: &[MenuItem], depth: usize) {
    for item in menu {
        let indent = "  ".repeat(depth);
        match &item.target {
            MenuTarget::Page(path) => println!("{}{}  ->  {}", indent, item.label, path),
            MenuTarget::Group => println!("{}{}", indent, item.label),
            MenuTarget::Logout => println!("{}{}  (action)", indent, item.label),
        }
        print_menu(&item.children, depth + 1);
    }
}
