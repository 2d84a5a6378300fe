use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bucketward::admin::AdminService;
use bucketward::audit::AuditRecorder;
use bucketward::auth::{Argon2Hasher, CredentialHasher};
use bucketward::config::{BootstrapAdmin, ServerConfig};
use bucketward::server::{AppState, create_router};
use bucketward::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "bucketward")]
#[command(about = "Authorization and audit service for an object-storage dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Allow self-service signup
        #[arg(long)]
        allow_signup: bool,

        /// Create this admin on startup if it does not exist
        #[arg(long, env = "BUCKETWARD_ADMIN_USERNAME")]
        admin_username: Option<String>,

        #[arg(long, env = "BUCKETWARD_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and first admin)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long, env = "BUCKETWARD_ADMIN_USERNAME")]
        username: Option<String>,

        #[arg(long, env = "BUCKETWARD_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn open_store(data_dir: &std::path::Path, db_path: PathBuf) -> anyhow::Result<Arc<SqliteStore>> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let store = SqliteStore::new(db_path)?;
    store.initialize()?;
    Ok(Arc::new(store))
}

fn bootstrap(
    store: Arc<SqliteStore>,
    hasher: Arc<dyn CredentialHasher>,
    admin: &BootstrapAdmin,
) -> anyhow::Result<()> {
    let audit = AuditRecorder::new(store.clone());
    let service = AdminService::new(store, audit, hasher);

    match service.bootstrap_admin(&admin.username, &admin.password)? {
        Some(principal) => info!("Created admin '{}' ({})", principal.username, principal.id),
        None => info!("Admin '{}' already exists", admin.username),
    }
    Ok(())
}

fn prompt_credentials(
    username: Option<String>,
    password: Option<String>,
) -> anyhow::Result<BootstrapAdmin> {
    let username = match username {
        Some(username) => username,
        None => inquire::Text::new("Admin username:")
            .with_validator(|input: &str| {
                if input.trim().is_empty() {
                    Err("Username cannot be empty".into())
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()?,
    };

    let password = match password {
        Some(password) => password,
        None => inquire::Password::new("Admin password:")
            .with_validator(|input: &str| {
                if input.chars().count() < 8 {
                    Err("Password must be at least 8 characters".into())
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()?,
    };

    Ok(BootstrapAdmin { username, password })
}

fn run_init(
    data_dir: PathBuf,
    username: Option<String>,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = open_store(&config.data_dir, config.db_path())?;

    if store.has_admin()? {
        bail!(
            "Server already initialized. Database: {}",
            config.db_path().display()
        );
    }

    let admin = match (username, password) {
        (Some(username), Some(password)) => BootstrapAdmin { username, password },
        (username, password) if !non_interactive => prompt_credentials(username, password)?,
        _ => bail!(
            "--non-interactive requires BUCKETWARD_ADMIN_USERNAME and BUCKETWARD_ADMIN_PASSWORD"
        ),
    };

    bootstrap(store, Arc::new(Argon2Hasher::new()), &admin)?;

    println!();
    println!("========================================");
    println!("Initialized {}", config.db_path().display());
    println!("Log in with POST /auth/login as '{}'", admin.username);
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    allow_signup: bool,
    admin_username: Option<String>,
    admin_password: Option<String>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    if allow_signup {
        config.allow_signup = true;
    }
    if let (Some(username), Some(password)) = (admin_username, admin_password) {
        config.bootstrap_admin = Some(BootstrapAdmin { username, password });
    }
    config.validate()?;

    let store = open_store(&config.data_dir, config.db_path())?;
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap(store.clone(), hasher.clone(), admin)?;
    }

    if !store.has_admin()? {
        bail!(
            "Server not initialized. Run 'bucketward admin init' first or set BUCKETWARD_ADMIN_USERNAME and BUCKETWARD_ADMIN_PASSWORD."
        );
    }

    let addr = config.socket_addr()?;
    info!(
        signup = config.allow_signup,
        audit_retention = config.audit_retention.as_str(),
        "Loaded configuration"
    );

    let state = Arc::new(AppState::new(store, config, hasher));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bucketward=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                username,
                password,
                non_interactive,
            } => {
                run_init(data_dir, username, password, non_interactive)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            allow_signup,
            admin_username,
            admin_password,
        } => {
            run_serve(
                config,
                host,
                port,
                data_dir,
                allow_signup,
                admin_username,
                admin_password,
            )
            .await?;
        }
    }

    Ok(())
}
