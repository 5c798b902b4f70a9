//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hexa_core::backend::BackendClient;
use hexa_core::config::{self, Config};
use hexa_core::notice::{self, NoticeInbox, NoticeLevel};
use hexa_core::screens::ScreenContext;
use hexa_core::{interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "hexa")]
#[command(version)]
#[command(about = "Account client for a hosted auth, database and storage backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr (overridden by HEXA_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not write a log file under the hexa home
    #[arg(long = "no-log-file", global = true)]
    no_log_file: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(flatten)]
    Client(ClientCommands),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that talk to the backend.
#[derive(clap::Subcommand)]
enum ClientCommands {
    /// Show which screen group the session gate selects
    Status,
    /// Follow session changes until Ctrl+C
    Watch,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEXA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEXA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// View and edit the profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Change the account password
    Password {
        /// New password
        #[arg(long = "new", env = "HEXA_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
        /// Repeat the new password
        #[arg(long)]
        confirm: String,
    },
    /// Push notification registration
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },
}

#[derive(clap::Subcommand)]
enum ProfileCommands {
    /// Print the profile as JSON
    Show,
    /// Update profile fields
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long = "full-name")]
        full_name: Option<String>,
    },
    /// Upload an image file as the new avatar
    Avatar {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Save the current avatar to a file
    DownloadAvatar {
        #[arg(value_name = "OUT")]
        out: PathBuf,
    },
}

#[derive(clap::Subcommand)]
enum PushCommands {
    /// Store a device push token for the signed-in user
    Register {
        /// Token issued by the device's push service
        #[arg(long)]
        token: String,
    },
    /// Print the sample local notification
    Notify,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
    /// Point the client at a backend project
    SetBackend {
        #[arg(long)]
        url: String,
        #[arg(long = "anon-key")]
        anon_key: Option<String>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = (!cli.no_log_file).then(config::paths::logs_dir);
    let _log_guard = logging::init(cli.verbose, log_dir.as_deref())?;
    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli.command).await })
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
            ConfigCommands::SetBackend { url, anon_key } => {
                commands::config::set_backend(&url, anon_key.as_deref())
            }
        },
        Commands::Client(command) => {
            let config = Config::load().context("load config")?;
            let mut app = App::new(config)?;
            let result = dispatch_client(&mut app, command).await;
            app.flush_notices();
            result
        }
    }
}

async fn dispatch_client(app: &mut App, command: ClientCommands) -> Result<()> {
    match command {
        ClientCommands::Status => commands::session::status(app).await,
        ClientCommands::Watch => commands::session::watch(app).await,
        ClientCommands::Login { email, password } => {
            commands::auth::login(app, &email, &password).await
        }
        ClientCommands::Register { email, password } => {
            commands::auth::register(app, &email, &password).await
        }
        ClientCommands::Logout => commands::auth::logout(app).await,
        ClientCommands::Profile { command } => match command {
            ProfileCommands::Show => commands::profile::show(app).await,
            ProfileCommands::Update {
                username,
                full_name,
            } => commands::profile::update(app, username, full_name).await,
            ProfileCommands::Avatar { file } => commands::profile::avatar(app, &file).await,
            ProfileCommands::DownloadAvatar { out } => {
                commands::profile::download_avatar(app, &out).await
            }
        },
        ClientCommands::Password {
            new_password,
            confirm,
        } => commands::auth::change_password(app, &new_password, &confirm).await,
        ClientCommands::Push { command } => match command {
            PushCommands::Register { token } => commands::push::register(app, token).await,
            PushCommands::Notify => commands::push::notify(app).await,
        },
    }
}

/// Backend client plus the notice channel every screen reports to.
pub(crate) struct App {
    ctx: ScreenContext,
    inbox: NoticeInbox,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let client = BackendClient::from_config(&config)?;
        let (sink, inbox) = notice::channel();
        Ok(Self {
            ctx: ScreenContext::new(client, sink, config),
            inbox,
        })
    }

    pub(crate) fn ctx(&self) -> &ScreenContext {
        &self.ctx
    }

    pub(crate) fn client(&self) -> &BackendClient {
        &self.ctx.client
    }

    /// Prints queued notices: errors to stderr, the rest to stdout.
    pub(crate) fn flush_notices(&mut self) {
        for notice in self.inbox.drain() {
            match notice.level {
                NoticeLevel::Error => eprintln!("{notice}"),
                NoticeLevel::Info | NoticeLevel::Success => println!("{notice}"),
            }
        }
    }
}
