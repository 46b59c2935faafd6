use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokenward_core::auth::SessionManager;
use tokenward_core::config::{ClientConfig, RenewalFailurePolicy, StorageBackend};
use tokenward_core::http::{ApiClient, Method};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Session-aware API client")]
struct Cli {
    /// Base URL of the remote API
    #[arg(long, env = "TOKENWARD_BASE_URL", global = true)]
    base_url: Option<Url>,
    /// Where the session is stored (keyring, file, memory)
    #[arg(long, env = "TOKENWARD_STORAGE", default_value = "keyring", global = true)]
    storage: StorageBackend,
    /// Forget the session when token renewal fails
    #[arg(long, global = true)]
    sign_out_on_failure: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with email and password
    Login(LoginArgs),
    /// Forget the stored session and revoke it server-side
    Logout,
    /// Show the identity of the stored session
    Whoami(WhoamiArgs),
    /// Send an authenticated GET request and print the body
    Get(GetArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "TOKENWARD_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct WhoamiArgs {
    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Path relative to the base URL, e.g. `listings/42`
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let manager = build_manager(&cli)?;
    match cli.command {
        Commands::Login(args) => login(&manager, args).await?,
        Commands::Logout => {
            manager.logout().await;
            println!("Logged out.");
        }
        Commands::Whoami(args) => whoami(&manager, args)?,
        Commands::Get(args) => get(ApiClient::new(manager), args).await?,
    }
    Ok(())
}

fn build_manager(cli: &Cli) -> Result<SessionManager> {
    let base_url = cli
        .base_url
        .clone()
        .context("missing --base-url (or TOKENWARD_BASE_URL)")?;
    tracing::debug!(%base_url, storage = %cli.storage, "configuring session manager");
    let mut config = ClientConfig::new(base_url).with_storage(cli.storage);
    if cli.sign_out_on_failure {
        config = config.with_failure_policy(RenewalFailurePolicy::SignOut);
    }
    SessionManager::from_config(config).context("unable to initialise session storage")
}

async fn login(manager: &SessionManager, args: LoginArgs) -> Result<()> {
    let session = manager
        .login(&args.email, &args.password)
        .await
        .context("login failed")?;
    match session.identity() {
        Some(identity) => println!(
            "Logged in as {} ({}).",
            identity.email.as_deref().unwrap_or(&identity.id),
            identity.role.as_deref().unwrap_or("no role")
        ),
        None => println!("Logged in."),
    }
    Ok(())
}

fn whoami(manager: &SessionManager, args: WhoamiArgs) -> Result<()> {
    let Some(identity) = manager.identity() else {
        if manager
            .current_session()
            .context("unable to read stored session")?
            .is_some()
        {
            bail!("session has no cached profile");
        }
        bail!("not logged in");
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
    } else {
        println!("id:    {}", identity.id);
        println!("email: {}", identity.email.as_deref().unwrap_or("-"));
        println!("role:  {}", identity.role.as_deref().unwrap_or("-"));
    }
    Ok(())
}

async fn get(client: ApiClient, args: GetArgs) -> Result<()> {
    let request = client.request(Method::GET, &args.path)?;
    let response = client.send(request).await.context("request failed")?;
    let status = response.status();
    tracing::debug!(path = %args.path, %status, "request completed");
    let body = response.text().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("HTTP {status}: {body}");
    }
    println!("{body}");
    Ok(())
}
