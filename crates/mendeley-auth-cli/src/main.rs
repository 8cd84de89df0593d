use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mendeley_auth_core::auth::{
    browser_available, AuthError, AuthOptions, AuthSession, BrowserLocation, FileCookieJar,
    FlowKind, PageLocation, TokenStore,
};
use mendeley_auth_core::config::ConfigLocator;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mendeley OAuth token helper")]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the current access token, authenticating first when there is none
    Token,
    /// Force a new authentication redirect
    Login,
    /// Call the refresh endpoint and print its response
    Refresh,
    /// Forget the stored access token
    Logout,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Token flow: implicit or auth-code
    #[arg(long, global = true, default_value = "implicit", env = "MENDELEY_AUTH_FLOW")]
    flow: FlowKind,
    /// Page URL the session runs on (its fragment is read by the implicit flow)
    #[arg(long, global = true, default_value = "http://localhost/")]
    location: Url,
    /// OAuth client id (required for the implicit flow)
    #[arg(long = "client-id", global = true, env = "MENDELEY_CLIENT_ID")]
    client_id: Option<String>,
    /// Redirect URI sent to the authorize endpoint
    #[arg(long = "redirect-url", global = true)]
    redirect_url: Option<String>,
    /// Authorize endpoint (implicit) or login URL (auth-code)
    #[arg(long = "authenticate-url", global = true)]
    authenticate_url: Option<String>,
    /// Requested scope
    #[arg(long, global = true)]
    scope: Option<String>,
    /// Refresh endpoint (auth-code only)
    #[arg(long = "refresh-url", global = true)]
    refresh_url: Option<String>,
    /// Use this access token instead of looking one up
    #[arg(long = "access-token", global = true, env = "MENDELEY_ACCESS_TOKEN")]
    access_token: Option<String>,
    /// Name of the cookie holding the token
    #[arg(long = "cookie-name", global = true)]
    cookie_name: Option<String>,
    /// Lifetime of a stored token in hours
    #[arg(long = "ttl-hours", global = true)]
    ttl_hours: Option<i64>,
    /// Do not redirect automatically when no token is found
    #[arg(long = "no-authenticate-on-start", global = true)]
    no_authenticate_on_start: bool,
    /// Open redirects in the system browser
    #[arg(long, global = true)]
    open: bool,
    /// Options file (JSON, camelCase keys); defaults to options.json in the state directory
    #[arg(long, global = true)]
    options: Option<PathBuf>,
    /// Directory holding the cookie jar and options file
    #[arg(long = "state-dir", global = true, env = "MENDELEY_AUTH_STATE_DIR")]
    state_dir: Option<PathBuf>,
}

impl SessionArgs {
    fn overrides(&self) -> AuthOptions {
        AuthOptions {
            client_id: self.client_id.clone(),
            redirect_url: self.redirect_url.clone(),
            api_authenticate_url: self.authenticate_url.clone().map(Into::into),
            scope: self.scope.clone(),
            refresh_access_token_url: self.refresh_url.clone(),
            access_token: self.access_token.clone(),
            access_token_cookie_name: self.cookie_name.clone(),
            authenticate_on_start: self.no_authenticate_on_start.then_some(false),
            token_ttl_hours: self.ttl_hours,
        }
    }
}

type RedirectNotify = fn(&Url) -> Result<(), AuthError>;
type CliSession = AuthSession<FileCookieJar, BrowserLocation<RedirectNotify>>;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let locator = match &cli.session.state_dir {
        Some(dir) => ConfigLocator::with_root(dir.clone()),
        None => ConfigLocator::new(),
    }
    .context("failed to prepare state directory")?;

    match cli.command {
        Commands::Token => print_token(&start_session(&cli.session, &locator)?),
        Commands::Login => login(&start_session(&cli.session, &locator)?),
        Commands::Refresh => refresh(&start_session(&cli.session, &locator)?).await,
        Commands::Logout => logout(&cli.session, &locator),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(args: &SessionArgs, locator: &ConfigLocator) -> Result<AuthOptions> {
    let path = args
        .options
        .clone()
        .unwrap_or_else(|| locator.options_file());
    let base = if path.exists() {
        AuthOptions::from_json_file(&path)
            .with_context(|| format!("failed to read options from {}", path.display()))?
    } else if args.options.is_some() {
        anyhow::bail!("options file {} does not exist", path.display());
    } else {
        AuthOptions::new()
    };
    Ok(base.merge(args.overrides()))
}

fn page_jar(args: &SessionArgs, locator: &ConfigLocator) -> (PageLocation, FileCookieJar) {
    let page = PageLocation::new(args.location.clone());
    let jar = FileCookieJar::for_host(locator, &page.host());
    (page, jar)
}

fn start_session(args: &SessionArgs, locator: &ConfigLocator) -> Result<CliSession> {
    let options = load_options(args, locator)?;
    let (page, jar) = page_jar(args, locator);
    let open_browser = args.open && browser_available();
    if args.open && !open_browser {
        eprintln!("No browser available; printing the redirect target instead.");
    }
    let notify: RedirectNotify = print_redirect;
    let location = BrowserLocation::new(page, open_browser, notify);

    AuthSession::start(args.flow, options, jar, location)
        .with_context(|| format!("failed to start {} flow", args.flow))
}

fn print_token(session: &CliSession) -> Result<()> {
    if session.has_redirected() {
        println!("No access token found; authenticate and re-run with the returned page URL.");
        return Ok(());
    }
    println!("{}", session.get_token()?);
    Ok(())
}

fn login(session: &CliSession) -> Result<()> {
    if !session.has_redirected() {
        session.authenticate()?;
    }
    Ok(())
}

async fn refresh(session: &CliSession) -> Result<()> {
    match session.refresh_token() {
        Some(request) => {
            let response = request.await.context("refresh request failed")?;
            println!("{}", response.body);
        }
        None => {
            eprintln!("The {} flow has no refresh endpoint configured.", session.flow());
        }
    }
    Ok(())
}

fn logout(args: &SessionArgs, locator: &ConfigLocator) -> Result<()> {
    let options = load_options(args, locator)?;
    let (page, jar) = page_jar(args, locator);
    let cookie_name = options
        .access_token_cookie_name
        .unwrap_or_else(|| mendeley_auth_core::auth::DEFAULT_ACCESS_TOKEN_COOKIE_NAME.to_owned());
    TokenStore::new(jar, cookie_name)
        .clear()
        .context("failed to clear stored token")?;
    println!("Stored access token for {} removed.", page.host());
    Ok(())
}

fn print_redirect(url: &Url) -> Result<(), AuthError> {
    println!("Authenticate at:\n  {url}");
    Ok(())
}
