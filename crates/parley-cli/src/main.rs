use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_client::{ApiClient, BrowserRedirector, Redirect, Redirector};
use parley_config::{Config, ConfigManager, LogLevel};
use parley_core::{
    AuthForm, AuthMode, ChatState, ConversationId, Driver, Effect, GateState, Message,
    Request, SessionContext, UsageMeter,
};
use parley_observability::LogManager;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Command-line client for the Parley chat service")]
#[command(version = parley_client::VERSION)]
struct Cli {
    /// Log to stderr at debug level
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "PARLEY_CONFIG", default_value = "~/.parley/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login(CredentialArgs),
    /// Create an account and sign in
    Register(CredentialArgs),
    /// Forget the stored session
    Logout,
    /// List conversations
    Chats,
    /// Start a new conversation
    New,
    /// Show the messages of a conversation
    History {
        /// Conversation id (defaults to the most recent)
        #[arg(long)]
        chat: Option<String>,
        /// Every message of the account, across conversations
        #[arg(long, conflicts_with = "chat")]
        all: bool,
    },
    /// Send one message
    Send {
        message: String,
        /// Conversation id (defaults to the most recent)
        #[arg(long)]
        chat: Option<String>,
    },
    /// Interactive chat in the terminal
    Chat {
        #[arg(long)]
        chat: Option<String>,
    },
    /// Rename a conversation
    Rename { chat: String, title: String },
    /// Show the message quota
    Usage,
    /// Open hosted checkout for the premium plan
    Upgrade,
    /// Config management
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct CredentialArgs {
    email: String,
    /// Read from stdin when omitted
    #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Get a config value
    Get {
        /// Dotted key, e.g. api.base_url or usage.message_limit
        key: String,
    },
    /// Set a config value
    Set {
        /// Dotted key, e.g. api.base_url or usage.message_limit
        key: String,
        value: String,
    },
    /// Write the default config
    Init {
        /// Overwrite an existing config
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// Print the current config
    Show,
}

/// Everything a command needs once the config is loaded
struct Context {
    config: Config,
    session: SessionContext,
    _logging: Option<LogManager>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = parley_config::expand_tilde(&cli.config)
        .unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    let command = match cli.command {
        Commands::Config(args) => return handle_config(args, config_path).await,
        command => command,
    };

    let ctx = load_context(&config_path, cli.debug).await?;

    match command {
        Commands::Login(args) => authenticate(ctx, AuthMode::Login, args).await,
        Commands::Register(args) => authenticate(ctx, AuthMode::Register, args).await,
        Commands::Logout => logout(ctx).await,
        Commands::Chats => list_chats(ctx).await,
        Commands::New => new_chat(ctx).await,
        Commands::History { chat, all } => history(ctx, chat, all).await,
        Commands::Send { message, chat } => send(ctx, chat, &message).await,
        Commands::Chat { chat } => interactive(ctx, chat).await,
        Commands::Rename { chat, title } => rename(ctx, &chat, &title).await,
        Commands::Usage => usage(ctx).await,
        Commands::Upgrade => upgrade(ctx).await,
        Commands::Config(_) => Ok(()),
    }
}

async fn load_context(config_path: &Path, debug: bool) -> anyhow::Result<Context> {
    let manager = ConfigManager::load(config_path).await?;
    let mut config = manager.snapshot().await;

    if debug {
        config.logging.level = LogLevel::Debug;
        config.logging.file = None;
    }
    let logging = match LogManager::init(&config.logging) {
        Ok(manager) => Some(manager),
        Err(e) => {
            eprintln!("{}", format!("⚠️  Logging disabled: {}", e).yellow());
            None
        }
    };

    let session = parley_client::restore_session(&config.session).await;
    Ok(Context {
        config,
        session,
        _logging: logging,
    })
}

impl Context {
    fn base_client(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::from_config(&self.config.api)?)
    }

    /// Driver for a signed-in session
    fn driver(&self) -> anyhow::Result<Driver<ApiClient>> {
        if !self.session.is_authenticated() {
            anyhow::bail!("Not logged in. Run `parley login <email>` first.");
        }
        let client = parley_client::session_client(&self.config.api, &self.session)?;
        Ok(Driver::new(Arc::new(client)))
    }

    fn state(&self) -> ChatState {
        ChatState::new(UsageMeter::new(
            self.config.usage.message_limit,
            self.config.usage.time_frame.as_str(),
        ))
    }

    fn redirector(&self) -> BrowserRedirector {
        BrowserRedirector::from_config(&self.config.checkout)
    }

    /// Load the main view, then open `chat` if given
    async fn open(
        &mut self,
        driver: &Driver<ApiClient>,
        chat: Option<&str>,
    ) -> anyhow::Result<ChatState> {
        let mut state = self.state();
        let effects = state.enter();
        let surfaced = driver.run(&mut state, effects).await;
        self.surface(surfaced).await?;

        if let Some(chat) = chat {
            let id = ConversationId::from(chat);
            let Some(effect) = state.select_conversation(&id) else {
                anyhow::bail!("No conversation with id {}", chat);
            };
            let surfaced = driver.run(&mut state, [effect]).await;
            self.surface(surfaced).await?;
        }
        Ok(state)
    }

    /// Act on view effects; a rejected credential ends the command
    async fn surface(&mut self, effects: Vec<Effect>) -> anyhow::Result<()> {
        for effect in effects {
            match effect {
                Effect::Request(request) => {
                    tracing::debug!("Unexpected pending request {}", request.name());
                }
                Effect::Alert(message) => println!("{}", format!("❌ {}", message).red()),
                Effect::Redirect(url) => match self.redirector().redirect(&url) {
                    Ok(Redirect::Opened) => {
                        println!("{}", "🌐 Checkout opened in your browser".green());
                    }
                    Ok(Redirect::Manual(manual)) => print_checkout_link(&manual),
                    Err(e) => {
                        tracing::warn!("Browser redirect failed: {}", e);
                        print_checkout_link(&url);
                    }
                },
                Effect::SignedOut => {
                    if let Err(e) = self.session.logout().await {
                        tracing::warn!("Failed to delete credential: {}", e);
                    }
                    anyhow::bail!("Session expired. Run `parley login <email>` again.");
                }
            }
        }
        Ok(())
    }
}

async fn authenticate(
    mut ctx: Context,
    mode: AuthMode,
    args: CredentialArgs,
) -> anyhow::Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    let mut form = AuthForm::new();
    form.mode = mode;
    form.email = args.email;
    form.password = password;

    let client = ctx.base_client()?;
    match form.submit(&client).await {
        Some(credential) => {
            ctx.session.login(credential).await?;
            println!("{}", format!("✅ Signed in as {}", form.email.trim()).green());
            Ok(())
        }
        None => {
            let message = form.error().unwrap_or(mode.failure_message()).to_string();
            anyhow::bail!(message);
        }
    }
}

async fn logout(mut ctx: Context) -> anyhow::Result<()> {
    ctx.session.logout().await?;
    println!("{}", "👋 Logged out".cyan());
    Ok(())
}

async fn list_chats(mut ctx: Context) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let state = ctx.open(&driver, None).await?;
    let registry = state.registry();

    println!("{}", "💬 Conversations:".cyan().bold());
    for conversation in registry.conversations() {
        let marker = if registry.is_active(&conversation.id) { "●" } else { " " };
        println!(
            "{} {:>6}  {}",
            marker.green(),
            conversation.id.to_string().dimmed(),
            conversation.title
        );
    }
    Ok(())
}

async fn new_chat(mut ctx: Context) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.state();
    if let Some(effect) = state.new_conversation() {
        let surfaced = driver.run(&mut state, [effect]).await;
        ctx.surface(surfaced).await?;
    }

    match state.registry().active() {
        Some(conversation) => println!(
            "{}",
            format!("✅ Started \"{}\" ({})", conversation.title, conversation.id).green()
        ),
        None => println!("{}", "❌ Could not create a conversation".red()),
    }
    Ok(())
}

async fn history(mut ctx: Context, chat: Option<String>, all: bool) -> anyhow::Result<()> {
    let driver = ctx.driver()?;

    let state = if all {
        let mut state = ctx.state();
        let effect = state.load_all_messages();
        let surfaced = driver.run(&mut state, [effect]).await;
        ctx.surface(surfaced).await?;
        state
    } else {
        ctx.open(&driver, chat.as_deref()).await?
    };

    if let Some(conversation) = state.registry().active() {
        println!("{}", format!("💬 {}", conversation.title).cyan().bold());
    }
    if state.transcript().is_empty() {
        println!("{}", "(no messages)".dimmed());
    }
    for message in state.transcript().messages() {
        print_message(message);
    }
    Ok(())
}

async fn send(mut ctx: Context, chat: Option<String>, message: &str) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.open(&driver, chat.as_deref()).await?;
    send_one(&mut ctx, &driver, &mut state, message).await?;
    print_gate(&state);
    Ok(())
}

async fn send_one(
    ctx: &mut Context,
    driver: &Driver<ApiClient>,
    state: &mut ChatState,
    message: &str,
) -> anyhow::Result<()> {
    state.set_input(message);
    let before = state.transcript().len();

    let Some(effect) = state.begin_send() else {
        if message.trim().is_empty() {
            println!("{}", "❌ Message is empty".red());
        } else if !state.usage().can_send() {
            print_gate(state);
        } else {
            println!("{}", "❌ No active conversation".red());
        }
        return Ok(());
    };

    let surfaced = driver.run(state, [effect]).await;
    ctx.surface(surfaced).await?;

    // the optimistic user entry is already at `before`
    for reply in state.transcript().messages().iter().skip(before + 1) {
        print_message(reply);
    }
    Ok(())
}

async fn interactive(mut ctx: Context, chat: Option<String>) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.open(&driver, chat.as_deref()).await?;

    println!("{}", "💬 Parley Interactive Chat".cyan().bold());
    if let Some(conversation) = state.registry().active() {
        println!("{}", format!("Conversation: {}", conversation.title).dimmed());
    }
    println!("{}", "Type '/new' for a new conversation, 'exit' to leave".dimmed());
    println!();

    loop {
        print_gate(&state);
        let input = prompt(&format!("{} ", "You:".cyan().bold()))?;

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("{}", "👋 Goodbye!".cyan());
            break;
        }
        if input.trim().is_empty() {
            continue;
        }
        if input.trim() == "/new" {
            if let Some(effect) = state.new_conversation() {
                let surfaced = driver.run(&mut state, [effect]).await;
                ctx.surface(surfaced).await?;
                println!("{}", "✅ New conversation".green());
            }
            continue;
        }

        send_one(&mut ctx, &driver, &mut state, &input).await?;
        println!();
    }
    Ok(())
}

async fn rename(mut ctx: Context, chat: &str, title: &str) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.open(&driver, None).await?;
    let id = ConversationId::from(chat);

    if !state.begin_rename(&id) {
        anyhow::bail!("No conversation with id {}", chat);
    }
    state.rename_set(title);
    let Some(effect) = state.commit_rename() else {
        anyhow::bail!("Title cannot be empty");
    };

    let surfaced = driver.run(&mut state, [effect]).await;
    ctx.surface(surfaced).await?;

    if let Some(conversation) = state.registry().get(&id) {
        println!("{}", format!("✅ Renamed to \"{}\"", conversation.title).green());
    }
    Ok(())
}

async fn usage(mut ctx: Context) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.state();
    let effects: Vec<Effect> = vec![Request::Profile.into(), Request::Usage.into()];
    let surfaced = driver.run(&mut state, effects).await;
    ctx.surface(surfaced).await?;

    let meter = state.usage();
    println!("{}", "📊 Usage:".cyan().bold());
    if meter.is_premium() {
        println!("  Plan:      {}", "Premium".magenta());
        println!("  Messages:  unlimited");
    } else {
        println!("  Plan:      Free");
        println!(
            "  Messages:  {}/{} this {}",
            meter.current_count(),
            meter.limit(),
            meter.time_frame()
        );
        println!("  Remaining: {}", meter.remaining());
    }
    print_gate(&state);
    Ok(())
}

async fn upgrade(mut ctx: Context) -> anyhow::Result<()> {
    let driver = ctx.driver()?;
    let mut state = ctx.state();
    let Some(effect) = state.upgrade() else {
        return Ok(());
    };
    println!("{}", "💳 Creating checkout session...".cyan());
    let surfaced = driver.run(&mut state, [effect]).await;
    ctx.surface(surfaced).await
}

fn print_message(message: &Message) {
    let time = message
        .sent_at
        .map(|t| format!("[{}] ", t.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    if message.is_bot {
        println!("{}{} {}", time.dimmed(), "Parley:".green().bold(), message.content);
    } else {
        println!("{}{} {}", time.dimmed(), "You:".cyan().bold(), message.content);
    }
}

fn print_gate(state: &ChatState) {
    let usage = state.usage();
    match usage.gate() {
        GateState::Unrestricted => {}
        GateState::Notice { .. } | GateState::SevereNotice { .. } => {
            if let Some(notice) = usage.notice() {
                if notice.severe {
                    println!("{}", notice.text.red());
                } else {
                    println!("{}", notice.text.yellow());
                }
            }
        }
        GateState::Blocked => {
            if let Some(panel) = usage.upgrade_panel() {
                println!("{}", panel.headline.red().bold());
                for plan in &panel.plans {
                    println!();
                    println!("  {} {}", plan.name.bold(), plan.price.dimmed());
                    for feature in &plan.features {
                        println!("    ✓ {}", feature);
                    }
                    println!("    → {}", plan.action.label().cyan());
                }
                println!();
                println!("{}", "Run `parley upgrade` to go premium.".dimmed());
            }
        }
    }
}

fn print_checkout_link(url: &str) {
    println!("{}", "Open this page to complete checkout:".cyan());
    println!("{}", url);
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

async fn handle_config(args: ConfigArgs, config_path: PathBuf) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => println!("{}", format!("{} = {}", key, value).green()),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(&config_path).await?;
            manager
                .update(|config| config.set_value(&key, &value))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to set value: {}", e))?;
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("⚠️  Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            parley_config::init_parley_dirs().await?;
            let manager = ConfigManager::new(Config::default(), config_path.clone());
            manager.save().await?;

            println!("{}", format!("✅ Config initialized at {:?}", config_path).green());
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::MemoryCredentialStore;

    async fn context() -> Context {
        let session = SessionContext::restore(Arc::new(MemoryCredentialStore::new())).await;
        Context {
            config: Config::default(),
            session,
            _logging: None,
        }
    }

    #[tokio::test]
    async fn test_rejected_login_returns_error() {
        let ctx = context().await;
        let args = CredentialArgs {
            email: String::new(),
            password: Some(String::new()),
        };
        let err = authenticate(ctx, AuthMode::Login, args).await.unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn test_chat_commands_require_login() {
        let ctx = context().await;
        let err = ctx.driver().err().unwrap();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[tokio::test]
    async fn test_unknown_config_key_returns_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let args = ConfigArgs {
            command: ConfigCommands::Get {
                key: "api.nope".to_string(),
            },
        };
        let result = handle_config(args, config_path).await;
        assert!(result.is_err());
    }
}
