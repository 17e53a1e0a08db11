// Command line front end: inspect translations and call the API the same way
// the app does.
use anyhow::{Context, Result, bail};
use appshell::config::AppConfig;
use appshell::context::StandardContext;
use appshell::locale::{LocaleCatalog, LocaleId, device_language};
use appshell::secure_store::{CredentialStore, KeyringStore, MemoryStore, register_platform_store};
use appshell::AppShell;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::Arc;

/// Token used instead of the keychain when set (development only).
const TOKEN_ENV: &str = "APPSHELL_ACCESS_TOKEN";

struct Args {
    root: Option<PathBuf>,
    lang: Option<String>,
    verbose: bool,
    vars: Vec<(String, String)>,
    command: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let mut args = Args {
        root: None,
        lang: None,
        verbose: false,
        vars: Vec::new(),
        command: Vec::new(),
    };

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--root" | "-r" => {
                i += 1;
                args.root = Some(raw.get(i).context("--root needs a directory")?.into());
            }
            "--lang" | "-l" => {
                i += 1;
                args.lang = Some(raw.get(i).context("--lang needs a language code")?.clone());
            }
            "--var" => {
                i += 1;
                let pair = raw.get(i).context("--var needs name=value")?;
                let (name, value) = pair
                    .split_once('=')
                    .with_context(|| format!("'{}' is not name=value", pair))?;
                args.vars.push((name.to_string(), value.to_string()));
            }
            "--verbose" | "-v" => args.verbose = true,
            other => args.command.push(other.to_string()),
        }
        i += 1;
    }
    Ok(args)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("appshell")
        .build();
    // A second init only fails if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    if args.command.is_empty()
        || matches!(args.command[0].as_str(), "--help" | "-h" | "help")
    {
        print_help();
        return Ok(());
    }

    init_logging(args.verbose);

    let ctx = StandardContext::new(args.root.clone());
    let config = AppConfig::resolve(&ctx)?;
    let store: Arc<dyn CredentialStore> = match std::env::var(TOKEN_ENV) {
        Ok(token) => Arc::new(MemoryStore::with(&config.token_key, &token)),
        Err(_) => {
            if let Err(e) = register_platform_store() {
                log::warn!("{}; requests will be sent unauthenticated", e);
            }
            Arc::new(KeyringStore::new(config.credential_service.clone()))
        }
    };
    let shell = AppShell::from_parts(config, LocaleCatalog::bundled()?, device_language(), store)?;

    let t = shell.translation();
    if let Some(lang) = &args.lang {
        let id = LocaleId::parse(lang)?;
        if !t.change_language(&id) {
            eprintln!("'{}' is not available, staying on '{}'", id, t.current_language());
        }
    }

    match args.command[0].as_str() {
        "languages" => {
            let current = t.current_language();
            for option in t.language_options() {
                let marker = if option.id == current { "*" } else { " " };
                println!("{} {}  {} ({})", marker, option.label, option.native_name, option.name);
            }
        }
        "t" | "translate" => {
            let key = args.command.get(1).context("usage: appshell t <key>")?;
            let vars: Vec<(&str, &str)> = args
                .vars
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_str()))
                .collect();
            println!("{}", t.t_with(key, &vars));
        }
        "get" | "delete" | "post" | "put" => {
            let path = args
                .command
                .get(1)
                .with_context(|| format!("usage: appshell {} <path>", args.command[0]))?;
            let api = shell.api();
            let response = match args.command[0].as_str() {
                "get" => api.get(path).await?,
                "delete" => api.delete(path).await?,
                method => {
                    let body = args.command.get(2).map(String::as_str).unwrap_or("{}");
                    let json: serde_json::Value =
                        serde_json::from_str(body).context("Body must be JSON")?;
                    if method == "post" {
                        api.post_json(path, &json).await?
                    } else {
                        api.put_json(path, &json).await?
                    }
                }
            };
            eprintln!("{}", response.status());
            println!("{}", response.text());
            if response.status() == http::StatusCode::UNAUTHORIZED {
                eprintln!("{}", t.t("errors.unauthorized"));
            }
        }
        other => bail!("Unknown command '{}'. Try --help.", other),
    }

    Ok(())
}

fn print_help() {
    println!("appshell v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    appshell [OPTIONS] languages              List available languages");
    println!("    appshell [OPTIONS] t <key>                Translate a key");
    println!("    appshell [OPTIONS] get <path>             GET an API path");
    println!("    appshell [OPTIONS] delete <path>          DELETE an API path");
    println!("    appshell [OPTIONS] post <path> [json]     POST a JSON body");
    println!("    appshell [OPTIONS] put <path> [json]      PUT a JSON body");
    println!();
    println!("OPTIONS:");
    println!("    -l, --lang <code>       Switch language before running the command");
    println!("    --var <name=value>      Placeholder value for 't' (repeatable)");
    println!("    -r, --root <dir>        Read config from <dir>/config/config.toml");
    println!("    -v, --verbose           Debug logging on stderr");
    println!();
    println!("ENVIRONMENT:");
    println!("    APPSHELL_API_URL        API base URL (default http://localhost:8000)");
    println!("    APPSHELL_ACCESS_TOKEN   Use this token instead of the system keychain");
}
