// autoreply CLI - email every pending row of a sheet, then mark it done

mod context;
mod exit_codes;
mod server;

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use autoreply_config::{
    delete_secret, get_secret, keychain_available, set_secret, Secret, Settings,
};
use autoreply_mailer::SmtpNotifier;
use autoreply_recon::{BatchResult, ExecuteReport, ReconError, RowOutcome};

use context::Mode;
use exit_codes::{
    recon_exit_code, EXIT_ERROR, EXIT_MISSING_SECRET, EXIT_ROW_FAILURES, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "autoreply")]
#[command(about = "Send a thank-you email to every pending row of a Google Sheet and mark it done")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file [default: <config dir>/autoreply/autoreply.toml]
    #[arg(long, global = true, env = "AUTOREPLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sheet as the service sees it
    Preview {
        /// Output as JSON ({"headers": [...], "data": [...]})
        #[arg(long)]
        json: bool,
    },

    /// Email every eligible row and write the completion marker
    #[command(after_help = "\
Exit codes:
  0  all eligible rows sent and recorded
  3  sheet could not be read
  4  a required column is missing (nothing was sent)
  5  finished, but some rows failed; rerun to retry them
  7  mail password or Sheets token not configured")]
    Execute {
        /// Output the full per-row result as JSON
        #[arg(long)]
        json: bool,

        /// Screen rows without sending or writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the HTTP server (/health, /api/preview, /api/execute)
    Serve {
        /// Listen address [default: server.bind, PORT overrides the port]
        #[arg(long)]
        bind: Option<String>,

        /// Directory served at / (dashboard assets)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Check settings and credentials
    Doctor {
        /// Output as JSON for machine parsing
        #[arg(long)]
        json: bool,

        /// Also log in to the SMTP server (sends nothing)
        #[arg(long)]
        check_smtp: bool,
    },

    /// Manage credentials in the system keychain
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Store a secret read from stdin
    #[command(after_help = "\
Examples:
  echo 'abcd efgh ijkl mnop' | autoreply secret set mail-password
  gcloud auth print-access-token | autoreply secret set sheets-token")]
    Set { name: SecretName },

    /// Remove a stored secret
    Delete { name: SecretName },
}

#[derive(Clone, Copy, ValueEnum)]
enum SecretName {
    MailPassword,
    SheetsToken,
}

impl From<SecretName> for Secret {
    fn from(name: SecretName) -> Self {
        match name {
            SecretName::MailPassword => Secret::MailPassword,
            SecretName::SheetsToken => Secret::SheetsToken,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
    )
}

fn main() -> ExitCode {
    // Before clap and the logger, so .env can set AUTOREPLY_CONFIG and RUST_LOG.
    let dotenv = autoreply_config::load_dotenv();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Some(path) = dotenv {
        log::debug!("loaded environment from {}", path.display());
    }

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Preview { json } => cmd_preview(config, json),
        Commands::Execute { json, dry_run } => cmd_execute(config, json, dry_run),
        Commands::Serve { bind, static_dir } => cmd_serve(config, bind, static_dir),
        Commands::Doctor { json, check_smtp } => cmd_doctor(config, json, check_smtp),
        Commands::Secret { command } => match command {
            SecretCommands::Set { name } => cmd_secret_set(name.into()),
            SecretCommands::Delete { name } => cmd_secret_delete(name.into()),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(err: io::Error) -> Self {
        Self::general(format!("I/O error: {}", err))
    }

    /// Exit silently with `code`; the command already reported.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    /// Create error from a fatal run error with proper exit code.
    pub fn recon(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::SourceUnavailable(_) => {
                Some("check sheets.spreadsheet_id, sharing, and the sheets-token secret".to_string())
            }
            ReconError::MissingRequiredField { .. } => {
                Some("the header row must contain every name under [fields]".to_string())
            }
            ReconError::RunInProgress => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("cannot encode JSON: {}", e)))?;
    let mut out = io::stdout().lock();
    writeln!(out, "{}", text).map_err(CliError::io)
}

// ============================================================================
// preview
// ============================================================================

fn cmd_preview(config: Option<&Path>, json: bool) -> Result<(), CliError> {
    let settings = context::load_settings(config)?;
    let service = context::build_service(&settings, Mode::ReadOnly)?;
    let preview = service.preview().map_err(CliError::recon)?;

    if json {
        return print_json(&preview);
    }

    let mut out = io::stdout().lock();
    let header: Vec<&str> = std::iter::once("row")
        .chain(preview.headers.iter().map(String::as_str))
        .collect();
    writeln!(out, "{}", header.join("\t")).map_err(CliError::io)?;
    for record in &preview.data {
        let cells: Vec<&str> = record.fields().map(|(_, value)| value).collect();
        writeln!(out, "{}\t{}", record.row_position, cells.join("\t")).map_err(CliError::io)?;
    }
    eprintln!("{} data row(s)", preview.data.len());
    Ok(())
}

// ============================================================================
// execute
// ============================================================================

fn describe(outcome: &RowOutcome) -> String {
    match outcome {
        RowOutcome::Sent => "sent".to_string(),
        RowOutcome::SentUnrecorded { reason } => format!("sent, NOT recorded ({})", reason),
        RowOutcome::Failed { reason } => format!("failed ({})", reason),
        RowOutcome::Skipped { reason } => format!("skipped: {}", reason),
        RowOutcome::WouldSend => "would send".to_string(),
    }
}

fn print_summary(result: &BatchResult, dry_run: bool) {
    for row in &result.rows {
        // Skips are the steady state; only list them at debug level.
        if matches!(row.outcome, RowOutcome::Skipped { .. }) {
            log::debug!("row {:>4}  {}  {}", row.row_position, row.recipient, describe(&row.outcome));
            continue;
        }
        eprintln!("row {:>4}  {}  {}", row.row_position, row.recipient, describe(&row.outcome));
    }

    if dry_run {
        let pending = result.rows.iter().filter(|r| r.outcome == RowOutcome::WouldSend).count();
        eprintln!(
            "dry run: {} row(s) would be sent, {} skipped, {} scanned",
            pending, result.skipped, result.scanned
        );
    } else {
        let report = ExecuteReport::from(result);
        eprintln!(
            "{}: {} processed, {} skipped, {} failed, {} scanned",
            report.message, report.processed, result.skipped, result.failed, result.scanned
        );
    }
}

fn cmd_execute(config: Option<&Path>, json: bool, dry_run: bool) -> Result<(), CliError> {
    let settings = context::load_settings(config)?;
    let mode = if dry_run { Mode::ReadOnly } else { Mode::Live };
    let service = context::build_service(&settings, mode)?;

    let result = if dry_run { service.dry_run() } else { service.execute() };
    let result = result.map_err(CliError::recon)?;

    if json {
        print_json(&result)?;
    }
    print_summary(&result, dry_run);

    if result.has_failures() {
        let rows: Vec<String> = result
            .failures()
            .map(|r| r.row_position.to_string())
            .collect();
        return Err(CliError {
            code: EXIT_ROW_FAILURES,
            message: format!("{} row(s) failed: {}", result.failed, rows.join(", ")),
            hint: Some("failed rows were left eligible; rerun to retry them".to_string()),
        });
    }
    Ok(())
}

// ============================================================================
// serve
// ============================================================================

fn cmd_serve(
    config: Option<&Path>,
    bind: Option<String>,
    static_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut settings = context::load_settings(config)?;
    if let Some(bind) = bind {
        settings.server.bind = bind;
    }
    if let Some(dir) = static_dir {
        settings.server.static_dir = Some(dir);
    }

    let addr: SocketAddr = settings.server.bind.parse().map_err(|_| {
        CliError::usage(format!("invalid bind address: {}", settings.server.bind))
            .with_hint("expected host:port, e.g. 127.0.0.1:3000")
    })?;
    if let Some(dir) = &settings.server.static_dir {
        if !dir.is_dir() {
            return Err(CliError::usage(format!("static dir not found: {}", dir.display())));
        }
    }

    // Kept alive here so the blocking HTTP client is dropped outside the runtime.
    let service = Arc::new(context::build_service(&settings, Mode::Live)?);
    let app = server::router(service.clone(), settings.server.static_dir.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::general(format!("cannot start runtime: {}", e)))?;

    runtime
        .block_on(server::serve(app, addr))
        .map_err(CliError::general)
}

// ============================================================================
// doctor
// ============================================================================

/// Log in to the SMTP server with the configured account.
/// Returns the sender address on success.
fn check_smtp(settings: &Settings) -> Result<String, String> {
    let password = get_secret(Secret::MailPassword)
        .value
        .ok_or_else(|| format!("{} is not configured", Secret::MailPassword))?;
    let notifier = SmtpNotifier::new(&context::smtp_options(settings, password))
        .map_err(|e| e.to_string())?;
    notifier.test_connection().map_err(|e| e.to_string())?;
    Ok(notifier.from_address().to_string())
}

fn cmd_doctor(config: Option<&Path>, json: bool, smtp: bool) -> Result<(), CliError> {
    let (config_path, _) = Settings::resolve_path(config);
    let config_found = config_path.exists();
    let settings = context::load_settings(config)?;

    let problems = settings.validate();
    let secrets: Vec<(Secret, autoreply_config::SecretLookup)> =
        Secret::ALL.into_iter().map(|s| (s, get_secret(s))).collect();
    let secrets_missing: Vec<Secret> = secrets
        .iter()
        .filter(|(_, lookup)| lookup.value.is_none())
        .map(|(secret, _)| *secret)
        .collect();
    let keychain = keychain_available();

    // Only worth a network round trip once the settings are usable.
    let smtp_check = (smtp && problems.is_empty()).then(|| check_smtp(&settings));

    let status = if !problems.is_empty() {
        "misconfigured"
    } else if !secrets_missing.is_empty() {
        "missing_secret"
    } else if matches!(smtp_check, Some(Err(_))) {
        "smtp_unreachable"
    } else {
        "ready"
    };
    let transport = if settings.mail.port == autoreply_mailer::IMPLICIT_TLS_PORT {
        "tls"
    } else {
        "starttls"
    };

    if json {
        let secret_json: serde_json::Map<String, serde_json::Value> = secrets
            .iter()
            .map(|(secret, lookup)| {
                (
                    secret.as_str().to_string(),
                    serde_json::json!({
                        "present": lookup.value.is_some(),
                        "source": lookup.source.as_str(),
                    }),
                )
            })
            .collect();

        print_json(&serde_json::json!({
            "schema_version": 1,
            "status": status,
            "problems": problems,
            "config": {
                "path": config_path.display().to_string(),
                "found": config_found,
            },
            "sheets": {
                "spreadsheet_id": settings.sheets.spreadsheet_id,
                "sheet_name": settings.sheets.sheet_name,
                "read_columns": settings.sheets.read_columns,
                "api_base": settings.sheets.api_base,
            },
            "mail": {
                "host": settings.mail.host,
                "port": settings.mail.port,
                "transport": transport,
                "username": settings.mail.username,
                "from": settings.mail.effective_from(),
            },
            "fields": {
                "name": settings.fields.name,
                "email": settings.fields.email,
                "status": settings.fields.status,
                "completion_marker": settings.fields.completion_marker,
            },
            "server": {
                "bind": settings.server.bind,
                "static_dir": settings.server.static_dir,
            },
            "secrets": secret_json,
            "smtp_check": match &smtp_check {
                None => serde_json::Value::Null,
                Some(Ok(from)) => serde_json::json!({ "ok": true, "from": from }),
                Some(Err(e)) => serde_json::json!({ "ok": false, "error": e }),
            },
            "keychain": if keychain { "ok" } else { "unavailable" },
        }))?;
    } else {
        let or_unset = |s: &str| if s.is_empty() { "(unset)".to_string() } else { s.to_string() };
        println!("autoreply doctor");
        println!();
        println!(
            "  Config:        {}{}",
            config_path.display(),
            if config_found { "" } else { " (not found, using defaults)" }
        );
        println!("  Spreadsheet:   {}", or_unset(&settings.sheets.spreadsheet_id));
        println!(
            "  Sheet:         {}",
            settings.sheets.sheet_name.as_deref().unwrap_or("(first sheet)")
        );
        println!(
            "  SMTP:          {}:{} ({})",
            settings.mail.host, settings.mail.port, transport
        );
        println!("  From:          {}", or_unset(settings.mail.effective_from()));
        println!(
            "  Columns:       {} / {} / {}",
            settings.fields.name, settings.fields.email, settings.fields.status
        );
        println!("  Marker:        {}", settings.fields.completion_marker);
        println!("  Server:        {}", settings.server.bind);
        for (secret, lookup) in &secrets {
            println!(
                "  {:<15}{}",
                format!("{}:", secret),
                if lookup.value.is_some() {
                    format!("present ({})", lookup.source.as_str())
                } else {
                    "missing".to_string()
                }
            );
        }
        println!("  Keychain:      {}", if keychain { "ok" } else { "unavailable" });
        match &smtp_check {
            Some(Ok(from)) => println!("  SMTP login:    ok ({})", from),
            Some(Err(e)) => println!("  SMTP login:    FAILED ({})", e),
            None => {}
        }
        println!();
        println!("  Status:        {}", status);
        for problem in &problems {
            println!("    - {}", problem);
        }
    }

    match status {
        "misconfigured" => Err(CliError::silent(EXIT_USAGE)),
        "missing_secret" => Err(CliError::silent(EXIT_MISSING_SECRET)),
        "smtp_unreachable" => Err(CliError::silent(EXIT_ERROR)),
        _ => Ok(()),
    }
}

// ============================================================================
// secret
// ============================================================================

fn cmd_secret_set(secret: Secret) -> Result<(), CliError> {
    let mut value = String::new();
    io::stdin().read_to_string(&mut value).map_err(CliError::io)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(CliError::usage(format!("no value for {} on stdin", secret)));
    }

    set_secret(secret, value).map_err(|e| {
        CliError::general(e).with_hint(format!(
            "set {} in the environment instead",
            secret.env_vars()[0]
        ))
    })?;
    eprintln!("Stored {} in the system keychain", secret);
    Ok(())
}

fn cmd_secret_delete(secret: Secret) -> Result<(), CliError> {
    delete_secret(secret).map_err(CliError::general)?;
    eprintln!("Deleted {} from the system keychain", secret);
    Ok(())
}
