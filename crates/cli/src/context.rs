// Wiring: settings + secrets -> store, transport, service

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autoreply_config::{get_secret, Secret, Settings};
use autoreply_mailer::{SmtpNotifier, SmtpOptions};
use autoreply_recon::{AutoReply, FieldNames, Message, Notifier, SendError, Template};
use autoreply_sheets::{SheetStore, SheetsClient};

use crate::exit_codes::{EXIT_MISSING_SECRET, EXIT_SOURCE_UNAVAILABLE, EXIT_USAGE};
use crate::CliError;

/// Which collaborators a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Sheet reads only (preview, dry run)
    ReadOnly,
    /// Sheet reads and writes plus SMTP
    Live,
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    Settings::load(path).map_err(|e| {
        CliError::usage(e.to_string())
            .with_hint(format!("default location: {}", Settings::config_path().display()))
    })
}

pub fn ensure_valid(settings: &Settings, mode: Mode) -> Result<(), CliError> {
    let problems = settings.validate_for(mode == Mode::Live);
    if problems.is_empty() {
        return Ok(());
    }
    Err(CliError::usage(format!("invalid configuration: {}", problems.join("; ")))
        .with_hint("run `autoreply doctor` to see the effective settings"))
}

pub fn require_secret(secret: Secret) -> Result<String, CliError> {
    get_secret(secret).value.ok_or_else(|| CliError {
        code: EXIT_MISSING_SECRET,
        message: format!("{} is not configured", secret),
        hint: Some(format!(
            "run `autoreply secret set {}` or set {}",
            secret,
            secret.env_vars().join(" / "),
        )),
    })
}

pub fn sheet_store(settings: &Settings) -> Result<SheetStore, CliError> {
    let token = require_secret(Secret::SheetsToken)?;
    let sheets = &settings.sheets;
    let client = SheetsClient::new(
        &sheets.api_base,
        &sheets.spreadsheet_id,
        &token,
        Duration::from_secs(sheets.timeout_secs),
    )
    .map_err(|e| CliError {
        code: EXIT_SOURCE_UNAVAILABLE,
        message: e.to_string(),
        hint: None,
    })?;
    Ok(SheetStore::new(client, sheets.sheet_name.clone(), &sheets.read_columns))
}

pub fn smtp_options(settings: &Settings, password: String) -> SmtpOptions {
    let mail = &settings.mail;
    SmtpOptions {
        host: mail.host.clone(),
        port: mail.port,
        username: mail.username.clone(),
        password,
        from: mail.from.clone(),
        timeout: Duration::from_secs(mail.timeout_secs),
    }
}

pub fn smtp_notifier(settings: &Settings) -> Result<SmtpNotifier, CliError> {
    let password = require_secret(Secret::MailPassword)?;
    SmtpNotifier::new(&smtp_options(settings, password)).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: e.to_string(),
        hint: Some("check [mail] in the settings file".into()),
    })
}

/// Stand-in transport for read-only commands; never reached by them.
struct NoTransport;

impl Notifier for NoTransport {
    fn send(&self, _message: &Message) -> Result<(), SendError> {
        Err(SendError("mail transport not configured for this command".into()))
    }
}

/// Apply field names, template and completion marker from settings.
pub fn configure(service: AutoReply, settings: &Settings) -> AutoReply {
    let f = &settings.fields;
    service
        .with_fields(FieldNames {
            name: f.name.clone(),
            email: f.email.clone(),
            status: f.status.clone(),
        })
        .with_template(Template {
            subject: settings.template.subject.clone(),
            body: settings.template.body.clone(),
        })
        .with_completion_marker(f.completion_marker.trim())
}

pub fn build_service(settings: &Settings, mode: Mode) -> Result<AutoReply, CliError> {
    ensure_valid(settings, mode)?;
    let store = Arc::new(sheet_store(settings)?);
    let notifier: Arc<dyn Notifier> = match mode {
        Mode::Live => Arc::new(smtp_notifier(settings)?),
        Mode::ReadOnly => Arc::new(NoTransport),
    };
    Ok(configure(AutoReply::new(store, notifier), settings))
}
