// Application settings
// Loaded from ~/.config/autoreply/autoreply.toml, then overridden by environment

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "AUTOREPLY_CONFIG";

#[derive(Debug)]
pub enum ConfigError {
    /// Settings file could not be read.
    Io(String),
    /// TOML syntax or type error.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config IO error: {msg}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Spreadsheet location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    /// None = first sheet of the spreadsheet, looked up on every run
    pub sheet_name: Option<String>,
    /// Column span of bulk reads
    pub read_columns: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: None,
            read_columns: "A:Z".to_string(),
            api_base: "https://sheets.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

/// SMTP transport. The password is a secret and never lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub host: String,
    /// 465 = implicit TLS, anything else = STARTTLS
    pub port: u16,
    pub username: String,
    /// None = send from `username`
    pub from: Option<String>,
    /// Per-send timeout
    pub timeout_secs: u64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: String::new(),
            from: None,
            timeout_secs: 30,
        }
    }
}

impl MailSettings {
    pub fn effective_from(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

/// Header names of the required columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    pub name: String,
    pub email: String,
    pub status: String,
    /// Written to the status column after a successful send
    pub completion_marker: String,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            name: "姓名".to_string(),
            email: "Email".to_string(),
            status: "是否自動回覆".to_string(),
            completion_marker: "Y".to_string(),
        }
    }
}

/// Message text; `{name}` is substituted per recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub subject: String,
    pub body: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            subject: "感謝您喜愛我們的產品！".to_string(),
            body: "Hi {name},\n\n感謝您喜歡我們的某項產品！我們很高興能為您服務。\n\nBest regards,\nYanwun"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Dashboard assets served at `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sheets: SheetsSettings,
    pub mail: MailSettings,
    pub fields: FieldSettings,
    pub template: TemplateSettings,
    pub server: ServerSettings,
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Existing variables win. `None` when there is no file.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl Settings {
    /// Default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autoreply")
            .join("autoreply.toml")
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Settings file to use and whether it must exist: an explicit path
    /// (argument, then `AUTOREPLY_CONFIG`) or the optional default.
    pub fn resolve_path(path: Option<&Path>) -> (PathBuf, bool) {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match explicit {
            Some(p) => (p, true),
            None => (Self::config_path(), false),
        }
    }

    /// Load settings from a file.
    ///
    /// An explicit path (argument, then `AUTOREPLY_CONFIG`) must exist.
    /// The default path is optional: when absent, built-in defaults apply.
    pub fn load_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = Self::resolve_path(path);

        if !required && !path.exists() {
            log::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("cannot read {}: {e}", path.display())))?;
        log::debug!("loaded settings from {}", path.display());
        Self::from_toml(&contents)
    }

    /// Settings file, then environment overrides. Call [`load_dotenv`]
    /// first so `.env` values count as environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Self::load_file(path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply environment overrides. `get` is the variable lookup.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = v;
        }
        if let Some(v) = get("SHEET_NAME") {
            self.sheets.sheet_name = Some(v);
        }
        if let Some(v) = get("EMAIL_USER") {
            self.mail.username = v;
        }
        if let Some(v) = get("EMAIL_FROM") {
            self.mail.from = Some(v);
        }
        if let Some(v) = get("SMTP_HOST") {
            self.mail.host = v;
        }
        if let Some(v) = get("SMTP_PORT") {
            match v.trim().parse() {
                Ok(port) => self.mail.port = port,
                Err(_) => log::warn!("ignoring SMTP_PORT={v:?}: not a port number"),
            }
        }
        if let Some(v) = get("PORT") {
            match v.trim().parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .server
                        .bind
                        .rsplit_once(':')
                        .map(|(host, _)| host.to_string())
                        .unwrap_or_else(|| "127.0.0.1".to_string());
                    self.server.bind = format!("{host}:{port}");
                }
                Err(_) => log::warn!("ignoring PORT={v:?}: not a port number"),
            }
        }
    }

    /// Human-readable problems that would make a run fail. Empty = usable.
    pub fn validate(&self) -> Vec<String> {
        self.validate_for(true)
    }

    /// Like [`Settings::validate`]; `with_mail = false` skips the `[mail]`
    /// checks for read-only commands.
    pub fn validate_for(&self, with_mail: bool) -> Vec<String> {
        let mut problems = Vec::new();

        if self.sheets.spreadsheet_id.trim().is_empty() {
            problems.push("sheets.spreadsheet_id is empty (set SPREADSHEET_ID)".to_string());
        }
        if self.sheets.read_columns.trim().is_empty() {
            problems.push("sheets.read_columns is empty".to_string());
        }
        if with_mail {
            if self.mail.username.trim().is_empty() {
                problems.push("mail.username is empty (set EMAIL_USER)".to_string());
            }
            if self.mail.host.trim().is_empty() {
                problems.push("mail.host is empty".to_string());
            }
        }

        let f = &self.fields;
        for (key, value) in [("name", &f.name), ("email", &f.email), ("status", &f.status)] {
            if value.is_empty() {
                problems.push(format!("fields.{key} is empty"));
            }
        }
        if f.name == f.email || f.name == f.status || f.email == f.status {
            problems.push("fields.name, fields.email and fields.status must differ".to_string());
        }

        let marker = f.completion_marker.trim();
        if marker.is_empty() || marker.eq_ignore_ascii_case("n") {
            problems.push(format!(
                "fields.completion_marker {:?} would leave rows eligible",
                f.completion_marker
            ));
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            problems.push(format!("server.bind {:?} is not a socket address", self.server.bind));
        }

        problems
    }
}
