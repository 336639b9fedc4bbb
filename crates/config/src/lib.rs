// Configuration loading

pub mod secrets;
pub mod settings;

pub use secrets::{
    delete_secret, get_secret, keychain_available, lookup_env, set_secret, Secret, SecretLookup,
    SecretSource,
};
pub use settings::{
    load_dotenv, ConfigError, FieldSettings, MailSettings, ServerSettings, Settings,
    SheetsSettings, TemplateSettings, CONFIG_ENV,
};
