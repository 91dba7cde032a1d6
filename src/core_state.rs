//! Process-wide application state shared by every request.
//!
//! `CoreState` owns the configuration and the outbound clients (LLM and
//! mail). SQLite connections are opened per request via `open_db`, so
//! there is no connection held across awaits.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::ai::{self, AiError, LlmClient};
use crate::config::Config;
use crate::db;
use crate::mail::{self, MailError, Mailer};

pub type SharedLlm = Arc<dyn LlmClient + Send + Sync>;
pub type SharedMailer = Arc<dyn Mailer + Send + Sync>;

pub struct CoreState {
    pub config: Config,
    pub llm: SharedLlm,
    pub mailer: SharedMailer,
}

impl CoreState {
    /// Build state with the real clients described by `config`.
    ///
    /// Blocking HTTP clients are created here, so call this before
    /// entering the async runtime.
    pub fn from_config(config: Config) -> Result<Self, CoreError> {
        let llm: SharedLlm = Arc::from(ai::llm_from_config(&config)?);
        let mailer: SharedMailer = Arc::from(mail::mailer_from_config(&config)?);
        tracing::info!(transport = mailer.transport(), "Mail transport ready");
        Ok(Self::with_clients(config, llm, mailer))
    }

    pub fn with_clients(config: Config, llm: SharedLlm, mailer: SharedMailer) -> Self {
        Self {
            config,
            llm,
            mailer,
        }
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.config.db_path
    }

    /// Open a database connection (pragmas applied, migrations current).
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    /// Create the database file and schema up front so startup fails fast.
    pub fn init_db(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        let tables = db::count_tables(&conn)?;
        tracing::info!(path = %self.config.db_path.display(), tables, "Database ready");
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("AI client error: {0}")]
    Ai(#[from] AiError),
    #[error("Mail client error: {0}")]
    Mail(#[from] MailError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockLlmClient;
    use crate::mail::RecordingMailer;

    #[test]
    fn open_db_creates_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::for_tests(tmp.path().join("data").join("medichelp.db"));
        let core = CoreState::with_clients(
            config,
            Arc::new(MockLlmClient::new("ok")),
            Arc::new(RecordingMailer::new()),
        );
        core.init_db().unwrap();
        let conn = core.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 8);
        assert!(core.db_path().exists());
    }

    #[test]
    fn from_config_without_keys_uses_fallback_clients() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::from_config(Config::for_tests(tmp.path().join("m.db"))).unwrap();
        assert!(matches!(
            core.llm.generate("m", "p"),
            Err(AiError::NotConfigured)
        ));
        assert!(core.mailer.send_password_reset("p@clinic.test", "123456").is_ok());
    }
}
