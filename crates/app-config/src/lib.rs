// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{AppSettings, PortfolioSnapshot, RiskSettings, SessionFile, Settings};

/// Loads the application settings from the `config/` directory.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new("config"))
}

/// Loads the application settings from `dir`.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings_from(dir: &Path) -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let base = dir.join("base");
    let overlay = dir.join(&environment);

    let settings = Config::builder()
        // 1. Load the base configuration file.
        .add_source(File::with_name(&base.to_string_lossy()))
        // 2. Load the environment-specific configuration file.
        .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
        // 3. Load settings from environment variables (e.g., `APP_RISK__MAX_DAILY_LOSS=0.01`).
        // The prefix is `APP`, separator is `__`.
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    // Deserialize the configuration into our `Settings` struct.
    let settings: Settings = settings.try_deserialize()?;

    // Fail at startup rather than on the first trade.
    settings.risk.to_limits()?;

    Ok(settings)
}

/// Loads an account/portfolio snapshot from a TOML file.
pub fn load_portfolio(path: &Path) -> Result<PortfolioSnapshot> {
    let content = std::fs::read_to_string(path)?;

    let snapshot: PortfolioSnapshot = toml::from_str(&content)?;
    Ok(snapshot)
}

/// Loads a replay session (a snapshot plus a list of trade proposals) from a TOML file.
pub fn load_session(path: &Path) -> Result<SessionFile> {
    let content = std::fs::read_to_string(path)?;

    let session: SessionFile = toml::from_str(&content)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Side;
    use rust_decimal_macros::dec;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serializes tests that load settings and removes any variables it set on drop.
    struct EnvVars {
        keys: Vec<&'static str>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvVars {
        fn lock() -> Self {
            Self {
                keys: Vec::new(),
                _lock: ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
            }
        }

        fn set(&mut self, key: &'static str, value: &str) {
            // SAFETY: every test that reads or writes the environment holds ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
            self.keys.push(key);
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in &self.keys {
                // SAFETY: ENV_LOCK is still held; it is released after this body.
                unsafe { std::env::remove_var(key) };
            }
        }
    }

    fn write_layered_config(dir: &Path) {
        fs::write(
            dir.join("base.toml"),
            r#"
[app]
environment = "development"
log_level = "info"

[risk]
max_position_size = 0.10
max_daily_loss = 0.02
"#,
        )
        .unwrap();
        fs::write(
            dir.join("staging.toml"),
            r#"
[app]
environment = "staging"

[risk]
max_position_size = 0.08
"#,
        )
        .unwrap();
    }

    #[test]
    fn settings_load_from_base_file() {
        let _env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            r#"
[app]
environment = "test"
log_level = "debug"

[risk]
max_position_size = 0.05
max_trades_per_day = 4
"#,
        )
        .unwrap();

        let settings = load_settings_from(dir.path()).unwrap();

        assert_eq!(settings.app.log_level, "debug");
        let limits = settings.risk.to_limits().unwrap();
        assert_eq!(limits.max_position_size, dec!(0.05));
        assert_eq!(limits.max_daily_loss, dec!(0.02));
        assert_eq!(limits.max_portfolio_exposure, dec!(1.5));
        assert_eq!(limits.max_trades_per_day, 4);
    }

    #[test]
    fn out_of_range_risk_settings_fail_to_load() {
        let _env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            r#"
[app]
environment = "test"
log_level = "info"

[risk]
max_daily_loss = 1.5
"#,
        )
        .unwrap();

        let err = load_settings_from(dir.path()).unwrap_err();
        assert!(matches!(err, Error::RiskLimits(_)));
    }

    #[test]
    fn missing_base_file_is_an_error() {
        let _env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_settings_from(dir.path()),
            Err(Error::LoadError(_))
        ));
    }

    #[test]
    fn environment_file_overrides_base() {
        let mut env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        write_layered_config(dir.path());
        env.set("APP_ENVIRONMENT", "staging");

        let settings = load_settings_from(dir.path()).unwrap();

        assert_eq!(settings.app.environment, "staging");
        assert_eq!(settings.app.log_level, "info");
        let limits = settings.risk.to_limits().unwrap();
        assert_eq!(limits.max_position_size, dec!(0.08));
        assert_eq!(limits.max_daily_loss, dec!(0.02));
    }

    #[test]
    fn environment_variables_override_every_file() {
        let mut env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        write_layered_config(dir.path());
        env.set("APP_ENVIRONMENT", "staging");
        env.set("APP_RISK__MAX_POSITION_SIZE", "0.05");
        env.set("APP_APP__LOG_LEVEL", "warn");

        let settings = load_settings_from(dir.path()).unwrap();

        assert_eq!(settings.app.log_level, "warn");
        let limits = settings.risk.to_limits().unwrap();
        assert_eq!(limits.max_position_size, dec!(0.05));
        assert_eq!(limits.max_daily_loss, dec!(0.02));
    }

    #[test]
    fn missing_environment_file_falls_back_to_base() {
        let mut env = EnvVars::lock();
        let dir = tempfile::tempdir().unwrap();
        write_layered_config(dir.path());
        env.set("APP_ENVIRONMENT", "production");

        let settings = load_settings_from(dir.path()).unwrap();

        assert_eq!(settings.app.environment, "development");
        assert_eq!(
            settings.risk.to_limits().unwrap().max_position_size,
            dec!(0.10)
        );
    }

    #[test]
    fn portfolio_snapshot_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.toml");
        fs::write(
            &path,
            r#"
current_pnl = -250.5
trades_today = 3

[account]
total_value = 100000
buying_power = 40000
cash = 40000

[[positions]]
symbol = "AAPL"
quantity = 200
market_value = 30000

[[positions]]
symbol = "TSLA"
quantity = -50
market_value = "-12500.25"
"#,
        )
        .unwrap();

        let snapshot = load_portfolio(&path).unwrap();

        assert_eq!(snapshot.account.total_value, dec!(100000));
        assert_eq!(snapshot.current_pnl, dec!(-250.5));
        assert_eq!(snapshot.trades_today, 3);
        assert_eq!(snapshot.positions.len(), 2);
        assert_eq!(snapshot.positions[1].market_value, dec!(-12500.25));
    }

    #[test]
    fn session_file_parses_proposals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(
            &path,
            r#"
[account]
total_value = 100000
buying_power = 100000
cash = 100000

[[proposals]]
symbol = "AAPL"
side = "buy"
shares = 100
price = 150

[[proposals]]
symbol = "AAPL"
side = "sell"
shares = 10
price = 151.5
"#,
        )
        .unwrap();

        let session = load_session(&path).unwrap();

        assert_eq!(session.snapshot.current_pnl, dec!(0));
        assert!(session.snapshot.positions.is_empty());
        assert_eq!(session.proposals.len(), 2);
        assert_eq!(session.proposals[1].side, Side::Sell);
        assert_eq!(session.proposals[1].price, dec!(151.5));
    }
}
