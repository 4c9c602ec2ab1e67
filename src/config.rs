use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "observer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Articles committed per batch transaction during bulk regeneration.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

/// Get the application data directory: ~/.observer/ on all platforms
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(".observer")
}

/// Default location of the article database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("observer.sqlite3")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with(".observer"));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
    }

    #[test]
    fn log_filter_scopes_to_crate() {
        assert_eq!(default_log_filter(), "observer=info");
    }
}
