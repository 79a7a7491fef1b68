use std::path::PathBuf;
use std::sync::Once;

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve the Field Ops home directory.
///
/// Priority:
/// 1) FIELDOPS_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.fieldops
pub fn fieldops_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("FIELDOPS_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".fieldops");
    }
    PathBuf::from(".").join(".fieldops")
}

fn ensure_home_dir(home: &PathBuf) {
    if let Err(err) = std::fs::create_dir_all(home) {
        CREATE_DIR_WARNED.call_once(|| {
            tracing::warn!(
                home = %home.display(),
                error = %err,
                "Failed to create Field Ops home directory; set FIELDOPS_HOME"
            );
        });
    }
}

/// Default config path: ~/.fieldops/config.toml
pub fn config_path() -> PathBuf {
    let home = fieldops_home();
    ensure_home_dir(&home);
    home.join("config.toml")
}

/// Default session key directory: ~/.fieldops/session
pub fn session_dir() -> PathBuf {
    let home = fieldops_home();
    ensure_home_dir(&home);
    home.join("session")
}

/// Default directory for locally saved reports: ~/.fieldops/reports
pub fn reports_dir() -> PathBuf {
    let home = fieldops_home();
    ensure_home_dir(&home);
    home.join("reports")
}
