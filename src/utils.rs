use std::path::{Path, PathBuf};

/// Returns the cross-platform directory for application data
pub fn get_app_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let mut path = PathBuf::from(home_dir);
        path.push("Library");
        path.push("Application Support");
        path.push("CatMap");
        path
    } else if cfg!(target_os = "windows") {
        if let Ok(appdata) = std::env::var("APPDATA") {
            PathBuf::from(appdata).join("CatMap")
        } else {
            PathBuf::from(".").join("CatMap")
        }
    } else {
        // Linux and other Unix-like systems
        if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data_home).join("CatMap")
        } else {
            let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            let mut path = PathBuf::from(home_dir);
            path.push(".local");
            path.push("share");
            path.push("CatMap");
            path
        }
    }
}

/// Ensures the directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<(), std::io::Error> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
