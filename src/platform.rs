use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
    Unknown,
}

pub fn detect() -> Platform {
    match std::env::consts::OS {
        "macos" => Platform::MacOS,
        "linux" => Platform::Linux,
        "windows" => Platform::Windows,
        _ => Platform::Unknown,
    }
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Steam app id of Hades, used for the Proton prefix on Linux.
const STEAM_APP_ID: &str = "1145360";

/// Where the game keeps its saves on a stock install.
pub fn default_save_dir(platform: Platform) -> Option<PathBuf> {
    let home = home_dir()?;

    let path = match platform {
        Platform::MacOS => home.join("Library/Application Support/Supergiant Games/Hades"),
        Platform::Windows => home.join("Documents").join("Saved Games").join("Hades"),
        // Hades has no native Linux build, saves live inside the Proton prefix
        Platform::Linux | Platform::Unknown => home
            .join(".local/share/Steam/steamapps/compatdata")
            .join(STEAM_APP_ID)
            .join("pfx/drive_c/users/steamuser/Documents/Saved Games/Hades"),
    };

    Some(path)
}

/// `~/.local/share/hades_backups` on Linux, the platform data dir elsewhere.
pub fn default_backup_root() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("hades_backups"))
        .or_else(|| home_dir().map(|h| h.join(".local/share/hades_backups")))
}

pub fn settings_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hades-backup")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
