use std::path::PathBuf;

const APP_DIR: &str = "gmusic-clipd";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/gmusic-clipd/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    // On Windows, check for portable config.toml in executable directory first
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                if exe_dir.join("config.toml").exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn log_path() -> PathBuf {
    data_dir().join("gmusic-clipd.log")
}

/// Default place for downloaded tracks: the user's music directory, falling
/// back to `~/Music`.
pub fn music_dir() -> PathBuf {
    dirs::audio_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Music")
    })
}

#[cfg(unix)]
fn id3v2_binary_names() -> &'static [&'static str] {
    &["id3v2"]
}

#[cfg(windows)]
fn id3v2_binary_names() -> &'static [&'static str] {
    &["id3v2.exe", "id3v2"]
}

fn find_beside_exe(names: &[&str]) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    for name in names {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in names {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Find the id3v2 tagging tool.
///
/// Searches in order:
/// 1. ID3V2_PATH environment variable
/// 2. Beside current executable
/// 3. PATH
pub fn find_id3v2_binary() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ID3V2_PATH") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(p) = find_beside_exe(id3v2_binary_names()) {
        return Some(p);
    }

    find_on_path(id3v2_binary_names())
}
