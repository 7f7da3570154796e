use std::path::PathBuf;

/// Bundle identifier the `open` command launches.
pub const SPOTIFY_BUNDLE_ID: &str = "com.spotify.client";

/// Process name as it appears in the process table.
pub const SPOTIFY_PROCESS_NAME: &str = "Spotify";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/spotless (XDG layout, same on macOS for consistency)
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("spotless")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("spotless")
}

/// Spotify's per-user cache root. The files the client rewrites on every
/// track change live one level below, in `Users/<account>-user/`.
pub fn spotify_support_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Library")
        .join("Application Support")
        .join("Spotify")
}

/// Cache files whose mtime moves when playback state changes.
const WATCHED_CACHE_FILES: [&str; 4] = [
    "recently_played.bnk",
    "recently_played.bnk.tmp",
    "ad-state-storage.bnk",
    "ad-state-storage.bnk.tmp",
];

/// Enumerate the playback-state cache files for every logged-in Spotify
/// account under `users_dir`. Missing directories yield an empty list.
pub fn watch_files_under(users_dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(users_dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_user_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with("-user"))
                .unwrap_or(false);
        if is_user_dir {
            for name in WATCHED_CACHE_FILES {
                files.push(path.join(name));
            }
        }
    }
    files
}

pub fn spotify_watch_files() -> Vec<PathBuf> {
    watch_files_under(&spotify_support_dir().join("Users"))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    for dir in path.split(':') {
        let p = PathBuf::from(dir).join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

/// Resolve a system binary: env override, well-known location, then PATH.
fn find_system_binary(env_var: &str, well_known: &str, name: &str) -> PathBuf {
    if let Ok(p) = std::env::var(env_var) {
        let p = PathBuf::from(p);
        if p.exists() {
            return p;
        }
    }
    let p = PathBuf::from(well_known);
    if p.exists() {
        return p;
    }
    find_on_path(name).unwrap_or(p)
}

pub fn osascript_binary() -> PathBuf {
    find_system_binary("SPOTLESS_OSASCRIPT", "/usr/bin/osascript", "osascript")
}

pub fn open_binary() -> PathBuf {
    find_system_binary("SPOTLESS_OPEN", "/usr/bin/open", "open")
}

pub fn pgrep_binary() -> PathBuf {
    find_system_binary("SPOTLESS_PGREP", "/usr/bin/pgrep", "pgrep")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_files_enumeration() {
        let tmp = tempfile::tempdir().unwrap();
        let users = tmp.path().join("Users");
        std::fs::create_dir_all(users.join("alice-user")).unwrap();
        std::fs::create_dir_all(users.join("bob-user")).unwrap();
        std::fs::create_dir_all(users.join("not-a-match")).unwrap();

        let files = watch_files_under(&users);
        assert_eq!(files.len(), 8);
        assert!(files
            .iter()
            .any(|f| f.ends_with("alice-user/recently_played.bnk")));
        assert!(files
            .iter()
            .any(|f| f.ends_with("bob-user/ad-state-storage.bnk.tmp")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("not-a-match")));
    }

    #[test]
    fn test_watch_files_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(watch_files_under(&tmp.path().join("nope")).is_empty());
    }
}
