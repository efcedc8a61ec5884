use crate::{Result, ScrobbleError, User};
use std::fs;
use std::path::{Path, PathBuf};

/// Saves and loads [`User`]s between sessions.
///
/// Users are stored per username as
/// `{root}/users/{username}/user.json`, where the default root is
/// `~/.local/share/lastfm-scrobble` (the XDG data directory). The rolling
/// scrobble window is stored with the credentials, so the daily cap still
/// holds after a restart.
#[derive(Debug, Clone)]
pub struct UserPersistence {
    root: PathBuf,
}

impl UserPersistence {
    /// Use the XDG data directory.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ScrobbleError::Config("Cannot determine XDG data directory".to_string()))?;
        Ok(Self::with_root(data_dir.join("lastfm-scrobble")))
    }

    /// Use a custom root directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the file path a user is stored at.
    pub fn user_path(&self, username: &str) -> PathBuf {
        self.root.join("users").join(username).join("user.json")
    }

    /// Save a user, creating the directory structure as needed.
    pub fn save_user(&self, user: &User) -> Result<()> {
        let user_path = self.user_path(&user.username);

        if let Some(parent) = user_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let user_json = user
            .to_json()
            .map_err(|e| ScrobbleError::Parse(format!("Failed to serialize user: {e}")))?;
        fs::write(&user_path, user_json)?;

        log::debug!("User saved to: {}", user_path.display());
        Ok(())
    }

    /// Load a previously saved user.
    pub fn load_user(&self, username: &str) -> Result<User> {
        let user_path = self.user_path(username);

        if !user_path.exists() {
            return Err(ScrobbleError::NotAuthenticated(format!(
                "No saved user found for: {username}"
            )));
        }

        let user_json = fs::read_to_string(&user_path)?;
        let user = User::from_json(&user_json)
            .map_err(|e| ScrobbleError::Parse(format!("Failed to parse user JSON: {e}")))?;

        log::debug!("User loaded from: {}", user_path.display());
        Ok(user)
    }

    pub fn user_exists(&self, username: &str) -> bool {
        self.user_path(username).exists()
    }

    /// Remove a saved user. Missing users are not an error.
    pub fn remove_user(&self, username: &str) -> Result<()> {
        let user_path = self.user_path(username);

        if user_path.exists() {
            fs::remove_file(&user_path)?;
            log::debug!("User removed from: {}", user_path.display());
        }

        Ok(())
    }

    /// List all usernames that have been saved.
    pub fn list_saved_users(&self) -> Result<Vec<String>> {
        let users_dir = self.root.join("users");

        if !users_dir.exists() {
            return Ok(Vec::new());
        }

        let mut users = Vec::new();
        for entry in fs::read_dir(&users_dir)? {
            let entry = entry?;

            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && entry.path().join("user.json").exists()
            {
                if let Some(username) = entry.file_name().to_str() {
                    users.push(username.to_string());
                }
            }
        }

        users.sort();
        Ok(users)
    }
}
