use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";
const LOCAL_CONFIG_FILE: &str = "squad_messages.json";
const APP_DIR: &str = "squad_messages";

/// Poll intervals below this would hammer the server.
const MIN_POLL_SECS: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_url: String,

    /// Bearer credential handed over by the login flow.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub paths: ApiPaths,

    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_badge_poll_secs")]
    pub badge_poll_secs: u64,

    #[serde(default = "default_conversation_poll_secs")]
    pub conversation_poll_secs: u64,

    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    #[serde(default)]
    pub compact_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            badge_poll_secs: default_badge_poll_secs(),
            conversation_poll_secs: default_conversation_poll_secs(),
            show_timestamps: true,
            compact_mode: false,
        }
    }
}

impl Settings {
    pub fn badge_interval(&self) -> Duration {
        Duration::from_secs(self.badge_poll_secs.max(MIN_POLL_SECS))
    }

    pub fn conversation_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_poll_secs.max(MIN_POLL_SECS))
    }
}

/// Endpoint paths relative to `server_url`. `{id}` is replaced by the peer id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiPaths {
    pub unread_count: String,
    pub conversations: String,
    pub thread: String,
    pub send: String,
    pub user_search: String,
    pub profile: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            unread_count: "api/messages/unread_count/".to_string(),
            conversations: "api/messages/conversations/".to_string(),
            thread: "api/messages/with_user/".to_string(),
            send: "api/messages/".to_string(),
            user_search: "api/users/".to_string(),
            profile: "api/users/{id}/profile/".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_badge_poll_secs() -> u64 {
    10
}

fn default_conversation_poll_secs() -> u64 {
    30
}

impl Config {
    /// Load from an explicit path, or from the standard locations.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path(),
        };

        let mut config = if config_path.exists() {
            Self::read_from(&config_path)?
        } else {
            Self::create_new(config_path)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Environment wins over the file for the server and the credential.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SQUAD_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
        if let Ok(token) = std::env::var("SQUAD_TOKEN") {
            if !token.trim().is_empty() {
                self.token = Some(token.trim().to_string());
            }
        }
    }

    fn create_new(config_path: PathBuf) -> Result<Self> {
        println!("=== Squad Messages Setup ===");
        println!("No configuration found at {:?}", config_path);
        println!();

        let default_url = "http://localhost:8000";
        print!("Enter server URL (default: {}): ", default_url);
        use std::io::{self, Write};
        io::stdout().flush()?;
        let mut url = String::new();
        io::stdin().read_line(&mut url)?;
        let url = url.trim();

        let config = Config {
            server_url: if url.is_empty() {
                default_url.to_string()
            } else {
                url.to_string()
            },
            token: None,
            settings: Settings::default(),
            paths: ApiPaths::default(),
            config_path,
        };

        println!();
        println!("Set SQUAD_TOKEN to the access token from your login session.");
        println!();

        config.save()?;
        Ok(config)
    }

    fn default_config_path() -> PathBuf {
        // First check current directory
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let local_config = current_dir.join(LOCAL_CONFIG_FILE);

        if local_config.exists() {
            return local_config;
        }

        Self::config_dir().join(CONFIG_FILE)
    }

    pub fn config_dir() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir).join(APP_DIR)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join(APP_DIR)
        } else {
            PathBuf::from(".squad_messages")
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_dir)
            .join("debug.log")
    }
}
