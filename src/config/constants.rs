pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_SETTINGS_PATH: &str = "beeperbot.yaml";
pub const DEFAULT_TOKEN_PATH: &str = "beeperbot-token.txt";
pub const DEFAULT_CHARACTERS_DIR: &str = "characters";
pub const DEFAULT_INSTRUCT_DIR: &str = "instruction-templates";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const GENERATE_ENDPOINT: &str = "/api/v1/generate";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 200;

pub const DEFAULT_CHARACTER: &str = "None";
pub const DEFAULT_HISTORY_LIMIT: usize = 40;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IGNORE_PREFIX: &str = "//";
pub const DEFAULT_FAREWELL: &str = "Signing off...";

pub const GREETING_PROMPT: &str = "Say hi~";
pub const GREETING_AUTHOR: &str = "Chat";

pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
pub const AVATAR_EXTENSIONS: [&str; 4] = ["webp", "png", "jpg", "jpeg"];
