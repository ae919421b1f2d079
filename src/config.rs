use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "gridshot.ini";

/// Hard cap on the grid size: every cell must have a key binding in the
/// terminal frontend's flat key list.
pub const MAX_TOTAL_BOXES: usize = 20;

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.sections.clear();

        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let name = &line[1..line.len() - 1];
                let section = name.trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            // Key/value pair: key=value
            if let Some(eq_idx) = line.find('=') {
                let (key_raw, value_raw) = line.split_at(eq_idx);
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                // Skip '=' and trim whitespace from the value.
                let value = value_raw[1..].trim().to_string();
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }

        Ok(())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of target cells in the grid.
    pub total_boxes: usize,
    /// How many cells wide the grid is drawn. Input keys are bound to cell
    /// indices, not screen positions, so this is presentation only.
    pub grid_columns: usize,
    /// Scheduler ticks before the round is forced to end.
    pub max_hits: u32,
    pub activate_every_ms: u64,
    pub active_lifetime_ms: u64,
    pub hit_reward: u32,
    /// Render a scannable QR of the share link on the game-over panel.
    pub share_qr: bool,
    pub enable_score_submit: bool,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_boxes: 20,
            grid_columns: 5,
            max_hits: 20,
            activate_every_ms: 700,
            active_lifetime_ms: 600,
            hit_reward: 10,
            share_qr: true,
            enable_score_submit: false,
            log_level: LogLevel::Warn,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    let default = Config::default();

    let mut content = String::new();

    // [Options] section - keys in alphabetical order
    content.push_str("[Options]\n");
    content.push_str(&format!("ActivateEveryMs={}\n", default.activate_every_ms));
    content.push_str(&format!(
        "ActiveLifetimeMs={}\n",
        default.active_lifetime_ms
    ));
    content.push_str(&format!(
        "EnableScoreSubmit={}\n",
        if default.enable_score_submit { "1" } else { "0" }
    ));
    content.push_str(&format!("GridColumns={}\n", default.grid_columns));
    content.push_str(&format!("HitReward={}\n", default.hit_reward));
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push_str(&format!("MaxHits={}\n", default.max_hits));
    content.push_str(&format!(
        "ShareQr={}\n",
        if default.share_qr { "1" } else { "0" }
    ));
    content.push_str(&format!("TotalBoxes={}\n", default.total_boxes));
    content.push('\n');

    std::fs::write(CONFIG_PATH, content)
}

pub fn load() {
    if !std::path::Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            // Populate the global CONFIG struct from the file, using default
            // values for any missing or malformed keys.
            {
                let mut cfg = CONFIG.lock().unwrap();
                let default = Config::default();

                cfg.total_boxes = conf
                    .get("Options", "TotalBoxes")
                    .and_then(|v| v.parse::<usize>().ok())
                    .map_or(default.total_boxes, |v| v.clamp(1, MAX_TOTAL_BOXES));
                cfg.grid_columns = conf
                    .get("Options", "GridColumns")
                    .and_then(|v| v.parse::<usize>().ok())
                    .map_or(default.grid_columns, |v| v.clamp(1, MAX_TOTAL_BOXES));
                cfg.max_hits = conf
                    .get("Options", "MaxHits")
                    .and_then(|v| v.parse::<u32>().ok())
                    .map_or(default.max_hits, |v| v.clamp(1, 999));
                cfg.activate_every_ms = conf
                    .get("Options", "ActivateEveryMs")
                    .and_then(|v| v.parse::<u64>().ok())
                    .map_or(default.activate_every_ms, |v| v.clamp(100, 10_000));
                cfg.active_lifetime_ms = conf
                    .get("Options", "ActiveLifetimeMs")
                    .and_then(|v| v.parse::<u64>().ok())
                    .map_or(default.active_lifetime_ms, |v| v.clamp(50, 10_000));
                cfg.hit_reward = conf
                    .get("Options", "HitReward")
                    .and_then(|v| v.parse::<u32>().ok())
                    .map_or(default.hit_reward, |v| v.clamp(1, 1_000));
                cfg.share_qr = conf
                    .get("Options", "ShareQr")
                    .and_then(|v| v.parse::<u8>().ok())
                    .map_or(default.share_qr, |v| v != 0);
                cfg.enable_score_submit = conf
                    .get("Options", "EnableScoreSubmit")
                    .and_then(|v| v.parse::<u8>().ok())
                    .map_or(default.enable_score_submit, |v| v != 0);
                cfg.log_level = conf
                    .get("Options", "LogLevel")
                    .and_then(|v| LogLevel::from_str(&v).ok())
                    .unwrap_or(default.log_level);

                info!("Configuration loaded from '{CONFIG_PATH}'.");
            } // Lock on CONFIG is released here.

            // Only rewrite the file if any known key is missing.
            let missing_opts = {
                let options_keys = [
                    "ActivateEveryMs",
                    "ActiveLifetimeMs",
                    "EnableScoreSubmit",
                    "GridColumns",
                    "HitReward",
                    "LogLevel",
                    "MaxHits",
                    "ShareQr",
                    "TotalBoxes",
                ];
                options_keys
                    .iter()
                    .any(|k| conf.get("Options", k).is_none())
            };
            if missing_opts {
                save();
                info!("'{CONFIG_PATH}' updated with default values for any missing fields.");
            } else {
                info!("Configuration OK; no write needed.");
            }
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

fn save() {
    let cfg = CONFIG.lock().unwrap();

    let mut content = String::new();

    // [Options] (alphabetical order)
    content.push_str("[Options]\n");
    content.push_str(&format!("ActivateEveryMs={}\n", cfg.activate_every_ms));
    content.push_str(&format!("ActiveLifetimeMs={}\n", cfg.active_lifetime_ms));
    content.push_str(&format!(
        "EnableScoreSubmit={}\n",
        if cfg.enable_score_submit { "1" } else { "0" }
    ));
    content.push_str(&format!("GridColumns={}\n", cfg.grid_columns));
    content.push_str(&format!("HitReward={}\n", cfg.hit_reward));
    content.push_str(&format!("LogLevel={}\n", cfg.log_level.as_str()));
    content.push_str(&format!("MaxHits={}\n", cfg.max_hits));
    content.push_str(&format!(
        "ShareQr={}\n",
        if cfg.share_qr { "1" } else { "0" }
    ));
    content.push_str(&format!("TotalBoxes={}\n", cfg.total_boxes));
    content.push('\n');

    if let Err(e) = std::fs::write(CONFIG_PATH, content) {
        warn!("Failed to save config file: {e}");
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap()
}
