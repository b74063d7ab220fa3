/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD, or the
/// usual data directories). Falls back to sensible defaults if the
/// file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub levels_dir: PathBuf,
    /// Optional level code to start at instead of the first level.
    pub start_code: Option<String>,
    /// Plain-ASCII glyphs for terminals without good box/triangle fonts.
    pub ascii: bool,
    /// Held-key expiry when the terminal does not report Release events.
    pub hold_timeout_ms: u64,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    display: TomlDisplay,
    #[serde(default)]
    input: TomlInput,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    start_code: String,
}

#[derive(Deserialize, Debug)]
struct TomlDisplay {
    #[serde(default)]
    ascii: bool,
}

#[derive(Deserialize, Debug)]
struct TomlInput {
    #[serde(default = "default_hold_timeout")]
    hold_timeout_ms: u64,
}

// ── Defaults ──

fn default_levels_dir() -> String {
    "levels".into()
}
fn default_hold_timeout() -> u64 {
    160
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            start_code: String::new(),
        }
    }
}

impl Default for TomlDisplay {
    fn default() -> Self {
        TomlDisplay { ascii: false }
    }
}

impl Default for TomlInput {
    fn default() -> Self {
        TomlInput {
            hold_timeout_ms: default_hold_timeout(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) CWD, (3) data directories.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);

        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs
                .iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        let start_code = if toml_cfg.general.start_code.trim().is_empty() {
            None
        } else {
            Some(toml_cfg.general.start_code.trim().to_uppercase())
        };

        GameConfig {
            levels_dir,
            start_code,
            ascii: toml_cfg.display.ascii,
            hold_timeout_ms: toml_cfg.input.hold_timeout_ms,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths
/// (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable (resolve symlinks so a
    //    linked binary still finds its data)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/gridlock)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/gridlock");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/gridlock)
    let sys = PathBuf::from("/usr/share/gridlock");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        log::warn!("config.toml parse error: {e}; using defaults");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
