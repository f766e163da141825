use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{Mode, Tool};

const SUPPORTED_VERSION: u32 = 1;
const REGISTRY_FILE: &str = "registry.json";

// Canonical table, bundled at build time.
const BUNDLED_REGISTRY: &str = include_str!("../../modes/registry.json");
const BUNDLED_PROMPTS: &[(&str, &str)] = &[
    ("web.md", include_str!("../../modes/web.md")),
    ("academic.md", include_str!("../../modes/academic.md")),
    ("youtube.md", include_str!("../../modes/youtube.md")),
    ("x.md", include_str!("../../modes/x.md")),
    ("analysis.md", include_str!("../../modes/analysis.md")),
    ("chat.md", include_str!("../../modes/chat.md")),
    ("extreme.md", include_str!("../../modes/extreme.md")),
];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown mode {0:?}")]
    UnknownMode(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid mode registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported mode registry version {0}")]
    UnsupportedVersion(u32),
    #[error("mode registry has no entry for {0}")]
    MissingMode(Mode),
    #[error("prompt file {0:?} not found")]
    MissingPrompt(String),
    #[error("mode {0} has an empty system prompt")]
    EmptyPrompt(Mode),
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    version: u32,
    modes: BTreeMap<String, ModeEntry>,
}

#[derive(Debug, Deserialize)]
struct ModeEntry {
    tools: Vec<Tool>,
    prompt_file: String,
}

/// Tool allow-list and persona prompt for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeDescriptor {
    pub tools: Vec<Tool>,
    pub system_prompt: String,
}

impl ModeDescriptor {
    /// Fills the `{{date}}` and `{{timezone}}` placeholders.
    pub fn render_prompt(&self, date: NaiveDate, timezone: &str) -> String {
        self.system_prompt
            .replace("{{date}}", &date.format("%a, %b %d, %Y").to_string())
            .replace("{{timezone}}", timezone)
    }

    /// Renders with the calendar date of `now` as seen in `timezone`, so the
    /// date and the timezone in the prompt always agree.
    pub fn render_at(&self, now: DateTime<Utc>, timezone: &str) -> Result<String, RegistryError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| RegistryError::UnknownTimezone(timezone.to_string()))?;
        let today = now.with_timezone(&tz).date_naive();
        Ok(self.render_prompt(today, tz.name()))
    }
}

#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: HashMap<Mode, ModeDescriptor>,
}

impl ModeRegistry {
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::load(BUNDLED_REGISTRY, |name| {
            BUNDLED_PROMPTS
                .iter()
                .find(|(file, _)| *file == name)
                .map(|(_, prompt)| prompt.to_string())
                .ok_or_else(|| RegistryError::MissingPrompt(name.to_string()))
        })
    }

    /// Loads `registry.json` and its prompt files from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, RegistryError> {
        let read = |path: PathBuf| {
            std::fs::read_to_string(&path).map_err(|source| RegistryError::Io { path, source })
        };
        let registry = read(dir.join(REGISTRY_FILE))?;
        Self::load(&registry, |name| read(dir.join(name)))
    }

    fn load(
        registry: &str,
        read_prompt: impl Fn(&str) -> Result<String, RegistryError>,
    ) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(registry)?;
        if file.version != SUPPORTED_VERSION {
            return Err(RegistryError::UnsupportedVersion(file.version));
        }

        let mut modes = HashMap::new();
        for (id, entry) in file.modes {
            let mode: Mode = id.parse()?;
            let system_prompt = read_prompt(&entry.prompt_file)?;
            if system_prompt.trim().is_empty() {
                return Err(RegistryError::EmptyPrompt(mode));
            }
            modes.insert(
                mode,
                ModeDescriptor {
                    tools: entry.tools,
                    system_prompt,
                },
            );
        }

        if let Some(missing) = Mode::ALL.into_iter().find(|m| !modes.contains_key(m)) {
            return Err(RegistryError::MissingMode(missing));
        }

        tracing::debug!(version = file.version, modes = modes.len(), "mode registry loaded");
        Ok(Self { modes })
    }

    /// `None` selects the web mode.
    pub fn lookup(&self, mode: Option<Mode>) -> &ModeDescriptor {
        let mode = mode.unwrap_or_default();
        // Load-time validation guarantees every mode has an entry.
        &self.modes[&mode]
    }
}
