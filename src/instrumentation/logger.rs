use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub latency_ms: u64,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_cost: Option<f64>,
}

impl ActionLog {
    pub fn new(action: &str, latency_ms: u64, error: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            action: action.to_string(),
            latency_ms,
            outcome: if error.is_some() {
                Outcome::Error
            } else {
                Outcome::Ok
            },
            error,
            llm_input_tokens: None,
            llm_output_tokens: None,
            llm_cost: None,
        }
    }

    pub fn with_usage(mut self, input_tokens: u32, output_tokens: u32, cost: f64) -> Self {
        self.llm_input_tokens = Some(input_tokens);
        self.llm_output_tokens = Some(output_tokens);
        self.llm_cost = Some(cost);
        self
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {:?} in {:.2}s",
            self.action,
            self.outcome,
            self.latency_ms as f64 / 1000.0
        );
        if let (Some(input), Some(output)) = (self.llm_input_tokens, self.llm_output_tokens) {
            line.push_str(&format!(
                " | Tokens used by LLM: {} | Cost: ${:.4}",
                input + output,
                self.llm_cost.unwrap_or(0.0)
            ));
        }
        line
    }
}

pub struct ActionLogger {
    dir: PathBuf,
}

impl ActionLogger {
    pub fn new(dir: &str) -> Result<Self> {
        let dir = PathBuf::from(dir);
        fs::create_dir_all(&dir).context("Failed to create logs directory")?;
        Ok(Self { dir })
    }

    pub fn write(&self, entry: &ActionLog) -> Result<()> {
        let path = self.dir.join("actions.jsonl");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open log file")?;

        let json = serde_json::to_string(entry).context("Failed to serialize action log")?;
        writeln!(file, "{}", json).context("Failed to write log")?;

        Ok(())
    }
}

/// Appends `entry` under `dir`. A log that cannot be written is reported
/// with a warning and never replaces the action's own result.
pub fn record(dir: &str, entry: &ActionLog) -> bool {
    match ActionLogger::new(dir).and_then(|logger| logger.write(entry)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), dir, "Failed to write action log");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_action() {
        let dir = std::env::temp_dir().join(format!("action-log-{}", uuid::Uuid::new_v4()));
        let logger = ActionLogger::new(dir.to_str().unwrap()).unwrap();

        logger
            .write(&ActionLog::new("suggest", 420, None).with_usage(100, 20, 0.001))
            .unwrap();
        logger
            .write(&ActionLog::new("speak", 12, Some("ELEVENLABS_API_KEY is not defined".into())))
            .unwrap();

        let contents = fs::read_to_string(dir.join("actions.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "ok");
        assert_eq!(lines[0]["llm_input_tokens"], 100);
        assert_eq!(lines[1]["outcome"], "error");
        assert!(lines[1].get("llm_input_tokens").is_none());
        assert_ne!(lines[0]["id"], lines[1]["id"]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn summary_mentions_tokens_only_when_known() {
        let plain = ActionLog::new("metadata", 1500, None);
        assert_eq!(plain.summary(), "metadata Ok in 1.50s");

        let with_usage = ActionLog::new("suggest", 250, None).with_usage(10, 5, 0.0);
        assert!(with_usage.summary().contains("Tokens used by LLM: 15"));
    }

    #[test]
    fn unwritable_log_dir_only_warns() {
        let blocker = std::env::temp_dir().join(format!("action-log-file-{}", uuid::Uuid::new_v4()));
        fs::write(&blocker, "not a directory").unwrap();
        let dir = blocker.join("logs");

        assert!(!record(dir.to_str().unwrap(), &ActionLog::new("metadata", 3, None)));
        assert!(!dir.exists());

        fs::remove_file(blocker).unwrap();
    }

    #[test]
    fn record_writes_when_possible() {
        let dir = std::env::temp_dir().join(format!("action-log-{}", uuid::Uuid::new_v4()));
        assert!(record(dir.to_str().unwrap(), &ActionLog::new("speak", 5, None)));
        assert!(dir.join("actions.jsonl").exists());
        fs::remove_dir_all(dir).unwrap();
    }
}
