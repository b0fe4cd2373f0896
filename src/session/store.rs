use super::types::Turn;
use crate::error::SessionError;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Durable record of session turns, keyed by session identifier. Health
/// records deliberately have no counterpart here: health is a cache and is
/// rebuilt from live traffic after a restart.
pub trait TurnStore: Send + Sync {
    fn append(&self, session_id: &str, turn: &Turn) -> Result<(), SessionError>;
    fn load(&self, session_id: &str) -> Result<Vec<Turn>, SessionError>;
}

/// Append-only JSONL store: one file per session, one turn per line. Lines
/// are never rewritten, matching the append-only turn log it mirrors.
pub struct JsonlTurnStore {
    dir: PathBuf,
}

impl JsonlTurnStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // Session ids are minted internally (hex + dashes), safe as file
        // names; anything else gets flattened defensively.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.jsonl"))
    }
}

impl TurnStore for JsonlTurnStore {
    fn append(&self, session_id: &str, turn: &Turn) -> Result<(), SessionError> {
        let line =
            serde_json::to_string(turn).map_err(|e| SessionError::Store(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))
            .map_err(|e| SessionError::Store(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| SessionError::Store(e.to_string()))?;
        let mut turns = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SessionError::Store(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let turn: Turn =
                serde_json::from_str(&line).map_err(|e| SessionError::Store(e.to_string()))?;
            turns.push(turn);
        }
        Ok(turns)
    }
}
