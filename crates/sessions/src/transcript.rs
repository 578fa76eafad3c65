//! Per-session transcripts: one JSONL file per session, append-only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adjutant_domain::error::{Error, Result};

/// One persisted conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u32>,
    /// Names of the tools exercised while producing this turn (assistant
    /// turns only) — kept for audit; raw tool payloads are not persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.to_owned(),
            tokens_in: None,
            tokens_out: None,
            tool_names: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(
        content: &str,
        tokens_in: u32,
        tokens_out: u32,
        tool_names: Vec<String>,
    ) -> Self {
        Self {
            role: "assistant".into(),
            content: content.to_owned(),
            tokens_in: Some(tokens_in),
            tokens_out: Some(tokens_out),
            tool_names,
            created_at: Utc::now(),
        }
    }
}

/// Append-only JSONL transcript writer/reader.
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("transcripts");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self { dir })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one turn to the session's transcript.
    pub fn append(&self, session_id: &str, record: &TurnRecord) -> Result<()> {
        use std::io::Write;
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))
            .map_err(Error::Io)?;
        writeln!(file, "{line}").map_err(Error::Io)
    }

    /// Read the full transcript in chronological order. Unparseable lines
    /// are skipped rather than failing the read.
    pub fn read(&self, session_id: &str) -> Vec<TurnRecord> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        raw.lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let transcripts = TranscriptWriter::new(tmp.path()).unwrap();

        transcripts.append("s1", &TurnRecord::user("hello")).unwrap();
        transcripts
            .append(
                "s1",
                &TurnRecord::assistant("hi there", 12, 4, vec!["search_emails".into()]),
            )
            .unwrap();

        let turns = transcripts.read("s1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].tokens_in, Some(12));
        assert_eq!(turns[1].tool_names, vec!["search_emails"]);
    }

    #[test]
    fn missing_transcript_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let transcripts = TranscriptWriter::new(tmp.path()).unwrap();
        assert!(transcripts.read("nope").is_empty());
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let transcripts = TranscriptWriter::new(tmp.path()).unwrap();
        transcripts.append("s1", &TurnRecord::user("ok")).unwrap();

        // Scribble a partial line into the file.
        use std::io::Write;
        let path = tmp.path().join("transcripts/s1.jsonl");
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        writeln!(f, "{{not json").unwrap();

        assert_eq!(transcripts.read("s1").len(), 1);
    }
}
