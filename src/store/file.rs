//! Directory-backed store
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<session_id>/session.json    (or session.bin)
//! <root>/<session_id>/best_params.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{BestParamsStore, SessionStore, StoreFormat};
use crate::error::StoreError;
use crate::session::{Session, SessionId, SESSION_VERSION};
use crate::space::ParameterVector;

const MAGIC: &[u8; 4] = b"PTSN";
const HEADER_LEN: usize = 8;
const BEST_PARAMS_FILE: &str = "best_params.json";

/// Stores each session in its own directory
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    format: StoreFormat,
}

impl FileStore {
    /// Create a store rooted at `root`, writing JSON
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: StoreFormat::Json,
        }
    }

    /// Set the format used for new snapshots
    pub fn with_format(mut self, format: StoreFormat) -> Self {
        self.format = format;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Format used for new snapshots
    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// Directory holding one session's files
    pub fn session_dir(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        if !session_id.is_path_safe() {
            return Err(StoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.root.join(session_id.as_str()))
    }

    /// Path of the existing snapshot, preferring the configured format
    fn snapshot_path(&self, session_id: &SessionId) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.session_dir(session_id)?;
        let other = match self.format {
            StoreFormat::Json => StoreFormat::Binary,
            StoreFormat::Binary => StoreFormat::Json,
        };
        Ok([self.format, other]
            .iter()
            .map(|f| dir.join(f.file_name()))
            .find(|p| p.is_file()))
    }
}

impl SessionStore for FileStore {
    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let dir = self.session_dir(session.id())?;
        fs::create_dir_all(&dir)?;

        let bytes = match self.format {
            StoreFormat::Json => serde_json::to_vec_pretty(session)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            StoreFormat::Binary => {
                let mut bytes = Vec::with_capacity(HEADER_LEN);
                bytes.extend_from_slice(&session.version().to_le_bytes());
                bytes.extend_from_slice(MAGIC);
                bincode::serialize_into(&mut bytes, session)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                bytes
            }
        };

        let path = dir.join(self.format.file_name());
        write_atomic(&path, &bytes)?;

        // One snapshot per session
        let stale = match self.format {
            StoreFormat::Json => dir.join(StoreFormat::Binary.file_name()),
            StoreFormat::Binary => dir.join(StoreFormat::Json.file_name()),
        };
        if stale.is_file() {
            fs::remove_file(&stale)?;
        }

        tracing::debug!(
            session = %session.id(),
            path = %path.display(),
            rounds = session.round_count(),
            bytes = bytes.len(),
            "session saved"
        );
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        let path = self
            .snapshot_path(session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        let bytes = fs::read(&path)?;

        let session = if bytes.len() >= HEADER_LEN && &bytes[4..HEADER_LEN] == MAGIC {
            let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if version > SESSION_VERSION {
                return Err(StoreError::VersionTooNew(version));
            }
            bincode::deserialize::<Session>(&bytes[HEADER_LEN..])
                .map_err(|e| StoreError::Deserialization(e.to_string()))?
        } else {
            let value: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            let version = value
                .get("version")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| StoreError::Corrupted("missing version field".to_string()))?;
            if version > u64::from(SESSION_VERSION) {
                return Err(StoreError::VersionTooNew(
                    u32::try_from(version).unwrap_or(u32::MAX),
                ));
            }
            serde_json::from_value::<Session>(value)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?
        };

        if session.id() != session_id {
            return Err(StoreError::Corrupted(format!(
                "file for {} holds session {}",
                session_id,
                session.id()
            )));
        }
        session.check_invariants().map_err(StoreError::Corrupted)?;

        tracing::debug!(
            session = %session_id,
            path = %path.display(),
            rounds = session.round_count(),
            "session loaded"
        );
        Ok(session)
    }

    fn exists(&self, session_id: &SessionId) -> bool {
        matches!(self.snapshot_path(session_id), Ok(Some(_)))
    }
}

impl BestParamsStore for FileStore {
    fn save_best(
        &self,
        session_id: &SessionId,
        params: &ParameterVector,
    ) -> Result<(), StoreError> {
        let dir = self.session_dir(session_id)?;
        fs::create_dir_all(&dir)?;
        let bytes = serde_json::to_vec_pretty(&params.to_named())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&dir.join(BEST_PARAMS_FILE), &bytes)?;
        tracing::debug!(session = %session_id, "best parameters saved");
        Ok(())
    }

    fn load_best(&self, session_id: &SessionId) -> Result<ParameterVector, StoreError> {
        let path = self.session_dir(session_id)?.join(BEST_PARAMS_FILE);
        if !path.is_file() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        let bytes = fs::read(&path)?;
        let named: BTreeMap<String, f64> = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;
        ParameterVector::from_named(&named).map_err(|e| StoreError::Corrupted(e.to_string()))
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuneConfig;
    use crate::schedule::PhaseTable;
    use crate::session::machine::apply_judgment;
    use crate::session::{Judgment, NextAction};
    use crate::schedule::Rubric;
    use tempfile::TempDir;

    fn played_session() -> Session {
        let mut config = TuneConfig::default();
        config.proposal.num_restarts = 2;
        config.proposal.raw_samples = 8;
        config.proposal.local_iterations = 5;
        let policy = PhaseTable::default();

        let mut session = Session::new("ref.png");
        session.create_initial_round(&policy);
        let chosen = Judgment::Chosen {
            winning_slot: "B".to_string(),
            timestamp: chrono::Utc::now(),
        };
        apply_judgment(&mut session, 1, chosen, &config, &policy);
        let reprint = Judgment::Undecidable {
            rubric: Rubric::Shadows,
            next_action: NextAction::Reprint,
            chosen_slot: None,
            delta_scale: 2.0,
            rejudge_exhausted: false,
            timestamp: chrono::Utc::now(),
        };
        apply_judgment(&mut session, 2, reprint, &config, &policy);
        session
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let session = played_session();

        assert!(!store.exists(session.id()));
        store.save(&session).unwrap();
        assert!(store.exists(session.id()));
        assert!(dir
            .path()
            .join(session.id().as_str())
            .join("session.json")
            .is_file());

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_binary_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).with_format(StoreFormat::Binary);
        let session = played_session();

        store.save(&session).unwrap();
        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_switching_format_replaces_snapshot() {
        let dir = TempDir::new().unwrap();
        let session = played_session();
        FileStore::new(dir.path()).save(&session).unwrap();

        let binary = FileStore::new(dir.path()).with_format(StoreFormat::Binary);
        binary.save(&session).unwrap();

        let session_dir = dir.path().join(session.id().as_str());
        assert!(session_dir.join("session.bin").is_file());
        assert!(!session_dir.join("session.json").exists());
        // A JSON store still finds the binary snapshot
        assert_eq!(FileStore::new(dir.path()).load(session.id()).unwrap(), session);
    }

    #[test]
    fn test_missing_session() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let result = store.load(&SessionId::new("sess_000000000000"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_rejects_unsafe_id() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let session = Session::with_id(SessionId::new("../escape"), "ref.png");
        assert!(matches!(
            store.save(&session),
            Err(StoreError::InvalidSessionId(_))
        ));
        assert!(!store.exists(session.id()));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let session = played_session();
        store.save(&session).unwrap();

        let path = dir.path().join(session.id().as_str()).join("session.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["version"] = serde_json::json!(SESSION_VERSION + 1);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            store.load(session.id()),
            Err(StoreError::VersionTooNew(v)) if v == SESSION_VERSION + 1
        ));
    }

    #[test]
    fn test_newer_binary_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).with_format(StoreFormat::Binary);
        let session = played_session();
        store.save(&session).unwrap();

        let path = dir.path().join(session.id().as_str()).join("session.bin");
        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&(SESSION_VERSION + 1).to_le_bytes());
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.load(session.id()),
            Err(StoreError::VersionTooNew(_))
        ));
    }

    #[test]
    fn test_broken_invariants_are_corruption() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let session = played_session();
        store.save(&session).unwrap();

        let path = dir.path().join(session.id().as_str()).join("session.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["comparisons"][0]["loser"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            store.load(session.id()),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn test_best_params_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let id = SessionId::new("sess_abcdef012345");
        let params = ParameterVector::new([0.3, -0.1, 0.0, 0.25, -0.05, 0.1]);

        store.save_best(&id, &params).unwrap();
        assert_eq!(store.load_best(&id).unwrap(), params);

        let raw: BTreeMap<String, f64> = serde_json::from_slice(
            &fs::read(dir.path().join(id.as_str()).join(BEST_PARAMS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["exposure_stops"], 0.3);
        assert_eq!(raw.len(), 6);
    }

    #[test]
    fn test_missing_best_params() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.load_best(&SessionId::new("sess_abcdef012345")),
            Err(StoreError::NotFound(_))
        ));
    }
}
