use crate::incident::Incident;
use crate::notify::NotifyHandle;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Owns all incident state: the in-memory active map plus the append-only
/// JSONL journal. Every mutation goes through the single mutex so a
/// register/resolve is atomic with respect to its journal append and
/// interleaved calls never corrupt the map or split journal lines.
pub struct IncidentLedger {
    inner: Mutex<LedgerInner>,
    path: PathBuf,
    notify: Option<NotifyHandle>,
}

struct LedgerInner {
    active: HashMap<String, Incident>,
    writer: BufWriter<File>,
}

impl LedgerInner {
    /// Appends one record and flushes before returning, so a crash after
    /// the call cannot lose the transition.
    fn append(&mut self, incident: &Incident) -> anyhow::Result<()> {
        let json = serde_json::to_string(incident)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl IncidentLedger {
    /// Opens the ledger at `path`, replaying any existing journal to seed
    /// the active map. An unreadable or unwritable path is fatal.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let active = if path.exists() {
            replay_journal(&path)?
        } else {
            HashMap::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            inner: Mutex::new(LedgerInner {
                active,
                writer: BufWriter::new(file),
            }),
            path,
            notify: None,
        })
    }

    /// Attaches the notification handoff. Call before sharing the ledger
    /// across workers.
    pub fn set_notifier(&mut self, notify: NotifyHandle) {
        self.notify = Some(notify);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens an incident for `resource_name` unless one is already active.
    /// Idempotent under repeated failure reports from the same outage.
    pub async fn register_incident(
        &self,
        resource_name: &str,
        code: i32,
        text: &str,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.active.contains_key(resource_name) {
            return Ok(());
        }

        let incident = Incident::open(resource_name, code, text);
        inner.append(&incident)?;
        inner.active.insert(resource_name.to_string(), incident.clone());
        drop(inner);

        if let Some(notify) = &self.notify {
            notify.incident_opened(incident);
        }
        Ok(())
    }

    /// Closes the active incident for `resource_name`, if any.
    pub async fn resolve_incident(&self, resource_name: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(mut incident) = inner.active.remove(resource_name) else {
            return Ok(());
        };

        incident.close();
        if let Err(e) = inner.append(&incident) {
            // Keep the map consistent with the journal on a failed append
            inner.active.insert(resource_name.to_string(), incident);
            return Err(e);
        }
        drop(inner);

        if let Some(notify) = &self.notify {
            notify.incident_resolved(incident);
        }
        Ok(())
    }

    /// Snapshot of all currently open incidents.
    pub async fn get_active(&self) -> Vec<Incident> {
        let inner = self.inner.lock().await;
        inner.active.values().cloned().collect()
    }

    /// Discards the in-memory active map and rebuilds it purely from the
    /// journal.
    pub async fn reload_active_incidents(&self) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.active = replay_journal(&self.path)?;
        Ok(())
    }
}

/// Replays the journal in order: an open record makes its resource active,
/// a closed record clears the entry unless a newer open superseded it.
/// Malformed or truncated lines are skipped, never fatal. Lines are read
/// as raw bytes first: a crash mid-append can cut a record inside a
/// multibyte character, which must not abort replay either.
fn replay_journal(path: &Path) -> anyhow::Result<HashMap<String, Incident>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut active: HashMap<String, Incident> = HashMap::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                debug!(error = %e, "skipping non-utf8 journal line");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let record: Incident = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "skipping malformed journal line");
                continue;
            }
        };

        if record.is_open() {
            active.insert(record.resource_name.clone(), record);
        } else if let Some(open) = active.get(&record.resource_name) {
            if open.start_time <= record.start_time {
                active.remove(&record.resource_name);
            }
        }
    }
    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn journal_lines(path: &Path) -> Vec<serde_json::Value> {
        let mut contents = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");
        let ledger = IncidentLedger::open(&path).unwrap();

        ledger.register_incident("res1", 500, "boom").await.unwrap();
        let active = ledger.get_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_name, "res1");
        assert!(active[0].is_open());

        ledger.resolve_incident("res1").await.unwrap();
        assert!(ledger.get_active().await.is_empty());

        let lines = journal_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["endTime"].is_null());
        assert!(!lines[1]["endTime"].is_null());
    }

    #[tokio::test]
    async fn test_double_registration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");
        let ledger = IncidentLedger::open(&path).unwrap();

        ledger.register_incident("res1", 500, "").await.unwrap();
        ledger.register_incident("res1", 503, "again").await.unwrap();

        assert_eq!(ledger.get_active().await.len(), 1);
        assert_eq!(journal_lines(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_without_active_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");
        let ledger = IncidentLedger::open(&path).unwrap();

        ledger.resolve_incident("nothing").await.unwrap();
        assert!(ledger.get_active().await.is_empty());
        assert!(journal_lines(&path).is_empty());
    }

    #[tokio::test]
    async fn test_replay_seeds_active_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");

        {
            let ledger = IncidentLedger::open(&path).unwrap();
            ledger.register_incident("res1", 500, "").await.unwrap();
            ledger.register_incident("res2", 500, "").await.unwrap();
            ledger.resolve_incident("res2").await.unwrap();
        }

        let reopened = IncidentLedger::open(&path).unwrap();
        let active = reopened.get_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_name, "res1");
    }

    #[tokio::test]
    async fn test_replay_equivalence_after_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");
        let ledger = IncidentLedger::open(&path).unwrap();

        let steps: [(&str, &str); 6] = [
            ("register", "a"),
            ("register", "b"),
            ("resolve", "a"),
            ("register", "c"),
            ("resolve", "b"),
            ("register", "a"),
        ];

        for (op, name) in steps {
            match op {
                "register" => ledger.register_incident(name, 500, "").await.unwrap(),
                _ => ledger.resolve_incident(name).await.unwrap(),
            }

            let mut in_memory: Vec<String> = ledger
                .get_active()
                .await
                .into_iter()
                .map(|i| i.resource_name)
                .collect();
            in_memory.sort();

            let mut replayed: Vec<String> =
                replay_journal(&path).unwrap().into_keys().collect();
            replayed.sort();

            assert_eq!(in_memory, replayed);
        }
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");

        let open = serde_json::to_string(&Incident::open("res1", 500, "")).unwrap();
        let contents = format!(
            "{}\nnot json at all\n{{\"resourceName\":\"res2\"}}\n{{\"trunc",
            open
        );
        std::fs::write(&path, contents).unwrap();

        let ledger = IncidentLedger::open(&path).unwrap();
        let active = ledger.get_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_name, "res1");
    }

    #[tokio::test]
    async fn test_truncated_multibyte_tail_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");

        // A crash during an append can cut the last record inside a
        // multibyte character of the response text
        let open = serde_json::to_string(&Incident::open("res1", 500, "")).unwrap();
        let mut contents = format!("{}\n", open).into_bytes();
        contents.extend_from_slice(b"{\"resourceName\":\"res2\",\"response\":\"\xD0\xBF\xD1");
        std::fs::write(&path, contents).unwrap();

        let ledger = IncidentLedger::open(&path).unwrap();
        let active = ledger.get_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_name, "res1");
    }

    #[tokio::test]
    async fn test_reload_rebuilds_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");
        let ledger = IncidentLedger::open(&path).unwrap();

        ledger.register_incident("res1", 500, "").await.unwrap();

        // A close record appended behind the ledger's back, as after
        // external inspection of the log
        let mut incident = Incident::open("res1", 500, "");
        incident.close();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&incident).unwrap()).unwrap();

        assert_eq!(ledger.get_active().await.len(), 1);
        ledger.reload_active_incidents().await.unwrap();
        assert!(ledger.get_active().await.is_empty());
    }
}
