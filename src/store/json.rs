use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::{remove_from, select_for_tool, upsert_into, RuleStore, StoreError};
use crate::rules::{Rule, RuleKey};

const FORMAT_VERSION: u32 = 1;
const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_POLL: Duration = Duration::from_millis(25);
/// A lock older than this was left behind by a writer that died.
const STALE_LOCK: Duration = Duration::from_secs(30);

/// On-disk layout of the rules file
#[derive(Debug, Serialize, Deserialize)]
struct RulesFile {
    #[serde(default = "format_version")]
    version: u32,
    #[serde(default)]
    rules: Vec<Rule>,
}

fn format_version() -> u32 {
    FORMAT_VERSION
}

/// Rules persisted as one JSON document.
///
/// Rules keep file order, which is the order corrections are applied in.
/// Readers never lock: writers replace the file with an atomic rename while
/// holding `<file>.lock`, so a reader sees either the old or the new set.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all rules; a missing file is an empty rule set.
    fn load(&self) -> Result<Vec<Rule>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: RulesFile = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.rules)
    }

    fn save(&self, rules: Vec<Rule>) -> Result<(), StoreError> {
        let file = RulesFile {
            version: FORMAT_VERSION,
            rules,
        };
        let contents = serde_json::to_string_pretty(&file).map_err(StoreError::Serialize)?;

        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = sibling(&self.path, &format!("tmp.{}", std::process::id()));
        fs::write(&tmp, contents).map_err(write_err)?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(source));
        }
        Ok(())
    }

    /// Read-modify-write under the writer lock.
    fn modify<T>(&self, change: impl FnOnce(&mut Vec<Rule>) -> T) -> Result<T, StoreError> {
        let _lock = WriterLock::acquire(&self.path)?;
        let mut rules = self.load()?;
        let result = change(&mut rules);
        self.save(rules)?;
        Ok(result)
    }
}

impl RuleStore for JsonFileStore {
    fn lookup_alias(&self, key: &RuleKey) -> Result<Option<Rule>, StoreError> {
        Ok(self.load()?.into_iter().find(|rule| key.matches(rule)))
    }

    fn rules_for_tool(&self, tool: &str) -> Result<Vec<Rule>, StoreError> {
        Ok(select_for_tool(&self.load()?, tool))
    }

    fn upsert(&self, rule: Rule) -> Result<(), StoreError> {
        self.modify(|rules| upsert_into(rules, rule))
    }

    fn delete(&self, key: &RuleKey) -> Result<bool, StoreError> {
        self.modify(|rules| remove_from(rules, key))
    }

    fn list(&self) -> Result<Vec<Rule>, StoreError> {
        self.load()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Exclusive `<file>.lock`, removed on drop.
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(target: &Path) -> Result<Self, StoreError> {
        let path = sibling(target, "lock");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        tracing::warn!(lock = %path.display(), "removing stale rules lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= LOCK_WAIT {
                        return Err(StoreError::LockTimeout {
                            path,
                            waited_ms: LOCK_WAIT.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(source) => return Err(StoreError::Write { path, source }),
            }
        }
    }
}

fn is_stale(lock: &Path) -> bool {
    fs::metadata(lock)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > STALE_LOCK)
        .unwrap_or(false)
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
