//! Read-only document sources.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use docscope_core::errors::{redact_connection_string, SamplingError};
use serde_json::Value;

/// Callback receiving sampled documents one at a time.
pub type Visitor<'a> = &'a mut dyn FnMut(Value) -> ControlFlow<()>;

/// A database the sampler may read from. Implementations never write.
pub trait DocumentSource: Send + Sync {
    /// Redacted endpoint, safe for logs and snapshots.
    fn endpoint(&self) -> String;

    fn database(&self) -> Option<String>;

    /// How documents are picked, recorded in the sampling snapshot.
    fn strategy(&self) -> &'static str {
        "first_n"
    }

    /// Connectivity check, run once before any collection is sampled.
    fn ping(&self) -> Result<(), SamplingError>;

    fn collections(&self) -> Result<Vec<String>, SamplingError>;

    /// Feed up to `limit` documents of `collection` to `visit`, stopping
    /// early when it breaks. A missing collection yields no documents.
    fn sample(&self, collection: &str, limit: u64, visit: Visitor<'_>) -> Result<(), SamplingError>;
}

/// Fixed documents held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    collections: BTreeMap<String, Vec<Value>>,
    offline: Option<String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: &str, documents: Vec<Value>) -> Self {
        self.collections.insert(name.to_string(), documents);
        self
    }

    /// A source whose ping fails, for exercising connectivity handling.
    pub fn offline(reason: &str) -> Self {
        Self {
            collections: BTreeMap::new(),
            offline: Some(reason.to_string()),
        }
    }
}

impl DocumentSource for InMemorySource {
    fn endpoint(&self) -> String {
        "memory://local".to_string()
    }

    fn database(&self) -> Option<String> {
        None
    }

    fn ping(&self) -> Result<(), SamplingError> {
        match &self.offline {
            Some(reason) => Err(SamplingError::Connectivity {
                endpoint: self.endpoint(),
                message: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn collections(&self) -> Result<Vec<String>, SamplingError> {
        Ok(self.collections.keys().cloned().collect())
    }

    fn sample(&self, collection: &str, limit: u64, visit: Visitor<'_>) -> Result<(), SamplingError> {
        let docs = self.collections.get(collection).map(Vec::as_slice).unwrap_or_default();
        for doc in docs.iter().take(limit as usize) {
            if visit(doc.clone()).is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// A directory of `mongoexport` dumps: `<collection>.json` (a JSON array or
/// one document per line) or `<collection>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    root: PathBuf,
    database: Option<String>,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            database: None,
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    fn file_for(&self, collection: &str) -> Option<PathBuf> {
        ["json", "jsonl"]
            .iter()
            .map(|ext| self.root.join(format!("{collection}.{ext}")))
            .find(|p| p.is_file())
    }
}

fn invalid(collection: &str, message: impl ToString) -> SamplingError {
    SamplingError::InvalidDocument {
        collection: collection.to_string(),
        message: message.to_string(),
    }
}

impl DocumentSource for JsonDirectorySource {
    fn endpoint(&self) -> String {
        redact_connection_string(&format!("file://{}", self.root.display()))
    }

    fn database(&self) -> Option<String> {
        self.database.clone()
    }

    fn ping(&self) -> Result<(), SamplingError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(SamplingError::Connectivity {
                endpoint: self.endpoint(),
                message: "dump directory does not exist".to_string(),
            })
        }
    }

    fn collections(&self) -> Result<Vec<String>, SamplingError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| SamplingError::Connectivity {
            endpoint: self.endpoint(),
            message: e.to_string(),
        })?;
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("json" | "jsonl")))
            .filter_map(|p| stem(&p))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn sample(&self, collection: &str, limit: u64, visit: Visitor<'_>) -> Result<(), SamplingError> {
        let Some(path) = self.file_for(collection) else {
            tracing::debug!(collection, root = %self.root.display(), "no dump for collection");
            return Ok(());
        };
        let file = File::open(&path).map_err(|e| invalid(collection, e))?;
        let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<Value>();
        let mut taken = 0u64;
        for item in stream {
            let value = item.map_err(|e| invalid(collection, e))?;
            // A top-level array is the whole export.
            let docs = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            for doc in docs {
                if taken >= limit {
                    return Ok(());
                }
                taken += 1;
                if visit(doc).is_break() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}
