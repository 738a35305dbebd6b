//! Append-only line stores backing the registry.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    string::FromUtf8Error,
    sync::Arc,
};

use parking_lot::Mutex;

use crate::config::AppConfig;

/// One line read back from a store. Lines that are not valid UTF-8 are kept
/// as errors so a reader can drop them without losing the rest of the store.
pub type StoredLine = Result<String, FromUtf8Error>;

/// A line-oriented, append-only log for one entity kind.
pub trait LineStore: Send + Sync {
    /// Every line currently in the store, in append order. A store that does
    /// not exist yet reads as empty.
    fn read_lines(&self) -> io::Result<Vec<StoredLine>>;

    /// Append one line and make it durable before returning.
    fn append_line(&self, line: &str) -> io::Result<()>;

    /// Human readable location used in logs and errors.
    fn location(&self) -> String;
}

/// Store backed by a text file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineStore for FileStore {
    fn read_lines(&self) -> io::Result<Vec<StoredLine>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut lines = Vec::new();
        for raw in BufReader::new(file).split(b'\n') {
            let mut raw = raw?;
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            lines.push(String::from_utf8(raw));
        }
        Ok(lines)
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.sync_data()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store. Clones share the same lines.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `lines`.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Arc::new(Mutex::new(lines.into_iter().map(Into::into).collect())),
        }
    }

    /// Snapshot of the current contents.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LineStore for MemoryStore {
    fn read_lines(&self) -> io::Result<Vec<StoredLine>> {
        Ok(self.lines().into_iter().map(Ok).collect())
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Which of the three stores an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Vehicle store.
    Vehicles,
    /// Customer store.
    Customers,
    /// Rental-record store.
    Records,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vehicles => "vehicle store",
            Self::Customers => "customer store",
            Self::Records => "rental-record store",
        })
    }
}

/// The three stores a registry persists to.
pub struct Stores {
    vehicles: Box<dyn LineStore>,
    customers: Box<dyn LineStore>,
    records: Box<dyn LineStore>,
}

impl Stores {
    /// Bundle three stores.
    pub fn new(
        vehicles: impl LineStore + 'static,
        customers: impl LineStore + 'static,
        records: impl LineStore + 'static,
    ) -> Self {
        Self {
            vehicles: Box::new(vehicles),
            customers: Box::new(customers),
            records: Box::new(records),
        }
    }

    /// File stores at the locations named by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let paths = config.store_paths();
        Self::new(
            FileStore::new(paths.vehicles),
            FileStore::new(paths.customers),
            FileStore::new(paths.records),
        )
    }

    /// File stores with the default file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&AppConfig::default().with_data_dir(dir))
    }

    /// Borrow the store for `kind`.
    pub fn get(&self, kind: StoreKind) -> &dyn LineStore {
        match kind {
            StoreKind::Vehicles => self.vehicles.as_ref(),
            StoreKind::Customers => self.customers.as_ref(),
            StoreKind::Records => self.records.as_ref(),
        }
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores")
            .field("vehicles", &self.vehicles.location())
            .field("customers", &self.customers.location())
            .field("records", &self.records.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn text(store: &dyn LineStore) -> Result<Vec<String>> {
        Ok(store.read_lines()?.into_iter().collect::<Result<_, _>>()?)
    }

    #[test]
    fn missing_file_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("absent.txt"));
        assert!(store.read_lines()?.is_empty());
        Ok(())
    }

    #[test]
    fn appends_create_parent_directories() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("nested/data/log.txt"));
        store.append_line("first")?;
        store.append_line("second")?;
        assert_eq!(text(&store)?, vec!["first", "second"]);
        assert_eq!(fs::read_to_string(store.path())?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn memory_store_clones_share_lines() -> Result<()> {
        let store = MemoryStore::with_lines(["a"]);
        let handle = store.clone();
        handle.append_line("b")?;
        assert_eq!(text(&store)?, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn undecodable_lines_do_not_hide_their_neighbours() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("mixed.txt");
        fs::write(&path, b"first\r\nbad \xff line\nlast")?;

        let lines = FileStore::new(&path).read_lines()?;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_deref().ok(), Some("first"));
        assert!(lines[1].is_err());
        assert_eq!(lines[2].as_deref().ok(), Some("last"));
        Ok(())
    }

    #[test]
    fn stores_in_dir_use_default_file_names() {
        let stores = Stores::in_dir("/srv/rental");
        assert!(stores
            .get(StoreKind::Vehicles)
            .location()
            .ends_with("vehicles.txt"));
        assert!(stores
            .get(StoreKind::Records)
            .location()
            .ends_with("rental_records.txt"));
    }
}
