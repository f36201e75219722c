use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Size at which the log file is rotated (128 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 128 * 1024 * 1024;

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Append-only log file that is moved aside once it would grow past `max_size`.
///
/// A rotated file keeps its stem and extension with the UTC rotation time
/// in between (`entry.log` becomes `entry-2024-01-31T09-15-00.000.log`).
/// Backups are never pruned.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    /// Open (or create) the file at `path`, creating missing parent directories.
    pub fn open(path: impl Into<PathBuf>, max_size: u64) -> io::Result<Self> {
        let mut rotating = Self {
            path: path.into(),
            max_size,
            file: None,
            size: 0,
        };
        rotating.open_existing()?;
        Ok(rotating)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes currently held by the active file
    #[cfg(test)]
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    fn open_existing(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    /// Close the active file, move it to a timestamped backup and start a new one.
    pub fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.path.exists() {
            std::fs::rename(&self.path, self.backup_path())?;
        }

        self.open_existing()
    }

    /// Timestamped name for the rotated file. A numeric suffix is added when
    /// an earlier rotation in the same millisecond already took the name.
    fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log");
        let ext = self.path.extension().and_then(|e| e.to_str());
        let timestamp = Utc::now().format(BACKUP_TIME_FORMAT).to_string();

        let mut attempt = 0u32;
        loop {
            let base = match attempt {
                0 => format!("{}-{}", stem, timestamp),
                n => format!("{}-{}-{}", stem, timestamp, n),
            };
            let name = match ext {
                Some(ext) => format!("{}.{}", base, ext),
                None => base,
            };

            let candidate = self.path.with_file_name(name);
            if !candidate.exists() {
                return candidate;
            }
            attempt += 1;
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if len > self.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.max_size
                ),
            ));
        }

        if self.file.is_none() {
            self.open_existing()?;
        }
        if self.size + len > self.max_size {
            self.rotate()?;
        }

        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::new(io::ErrorKind::NotFound, "log file is closed")),
        };
        let written = file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Shareable handle to a [`RotatingFile`], usable as a `tracing` writer.
#[derive(Debug, Clone)]
pub struct RotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingWriter {
    pub fn new(file: RotatingFile) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }

    /// Run `f` with the underlying file locked
    pub fn with_file<T>(&self, f: impl FnOnce(&mut RotatingFile) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard)
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backups(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some("entry.log"))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("entry.log");

        let file = RotatingFile::open(&path, DEFAULT_MAX_SIZE).unwrap();
        assert!(path.exists());
        assert_eq!(file.path(), path.as_path());
        assert_eq!(file.max_size(), 128 * 1024 * 1024);
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.log");
        std::fs::write(&path, "first\n").unwrap();

        let mut file = RotatingFile::open(&path, 1024).unwrap();
        assert_eq!(file.size(), 6);
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert!(backups(dir.path()).is_empty());
    }

    #[test]
    fn test_rotates_when_write_would_exceed_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.log");

        let mut file = RotatingFile::open(&path, 16).unwrap();
        file.write_all(b"0123456789\n").unwrap();
        file.write_all(b"abcdefghij\n").unwrap();
        file.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abcdefghij\n");
        assert_eq!(file.size(), 11);

        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 1);
        let name = rotated[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("entry-"), "unexpected backup name {name}");
        assert!(name.ends_with(".log"), "unexpected backup name {name}");
        assert_eq!(std::fs::read_to_string(&rotated[0]).unwrap(), "0123456789\n");
    }

    #[test]
    fn test_write_exactly_at_limit_does_not_rotate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.log");

        let mut file = RotatingFile::open(&path, 8).unwrap();
        file.write_all(b"1234").unwrap();
        file.write_all(b"5678").unwrap();

        assert_eq!(file.size(), 8);
        assert!(backups(dir.path()).is_empty());
    }

    #[test]
    fn test_rotations_in_quick_succession_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.log");

        let mut file = RotatingFile::open(&path, 1024).unwrap();
        for chunk in ["one\n", "two\n", "three\n"] {
            file.write_all(chunk.as_bytes()).unwrap();
            file.rotate().unwrap();
        }

        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 3, "{rotated:?}");

        let mut contents: Vec<String> = rotated
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["one\n", "three\n", "two\n"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_oversized_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RotatingFile::open(dir.path().join("entry.log"), 4).unwrap();

        let err = file.write(b"too long").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn test_writer_handles_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.log");
        let writer = RotatingWriter::new(RotatingFile::open(&path, 1024).unwrap());

        let mut a = writer.make_writer();
        let mut b = writer.make_writer();
        a.write_all(b"a\n").unwrap();
        b.write_all(b"b\n").unwrap();

        assert_eq!(writer.with_file(|f| f.size()), 4);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}
