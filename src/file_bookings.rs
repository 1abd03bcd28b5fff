use crate::{
    backend::{ensure_insertable, is_within, sort_by_start, BookingBackend},
    error::{BookingError, BookingResult},
    types::Booking,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::{
    collections::HashMap,
    fmt::Display,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tempfile::NamedTempFile;
use tracing::{error, info};
use uuid::Uuid;

lazy_static! {
    /// One lock per booking file, shared by every store opened on that path.
    static ref FILE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = FILE_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(path.to_path_buf()).or_default().clone()
}

/// Bookings kept as one JSON array in a single file.
///
/// Every mutation reads the file, checks, and replaces the file atomically
/// while holding the lock of that path, so writers in this process never
/// interleave. The lock is per process: two processes sharing one file can
/// both pass the overlap check and the later write wins. Run a single
/// service instance per file.
#[derive(Debug, Clone)]
pub struct FileBookings {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

fn storage_error(context: &str, err: impl Display) -> BookingError {
    error!(%err, "{context}");
    BookingError::Storage(context.into())
}

impl FileBookings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "Using file backed bookings");
        Self {
            lock: file_lock(&path),
            path: Arc::new(path),
        }
    }

    fn guard(&self) -> BookingResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|err| storage_error("Booking file lock poisoned", err))
    }

    fn load(&self) -> BookingResult<Vec<Booking>> {
        let contents = match fs::read_to_string(self.path.as_path()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(storage_error("Failed to read booking file", err)),
        };
        if contents.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&contents)
            .map_err(|err| storage_error("Failed to parse booking file", err))
    }

    fn store(&self, bookings: &[Booking]) -> BookingResult<()> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(directory)
            .map_err(|err| storage_error("Failed to create temporary booking file", err))?;
        serde_json::to_writer_pretty(&mut file, bookings)
            .map_err(|err| storage_error("Failed to serialize bookings", err))?;
        file.flush()
            .map_err(|err| storage_error("Failed to write booking file", err))?;
        file.persist(self.path.as_path())
            .map_err(|err| storage_error("Failed to replace booking file", err))?;
        Ok(())
    }
}

impl BookingBackend for FileBookings {
    fn bookings(&self) -> BookingResult<Vec<Booking>> {
        let _guard = self.guard()?;
        let mut bookings = self.load()?;
        sort_by_start(&mut bookings);
        Ok(bookings)
    }

    fn list_by_professional_between(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>> {
        let mut bookings = self.bookings()?;
        bookings.retain(|booking| is_within(booking, professional_id, from, until));
        Ok(bookings)
    }

    fn insert(&self, booking: Booking) -> BookingResult<()> {
        let _guard = self.guard()?;
        let mut bookings = self.load()?;
        ensure_insertable(&bookings, &booking)?;
        bookings.push(booking);
        self.store(&bookings)
    }

    fn remove(&self, id: Uuid) -> BookingResult<Booking> {
        let _guard = self.guard()?;
        let mut bookings = self.load()?;
        let index = bookings
            .iter()
            .position(|booking| booking.id == id)
            .ok_or(BookingError::NotFound { id })?;
        let booking = bookings.remove(index);
        self.store(&bookings)?;
        Ok(booking)
    }
}
