// ********* Persistence ***********

use chrono::{Timelike, Utc};
use log::{debug, warn};
use snafu::Snafu;

use crate::config::*;

/// Errors raised by a response store. They all mean that the store could not be
/// reached or used: connection refused, missing table, failed query.
#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("Response store unavailable during {operation}: {source}"))]
    Unavailable {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The `responses` table.
///
/// Only two operations exist: appending one row, and reading every row. Rows are
/// never updated or deleted.
pub trait ResponseStore {
    /// Appends one row. The store assigns the id and the submission time.
    fn insert(&mut self, response: &NewResponse) -> Result<RespondentAnswer, StoreError>;

    /// All the rows, most recent submission first.
    fn load_all(&self) -> Result<Vec<RespondentAnswer>, StoreError>;
}

/// A store that keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: Vec<RespondentAnswer>,
    last_id: ResponseId,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Starts from existing rows, for example to replay a table.
    pub fn with_rows(rows: Vec<RespondentAnswer>) -> MemoryStore {
        let last_id = rows.iter().map(|r| r.id).max().unwrap_or(0);
        MemoryStore { rows, last_id }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ResponseStore for MemoryStore {
    fn insert(&mut self, response: &NewResponse) -> Result<RespondentAnswer, StoreError> {
        self.last_id += 1;
        // Same resolution as a CURRENT_TIMESTAMP column.
        let now = Utc::now().naive_utc();
        let submitted_at = now.with_nanosecond(0).unwrap_or(now);
        let row = RespondentAnswer::from_new(self.last_id, submitted_at, response);
        debug!("MemoryStore::insert: row {}", row.id);
        self.rows.push(row.clone());
        Ok(row)
    }

    fn load_all(&self) -> Result<Vec<RespondentAnswer>, StoreError> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }
}

/// What a dashboard has to show.
#[derive(Debug)]
pub enum Dataset {
    Responses(Vec<RespondentAnswer>),
    /// The table exists but holds no response yet.
    Empty,
    /// The store could not be read. Displayed like an empty table.
    Unavailable(StoreError),
}

impl Dataset {
    pub fn rows(&self) -> &[RespondentAnswer] {
        match self {
            Dataset::Responses(rows) => rows,
            _ => &[],
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(self, Dataset::Responses(_))
    }
}

/// Reads the whole table. Failures do not propagate: they turn into a dataset
/// without rows.
pub fn load_dataset<S: ResponseStore + ?Sized>(store: &S) -> Dataset {
    match store.load_all() {
        Ok(rows) if rows.is_empty() => Dataset::Empty,
        Ok(rows) => {
            debug!("load_dataset: {} responses", rows.len());
            Dataset::Responses(rows)
        }
        Err(e) => {
            warn!("load_dataset: no data available: {}", e);
            Dataset::Unavailable(e)
        }
    }
}
