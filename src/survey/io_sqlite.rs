// Storage of the responses in a SQLite database.

use crate::survey::*;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rusqlite::types::FromSql;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    organization TEXT,
    org_size TEXT,
    org_type TEXT,
    location TEXT,
    q1 TEXT,
    q2 TEXT,
    q3 TEXT,
    q4 TEXT,
    q5 TEXT,
    submitted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const INSERT_RESPONSE: &str = r#"
INSERT INTO responses (name, organization, org_size, org_type, location, q1, q2, q3, q4, q5)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
RETURNING id, submitted_at
"#;

const SELECT_RESPONSES: &str = r#"
SELECT id, name, organization, org_size, org_type, location, q1, q2, q3, q4, q5, submitted_at
FROM responses
ORDER BY submitted_at DESC, id DESC
"#;

pub struct SqliteStore {
    conn: Connection,
}

/// Creates the `responses` table if it does not exist yet.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(CREATE_TABLE, [])?;
    Ok(())
}

fn unavailable(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::Unavailable {
        operation,
        source: Box::new(e),
    }
}

impl SqliteStore {
    /// Opens the database for writing, creating the file and the table if needed.
    pub fn open(db_path: &str) -> SurveyResult<SqliteStore> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context(WritingSnafu {
                    path: parent.display().to_string(),
                })?;
            }
        }
        info!("Opening database {:?}", db_path);
        let conn = Connection::open(db_path).context(OpeningDatabaseSnafu { path: db_path })?;
        init_schema(&conn).context(OpeningDatabaseSnafu { path: db_path })?;
        Ok(SqliteStore { conn })
    }

    /// Opens an existing database without creating anything. Readers of the
    /// results never change the file.
    pub fn open_read_only(db_path: &str) -> Result<SqliteStore, StoreError> {
        debug!("Opening database {:?} in read-only mode", db_path);
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(unavailable("open"))?;
        Ok(SqliteStore { conn })
    }

    #[cfg(test)]
    fn in_memory(with_table: bool) -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        if with_table {
            init_schema(&conn).unwrap();
        }
        SqliteStore { conn }
    }
}

// Rows without a readable submission time are skipped, the others still load.
fn read_row(row: &Row) -> rusqlite::Result<Option<RespondentAnswer>> {
    let id: ResponseId = row.get(0)?;
    let submitted_at = match Option::<NaiveDateTime>::column_result(row.get_ref(11)?) {
        Ok(Some(ts)) => ts,
        Ok(None) => {
            warn!("Skipping response {}: no submission time", id);
            return Ok(None);
        }
        Err(e) => {
            warn!("Skipping response {}: cannot read submission time: {}", id, e);
            return Ok(None);
        }
    };
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    let q1: Option<String> = row.get(6)?;
    let q2: Option<String> = row.get(7)?;
    let q3: Option<String> = row.get(8)?;
    let q4: Option<String> = row.get(9)?;
    let q5: Option<String> = row.get(10)?;
    Ok(Some(RespondentAnswer {
        id,
        name: text(1)?,
        organization: text(2)?,
        org_size: text(3)?,
        org_type: text(4)?,
        location: text(5)?,
        answers: Answers::decode([
            q1.as_deref(),
            q2.as_deref(),
            q3.as_deref(),
            q4.as_deref(),
            q5.as_deref(),
        ]),
        submitted_at,
    }))
}

impl ResponseStore for SqliteStore {
    fn insert(&mut self, response: &NewResponse) -> Result<RespondentAnswer, StoreError> {
        let a = &response.answers;
        let (id, submitted_at): (ResponseId, NaiveDateTime) = self
            .conn
            .query_row(
                INSERT_RESPONSE,
                params![
                    response.name,
                    response.organization,
                    response.org_size,
                    response.org_type,
                    response.location,
                    a.encoded(QuestionId::Q1),
                    a.encoded(QuestionId::Q2),
                    a.encoded(QuestionId::Q3),
                    a.encoded(QuestionId::Q4),
                    a.encoded(QuestionId::Q5),
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(unavailable("insert"))?;
        debug!("SqliteStore::insert: row {} at {}", id, submitted_at);
        Ok(RespondentAnswer::from_new(id, submitted_at, response))
    }

    fn load_all(&self) -> Result<Vec<RespondentAnswer>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(SELECT_RESPONSES)
            .map_err(unavailable("select"))?;
        let rows = stmt
            .query_map([], read_row)
            .map_err(unavailable("select"))?
            .collect::<rusqlite::Result<Vec<Option<RespondentAnswer>>>>()
            .map_err(unavailable("select"))?
            .into_iter()
            .flatten()
            .collect::<Vec<RespondentAnswer>>();
        debug!("SqliteStore::load_all: {} rows", rows.len());
        Ok(rows)
    }
}
