//! Sample record store used to populate a source database
//!
//! Holds a `people` table filled with synthetic rows. Row generation is
//! seedable (`SQLSHIP_SEED` or [`SampleStore::with_seed`]) so test runs are
//! reproducible.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, Transaction, params};

use sqlship_core::log::LogSink;

use crate::dump;
use crate::error::{StoreError, StoreResult};

/// Environment variable holding a deterministic RNG seed
pub const SEED_ENV: &str = "SQLSHIP_SEED";

/// Timestamp layout of store file names
pub const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const FIRST_NAMES: [&str; 10] = [
    "Anna", "David", "Maya", "Liam", "Sophie", "Alex", "Nora", "Arman", "Karen", "Sara",
];

const LAST_NAMES: [&str; 10] = [
    "Petrosyan",
    "Smith",
    "Johnson",
    "Grigoryan",
    "Brown",
    "Martirosian",
    "Lee",
    "Garcia",
    "Ivanov",
    "Khan",
];

const CREATE_PEOPLE: &str = "CREATE TABLE IF NOT EXISTS people(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    created_at TEXT
);";

const INSERT_PERSON: &str =
    "INSERT INTO people (first_name, last_name, email, created_at) VALUES (?1, ?2, ?3, ?4)";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Person {
    first_name: &'static str,
    last_name: &'static str,
    email: String,
    created_at: String,
}

/// SQLite database holding synthetic `people` rows
pub struct SampleStore {
    conn: Connection,
    path: PathBuf,
    rng: StdRng,
    log: Arc<dyn LogSink>,
}

impl SampleStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>, log: Arc<dyn LogSink>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        log.info(&format!("Opening SQLite database: {}", path.display()));

        let conn = Connection::open(&path).map_err(|source| {
            log.error(&format!("Can't open SQLite DB: {}", source));
            StoreError::Open {
                path: path.clone(),
                source,
            }
        })?;

        let rng = match std::env::var(SEED_ENV) {
            Ok(value) => {
                let seed = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| StoreError::InvalidSeed {
                        value: value.clone(),
                    })?;
                log.info(&format!("Using deterministic RNG seed from {}", SEED_ENV));
                StdRng::seed_from_u64(seed)
            }
            Err(_) => StdRng::seed_from_u64(rand::random()),
        };

        Ok(Self {
            conn,
            path,
            rng,
            log,
        })
    }

    /// Open a new store at `<prefix>_<YYYY-MM-DD_HH-MM-SS>.sqlite`
    pub fn open_timestamped(prefix: &str, log: Arc<dyn LogSink>) -> StoreResult<Self> {
        let path = format!(
            "{}_{}.sqlite",
            prefix,
            Local::now().format(STORE_TIMESTAMP_FORMAT)
        );
        Self::open(path, log)
    }

    /// Replace the RNG with a deterministic one
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the `people` table if it does not exist
    pub fn create_table(&self) -> StoreResult<()> {
        self.log.info("Creating table 'people' if not exists...");
        self.conn.execute_batch(CREATE_PEOPLE).map_err(|e| {
            self.log.error(&format!("Failed to create table: {}", e));
            StoreError::from(e)
        })?;
        self.log.info("Table 'people' ready.");
        Ok(())
    }

    /// Insert `count` synthetic rows in a single transaction.
    ///
    /// Nothing is inserted if any row fails.
    pub fn insert_random_rows(&mut self, count: usize) -> StoreResult<usize> {
        self.log.info(&format!("Inserting {} random rows...", count));

        let tx = self.conn.transaction()?;
        match insert_people(&tx, &mut self.rng, count) {
            Ok(()) => {
                tx.commit()?;
                self.log.info(&format!("Inserted {} rows successfully.", count));
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    self.log.warn(&format!(
                        "Rollback after failed insert also failed: {}",
                        rollback
                    ));
                }
                self.log.error(&format!(
                    "Transaction rolled back due to error during insert_random_rows: {}",
                    e
                ));
                Err(e.into())
            }
        }
    }

    /// Number of rows in `people`
    pub fn row_count(&self) -> StoreResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
        self.log.info(&format!("Current row count: {}", count));
        Ok(count)
    }

    /// Write the table as SQL `INSERT` statements
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> StoreResult<usize> {
        dump::dump_to_file(&self.conn, path.as_ref(), self.log.as_ref())
    }
}

fn insert_people(tx: &Transaction<'_>, rng: &mut StdRng, count: usize) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(INSERT_PERSON)?;
    for _ in 0..count {
        let person = random_person(rng);
        stmt.execute(params![
            person.first_name,
            person.last_name,
            person.email,
            person.created_at
        ])?;
    }
    Ok(())
}

fn random_person(rng: &mut StdRng) -> Person {
    let first_name = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
    let last_name = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
    let suffix: u32 = rng.random_range(0..=9999);

    Person {
        first_name,
        last_name,
        email: format!("{}.{}{}@example.com", first_name, last_name, suffix),
        created_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    }
}
