//! `SQLite` implementation of [`RecordRepository`].
//!
//! All classes live in one `records` table keyed by `(class, id)`. Fields
//! are stored as a JSON object, and filters are evaluated after loading
//! the rows of a class so that loose value comparison behaves the same as
//! in memory. Ids come from `record_sequences` and are never reused.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fog_app::ports::RecordRepository;
use fog_domain::error::{FogError, NotFoundError};
use fog_domain::id::{ParseIdError, RecordId};
use fog_domain::record::{Fields, Filter, Record};

use crate::error::StorageError;

/// Wrapper for converting database rows into [`Record`]s.
struct Wrapper(Record);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Record> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let class: String = row.try_get("class")?;
        let id: i64 = row.try_get("id")?;
        let fields: String = row.try_get("fields")?;

        let id = RecordId::new(id)
            .ok_or_else(|| sqlx::Error::Decode(Box::new(ParseIdError::NonPositive)))?;
        let fields: Fields =
            serde_json::from_str(&fields).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Record::new(class, id, fields)))
    }
}

const NEXT_ID: &str = r"
    INSERT INTO record_sequences (class, last_id) VALUES (?, 1)
    ON CONFLICT (class) DO UPDATE SET last_id = last_id + 1
    RETURNING last_id
";
const INSERT: &str = "INSERT INTO records (class, id, fields) VALUES (?, ?, ?) RETURNING class, id, fields";

const SELECT_BY_ID: &str = "SELECT class, id, fields FROM records WHERE class = ? AND id = ?";
const SELECT_BY_CLASS: &str = "SELECT class, id, fields FROM records WHERE class = ? ORDER BY id";
const UPDATE: &str = "UPDATE records SET fields = ? WHERE class = ? AND id = ?";
const DELETE_BY_ID: &str = "DELETE FROM records WHERE class = ? AND id = ?";

/// `SQLite`-backed record repository.
pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn insert(
        &self,
        class: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<Record, FogError>> + Send {
        let pool = self.pool.clone();
        let class = class.to_string();
        async move {
            let json = serde_json::to_string(&fields).map_err(StorageError::from)?;
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let (id,): (i64,) = sqlx::query_as(NEXT_ID)
                .bind(&class)
                .fetch_one(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            let row: Wrapper = sqlx::query_as(INSERT)
                .bind(&class)
                .bind(id)
                .bind(json)
                .fetch_one(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;
            tracing::trace!(%class, id = %row.0.id, "record inserted");
            Ok(row.0)
        }
    }

    fn get(
        &self,
        class: &str,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, FogError>> + Send {
        let pool = self.pool.clone();
        let class = class.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(class)
                .bind(id.get())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find(
        &self,
        class: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Record>, FogError>> + Send {
        let pool = self.pool.clone();
        let class = class.to_string();
        let filter = filter.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_CLASS)
                .bind(class)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows
                .into_iter()
                .map(|w| w.0)
                .filter(|record| filter.matches(record))
                .collect())
        }
    }

    fn update(&self, record: Record) -> impl Future<Output = Result<Record, FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            let json = serde_json::to_string(&record.fields).map_err(StorageError::from)?;
            let result = sqlx::query(UPDATE)
                .bind(json)
                .bind(&record.class)
                .bind(record.id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError::new(record.class, record.id).into());
            }
            Ok(record)
        }
    }

    fn delete(
        &self,
        class: &str,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<u64, FogError>> + Send {
        let pool = self.pool.clone();
        let class = class.to_string();
        let ids = ids.to_vec();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let mut removed = 0;
            for id in ids {
                removed += sqlx::query(DELETE_BY_ID)
                    .bind(&class)
                    .bind(id.get())
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?
                    .rows_affected();
            }
            tx.commit().await.map_err(StorageError::from)?;
            Ok(removed)
        }
    }
}
