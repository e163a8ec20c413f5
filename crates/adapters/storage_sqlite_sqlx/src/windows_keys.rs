//! `SQLite` implementation of [`WindowsKeyStore`].
//!
//! The plugin owns two tables outside the migration set: `windowsKeys` and
//! its image association table `windowsKeysAssoc`. Both are created when
//! the plugin is installed and dropped when it is removed.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use fog_app::ports::WindowsKeyStore;
use fog_domain::error::FogError;
use fog_domain::id::{ParseIdError, RecordId};
use fog_domain::windows_key::{KeyFilter, NewWindowsKey, WindowsKey};

use crate::error::StorageError;

const CREATE_KEYS: &str = r"
    CREATE TABLE windowsKeys (
        wkID          INTEGER      PRIMARY KEY AUTOINCREMENT,
        wkName        VARCHAR(255) NOT NULL UNIQUE,
        wkDesc        TEXT         NOT NULL DEFAULT '',
        wkCreatedBy   VARCHAR(40)  NOT NULL DEFAULT '',
        wkCreatedTime TIMESTAMP    NOT NULL DEFAULT CURRENT_TIMESTAMP,
        wkKey         VARCHAR(200) NOT NULL DEFAULT ''
    )
";
const CREATE_ASSOC: &str = r"
    CREATE TABLE windowsKeysAssoc (
        wkaID      INTEGER PRIMARY KEY AUTOINCREMENT,
        wkaImageID INTEGER NOT NULL,
        wkaKeyID   INTEGER NOT NULL,
        UNIQUE (wkaImageID, wkaKeyID)
    )
";
const DROP_KEYS: &str = "DROP TABLE IF EXISTS windowsKeys";
const DROP_ASSOC: &str = "DROP TABLE IF EXISTS windowsKeysAssoc";

const INSERT: &str = r"
    INSERT INTO windowsKeys (wkName, wkDesc, wkCreatedBy, wkKey)
    VALUES (?, ?, ?, ?)
    RETURNING wkID, wkName, wkDesc, wkCreatedBy, CAST(wkCreatedTime AS TEXT) AS wkCreatedTime, wkKey
";
const SELECT_ALL: &str = r"
    SELECT wkID, wkName, wkDesc, wkCreatedBy, CAST(wkCreatedTime AS TEXT) AS wkCreatedTime, wkKey
    FROM windowsKeys ORDER BY wkName
";
const ASSOCIATE: &str =
    "INSERT OR IGNORE INTO windowsKeysAssoc (wkaKeyID, wkaImageID) VALUES (?, ?)";
const SELECT_IMAGES: &str =
    "SELECT wkaImageID FROM windowsKeysAssoc WHERE wkaKeyID = ? ORDER BY wkaID";
const DELETE_ORPHAN_LINKS: &str =
    "DELETE FROM windowsKeysAssoc WHERE wkaKeyID NOT IN (SELECT wkID FROM windowsKeys)";

struct Wrapper(WindowsKey);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("wkID")?;
        let id = RecordId::new(id)
            .ok_or_else(|| sqlx::Error::Decode(Box::new(ParseIdError::NonPositive)))?;

        Ok(Self(WindowsKey {
            id,
            name: row.try_get("wkName")?,
            description: row.try_get("wkDesc")?,
            created_by: row.try_get("wkCreatedBy")?,
            created_time: row.try_get("wkCreatedTime")?,
            key: row.try_get("wkKey")?,
        }))
    }
}

/// `SQLite`-backed Windows key store.
pub struct SqliteWindowsKeyStore {
    pool: SqlitePool,
}

impl SqliteWindowsKeyStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn uninstall(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(DROP_ASSOC).execute(pool).await?;
    sqlx::query(DROP_KEYS).execute(pool).await?;
    Ok(())
}

impl WindowsKeyStore for SqliteWindowsKeyStore {
    fn install(&self) -> impl Future<Output = Result<(), FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            uninstall(&pool).await?;
            sqlx::query(CREATE_KEYS)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            sqlx::query(CREATE_ASSOC)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            tracing::info!("windows key tables created");
            Ok(())
        }
    }

    fn uninstall(&self) -> impl Future<Output = Result<(), FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            uninstall(&pool).await?;
            tracing::info!("windows key tables dropped");
            Ok(())
        }
    }

    fn destroy(&self, filter: KeyFilter) -> impl Future<Output = Result<u64, FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM windowsKeys WHERE 1 = 1");
            if !filter.ids.is_empty() {
                query.push(" AND wkID IN (");
                let mut ids = query.separated(", ");
                for id in &filter.ids {
                    ids.push_bind(id.get());
                }
                ids.push_unseparated(")");
            }
            if let Some(name) = &filter.name {
                query.push(" AND wkName = ").push_bind(name.clone());
            }

            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let removed = query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            sqlx::query(DELETE_ORPHAN_LINKS)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;
            Ok(removed)
        }
    }

    fn create(
        &self,
        key: NewWindowsKey,
    ) -> impl Future<Output = Result<WindowsKey, FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Wrapper = sqlx::query_as(INSERT)
                .bind(&key.name)
                .bind(&key.description)
                .bind(&key.created_by)
                .bind(&key.key)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(row.0)
        }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<WindowsKey>, FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn associate(
        &self,
        key_id: RecordId,
        image_id: RecordId,
    ) -> impl Future<Output = Result<(), FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(ASSOCIATE)
                .bind(key_id.get())
                .bind(image_id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn images_for(
        &self,
        key_id: RecordId,
    ) -> impl Future<Output = Result<Vec<RecordId>, FogError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(i64,)> = sqlx::query_as(SELECT_IMAGES)
                .bind(key_id.get())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().filter_map(|(id,)| RecordId::new(id)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteWindowsKeyStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let store = SqliteWindowsKeyStore::new(db.pool().clone());
        store.install().await.unwrap();
        store
    }

    fn key(name: &str) -> NewWindowsKey {
        NewWindowsKey {
            name: name.to_string(),
            description: "volume licence".to_string(),
            created_by: "fog".to_string(),
            key: "W269N-WFGWX-YVC9B-4J6C9-T83GX".to_string(),
        }
    }

    fn id(raw: i64) -> RecordId {
        RecordId::new(raw).unwrap()
    }

    async fn tables(store: &SqliteWindowsKeyStore) -> Vec<String> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'windowsKeys%' ORDER BY name",
        )
        .fetch_all(&store.pool)
        .await
        .unwrap();
        rows.into_iter().map(|row| row.0).collect()
    }

    #[tokio::test]
    async fn should_create_both_tables_on_install() {
        let store = setup().await;
        assert_eq!(tables(&store).await, vec!["windowsKeys", "windowsKeysAssoc"]);
    }

    #[tokio::test]
    async fn should_start_empty_after_reinstall() {
        let store = setup().await;
        store.create(key("pro")).await.unwrap();
        store.install().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_drop_both_tables_on_uninstall() {
        let store = setup().await;
        store.uninstall().await.unwrap();
        assert!(tables(&store).await.is_empty());
    }

    #[tokio::test]
    async fn should_store_key_with_creation_time() {
        let store = setup().await;
        let stored = store.create(key("pro")).await.unwrap();
        assert_eq!(stored.name, "pro");
        assert_eq!(stored.created_by, "fog");
        assert!(!stored.created_time.is_empty());
    }

    #[tokio::test]
    async fn should_reject_duplicate_key_name() {
        let store = setup().await;
        store.create(key("pro")).await.unwrap();
        assert!(store.create(key("pro")).await.is_err());
    }

    #[tokio::test]
    async fn should_destroy_keys_and_their_associations() {
        let store = setup().await;
        let pro = store.create(key("pro")).await.unwrap();
        let home = store.create(key("home")).await.unwrap();
        store.associate(pro.id, id(1)).await.unwrap();
        store.associate(pro.id, id(2)).await.unwrap();
        store.associate(home.id, id(1)).await.unwrap();

        let removed = store
            .destroy(KeyFilter {
                ids: vec![pro.id],
                name: None,
            })
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.images_for(pro.id).await.unwrap().is_empty());
        assert_eq!(store.images_for(home.id).await.unwrap(), vec![id(1)]);
    }

    #[tokio::test]
    async fn should_destroy_by_name() {
        let store = setup().await;
        store.create(key("pro")).await.unwrap();
        store.create(key("home")).await.unwrap();
        let removed = store
            .destroy(KeyFilter {
                ids: Vec::new(),
                name: Some("home".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|k| k.name).collect();
        assert_eq!(names, vec!["pro"]);
    }

    #[tokio::test]
    async fn should_ignore_repeated_association() {
        let store = setup().await;
        let pro = store.create(key("pro")).await.unwrap();
        store.associate(pro.id, id(4)).await.unwrap();
        store.associate(pro.id, id(4)).await.unwrap();
        assert_eq!(store.images_for(pro.id).await.unwrap(), vec![id(4)]);
    }
}
