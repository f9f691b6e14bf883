use serde_json::{Map, Value};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::{AppResult, store::{Collection, StoreRecord}};

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        // an in-memory database dies with its connection
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(database_url)
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            attributes TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(db_pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS records_collection ON records (collection, id)")
        .execute(db_pool)
        .await?;
    Ok(())
}

type Row = (i64, String, String);

fn to_record((id, attributes, created_at): Row) -> AppResult<StoreRecord> {
    let mut attributes: Map<String, Value> = serde_json::from_str(&attributes)?;
    attributes.insert("createdAt".to_owned(), Value::String(created_at));
    Ok(StoreRecord { id, attributes })
}

pub(crate) async fn insert(
    db_pool: &SqlitePool,
    collection: Collection,
    attributes: &Map<String, Value>,
) -> AppResult<StoreRecord> {
    let row: Row = sqlx::query_as(
        "INSERT INTO records (collection, attributes) VALUES (?, ?) RETURNING id, attributes, created_at",
    )
    .bind(collection.path())
    .bind(serde_json::to_string(attributes)?)
    .fetch_one(db_pool)
    .await?;
    to_record(row)
}

pub(crate) async fn list(db_pool: &SqlitePool, collection: Collection) -> AppResult<Vec<StoreRecord>> {
    let rows: Vec<Row> =
        sqlx::query_as("SELECT id, attributes, created_at FROM records WHERE collection=? ORDER BY id")
            .bind(collection.path())
            .fetch_all(db_pool)
            .await?;
    rows.into_iter().map(to_record).collect()
}

pub(crate) async fn delete(db_pool: &SqlitePool, collection: Collection, id: i64) -> AppResult<Option<StoreRecord>> {
    let row: Option<Row> =
        sqlx::query_as("DELETE FROM records WHERE collection=? AND id=? RETURNING id, attributes, created_at")
            .bind(collection.path())
            .bind(id)
            .fetch_optional(db_pool)
            .await?;
    row.map(to_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fields;

    async fn test_pool() -> SqlitePool {
        connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_list_delete() {
        let db_pool = test_pool().await;
        let first = insert(&db_pool, Collection::Messages, &fields([("sender", "alice"), ("body", "hi")]))
            .await
            .unwrap();
        let second = insert(&db_pool, Collection::Messages, &fields([("sender", "bob"), ("body", "yo")]))
            .await
            .unwrap();
        insert(&db_pool, Collection::ActiveUsers, &fields([("username", "alice")]))
            .await
            .unwrap();

        let listed = list(&db_pool, Collection::Messages).await.unwrap();
        assert_eq!(listed, vec![first.clone(), second.clone()]);
        assert!(first.str_attr("createdAt").is_some());

        let deleted = delete(&db_pool, Collection::Messages, first.id).await.unwrap();
        assert_eq!(deleted, Some(first.clone()));
        assert_eq!(delete(&db_pool, Collection::Messages, first.id).await.unwrap(), None);
        assert_eq!(list(&db_pool, Collection::Messages).await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_collection() {
        let db_pool = test_pool().await;
        let user = insert(&db_pool, Collection::ActiveUsers, &fields([("username", "alice")]))
            .await
            .unwrap();
        assert_eq!(delete(&db_pool, Collection::Accounts, user.id).await.unwrap(), None);
        assert_eq!(list(&db_pool, Collection::ActiveUsers).await.unwrap().len(), 1);
    }
}
