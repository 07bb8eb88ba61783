//! Persistence for task records.
//!
//! Tasks live in a single `tasks` table created by the embedded migrations.
//! Every call checks a connection out of the pool for the duration of one
//! statement and returns it when the statement completes or fails.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{Priority, StatusFilter, TaskListItem, TaskResponse};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Sqlite};

pub type DbPool = Pool<Sqlite>;

pub static MIGRATOR: Migrator = sqlx::migrate!();

const TASK_COLUMNS: &str = "id, user_id, title, description, completed, due_date, priority, \
                            categories, created_at, updated_at";

/// Opens a pool for `database_url` and applies pending migrations.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database. The connection is never recycled, so
/// the data lives as long as the pool.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskRecord {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub categories: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn priority(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(|p| p.parse().ok())
    }

    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_ref().map(|Json(c)| c.as_slice())
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = Some(priority.as_str().to_string());
    }

    pub fn set_categories(&mut self, categories: Vec<String>) {
        self.categories = Some(Json(categories));
    }
}

impl From<TaskRecord> for TaskResponse {
    fn from(record: TaskRecord) -> Self {
        let priority = record.priority();
        Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            description: record.description,
            completed: record.completed,
            due_date: record.due_date,
            priority,
            categories: record.categories.map(|Json(c)| c),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<TaskRecord> for TaskListItem {
    fn from(record: TaskRecord) -> Self {
        let priority = record.priority();
        Self {
            id: record.id,
            title: record.title,
            completed: record.completed,
            priority,
            due_date: record.due_date,
            categories: record.categories.map(|Json(c)| c),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub categories: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: DbPool,
}

impl TaskStore {
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, task: NewTask) -> Result<TaskRecord, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tasks (user_id, title, description, completed, due_date, priority, \
             categories, created_at, updated_at) \
             VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?) RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(task.user_id)
            .bind(task.title)
            .bind(task.description)
            .bind(task.due_date)
            .bind(task.priority.map(Priority::as_str))
            .bind(task.categories.map(Json))
            .bind(task.created_at)
            .bind(task.created_at)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, sqlx::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        sqlx::query_as::<_, TaskRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// The user's tasks passing `filter`, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        filter: StatusFilter,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        const ORDER: &str = "ORDER BY created_at DESC, id DESC";
        match filter.completed() {
            None => {
                let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? {ORDER}");
                sqlx::query_as::<_, TaskRecord>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(completed) => {
                let sql = format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? AND completed = ? {ORDER}"
                );
                sqlx::query_as::<_, TaskRecord>(&sql)
                    .bind(user_id)
                    .bind(completed)
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    /// Writes every mutable column of `record` back. `id`, `user_id` and
    /// `created_at` are never rewritten.
    pub async fn save(&self, record: &TaskRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, completed = ?, due_date = ?, \
             priority = ?, categories = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.completed)
        .bind(record.due_date)
        .bind(&record.priority)
        .bind(record.categories.clone())
        .bind(record.updated_at)
        .bind(record.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, minute, 0).unwrap()
    }

    fn new_task(user_id: &str, title: &str, created_at: DateTime<Utc>) -> NewTask {
        NewTask {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            priority: None,
            categories: None,
            created_at,
        }
    }

    async fn store() -> TaskStore {
        TaskStore::new(connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn insert_round_trips_every_column() {
        let store = store().await;
        let inserted = store
            .insert(NewTask {
                description: Some("2 litres".into()),
                due_date: Some(at(30)),
                priority: Some(Priority::High),
                categories: Some(vec!["shopping".into(), "errands".into()]),
                ..new_task("alice", "Buy milk", at(0))
            })
            .await
            .unwrap();

        assert_eq!(inserted.id, 1);
        assert!(!inserted.completed);
        assert_eq!(inserted.created_at, inserted.updated_at);

        let found = store.find_by_id(inserted.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, "alice");
        assert_eq!(found.description.as_deref(), Some("2 litres"));
        assert_eq!(found.due_date, Some(at(30)));
        assert_eq!(found.priority(), Some(Priority::High));
        assert_eq!(
            found.categories(),
            Some(&["shopping".to_string(), "errands".to_string()][..])
        );
    }

    #[tokio::test]
    async fn categories_column_is_declared_json() {
        let pool = connect_in_memory().await.unwrap();
        let declared: String = sqlx::query_scalar(
            "SELECT type FROM pragma_table_info('tasks') WHERE name = 'categories'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(declared, "JSON");
    }

    #[tokio::test]
    async fn find_missing_id_is_none() {
        let store = store().await;
        assert!(store.find_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_filtered_and_newest_first() {
        let store = store().await;
        let first = store.insert(new_task("alice", "first", at(1))).await.unwrap();
        let second = store.insert(new_task("alice", "second", at(2))).await.unwrap();
        store.insert(new_task("bob", "not yours", at(3))).await.unwrap();

        let mut done = second.clone();
        done.completed = true;
        store.save(&done).await.unwrap();

        let all = store.list_for_user("alice", StatusFilter::All).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let pending = store.list_for_user("alice", StatusFilter::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);

        let completed = store.list_for_user("alice", StatusFilter::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, second.id);

        assert!(store.list_for_user("carol", StatusFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_rewrites_mutable_columns() {
        let store = store().await;
        let mut record = store.insert(new_task("alice", "draft", at(0))).await.unwrap();
        record.title = "final".into();
        record.set_priority(Priority::Low);
        record.set_categories(vec!["work".into()]);
        record.updated_at = at(5);
        store.save(&record).await.unwrap();

        let found = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(found.title, "final");
        assert_eq!(found.priority(), Some(Priority::Low));
        assert_eq!(found.categories(), Some(&["work".to_string()][..]));
        assert_eq!(found.created_at, at(0));
        assert_eq!(found.updated_at, at(5));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went_away() {
        let store = store().await;
        let record = store.insert(new_task("alice", "gone soon", at(0))).await.unwrap();
        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(store.find_by_id(record.id).await.unwrap().is_none());
    }

    #[test]
    fn response_conversion_keeps_owner_and_parses_priority() {
        let record = TaskRecord {
            id: 7,
            user_id: "alice".into(),
            title: "Ship it".into(),
            description: None,
            completed: true,
            due_date: None,
            priority: Some("medium".into()),
            categories: Some(Json(vec!["work".into()])),
            created_at: at(0),
            updated_at: at(1),
        };
        let response = TaskResponse::from(record.clone());
        assert_eq!(response.user_id, "alice");
        assert_eq!(response.priority, Some(Priority::Medium));

        let item = TaskListItem::from(record);
        assert_eq!(item.id, 7);
        assert_eq!(item.categories, Some(vec!["work".to_string()]));
    }
}
