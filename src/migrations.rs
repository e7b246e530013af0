//! Thin wrapper around the embedded SQL migrations, mirroring the teacher's
//! `sqlx::migrate!().run(&db).await` call in `main`.

use sqlx::SqlitePool;

pub async fn run(db: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(db).await
}
