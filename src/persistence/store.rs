//! SQLite-based stage store
//!
//! Serves as both a stage source for ingestion and a persistence backend.
//! Stages are keyed by `(name, pipeline_file)` and steps by `(name, stage_id)`.

use crate::core::{Pipeline, Stage, StageRecord, Step, StepStatus};
use crate::ingest::{SourceError, StageSource};
use crate::persistence::{PersistenceBackend, PersistenceError};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::debug;

/// SQLite stage store
pub struct SqliteStageStore {
    pool: SqlitePool,
}

impl SqliteStageStore {
    /// Open (creating if needed) a database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("stageboard");
        std::fs::create_dir_all(&db_dir)?;

        Self::new(db_dir.join("stages.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                pipeline_file TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started',
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (name, pipeline_file)
            );

            CREATE TABLE IF NOT EXISTS stage_steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started',
                image TEXT,
                UNIQUE (name, stage_id)
            );

            CREATE INDEX IF NOT EXISTS idx_stages_pipeline_file ON stages(pipeline_file);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Load all stages with their steps, ordered by pipeline file
    async fn load_stages(&self) -> Result<Vec<StageRecord>, sqlx::Error> {
        let stage_rows = sqlx::query(
            r#"
            SELECT id, name, pipeline_file, status
            FROM stages
            ORDER BY pipeline_file ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stages = Vec::with_capacity(stage_rows.len());
        for row in &stage_rows {
            let stage_id: i64 = row.get("id");
            let step_rows = sqlx::query(
                r#"
                SELECT name, status, image
                FROM stage_steps
                WHERE stage_id = ?1
                ORDER BY id ASC
                "#,
            )
            .bind(stage_id)
            .fetch_all(&self.pool)
            .await?;

            let steps = step_rows
                .iter()
                .map(|step| Step {
                    name: step.get("name"),
                    status: StepStatus::normalize(step.get::<String, _>("status").as_str()),
                    image: step.get("image"),
                })
                .collect();

            stages.push(Stage {
                pipeline_file: row.get("pipeline_file"),
                name: row.get("name"),
                status: StepStatus::normalize(row.get::<String, _>("status").as_str()),
                steps,
            });
        }

        Ok(stages)
    }
}

#[async_trait::async_trait]
impl StageSource for SqliteStageStore {
    async fn fetch_stage_records(&self) -> Result<Vec<StageRecord>, SourceError> {
        self.load_stages()
            .await
            .map_err(|e| SourceError::Backend(e.to_string()))
    }
}

/// Upsert one pipeline and delete the stages and steps it no longer has
async fn save_pipeline(conn: &mut SqliteConnection, pipeline: &Pipeline) -> Result<(), sqlx::Error> {
    let mut stage_ids = Vec::with_capacity(pipeline.stages.len());

    for stage in &pipeline.stages {
        let row = sqlx::query(
            r#"
            INSERT INTO stages (name, pipeline_file, status)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name, pipeline_file) DO UPDATE SET
                status = excluded.status,
                updated_at = datetime('now')
            RETURNING id
            "#,
        )
        .bind(&stage.name)
        .bind(&pipeline.pipeline_file)
        .bind(stage.status.as_str())
        .fetch_one(&mut *conn)
        .await?;
        let stage_id: i64 = row.get("id");
        stage_ids.push(stage_id);

        for step in &stage.steps {
            sqlx::query(
                r#"
                INSERT INTO stage_steps (stage_id, name, status, image)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(name, stage_id) DO UPDATE SET
                    status = excluded.status,
                    image = excluded.image
                "#,
            )
            .bind(stage_id)
            .bind(&step.name)
            .bind(step.status.as_str())
            .bind(step.image.as_deref())
            .execute(&mut *conn)
            .await?;
        }

        let mut stale_steps = QueryBuilder::<Sqlite>::new("DELETE FROM stage_steps WHERE stage_id = ");
        stale_steps.push_bind(stage_id);
        if !stage.steps.is_empty() {
            stale_steps.push(" AND name NOT IN (");
            let mut names = stale_steps.separated(", ");
            for step in &stage.steps {
                names.push_bind(step.name.clone());
            }
            names.push_unseparated(")");
        }
        stale_steps.build().execute(&mut *conn).await?;
    }

    // steps of deleted stages go with them (ON DELETE CASCADE)
    let mut stale_stages = QueryBuilder::<Sqlite>::new("DELETE FROM stages WHERE pipeline_file = ");
    stale_stages.push_bind(pipeline.pipeline_file.clone());
    if !stage_ids.is_empty() {
        stale_stages.push(" AND id NOT IN (");
        let mut ids = stale_stages.separated(", ");
        for id in stage_ids {
            ids.push_bind(id);
        }
        ids.push_unseparated(")");
    }
    stale_stages.build().execute(&mut *conn).await?;

    debug!("Saved pipeline {}", pipeline.pipeline_file);
    Ok(())
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStageStore {
    async fn persist_pipelines(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        for pipeline in pipelines {
            save_pipeline(&mut tx, pipeline).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_all(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let mut stale = QueryBuilder::<Sqlite>::new("DELETE FROM stages");
        if !pipelines.is_empty() {
            stale.push(" WHERE pipeline_file NOT IN (");
            let mut files = stale.separated(", ");
            for pipeline in pipelines {
                files.push_bind(pipeline.pipeline_file.clone());
            }
            files.push_unseparated(")");
        }
        let removed = stale.build().execute(&mut *tx).await?.rows_affected();
        debug!("Deleted {} stages of removed pipelines", removed);

        for pipeline in pipelines {
            save_pipeline(&mut tx, pipeline).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
