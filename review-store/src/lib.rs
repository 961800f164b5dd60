//! Relational persistence for residual review errors and their patches.
//!
//! Schema migration is owned elsewhere; [`ReviewStore::init_schema`] exists
//! so tests (and local sqlite runs) can build the tables straight from the
//! entities.

pub mod entities;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    NotSet, Schema,
};
use thiserror::Error;
use tracing::debug;

use entities::{error, patch};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// One residual error to persist, context already resolved from TaskInfo.
#[derive(Debug, Clone)]
pub struct NewError {
    pub rules_rev: String,
    pub devagent_rev: String,
    pub project: String,
    pub project_rev: String,
    pub patch: String,
    pub rule: String,
    pub message: String,
}

#[derive(Clone)]
pub struct ReviewStore {
    conn: DatabaseConnection,
}

impl ReviewStore {
    pub async fn connect(url: &str) -> DbResult<Self> {
        let mut options = ConnectOptions::new(url.to_string());
        // A pooled in-memory sqlite gives every pooled connection its own
        // empty database; pin it to a single connection.
        if url.starts_with("sqlite::memory:") {
            options.max_connections(1);
        }
        Ok(Self {
            conn: Database::connect(options).await?,
        })
    }

    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates the tables from the entity definitions when they are absent.
    pub async fn init_schema(&self) -> DbResult<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let mut errors_table = schema.create_table_from_entity(error::Entity);
        errors_table.if_not_exists();
        self.conn.execute(backend.build(&errors_table)).await?;

        let mut patches_table = schema.create_table_from_entity(patch::Entity);
        patches_table.if_not_exists();
        self.conn.execute(backend.build(&patches_table)).await?;

        Ok(())
    }

    pub async fn insert_errors(&self, rows: Vec<NewError>) -> DbResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("persisting {} error rows", rows.len());

        let now = Utc::now();
        let models = rows.into_iter().map(|row| error::ActiveModel {
            id: NotSet,
            rules_rev: Set(row.rules_rev),
            devagent_rev: Set(row.devagent_rev),
            project: Set(row.project),
            project_rev: Set(row.project_rev),
            patch: Set(row.patch),
            rule: Set(row.rule),
            message: Set(row.message),
            created_at: Set(now),
        });
        error::Entity::insert_many(models).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn select_errors(&self) -> DbResult<Vec<error::Model>> {
        Ok(error::Entity::find().all(&self.conn).await?)
    }

    pub async fn get_patch(&self, id: &str) -> DbResult<Option<patch::Model>> {
        Ok(patch::Entity::find_by_id(id).one(&self.conn).await?)
    }

    /// Inserts the patch row unless a row with the same name already exists.
    pub async fn insert_patch_if_absent(
        &self,
        id: &str,
        content: &str,
        context: Option<&str>,
    ) -> DbResult<()> {
        let model = patch::ActiveModel {
            id: Set(id.to_string()),
            content: Set(content.to_string()),
            context: Set(context.map(str::to_string)),
            created_at: Set(Utc::now()),
        };
        patch::Entity::insert(model)
            .on_conflict(
                OnConflict::column(patch::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
