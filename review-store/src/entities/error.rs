//! `errors` table: one row per residual review-tool error, append-only.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "errors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Revision of the rules project used by the job.
    pub rules_rev: String,
    /// Revision of the review tool used by the job.
    pub devagent_rev: String,
    /// `owner/repo` under review.
    pub project: String,
    /// Revision of the reviewed project.
    pub project_rev: String,
    /// Patch name the error refers to.
    pub patch: String,
    /// Canonical rule name.
    pub rule: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
