//! PostgreSQL-based template storage backend.
//!
//! Templates live in a single `mail_templates` table with the component tree
//! stored as JSONB. Saves are compare-and-swap on `updated_at`, so a stale
//! writer loses without overwriting anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::template::{
    next_revision, ListFilter, NewTemplate, Node, SortSpec, Template, TemplateError,
    TemplateResult, TemplateStats, TemplateSummary, TemplateType,
};

use super::backend::{duplicate_of, update_rejection, TemplateRepository};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS mail_templates (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    template_type TEXT NOT NULL DEFAULT 'blank',
    description TEXT,
    subject TEXT,
    component_tree JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_TYPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_mail_templates_type ON mail_templates (template_type)";

const SELECT_COLUMNS: &str =
    "id, name, template_type, description, subject, component_tree, created_at, updated_at";

type TemplateRow = (
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    Json<Node>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type SummaryRow = (
    Uuid,
    String,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Stored type strings the service does not know are listed as `blank`
fn parse_type(raw: &str) -> TemplateType {
    TemplateType::parse(raw).unwrap_or_else(|| {
        tracing::warn!(template_type = %raw, "Unknown stored template type, treating as blank");
        TemplateType::Blank
    })
}

fn template_from_row(row: TemplateRow) -> Template {
    let (id, name, template_type, description, subject, tree, created_at, updated_at) = row;
    Template {
        id,
        name,
        template_type: parse_type(&template_type),
        description,
        subject,
        component_tree: tree.0,
        created_at,
        updated_at,
    }
}

fn summary_from_row(row: SummaryRow) -> TemplateSummary {
    let (id, name, template_type, description, created_at, updated_at) = row;
    TemplateSummary {
        id,
        name,
        template_type: parse_type(&template_type),
        description,
        created_at,
        updated_at,
    }
}

fn storage_error(e: sqlx::Error) -> TemplateError {
    tracing::error!(error = %e, "PostgreSQL template query failed");
    TemplateError::Storage(e.to_string())
}

/// PostgreSQL-based template repository.
pub struct PostgresTemplateRepository {
    /// PostgreSQL connection pool
    pool: PgPool,
}

impl PostgresTemplateRepository {
    /// Create a new PostgreSQL template repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the templates table and indexes when missing.
    pub async fn ensure_schema(&self) -> TemplateResult<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        sqlx::query(CREATE_TYPE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        tracing::info!("mail_templates schema ready");
        Ok(())
    }

    async fn insert(&self, template: &Template) -> TemplateResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mail_templates
                (id, name, template_type, description, subject, component_tree, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(template.template_type.as_str())
        .bind(&template.description)
        .bind(&template.subject)
        .bind(Json(&template.component_tree))
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn current_revision(&self, id: Uuid) -> TemplateResult<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT updated_at FROM mail_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(row.map(|(updated_at,)| updated_at))
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, template: NewTemplate) -> TemplateResult<Template> {
        let template = template.into_template();
        template.validate()?;
        self.insert(&template).await?;

        tracing::debug!(template_id = %template.id, "Template created (PostgreSQL)");
        Ok(template)
    }

    async fn read(&self, id: Uuid) -> TemplateResult<Template> {
        let query = format!("SELECT {} FROM mail_templates WHERE id = $1", SELECT_COLUMNS);
        let row: Option<TemplateRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(template_from_row)
            .ok_or_else(|| TemplateError::template_not_found(id))
    }

    async fn update(&self, id: Uuid, template: Template) -> TemplateResult<Template> {
        let expected = template.updated_at;
        let template = Template {
            id,
            updated_at: next_revision(expected),
            ..template
        };
        if let Err(invalid) = template.validate() {
            let current = self.current_revision(id).await?;
            return Err(update_rejection(id, expected, current, invalid));
        }

        let created_at: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            UPDATE mail_templates
            SET name = $3, template_type = $4, description = $5, subject = $6,
                component_tree = $7, updated_at = $8
            WHERE id = $1 AND updated_at = $2
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(&template.name)
        .bind(template.template_type.as_str())
        .bind(&template.description)
        .bind(&template.subject)
        .bind(Json(&template.component_tree))
        .bind(template.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match created_at {
            Some((created_at,)) => Ok(Template {
                created_at,
                ..template
            }),
            // Nothing matched: either the row is gone or someone saved first
            None => match self.current_revision(id).await? {
                None => Err(TemplateError::template_not_found(id)),
                Some(current) => Err(TemplateError::Conflict {
                    id,
                    current: Some(current),
                }),
            },
        }
    }

    async fn delete(&self, id: Uuid) -> TemplateResult<()> {
        let result = sqlx::query("DELETE FROM mail_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::template_not_found(id));
        }
        Ok(())
    }

    async fn duplicate(&self, id: Uuid) -> TemplateResult<Template> {
        let source = self.read(id).await?;
        let copy = duplicate_of(&source);
        self.insert(&copy).await?;
        Ok(copy)
    }

    async fn list(
        &self,
        filter: &ListFilter,
        sort: SortSpec,
    ) -> TemplateResult<Vec<TemplateSummary>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, name, template_type, description, created_at, updated_at
            FROM mail_templates
            WHERE ($1::TEXT IS NULL OR template_type = $1)
              AND ($2::TEXT IS NULL
                   OR strpos(lower(name), $2) > 0
                   OR strpos(lower(coalesce(description, '')), $2) > 0)
            "#,
        )
        .bind(filter.template_type.map(|t| t.as_str()))
        .bind(search)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut summaries: Vec<TemplateSummary> = rows.into_iter().map(summary_from_row).collect();
        sort.apply(&mut summaries);
        Ok(summaries)
    }

    async fn stats(&self) -> TemplateResult<TemplateStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT template_type, COUNT(*) FROM mail_templates GROUP BY template_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut stats = TemplateStats::from_types(std::iter::empty());
        for (raw, count) in rows {
            let count = count.max(0) as usize;
            *stats.by_type.entry(parse_type(&raw)).or_default() += count;
            stats.total += count;
        }
        Ok(stats)
    }
}
