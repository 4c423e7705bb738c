//! Read-only access to the business record tables.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use mnemos_core::{
    CommunicationRecord, CompanyRecord, ContactRecord, DealRecord, DomainRepository, Error,
    KnowledgeRecord, Priority, ProjectRecord, ProjectTaskSummary, Result, SubtaskSummary,
    TaskRecord,
};

const TASK_SELECT: &str = "SELECT t.id, t.organization_id, t.title, t.description, t.status, \
     t.priority, t.context, p.name AS project_name, t.assignee_name, t.assigned_to_id, \
     t.created_by_id, t.due_date, t.created_at, t.updated_at, \
     COALESCE((SELECT json_agg(json_build_object('title', s.title, 'status', s.status) \
               ORDER BY s.created_at) FROM task s WHERE s.parent_task_id = t.id), '[]'::json) AS subtasks \
     FROM task t LEFT JOIN project p ON p.id = t.project_id \
     WHERE t.organization_id = $1";

const PROJECT_SELECT: &str = "SELECT p.id, p.organization_id, p.name, p.description, p.status, \
     p.priority, p.methodology, p.creator_name, p.created_by_id, p.due_date, p.collaborators, \
     p.created_at, p.updated_at, \
     COALESCE((SELECT json_agg(json_build_object('id', t.id, 'title', t.title, 'status', t.status) \
               ORDER BY t.created_at) FROM task t WHERE t.project_id = p.id), '[]'::json) AS tasks \
     FROM project p WHERE p.organization_id = $1";

const CONTACT_SELECT: &str = "SELECT c.id, c.organization_id, c.first_name, c.last_name, c.email, \
     c.phone, c.position, co.name AS company_name, c.notes, c.created_by_id, c.created_at, c.updated_at \
     FROM contact c LEFT JOIN company co ON co.id = c.company_id \
     WHERE c.organization_id = $1";

const COMPANY_SELECT: &str = "SELECT co.id, co.organization_id, co.name, co.industry, co.website, \
     co.size, co.description, co.created_by_id, co.created_at, co.updated_at \
     FROM company co WHERE co.organization_id = $1";

const DEAL_SELECT: &str = "SELECT d.id, d.organization_id, d.name, d.value, d.currency, d.stage, \
     d.probability, d.description, \
     NULLIF(TRIM(CONCAT(c.first_name, ' ', c.last_name)), '') AS contact_name, \
     co.name AS company_name, d.owner_id, d.created_at, d.updated_at \
     FROM deal d LEFT JOIN contact c ON c.id = d.contact_id LEFT JOIN company co ON co.id = d.company_id \
     WHERE d.organization_id = $1";

const COMMUNICATION_SELECT: &str = "SELECT m.id, m.organization_id, m.subject, m.channel_name, \
     m.channel_type, m.message_type, m.from_name, m.from_address, m.to_address, \
     NULLIF(TRIM(CONCAT(c.first_name, ' ', c.last_name)), '') AS contact_name, c.email AS contact_email, \
     m.contact_id, co.name AS company_name, m.company_id, m.content, m.urgency_score, m.action_needed, \
     m.priority, m.user_id, m.received_at, m.sent_at, m.created_at, m.updated_at \
     FROM communication m LEFT JOIN contact c ON c.id = m.contact_id \
     LEFT JOIN company co ON co.id = m.company_id \
     WHERE m.organization_id = $1";

const KNOWLEDGE_SELECT: &str = "SELECT k.id, k.organization_id, k.title, k.category, k.content, \
     k.tags, k.author_id, k.created_at, k.updated_at \
     FROM knowledge_entry k WHERE k.organization_id = $1";

/// PostgreSQL implementation of DomainRepository.
pub struct PgDomainRepository {
    pool: Pool<Postgres>,
}

impl PgDomainRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: &str, organization_id: &str) -> Result<Vec<PgRow>> {
        sqlx::query(sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn fetch_ids(
        &self,
        sql: &str,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<PgRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query(sql)
            .bind(organization_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

fn priority(row: &PgRow) -> Option<Priority> {
    row.get::<Option<String>, _>("priority")
        .and_then(|p| p.parse().ok())
}

fn json_list<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<Vec<T>> {
    let value: JsonValue = row.get(column);
    Ok(serde_json::from_value(value)?)
}

fn task_from_row(row: &PgRow) -> Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        priority: priority(row),
        context: row.get("context"),
        project_name: row.get("project_name"),
        assignee_name: row.get("assignee_name"),
        assigned_to_id: row.get("assigned_to_id"),
        created_by_id: row.get("created_by_id"),
        due_date: row.get("due_date"),
        subtasks: json_list::<SubtaskSummary>(row, "subtasks")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn project_from_row(row: &PgRow) -> Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        description: row.get("description"),
        status: row.get("status"),
        priority: priority(row),
        methodology: row.get("methodology"),
        creator_name: row.get("creator_name"),
        created_by_id: row.get("created_by_id"),
        due_date: row.get("due_date"),
        tasks: json_list::<ProjectTaskSummary>(row, "tasks")?,
        collaborators: row.get("collaborators"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn contact_from_row(row: &PgRow) -> ContactRecord {
    ContactRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        position: row.get("position"),
        company_name: row.get("company_name"),
        notes: row.get("notes"),
        created_by_id: row.get("created_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn company_from_row(row: &PgRow) -> CompanyRecord {
    CompanyRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        industry: row.get("industry"),
        website: row.get("website"),
        size: row.get("size"),
        description: row.get("description"),
        created_by_id: row.get("created_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn deal_from_row(row: &PgRow) -> DealRecord {
    DealRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        value: row.get("value"),
        currency: row.get("currency"),
        stage: row.get("stage"),
        probability: row
            .get::<Option<i16>, _>("probability")
            .map(|p| p.clamp(0, 100) as u8),
        description: row.get("description"),
        contact_name: row.get("contact_name"),
        company_name: row.get("company_name"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn communication_from_row(row: &PgRow) -> CommunicationRecord {
    CommunicationRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        subject: row.get("subject"),
        channel_name: row.get("channel_name"),
        channel_type: row.get("channel_type"),
        message_type: row.get("message_type"),
        from_name: row.get("from_name"),
        from_address: row.get("from_address"),
        to_address: row.get("to_address"),
        contact_name: row.get("contact_name"),
        contact_email: row.get("contact_email"),
        contact_id: row.get("contact_id"),
        company_name: row.get("company_name"),
        company_id: row.get("company_id"),
        content: row.get("content"),
        urgency_score: row
            .get::<Option<i16>, _>("urgency_score")
            .map(|u| u.clamp(0, 10) as u8),
        action_needed: row.get("action_needed"),
        priority: priority(row),
        user_id: row.get("user_id"),
        received_at: row.get("received_at"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn knowledge_from_row(row: &PgRow) -> KnowledgeRecord {
    KnowledgeRecord {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        title: row.get("title"),
        category: row.get("category"),
        content: row.get("content"),
        tags: row.get("tags"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DomainRepository for PgDomainRepository {
    async fn list_tasks(&self, organization_id: &str) -> Result<Vec<TaskRecord>> {
        let sql = format!("{} ORDER BY t.created_at", TASK_SELECT);
        self.fetch(&sql, organization_id)
            .await?
            .iter()
            .map(task_from_row)
            .collect()
    }

    async fn list_projects(&self, organization_id: &str) -> Result<Vec<ProjectRecord>> {
        let sql = format!("{} ORDER BY p.created_at", PROJECT_SELECT);
        self.fetch(&sql, organization_id)
            .await?
            .iter()
            .map(project_from_row)
            .collect()
    }

    async fn list_contacts(&self, organization_id: &str) -> Result<Vec<ContactRecord>> {
        let sql = format!("{} ORDER BY c.created_at", CONTACT_SELECT);
        Ok(self
            .fetch(&sql, organization_id)
            .await?
            .iter()
            .map(contact_from_row)
            .collect())
    }

    async fn list_companies(&self, organization_id: &str) -> Result<Vec<CompanyRecord>> {
        let sql = format!("{} ORDER BY co.created_at", COMPANY_SELECT);
        Ok(self
            .fetch(&sql, organization_id)
            .await?
            .iter()
            .map(company_from_row)
            .collect())
    }

    async fn list_deals(&self, organization_id: &str) -> Result<Vec<DealRecord>> {
        let sql = format!("{} ORDER BY d.created_at", DEAL_SELECT);
        Ok(self
            .fetch(&sql, organization_id)
            .await?
            .iter()
            .map(deal_from_row)
            .collect())
    }

    async fn list_communications(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>> {
        let sql = format!(
            "{} ORDER BY COALESCE(m.received_at, m.sent_at, m.created_at) DESC LIMIT $2",
            COMMUNICATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(organization_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(communication_from_row).collect())
    }

    async fn list_knowledge(&self, organization_id: &str) -> Result<Vec<KnowledgeRecord>> {
        let sql = format!("{} ORDER BY k.created_at", KNOWLEDGE_SELECT);
        Ok(self
            .fetch(&sql, organization_id)
            .await?
            .iter()
            .map(knowledge_from_row)
            .collect())
    }

    async fn tasks_by_ids(&self, organization_id: &str, ids: &[String]) -> Result<Vec<TaskRecord>> {
        let sql = format!("{} AND t.id = ANY($2)", TASK_SELECT);
        self.fetch_ids(&sql, organization_id, ids)
            .await?
            .iter()
            .map(task_from_row)
            .collect()
    }

    async fn projects_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProjectRecord>> {
        let sql = format!("{} AND p.id = ANY($2)", PROJECT_SELECT);
        self.fetch_ids(&sql, organization_id, ids)
            .await?
            .iter()
            .map(project_from_row)
            .collect()
    }

    async fn contacts_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<ContactRecord>> {
        let sql = format!("{} AND c.id = ANY($2)", CONTACT_SELECT);
        Ok(self
            .fetch_ids(&sql, organization_id, ids)
            .await?
            .iter()
            .map(contact_from_row)
            .collect())
    }

    async fn companies_by_ids(
        &self,
        organization_id: &str,
        ids: &[String],
    ) -> Result<Vec<CompanyRecord>> {
        let sql = format!("{} AND co.id = ANY($2)", COMPANY_SELECT);
        Ok(self
            .fetch_ids(&sql, organization_id, ids)
            .await?
            .iter()
            .map(company_from_row)
            .collect())
    }

    async fn recent_communications_for(
        &self,
        organization_id: &str,
        contact_ids: &[String],
        company_ids: &[String],
        limit: usize,
    ) -> Result<Vec<CommunicationRecord>> {
        if contact_ids.is_empty() && company_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} AND (m.contact_id = ANY($2) OR m.company_id = ANY($3))
             ORDER BY COALESCE(m.received_at, m.sent_at, m.created_at) DESC LIMIT $4",
            COMMUNICATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(organization_id)
            .bind(contact_ids)
            .bind(company_ids)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(communication_from_row).collect())
    }
}
