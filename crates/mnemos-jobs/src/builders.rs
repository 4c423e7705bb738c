//! Document builders: render business records as embedding text and
//! derive their metadata.
//!
//! Every builder writes its fields in a fixed order and omits empty ones,
//! so re-ingesting an unchanged record yields byte-identical text.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use mnemos_core::{
    defaults, CommunicationRecord, CompanyRecord, ContactRecord, DealRecord, Document,
    DocumentType, KnowledgeRecord, Priority, ProjectRecord, TaskRecord,
};
use mnemos_search::truncate_chars;

/// Currency assumed for deals without one.
pub const DEFAULT_CURRENCY: &str = "PLN";

/// Append `label: value` when the value is present and not blank.
fn field(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        let _ = writeln!(out, "{}: {}", label, value);
    }
}

fn date(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn join<'a>(items: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let joined = items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

fn finish(out: String) -> String {
    out.trim_end().to_string()
}

fn non_empty<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// +3 for high and urgent, +1 for medium, -1 for low.
fn priority_boost(priority: Option<Priority>) -> i32 {
    match priority {
        Some(Priority::Urgent) | Some(Priority::High) => 3,
        Some(Priority::Medium) => 1,
        Some(Priority::Low) => -1,
        None => 0,
    }
}

const BASE_IMPORTANCE: i32 = defaults::IMPORTANCE_DEFAULT as i32;

// =============================================================================
// TASKS
// =============================================================================

pub fn task_text(task: &TaskRecord) -> String {
    let mut out = String::new();
    field(&mut out, "Task", Some(&task.title));
    field(&mut out, "Description", task.description.as_deref());
    field(&mut out, "Status", Some(&task.status));
    field(&mut out, "Priority", task.priority.map(|p| p.as_str()));
    field(&mut out, "Context", task.context.as_deref());
    field(&mut out, "Project", task.project_name.as_deref());
    field(&mut out, "Assigned to", task.assignee_name.as_deref());
    field(&mut out, "Due", task.due_date.map(date).as_deref());
    field(
        &mut out,
        "Subtasks",
        join(task.subtasks.iter().map(|s| s.title.as_str())).as_deref(),
    );
    finish(out)
}

/// Importance of a task at `now`.
///
/// Base 5, adjusted by priority, by due date (+2 when due within a day or
/// overdue, +1 within a week) and by status (+1 in progress, -2 done).
pub fn task_importance(task: &TaskRecord, now: DateTime<Utc>) -> i32 {
    let mut importance = BASE_IMPORTANCE + priority_boost(task.priority);

    if let Some(due) = task.due_date {
        let until_due = due - now;
        if until_due < chrono::Duration::days(1) {
            importance += 2;
        } else if until_due < chrono::Duration::days(7) {
            importance += 1;
        }
    }

    match task.status.as_str() {
        "IN_PROGRESS" => importance += 1,
        "DONE" => importance -= 2,
        _ => {}
    }
    importance
}

pub fn task_document(task: &TaskRecord, now: DateTime<Utc>) -> Document {
    Document::new(
        DocumentType::Task,
        &task.id,
        &task.organization_id,
        task_text(task),
    )
    .with_owner(task.assigned_to_id.clone())
    .with_timestamps(task.created_at, task.updated_at)
    .with_tags(non_empty([
        Some(task.status.as_str()),
        task.priority.map(|p| p.as_str()),
        task.context.as_deref(),
    ]))
    .with_importance(task_importance(task, now))
}

// =============================================================================
// PROJECTS
// =============================================================================

pub fn project_text(project: &ProjectRecord) -> String {
    let mut out = String::new();
    field(&mut out, "Project", Some(&project.name));
    field(&mut out, "Description", project.description.as_deref());
    field(&mut out, "Status", Some(&project.status));
    field(&mut out, "Priority", project.priority.map(|p| p.as_str()));
    field(&mut out, "Methodology", project.methodology.as_deref());
    field(&mut out, "Created by", project.creator_name.as_deref());
    field(&mut out, "Due", project.due_date.map(date).as_deref());
    field(
        &mut out,
        "Active tasks",
        join(project.active_tasks().map(|t| t.title.as_str())).as_deref(),
    );
    field(
        &mut out,
        "Collaborators",
        join(project.collaborators.iter().map(String::as_str)).as_deref(),
    );
    finish(out)
}

/// Importance of a project.
///
/// Base 5, adjusted by priority, by status (+2 active, +1 planning,
/// -2 completed) and by size (+2 above 20 tasks, +1 above 10).
pub fn project_importance(project: &ProjectRecord) -> i32 {
    let mut importance = BASE_IMPORTANCE + priority_boost(project.priority);

    match project.status.as_str() {
        "ACTIVE" => importance += 2,
        "PLANNING" => importance += 1,
        "COMPLETED" => importance -= 2,
        _ => {}
    }

    let task_count = project.tasks.len();
    if task_count > 20 {
        importance += 2;
    } else if task_count > 10 {
        importance += 1;
    }
    importance
}

pub fn project_document(project: &ProjectRecord) -> Document {
    Document::new(
        DocumentType::Project,
        &project.id,
        &project.organization_id,
        project_text(project),
    )
    .with_owner(project.created_by_id.clone())
    .with_timestamps(project.created_at, project.updated_at)
    .with_tags(non_empty([
        Some(project.status.as_str()),
        project.priority.map(|p| p.as_str()),
        project.methodology.as_deref(),
    ]))
    .with_importance(project_importance(project))
}

// =============================================================================
// CONTACTS AND COMPANIES
// =============================================================================

pub fn contact_text(contact: &ContactRecord) -> String {
    let mut out = String::new();
    field(&mut out, "Contact", Some(&contact.full_name()));
    field(&mut out, "Email", contact.email.as_deref());
    field(&mut out, "Phone", contact.phone.as_deref());
    field(&mut out, "Position", contact.position.as_deref());
    field(&mut out, "Company", contact.company_name.as_deref());
    field(&mut out, "Notes", contact.notes.as_deref());
    finish(out)
}

pub fn contact_document(contact: &ContactRecord) -> Document {
    Document::new(
        DocumentType::Contact,
        &contact.id,
        &contact.organization_id,
        contact_text(contact),
    )
    .with_owner(contact.created_by_id.clone())
    .with_timestamps(contact.created_at, contact.updated_at)
    .with_tags(non_empty([contact.company_name.as_deref()]))
}

pub fn company_text(company: &CompanyRecord) -> String {
    let mut out = String::new();
    field(&mut out, "Company", Some(&company.name));
    field(&mut out, "Industry", company.industry.as_deref());
    field(&mut out, "Website", company.website.as_deref());
    field(&mut out, "Size", company.size.as_deref());
    field(&mut out, "Description", company.description.as_deref());
    finish(out)
}

pub fn company_document(company: &CompanyRecord) -> Document {
    Document::new(
        DocumentType::Company,
        &company.id,
        &company.organization_id,
        company_text(company),
    )
    .with_owner(company.created_by_id.clone())
    .with_timestamps(company.created_at, company.updated_at)
    .with_tags(non_empty([company.industry.as_deref()]))
}

// =============================================================================
// DEALS
// =============================================================================

pub fn deal_text(deal: &DealRecord) -> String {
    let currency = deal.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    let value = deal.value.map(|v| format!("{:.2} {}", v, currency));
    let probability = deal.probability.map(|p| format!("{}%", p));

    let mut out = String::new();
    field(&mut out, "Deal", Some(&deal.name));
    field(&mut out, "Value", value.as_deref());
    field(&mut out, "Stage", Some(&deal.stage));
    field(&mut out, "Probability", probability.as_deref());
    field(&mut out, "Description", deal.description.as_deref());
    field(&mut out, "Contact", deal.contact_name.as_deref());
    field(&mut out, "Company", deal.company_name.as_deref());
    finish(out)
}

pub fn deal_document(deal: &DealRecord) -> Document {
    Document::new(
        DocumentType::Deal,
        &deal.id,
        &deal.organization_id,
        deal_text(deal),
    )
    .with_owner(deal.owner_id.clone())
    .with_timestamps(deal.created_at, deal.updated_at)
    .with_tags(non_empty([Some(deal.stage.as_str())]))
}

// =============================================================================
// COMMUNICATIONS
// =============================================================================

pub fn communication_text(comm: &CommunicationRecord) -> String {
    let from = match (comm.from_name.as_deref(), comm.from_address.as_deref()) {
        (Some(name), Some(addr)) => Some(format!("{} <{}>", name, addr)),
        (Some(name), None) => Some(name.to_string()),
        (None, Some(addr)) => Some(addr.to_string()),
        (None, None) => None,
    };
    let contact = comm.contact_name.as_deref().map(|name| match comm.contact_email.as_deref() {
        Some(email) => format!("{} <{}>", name, email),
        None => name.to_string(),
    });
    let channel = format!("{} ({})", comm.channel_name, comm.channel_type);
    let content = comm
        .content
        .as_deref()
        .map(|c| truncate_chars(c.trim(), defaults::INGEST_COMMUNICATION_CONTENT_CHARS));
    let urgency = comm
        .urgency_score
        .filter(|u| *u > 0)
        .map(|u| format!("{}/10", u));

    let mut out = String::new();
    field(
        &mut out,
        "Message",
        Some(comm.subject.as_deref().unwrap_or("(no subject)")),
    );
    field(&mut out, "Channel", Some(&channel));
    field(&mut out, "From", from.as_deref());
    field(&mut out, "To", comm.to_address.as_deref());
    field(&mut out, "Contact", contact.as_deref());
    field(&mut out, "Company", comm.company_name.as_deref());
    field(&mut out, "Content", content);
    field(&mut out, "Urgency", urgency.as_deref());
    if comm.action_needed {
        field(&mut out, "Action needed", Some("yes"));
    }
    finish(out)
}

/// 10 for urgent messages, 8 for high priority, 5 otherwise.
pub fn communication_importance(comm: &CommunicationRecord) -> i32 {
    match comm.priority {
        Some(Priority::Urgent) => 10,
        Some(Priority::High) => 8,
        _ => BASE_IMPORTANCE,
    }
}

pub fn communication_document(comm: &CommunicationRecord) -> Document {
    let source = if comm.channel_type.trim().is_empty() {
        "unknown"
    } else {
        comm.channel_type.as_str()
    };
    Document::new(
        DocumentType::Communication,
        &comm.id,
        &comm.organization_id,
        communication_text(comm),
    )
    .with_owner(comm.user_id.clone())
    .with_source(source)
    .with_timestamps(comm.occurred_at(), comm.updated_at)
    .with_tags(non_empty([
        Some(comm.channel_name.as_str()),
        comm.message_type.as_deref(),
        comm.priority.map(|p| p.as_str()),
        comm.action_needed.then_some("action"),
    ]))
    .with_importance(communication_importance(comm))
}

// =============================================================================
// KNOWLEDGE
// =============================================================================

pub fn knowledge_text(entry: &KnowledgeRecord) -> String {
    let mut out = String::new();
    field(&mut out, "Knowledge", Some(&entry.title));
    field(&mut out, "Category", entry.category.as_deref());
    field(&mut out, "Content", Some(&entry.content));
    field(
        &mut out,
        "Tags",
        join(entry.tags.iter().map(String::as_str)).as_deref(),
    );
    finish(out)
}

pub fn knowledge_document(entry: &KnowledgeRecord) -> Document {
    let tags = entry
        .category
        .iter()
        .chain(entry.tags.iter())
        .cloned()
        .collect::<Vec<_>>();
    Document::new(
        DocumentType::Knowledge,
        &entry.id,
        &entry.organization_id,
        knowledge_text(entry),
    )
    .with_owner(entry.author_id.clone())
    .with_timestamps(entry.created_at, entry.updated_at)
    .with_tags(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use mnemos_core::{ProjectTaskSummary, SubtaskSummary};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn sample_task() -> TaskRecord {
        let mut task = TaskRecord::new("t1", "org", "Renew Acme contract");
        task.description = Some("Send the updated terms".into());
        task.priority = Some(Priority::High);
        task.context = Some("@office".into());
        task.project_name = Some("Key accounts".into());
        task.assignee_name = Some("Anna Nowak".into());
        task.due_date = Some(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap());
        task.subtasks = vec![
            SubtaskSummary { title: "Draft".into(), status: "DONE".into() },
            SubtaskSummary { title: "Review".into(), status: "TODO".into() },
        ];
        task
    }

    #[test]
    fn test_task_text_field_order() {
        let text = task_text(&sample_task());
        assert_eq!(
            text,
            "Task: Renew Acme contract\n\
             Description: Send the updated terms\n\
             Status: TODO\n\
             Priority: HIGH\n\
             Context: @office\n\
             Project: Key accounts\n\
             Assigned to: Anna Nowak\n\
             Due: 2026-03-10\n\
             Subtasks: Draft, Review"
        );
    }

    #[test]
    fn test_task_text_is_stable_across_updates_of_untracked_fields() {
        let task = sample_task();
        let mut touched = task.clone();
        touched.updated_at = task.updated_at + Duration::days(3);
        assert_eq!(task_text(&task), task_text(&touched));
    }

    #[test]
    fn test_task_importance() {
        let now = fixed_now();
        let mut task = TaskRecord::new("t", "org", "x");
        assert_eq!(task_importance(&task, now), 5);

        task.priority = Some(Priority::High);
        assert_eq!(task_importance(&task, now), 8);

        task.due_date = Some(now + Duration::hours(5));
        assert_eq!(task_importance(&task, now), 10);

        task.status = "IN_PROGRESS".into();
        let doc = task_document(&task, now);
        assert_eq!(doc.metadata.importance, 10, "clamped");

        task.priority = Some(Priority::Low);
        task.due_date = Some(now + Duration::days(3));
        task.status = "DONE".into();
        assert_eq!(task_importance(&task, now), 3);
    }

    #[test]
    fn test_task_document_metadata() {
        let task = sample_task();
        let doc = task_document(&task, fixed_now());
        assert_eq!(doc.id, "task_t1");
        assert_eq!(doc.metadata.tags, vec!["TODO", "HIGH", "@office"]);
        assert_eq!(doc.metadata.source, "internal");
        assert_eq!(doc.metadata.updated_at, task.updated_at);
    }

    #[test]
    fn test_project_importance_counts_tasks() {
        let mut project = ProjectRecord::new("p", "org", "Launch");
        project.status = "ON_HOLD".into();
        let summary = |i: usize| ProjectTaskSummary {
            id: i.to_string(),
            title: format!("task {}", i),
            status: "TODO".into(),
        };

        project.tasks = (0..11).map(summary).collect();
        assert_eq!(project_importance(&project), 6);

        project.tasks = (0..21).map(summary).collect();
        assert_eq!(project_importance(&project), 7);

        project.status = "ACTIVE".into();
        project.priority = Some(Priority::Urgent);
        assert_eq!(project_document(&project).metadata.importance, 10);
    }

    #[test]
    fn test_project_text_lists_active_tasks_only() {
        let mut project = ProjectRecord::new("p", "org", "Launch");
        project.tasks = vec![
            ProjectTaskSummary { id: "1".into(), title: "Old".into(), status: "DONE".into() },
            ProjectTaskSummary { id: "2".into(), title: "New".into(), status: "TODO".into() },
        ];
        project.collaborators = vec!["Anna".into(), "Piotr".into()];
        let text = project_text(&project);
        assert!(text.contains("Active tasks: New\n"));
        assert!(!text.contains("Old"));
        assert!(text.ends_with("Collaborators: Anna, Piotr"));
    }

    #[test]
    fn test_communication_text_truncates_content() {
        let mut comm = CommunicationRecord::new("m1", "org", "Sales inbox", "email");
        comm.from_name = Some("Jane".into());
        comm.from_address = Some("jane@acme.test".into());
        comm.content = Some("x".repeat(800));
        comm.urgency_score = Some(7);
        comm.action_needed = true;

        let text = communication_text(&comm);
        assert!(text.starts_with("Message: (no subject)\nChannel: Sales inbox (email)\n"));
        assert!(text.contains("From: Jane <jane@acme.test>"));
        let content_line = text.lines().find(|l| l.starts_with("Content: ")).unwrap();
        assert_eq!(content_line.len(), "Content: ".len() + 500);
        assert!(text.ends_with("Urgency: 7/10\nAction needed: yes"));
    }

    #[test]
    fn test_communication_metadata() {
        let mut comm = CommunicationRecord::new("m1", "org", "Support", "slack");
        comm.priority = Some(Priority::Urgent);
        let doc = communication_document(&comm);
        assert_eq!(doc.id, "comm_m1");
        assert_eq!(doc.metadata.source, "slack");
        assert_eq!(doc.metadata.importance, 10);

        comm.priority = Some(Priority::High);
        assert_eq!(communication_importance(&comm), 8);
        comm.priority = None;
        assert_eq!(communication_importance(&comm), 5);
    }

    #[test]
    fn test_deal_text_defaults_currency() {
        let mut deal = DealRecord::new("d1", "org", "Acme renewal");
        deal.value = Some(12500.0);
        deal.probability = Some(60);
        let text = deal_text(&deal);
        assert_eq!(
            text,
            "Deal: Acme renewal\nValue: 12500.00 PLN\nStage: LEAD\nProbability: 60%"
        );
        assert_eq!(deal_document(&deal).metadata.importance, 5);
    }

    #[test]
    fn test_contact_company_knowledge_text() {
        let mut contact = ContactRecord::new("c1", "org", "Anna");
        contact.last_name = Some("Nowak".into());
        contact.email = Some("anna@acme.test".into());
        contact.company_name = Some("Acme".into());
        assert_eq!(
            contact_text(&contact),
            "Contact: Anna Nowak\nEmail: anna@acme.test\nCompany: Acme"
        );

        let mut company = CompanyRecord::new("co1", "org", "Acme");
        company.industry = Some("Manufacturing".into());
        assert_eq!(company_text(&company), "Company: Acme\nIndustry: Manufacturing");

        let mut entry = KnowledgeRecord::new("k1", "org", "Refund policy", "30 days.");
        entry.category = Some("Support".into());
        entry.tags = vec!["billing".into()];
        assert_eq!(
            knowledge_text(&entry),
            "Knowledge: Refund policy\nCategory: Support\nContent: 30 days.\nTags: billing"
        );
        assert_eq!(knowledge_document(&entry).metadata.tags, vec!["Support", "billing"]);
    }
}
