//! Retrieval context: related records and the bounded text block handed to
//! the generation provider.

use std::fmt::Write;

use serde_json::{json, Value as JsonValue};

use mnemos_core::{
    CommunicationRecord, CompanyRecord, ContactRecord, DocumentType, EntityRef, ProjectRecord,
    SearchResult, TaskRecord,
};
use mnemos_search::truncate_chars;

use crate::config::RagConfig;

const RELATED_PROJECTS: usize = 3;
const RELATED_TASKS: usize = 5;
const RELATED_CONTACTS: usize = 3;
const RELATED_COMMUNICATIONS: usize = 3;
const DESCRIPTION_CHARS: usize = 100;

/// Relational records behind the retrieved documents.
#[derive(Debug, Clone, Default)]
pub struct RelatedEntities {
    pub projects: Vec<ProjectRecord>,
    pub tasks: Vec<TaskRecord>,
    pub contacts: Vec<ContactRecord>,
    pub companies: Vec<CompanyRecord>,
    /// Recent messages linked to the retrieved contacts or companies.
    pub communications: Vec<CommunicationRecord>,
}

impl RelatedEntities {
    pub fn count(&self) -> usize {
        self.projects.len()
            + self.tasks.len()
            + self.contacts.len()
            + self.companies.len()
            + self.communications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// `{id, name}` references keyed the way executors expect them.
    pub fn references(&self) -> Vec<(&'static str, JsonValue)> {
        let refs = |items: Vec<EntityRef>| json!(items);
        vec![
            (
                "relatedProjects",
                refs(self.projects.iter().map(|p| entity_ref(&p.id, &p.name)).collect()),
            ),
            (
                "relatedTasks",
                refs(self.tasks.iter().map(|t| entity_ref(&t.id, &t.title)).collect()),
            ),
            (
                "relatedContacts",
                refs(
                    self.contacts
                        .iter()
                        .map(|c| entity_ref(&c.id, &c.full_name()))
                        .collect(),
                ),
            ),
            (
                "relatedCompanies",
                refs(self.companies.iter().map(|c| entity_ref(&c.id, &c.name)).collect()),
            ),
        ]
    }
}

fn entity_ref(id: &str, name: &str) -> EntityRef {
    EntityRef {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Entity ids of the retrieved documents of one type, in result order.
pub fn entity_ids(results: &[SearchResult], doc_type: DocumentType) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for result in results {
        let metadata = &result.document.metadata;
        if metadata.doc_type == doc_type && !ids.contains(&metadata.entity_id) {
            ids.push(metadata.entity_id.clone());
        }
    }
    ids
}

fn description(text: Option<&str>) -> Option<&str> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(t, DESCRIPTION_CHARS))
}

/// Render the context block: top documents with relevance, then related
/// records, cut to `config.max_context_chars`. Empty when there is nothing
/// to say.
pub fn build_context(results: &[SearchResult], related: &RelatedEntities, config: &RagConfig) -> String {
    let mut out = String::new();

    if !results.is_empty() && config.context_documents > 0 {
        out.push_str("=== Relevant documents ===\n");
        for (index, result) in results.iter().take(config.context_documents).enumerate() {
            let content = result.document.content.trim();
            let snippet = truncate_chars(content, config.snippet_chars);
            let ellipsis = if snippet.len() < content.len() { "..." } else { "" };
            let _ = writeln!(
                out,
                "{}. [{}] {}{}",
                index + 1,
                result.document.metadata.doc_type,
                snippet,
                ellipsis
            );
            let _ = writeln!(out, "   Relevance: {:.1}%\n", result.relevance_score * 100.0);
        }
    }

    if !related.projects.is_empty() {
        out.push_str("=== Related projects ===\n");
        for project in related.projects.iter().take(RELATED_PROJECTS) {
            let _ = writeln!(
                out,
                "- {} ({}) - {}",
                project.name,
                project.status,
                description(project.description.as_deref()).unwrap_or("No description")
            );
        }
        out.push('\n');
    }

    if !related.tasks.is_empty() {
        out.push_str("=== Related tasks ===\n");
        for task in related.tasks.iter().take(RELATED_TASKS) {
            let priority = task.priority.map(|p| p.as_str()).unwrap_or("NO PRIORITY");
            let _ = write!(out, "- {} ({}, {})", task.title, task.status, priority);
            if let Some(text) = description(task.description.as_deref()) {
                let _ = write!(out, " - {}", text);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !related.contacts.is_empty() {
        out.push_str("=== Related contacts ===\n");
        for contact in related.contacts.iter().take(RELATED_CONTACTS) {
            let _ = writeln!(
                out,
                "- {} ({}) - {}",
                contact.full_name(),
                contact.email.as_deref().unwrap_or("no email"),
                contact.company_name.as_deref().unwrap_or("No company")
            );
        }
        out.push('\n');
    }

    if !related.companies.is_empty() {
        out.push_str("=== Related companies ===\n");
        for company in related.companies.iter().take(RELATED_CONTACTS) {
            let _ = write!(out, "- {}", company.name);
            if let Some(industry) = company.industry.as_deref() {
                let _ = write!(out, " ({})", industry);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !related.communications.is_empty() {
        out.push_str("=== Recent communications ===\n");
        for comm in related.communications.iter().take(RELATED_COMMUNICATIONS) {
            let _ = writeln!(
                out,
                "- {} via {} on {}",
                comm.subject.as_deref().unwrap_or("(no subject)"),
                comm.channel_name,
                comm.occurred_at().format("%Y-%m-%d")
            );
        }
        out.push('\n');
    }

    truncate_chars(out.trim_end(), config.max_context_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::{Document, Priority};

    fn result(doc_type: DocumentType, entity_id: &str, content: &str, relevance: f32) -> SearchResult {
        SearchResult {
            document: Document::new(doc_type, entity_id, "org", content),
            similarity: relevance,
            relevance_score: relevance,
        }
    }

    #[test]
    fn test_entity_ids_dedupes_by_type() {
        let results = vec![
            result(DocumentType::Task, "1", "a", 0.9),
            result(DocumentType::Project, "2", "b", 0.8),
            result(DocumentType::Task, "1", "c", 0.7),
            result(DocumentType::Task, "3", "d", 0.6),
        ];
        assert_eq!(entity_ids(&results, DocumentType::Task), vec!["1", "3"]);
        assert_eq!(entity_ids(&results, DocumentType::Project), vec!["2"]);
        assert!(entity_ids(&results, DocumentType::Contact).is_empty());
    }

    #[test]
    fn test_build_context_snippets_and_sections() {
        let long = "x".repeat(300);
        let results = vec![
            result(DocumentType::Task, "1", &long, 0.875),
            result(DocumentType::Deal, "2", "Acme renewal", 0.5),
        ];
        let mut task = TaskRecord::new("1", "org", "Renew contract");
        task.priority = Some(Priority::High);
        let related = RelatedEntities {
            tasks: vec![task],
            ..Default::default()
        };

        let context = build_context(&results, &related, &RagConfig::default());
        let expected_first = format!("1. [task] {}...", "x".repeat(200));
        assert!(context.starts_with("=== Relevant documents ===\n"));
        assert!(context.contains(&expected_first));
        assert!(context.contains("   Relevance: 87.5%"));
        assert!(context.contains("2. [deal] Acme renewal\n"));
        assert!(context.contains("=== Related tasks ===\n- Renew contract (TODO, HIGH)"));
        assert!(!context.contains("Related projects"));
    }

    #[test]
    fn test_build_context_caps_documents_and_size() {
        let results: Vec<_> = (0..8)
            .map(|i| result(DocumentType::Knowledge, &i.to_string(), "policy text", 0.7))
            .collect();
        let config = RagConfig::default();
        let context = build_context(&results, &RelatedEntities::default(), &config);
        assert!(context.contains("5. [knowledge]"));
        assert!(!context.contains("6. [knowledge]"));

        let tight = RagConfig::default().with_context_bounds(5, 200, 40);
        let context = build_context(&results, &RelatedEntities::default(), &tight);
        assert_eq!(context.chars().count(), 40);
    }

    #[test]
    fn test_build_context_empty() {
        let context = build_context(&[], &RelatedEntities::default(), &RagConfig::default());
        assert!(context.is_empty());
    }

    #[test]
    fn test_references() {
        let mut contact = ContactRecord::new("c1", "org", "Jane");
        contact.last_name = Some("Doe".into());
        let related = RelatedEntities {
            contacts: vec![contact],
            projects: vec![ProjectRecord::new("p1", "org", "Launch")],
            ..Default::default()
        };
        assert_eq!(related.count(), 2);

        let refs = related.references();
        let (key, contacts) = &refs[2];
        assert_eq!(*key, "relatedContacts");
        assert_eq!(contacts, &json!([{"id": "c1", "name": "Jane Doe"}]));
        assert_eq!(refs[0].1, json!([{"id": "p1", "name": "Launch"}]));
        assert_eq!(refs[1].1, json!([]));
    }
}
