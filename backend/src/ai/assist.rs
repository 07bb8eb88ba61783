use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use shared::{ParsedTask, Priority, SummaryStats, TaskSuggestion};

use super::{parse_reply, AiError, TextModel};
use crate::store::TaskRecord;

/// How many tasks are described to the model at most.
pub const CONTEXT_TASK_LIMIT: usize = 10;
pub const MAX_CATEGORIES: usize = 3;
pub const EMPTY_SUMMARY: &str = "No tasks yet. Add some tasks to get started!";

const CATEGORY_VOCABULARY: &str =
    "work, personal, shopping, health, finance, home, errands, learning, social, travel";

#[derive(Clone)]
pub struct AiAssistService {
    model: Arc<dyn TextModel>,
}

#[derive(Debug, Deserialize)]
struct ParsedReply {
    title: Option<String>,
    description: Option<String>,
    due_date: Option<String>,
    priority: Option<String>,
    categories: Option<Vec<String>>,
}

impl AiAssistService {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Extracts a task draft from free text. Relative dates in `text` resolve
    /// against `today`.
    pub async fn parse_natural_language(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<ParsedTask, AiError> {
        let prompt = parse_prompt(text, today);
        let reply = self.model.generate(&prompt).await?;
        let parsed: ParsedReply = parse_reply(&reply)?;

        let priority = parsed.priority.as_deref().and_then(|raw| {
            raw.parse::<Priority>()
                .map_err(|error| tracing::debug!(%error, "dropping model priority"))
                .ok()
        });

        Ok(ParsedTask {
            title: parsed
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| text.to_string()),
            description: parsed.description,
            due_date: parsed.due_date,
            priority,
            categories: parsed.categories,
        })
    }

    /// Two or three follow-up ideas based on the caller's recent tasks. No
    /// model call is made when there are no tasks.
    pub async fn suggestions(&self, tasks: &[TaskRecord]) -> Result<Vec<TaskSuggestion>, AiError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = suggestions_prompt(tasks);
        let reply = self.model.generate(&prompt).await?;
        parse_reply(&reply)
    }

    pub async fn categorize(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Vec<String>, AiError> {
        let prompt = categorize_prompt(title, description);
        let reply = self.model.generate(&prompt).await?;
        let mut categories: Vec<String> = parse_reply(&reply)?;
        categories.truncate(MAX_CATEGORIES);
        Ok(categories)
    }

    /// Narrative status summary plus statistics computed locally against `now`.
    pub async fn summary(
        &self,
        tasks: &[TaskRecord],
        now: DateTime<Utc>,
    ) -> Result<(String, SummaryStats), AiError> {
        let stats = summary_stats(tasks, now);
        if tasks.is_empty() {
            return Ok((EMPTY_SUMMARY.to_string(), stats));
        }

        let prompt = summary_prompt(tasks, &stats);
        let reply = self.model.generate(&prompt).await?;
        Ok((reply.trim().to_string(), stats))
    }
}

pub fn summary_stats(tasks: &[TaskRecord], now: DateTime<Utc>) -> SummaryStats {
    let open = || tasks.iter().filter(|task| !task.completed);
    SummaryStats {
        total: tasks.len(),
        completed: tasks.iter().filter(|task| task.completed).count(),
        high_priority: open()
            .filter(|task| task.priority() == Some(Priority::High))
            .count(),
        overdue: open()
            .filter(|task| task.due_date.is_some_and(|due| due < now))
            .count(),
    }
}

fn priority_label(task: &TaskRecord) -> &'static str {
    task.priority().map_or("none", Priority::as_str)
}

fn parse_prompt(text: &str, today: NaiveDate) -> String {
    format!(
        r#"Parse this task input into structured data. Today's date is {today}.

Input: "{text}"

Return ONLY valid JSON with these fields:
- title: string (the main task action)
- description: string or null (additional details if any)
- due_date: ISO datetime string or null (e.g., "2024-01-15T17:00:00")
- priority: "low", "medium", "high", or null
- categories: array of strings or null

Examples of date parsing:
- "tomorrow" = next day
- "next week" = 7 days from today
- "Monday" = next Monday
- "5pm" = today at 17:00
- "morning" = 09:00
- "evening" = 18:00

Priority keywords: urgent/important/asap = high, normal = medium, whenever/someday = low

Return only the JSON object, no markdown formatting."#,
        today = today.format("%Y-%m-%d"),
    )
}

fn suggestions_prompt(tasks: &[TaskRecord]) -> String {
    let mut listing = String::new();
    for task in tasks.iter().take(CONTEXT_TASK_LIMIT) {
        let _ = writeln!(
            listing,
            "- {} (completed: {}, priority: {})",
            task.title,
            task.completed,
            priority_label(task)
        );
    }

    format!(
        r#"Based on these existing tasks, suggest 2-3 follow-up or related tasks that might be helpful.

Current tasks:
{listing}
Return ONLY valid JSON array with objects containing:
- title: string (suggested task)
- reason: string (brief explanation why this is suggested)

Example: [{{"title": "Review grocery list", "reason": "Preparation for your shopping task"}}]

Return only the JSON array, no markdown formatting."#
    )
}

fn categorize_prompt(title: &str, description: Option<&str>) -> String {
    let task_text = match description.filter(|d| !d.is_empty()) {
        Some(description) => format!("{title} - {description}"),
        None => title.to_string(),
    };

    format!(
        r#"Categorize this task into 1-3 relevant categories.

Task: "{task_text}"

Common categories: {CATEGORY_VOCABULARY}

Return ONLY a JSON array of category strings, e.g., ["work", "urgent"]
No markdown formatting."#
    )
}

fn summary_prompt(tasks: &[TaskRecord], stats: &SummaryStats) -> String {
    let mut listing = String::new();
    for task in tasks
        .iter()
        .filter(|task| !task.completed)
        .take(CONTEXT_TASK_LIMIT)
    {
        let due = task
            .due_date
            .map_or_else(|| "none".to_string(), |due| due.to_rfc3339());
        let _ = writeln!(
            listing,
            "- {} (priority: {}, due: {due})",
            task.title,
            priority_label(task)
        );
    }

    format!(
        "Generate a brief, helpful daily summary for these tasks.

Stats: {} total, {} completed, {} high priority, {} overdue

Incomplete tasks:
{listing}
Write 2-3 sentences: acknowledge progress, highlight priorities, give one actionable suggestion.
Be encouraging but concise. No markdown formatting.",
        stats.total, stats.completed, stats.high_priority, stats.overdue
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    use crate::ai::CannedModel;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
    }

    fn task(id: i64, title: &str) -> TaskRecord {
        TaskRecord {
            id,
            user_id: "alice".into(),
            title: title.into(),
            description: None,
            completed: false,
            due_date: None,
            priority: None,
            categories: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn service(model: &Arc<CannedModel>) -> AiAssistService {
        AiAssistService::new(model.clone())
    }

    #[tokio::test]
    async fn parse_anchors_prompt_to_today_and_reads_fenced_json() {
        let model = Arc::new(CannedModel::reply(
            "```json\n{\"title\": \"Call dentist\", \"due_date\": \"2025-05-21T09:00:00\", \
             \"priority\": \"high\", \"categories\": [\"health\"]}\n```",
        ));
        let today = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();

        let parsed = service(&model)
            .parse_natural_language("call the dentist tomorrow morning, urgent", today)
            .await
            .unwrap();

        assert_eq!(parsed.title, "Call dentist");
        assert_eq!(parsed.due_date.as_deref(), Some("2025-05-21T09:00:00"));
        assert_eq!(parsed.priority, Some(Priority::High));
        assert_eq!(parsed.categories, Some(vec!["health".to_string()]));
        assert!(parsed.description.is_none());

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Today's date is 2025-05-20."));
        assert!(prompt.contains("call the dentist tomorrow morning, urgent"));
        assert!(prompt.contains("\"evening\" = 18:00"));
    }

    #[tokio::test]
    async fn parse_falls_back_to_input_title() {
        let model = Arc::new(CannedModel::reply(r#"{"priority": "someday"}"#));
        let today = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();

        let parsed = service(&model)
            .parse_natural_language("tidy garage", today)
            .await
            .unwrap();

        assert_eq!(parsed.title, "tidy garage");
        assert_eq!(parsed.priority, None);
    }

    #[tokio::test]
    async fn parse_rejects_wrongly_typed_fields() {
        let model = Arc::new(CannedModel::reply(r#"{"title": "x", "categories": "work"}"#));
        let today = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
        let result = service(&model).parse_natural_language("x", today).await;
        assert!(matches!(result, Err(AiError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn suggestions_skip_the_model_without_tasks() {
        let model = Arc::new(CannedModel::reply("[]"));
        let suggestions = service(&model).suggestions(&[]).await.unwrap();
        assert!(suggestions.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn suggestions_describe_at_most_ten_tasks() {
        let model = Arc::new(CannedModel::reply(
            r#"[{"title": "Review grocery list", "reason": "Preparation for shopping"}]"#,
        ));
        let tasks: Vec<TaskRecord> = (1..=12).map(|i| task(i, &format!("task-{i:02}"))).collect();

        let suggestions = service(&model).suggestions(&tasks).await.unwrap();
        assert_eq!(
            suggestions,
            vec![TaskSuggestion {
                title: "Review grocery list".into(),
                reason: "Preparation for shopping".into(),
            }]
        );

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("- task-10 (completed: false, priority: none)"));
        assert!(!prompt.contains("task-11"));
    }

    #[tokio::test]
    async fn categorize_keeps_at_most_three() {
        let model = Arc::new(CannedModel::reply(
            r#"["work", "finance", "learning", "social", "travel"]"#,
        ));
        let categories = service(&model)
            .categorize("File taxes", Some("before April"))
            .await
            .unwrap();

        assert_eq!(categories, vec!["work", "finance", "learning"]);
        assert!(model.prompts()[0].contains(r#"Task: "File taxes - before April""#));
    }

    #[tokio::test]
    async fn model_failures_propagate() {
        let model = Arc::new(CannedModel::failing(500, "boom"));
        let result = service(&model).categorize("File taxes", None).await;
        assert!(matches!(result, Err(AiError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn empty_summary_is_fixed_and_free() {
        let model = Arc::new(CannedModel::reply("unused"));
        let (summary, stats) = service(&model).summary(&[], now()).await.unwrap();

        assert_eq!(summary, EMPTY_SUMMARY);
        assert_eq!(stats, SummaryStats::default());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn summary_stats_are_computed_locally() {
        let model = Arc::new(CannedModel::reply("  Nice progress today.  "));

        let mut done = task(1, "done");
        done.completed = true;
        done.priority = Some("high".into());
        done.due_date = Some(now() - chrono::Duration::days(2));

        let mut urgent = task(2, "urgent and late");
        urgent.priority = Some("high".into());
        urgent.due_date = Some(now() - chrono::Duration::hours(1));

        let mut upcoming = task(3, "upcoming");
        upcoming.due_date = Some(now() + chrono::Duration::hours(1));
        upcoming.categories = Some(Json(vec!["home".into()]));

        let mut due_now = task(4, "due exactly now");
        due_now.due_date = Some(now());

        let tasks = vec![done, urgent, upcoming, due_now];
        let (summary, stats) = service(&model).summary(&tasks, now()).await.unwrap();

        assert_eq!(summary, "Nice progress today.");
        assert_eq!(
            stats,
            SummaryStats {
                total: 4,
                high_priority: 1,
                completed: 1,
                overdue: 1,
            }
        );

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Stats: 4 total, 1 completed, 1 high priority, 1 overdue"));
        assert!(prompt.contains("- urgent and late (priority: high, due: 2025-05-20T11:00:00+00:00)"));
        assert!(!prompt.contains("- done ("));
    }
}
