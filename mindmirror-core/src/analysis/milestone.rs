//! Progress insights for a milestone and its tasks.

use super::string_list;
use crate::llm::ResilientApiInvoker;
use crate::types::{MilestoneInsights, MilestoneRequest};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

const STATUS_SUCCESS: &str = "SUCCESS";
const STATUS_ERROR: &str = "ERROR";

pub struct MilestoneInsightsAssembler {
    invoker: Arc<ResilientApiInvoker>,
}

impl MilestoneInsightsAssembler {
    pub fn new(invoker: Arc<ResilientApiInvoker>) -> Self {
        Self { invoker }
    }

    pub fn insights(&self, milestone: &MilestoneRequest) -> MilestoneInsights {
        let prompt = build_prompt(milestone);
        match self.invoker.invoke_structured(&prompt) {
            Some(reply) if reply.is_object() => {
                let status = match reply.get("status").and_then(Value::as_str) {
                    Some(status) => status.to_string(),
                    None => {
                        tracing::warn!("Milestone insights missing status, assuming success");
                        STATUS_SUCCESS.to_string()
                    }
                };
                MilestoneInsights {
                    remaining_work: text_field(&reply, "remainingWork"),
                    performance_assessment: text_field(&reply, "performanceAssessment"),
                    tips: string_list(reply.get("tips"), "tips"),
                    encouragement: text_field(&reply, "encouragement"),
                    suggested_new_tasks: string_list(
                        reply.get("suggestedNewTasks"),
                        "suggestedNewTasks",
                    ),
                    status,
                }
            }
            _ => {
                tracing::error!(
                    title = milestone.title.as_deref().unwrap_or_default(),
                    "Milestone insights unavailable, returning fallback"
                );
                fallback_insights()
            }
        }
    }
}

/// Insights returned when the service produced nothing usable.
pub fn fallback_insights() -> MilestoneInsights {
    MilestoneInsights {
        remaining_work: "Unable to determine remaining work.".to_string(),
        performance_assessment: "Unable to assess performance.".to_string(),
        tips: vec![
            "Review milestone details manually.".to_string(),
            "Ensure all tasks are updated.".to_string(),
        ],
        encouragement: "Keep going! Manual review can also provide clarity.".to_string(),
        suggested_new_tasks: Vec::new(),
        status: STATUS_ERROR.to_string(),
    }
}

fn text_field(reply: &Value, key: &str) -> String {
    match reply.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

fn build_prompt(milestone: &MilestoneRequest) -> String {
    let mut tasks = String::new();
    if milestone.tasks.is_empty() {
        tasks.push_str("No specific tasks defined for this milestone.\n");
    } else {
        tasks.push_str("Tasks:\n");
        for task in &milestone.tasks {
            let _ = writeln!(
                tasks,
                "- {} (Status: {}, Due: {})",
                task.description.as_deref().unwrap_or("Unnamed task"),
                task.status.as_deref().unwrap_or("PENDING"),
                task.due_date.as_deref().unwrap_or("No due date"),
            );
        }
    }

    format!(
        r#"Review this milestone and its tasks and give the person practical insight into their progress.

Milestone:
Title: {title}
Description: {description}
Due date: {due}
Current status: {status}
Completion: {completion}%
{tasks}
Respond with a single JSON object with these keys:
- "remainingWork": what is left to do, and how much time remains if there is a due date
- "performanceAssessment": whether they are on track, falling behind or excelling
- "tips": array of 2-3 practical tips
- "encouragement": one short encouraging sentence
- "suggestedNewTasks": array of 1-2 concrete next-step tasks
- "status": "SUCCESS", "PARTIAL" or "ERROR" describing how complete these insights are
"#,
        title = milestone.title.as_deref().unwrap_or("a goal"),
        description = milestone
            .description
            .as_deref()
            .unwrap_or("no detailed description."),
        due = milestone.due_date.as_deref().unwrap_or("Not set"),
        status = milestone.status.as_deref().unwrap_or("PENDING"),
        completion = milestone.completion_percentage.unwrap_or(0.0),
    )
}
