// src/notify/template.rs

//! Message rendering for approval lifecycle events.

use serde_json::json;

use crate::approval::types::{ApprovalRequest, ApprovalStatus};
use crate::notify::RenderedMessage;

/// Substitute `{name}` placeholders from `(name, value)` pairs.
///
/// Unknown placeholders are left verbatim so a typo in a template shows
/// up in the delivered message instead of vanishing.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Renders the three approval lifecycle messages.
#[derive(Debug, Clone, Default)]
pub struct Templates;

impl Templates {
    /// Message sent to approvers when a request is created.
    pub fn request_created(&self, request: &ApprovalRequest) -> RenderedMessage {
        let deadline = request.timeout_at.to_rfc3339();
        let vars = [
            ("title", request.title.as_str()),
            ("description", request.description.as_str()),
            ("job", request.job_id.as_str()),
            ("deadline", deadline.as_str()),
        ];
        RenderedMessage {
            request_id: request.id.clone(),
            subject: render("Approval needed: {title}", &vars),
            plain: render(
                "Approval needed for job '{job}': {title}\n{description}\nRespond before {deadline}.",
                &vars,
            ),
            chat: render(
                ":hourglass: *Approval needed*: {title}\n_{description}_\nJob `{job}`, deadline {deadline}",
                &vars,
            ),
            recipients: request.approvers.clone(),
            payload: json!({
                "event": "approval.requested",
                "request_id": request.id,
                "execution_id": request.execution_id,
                "job_id": request.job_id,
                "title": request.title,
                "description": request.description,
                "context": request.context,
                "approvers": request.approvers,
                "require_min_approvers": request.require_min_approvers,
                "timeout_at": request.timeout_at,
            }),
        }
    }

    /// Message sent once a request reaches a terminal status.
    pub fn request_resolved(&self, request: &ApprovalRequest) -> RenderedMessage {
        let status = request.status.to_string();
        let decided_by = request
            .decisions
            .last()
            .map(|d| d.approver_id.clone())
            .unwrap_or_else(|| "nobody".to_string());
        let emoji = match request.status {
            ApprovalStatus::Approved => ":white_check_mark:",
            ApprovalStatus::Rejected => ":x:",
            _ => ":no_entry_sign:",
        };
        let vars = [
            ("title", request.title.as_str()),
            ("status", status.as_str()),
            ("by", decided_by.as_str()),
            ("emoji", emoji),
        ];
        RenderedMessage {
            request_id: request.id.clone(),
            subject: render("Approval {status}: {title}", &vars),
            plain: render("'{title}' was {status} (last decision by {by}).", &vars),
            chat: render("{emoji} *{title}* was *{status}* (last decision by {by})", &vars),
            recipients: request.approvers.clone(),
            payload: json!({
                "event": "approval.resolved",
                "request_id": request.id,
                "execution_id": request.execution_id,
                "job_id": request.job_id,
                "status": request.status,
                "decisions": request.decisions,
            }),
        }
    }

    /// Message sent to the escalation target when a request expires.
    pub fn escalation(&self, request: &ApprovalRequest, target: &str) -> RenderedMessage {
        let vars = [
            ("title", request.title.as_str()),
            ("job", request.job_id.as_str()),
        ];
        RenderedMessage {
            request_id: request.id.clone(),
            subject: render("Escalation: {title}", &vars),
            plain: render(
                "Approval request '{title}' for job '{job}' expired without a decision.",
                &vars,
            ),
            chat: render(
                ":rotating_light: *Escalation*: approval for `{job}` ({title}) expired undecided",
                &vars,
            ),
            recipients: vec![target.to_string()],
            payload: json!({
                "event": "approval.escalated",
                "request_id": request.id,
                "execution_id": request.execution_id,
                "job_id": request.job_id,
                "escalated_to": target,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let out = render("hello {who}, {what}", &[("who", "world"), ("what", "hi")]);
        assert_eq!(out, "hello world, hi");
    }

    #[test]
    fn leaves_unknown_placeholders_verbatim() {
        let out = render("hello {who}", &[("name", "world")]);
        assert_eq!(out, "hello {who}");
    }
}
