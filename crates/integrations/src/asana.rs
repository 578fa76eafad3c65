//! Asana adapter — task listing, inspection, creation, and completion.
//!
//! Asana scopes task queries to a workspace, so list/create first resolve
//! the user's default workspace via `/users/me`.

use serde::Deserialize;
use serde_json::{json, Value};

use adjutant_domain::capability::Provider;
use adjutant_domain::tool::{ToolDefinition, ToolOutcome};

use crate::{truncate_str, Ctx};

const ASANA_API_BASE: &str = "https://app.asana.com/api/1.0";

const MAX_TASKS_CAP: u32 = 100;
/// Task notes are clipped in list views to keep result payloads small.
const LIST_NOTES_CAP: usize = 500;

const NOT_CONNECTED: &str =
    "Asana is not connected or the connection has expired. Please reconnect in settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsanaOp {
    ListTasks,
    GetTask,
    CreateTask,
    CompleteTask,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_asana_tasks".into(),
            description: "List tasks from the user's Asana account. Can filter by project, \
                          assignee, or completion status."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "projectId": { "type": "string", "description": "Filter by project ID (optional)" },
                    "completed": {
                        "type": "boolean",
                        "description": "Filter by completion status. If not specified, returns incomplete tasks."
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of tasks to return (default: 20, max: 100)"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "get_asana_task".into(),
            description: "Get detailed information about a specific Asana task by its ID.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string", "description": "The Asana task GID (global ID)" }
                },
                "required": ["taskId"]
            }),
        },
        ToolDefinition {
            name: "create_asana_task".into(),
            description: "Create a new task in Asana. Requires at minimum a task name. \
                          Optionally specify project, due date, and description."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Task name/title" },
                    "notes": { "type": "string", "description": "Task description/notes (optional)" },
                    "dueDate": { "type": "string", "description": "Due date in YYYY-MM-DD format (optional)" },
                    "projectId": { "type": "string", "description": "Project GID to add the task to (optional)" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "complete_asana_task".into(),
            description: "Mark an Asana task as complete.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": { "type": "string", "description": "The Asana task GID to mark as complete" }
                },
                "required": ["taskId"]
            }),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInput {
    project_id: Option<String>,
    completed: Option<bool>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskIdInput {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInput {
    name: String,
    notes: Option<String>,
    due_date: Option<String>,
    project_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) async fn handle(ctx: &Ctx<'_>, op: AsanaOp, input: &Value) -> ToolOutcome {
    let Some(token) = ctx.tokens.valid_access_token(ctx.user_id, Provider::Asana).await else {
        return ToolOutcome::err(NOT_CONNECTED);
    };

    match op {
        AsanaOp::ListTasks => match ListInput::deserialize(input) {
            Ok(req) => list_tasks(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid list_asana_tasks input: {e}")),
        },
        AsanaOp::GetTask => match TaskIdInput::deserialize(input) {
            Ok(req) => get_task(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid get_asana_task input: {e}")),
        },
        AsanaOp::CreateTask => match CreateInput::deserialize(input) {
            Ok(req) => create_task(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid create_asana_task input: {e}")),
        },
        AsanaOp::CompleteTask => match TaskIdInput::deserialize(input) {
            Ok(req) => complete_task(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid complete_asana_task input: {e}")),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The authenticated Asana user, including workspace membership.
async fn current_user(ctx: &Ctx<'_>, token: &str) -> Option<Value> {
    let resp = ctx
        .http
        .get(format!("{ASANA_API_BASE}/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body: Value = resp.json().await.ok()?;
    body.get("data").cloned()
}

fn first_workspace(user: &Value) -> Option<(String, String)> {
    let ws = user.get("workspaces")?.as_array()?.first()?;
    let gid = ws.get("gid")?.as_str()?.to_owned();
    let name = ws.get("name").and_then(|v| v.as_str()).unwrap_or("").to_owned();
    Some((gid, name))
}

async fn list_tasks(ctx: &Ctx<'_>, token: &str, req: ListInput) -> ToolOutcome {
    let limit = req.limit.unwrap_or(20).min(MAX_TASKS_CAP);
    let completed = req.completed.unwrap_or(false);

    let Some(user) = current_user(ctx, token).await else {
        return ToolOutcome::err("Failed to retrieve Asana user information");
    };
    let Some((workspace_gid, workspace_name)) = first_workspace(&user) else {
        return ToolOutcome::err("No Asana workspace found for this user");
    };

    let base = match &req.project_id {
        Some(project) => format!("{ASANA_API_BASE}/projects/{project}/tasks"),
        None => format!("{ASANA_API_BASE}/tasks"),
    };
    let mut url = match reqwest::Url::parse(&base) {
        Ok(u) => u,
        Err(e) => return ToolOutcome::err(format!("invalid project id: {e}")),
    };
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("limit", &limit.to_string())
            .append_pair(
                "opt_fields",
                "name,completed,due_on,due_at,assignee,assignee.name,projects,projects.name,notes,permalink_url",
            );
        if !completed {
            // "now" = only incomplete tasks.
            pairs.append_pair("completed_since", "now");
        }
        if req.project_id.is_none() {
            pairs
                .append_pair("workspace", &workspace_gid)
                .append_pair("assignee", "me");
        }
    }

    let resp = match ctx.http.get(url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "asana list request failed");
            return ToolOutcome::err("Failed to retrieve tasks from Asana");
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "asana list rejected");
        return ToolOutcome::err("Failed to retrieve tasks from Asana");
    }

    let body: Value = resp.json().await.unwrap_or_default();
    let tasks: Vec<Value> = body
        .get("data")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().map(summarize_task).collect())
        .unwrap_or_default();

    ToolOutcome::ok(json!({
        "tasks": tasks,
        "total": tasks.len(),
        "workspace": workspace_name,
    }))
}

async fn get_task(ctx: &Ctx<'_>, token: &str, req: TaskIdInput) -> ToolOutcome {
    let mut url = match reqwest::Url::parse(&format!("{ASANA_API_BASE}/tasks/{}", req.task_id)) {
        Ok(u) => u,
        Err(e) => return ToolOutcome::err(format!("invalid task id: {e}")),
    };
    url.query_pairs_mut().append_pair(
        "opt_fields",
        "name,notes,completed,completed_at,due_on,due_at,created_at,modified_at,assignee,\
         assignee.name,assignee.email,projects,projects.name,tags,tags.name,workspace,\
         workspace.name,permalink_url",
    );

    let resp = match ctx.http.get(url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "asana get request failed");
            return ToolOutcome::err("Failed to retrieve task");
        }
    };
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return ToolOutcome::err("Task not found");
    }
    if !resp.status().is_success() {
        return ToolOutcome::err("Failed to retrieve task");
    }

    let body: Value = resp.json().await.unwrap_or_default();
    let task = body.get("data").cloned().unwrap_or_default();

    let assignee = task.get("assignee").filter(|a| !a.is_null()).map(|a| {
        json!({ "name": a.get("name"), "email": a.get("email") })
    });

    ToolOutcome::ok(json!({
        "id": task.get("gid"),
        "name": task.get("name"),
        "notes": task.get("notes"),
        "completed": task.get("completed"),
        "completedAt": task.get("completed_at"),
        "dueDate": due_date(&task),
        "createdAt": task.get("created_at"),
        "modifiedAt": task.get("modified_at"),
        "assignee": assignee,
        "projects": named_refs(&task, "projects"),
        "tags": named_refs(&task, "tags"),
        "workspace": task.get("workspace").and_then(|w| w.get("name")),
        "link": task.get("permalink_url"),
    }))
}

async fn create_task(ctx: &Ctx<'_>, token: &str, req: CreateInput) -> ToolOutcome {
    let Some(user) = current_user(ctx, token).await else {
        return ToolOutcome::err("Failed to retrieve Asana user information");
    };
    let Some((workspace_gid, _)) = first_workspace(&user) else {
        return ToolOutcome::err("No Asana workspace found for this user");
    };

    let mut data = json!({
        "name": req.name,
        "workspace": workspace_gid,
        "assignee": "me",
    });
    if let Some(notes) = &req.notes {
        data["notes"] = json!(notes);
    }
    if let Some(due) = &req.due_date {
        data["due_on"] = json!(due);
    }
    if let Some(project) = &req.project_id {
        data["projects"] = json!([project]);
    }

    let resp = match ctx
        .http
        .post(format!("{ASANA_API_BASE}/tasks"))
        .bearer_auth(token)
        .json(&json!({ "data": data }))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "asana create request failed");
            return ToolOutcome::err("Failed to create task in Asana");
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "asana create rejected");
        return ToolOutcome::err("Failed to create task in Asana");
    }

    let body: Value = resp.json().await.unwrap_or_default();
    let task = body.get("data").cloned().unwrap_or_default();

    ToolOutcome::ok(json!({
        "id": task.get("gid"),
        "name": task.get("name"),
        "dueDate": task.get("due_on"),
        "link": task.get("permalink_url"),
        "message": format!("Task \"{}\" created successfully", req.name),
    }))
}

async fn complete_task(ctx: &Ctx<'_>, token: &str, req: TaskIdInput) -> ToolOutcome {
    let resp = match ctx
        .http
        .put(format!("{ASANA_API_BASE}/tasks/{}", req.task_id))
        .bearer_auth(token)
        .json(&json!({ "data": { "completed": true } }))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "asana complete request failed");
            return ToolOutcome::err("Failed to complete task");
        }
    };
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return ToolOutcome::err("Task not found");
    }
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "asana complete rejected");
        return ToolOutcome::err("Failed to complete task");
    }

    let body: Value = resp.json().await.unwrap_or_default();
    let task = body.get("data").cloned().unwrap_or_default();
    let name = task.get("name").and_then(|v| v.as_str()).unwrap_or("").to_owned();

    ToolOutcome::ok(json!({
        "id": task.get("gid"),
        "name": task.get("name"),
        "completed": task.get("completed"),
        "completedAt": task.get("completed_at"),
        "message": format!("Task \"{name}\" marked as complete"),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn due_date(task: &Value) -> Value {
    task.get("due_on")
        .filter(|v| !v.is_null())
        .or_else(|| task.get("due_at").filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or(Value::Null)
}

fn named_refs(task: &Value, field: &str) -> Value {
    task.get(field)
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .map(|p| json!({ "id": p.get("gid"), "name": p.get("name") }))
                .collect::<Vec<_>>()
        })
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn summarize_task(task: &Value) -> Value {
    let notes = task
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|n| truncate_str(n, LIST_NOTES_CAP));

    json!({
        "id": task.get("gid"),
        "name": task.get("name"),
        "notes": notes,
        "completed": task.get("completed"),
        "dueDate": due_date(task),
        "assignee": task.get("assignee").and_then(|a| a.get("name")),
        "projects": named_refs(task, "projects"),
        "link": task.get("permalink_url"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_clips_long_notes() {
        let long_notes = "n".repeat(LIST_NOTES_CAP + 100);
        let task = json!({ "gid": "1", "name": "t", "notes": long_notes });
        let s = summarize_task(&task);
        assert_eq!(s["notes"].as_str().unwrap().len(), LIST_NOTES_CAP);
    }

    #[test]
    fn due_date_prefers_due_on() {
        let both = json!({ "due_on": "2024-02-01", "due_at": "2024-02-01T17:00:00Z" });
        assert_eq!(due_date(&both), "2024-02-01");
        let only_at = json!({ "due_on": null, "due_at": "2024-02-01T17:00:00Z" });
        assert_eq!(due_date(&only_at), "2024-02-01T17:00:00Z");
        assert_eq!(due_date(&json!({})), Value::Null);
    }

    #[test]
    fn first_workspace_reads_gid_and_name() {
        let user = json!({ "workspaces": [
            { "gid": "ws-1", "name": "Acme" },
            { "gid": "ws-2", "name": "Side" },
        ]});
        assert_eq!(first_workspace(&user), Some(("ws-1".into(), "Acme".into())));
        assert_eq!(first_workspace(&json!({ "workspaces": [] })), None);
        assert_eq!(first_workspace(&json!({})), None);
    }

    #[test]
    fn create_input_requires_name() {
        assert!(CreateInput::deserialize(&json!({})).is_err());
        let req = CreateInput::deserialize(&json!({ "name": "Review contract" })).unwrap();
        assert_eq!(req.name, "Review contract");
        assert!(req.project_id.is_none());
    }
}
