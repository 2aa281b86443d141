//! Issue and project lookup tools backed by an [`IssueDirectory`].
//!
//! The model can ask for any id it likes, so every call re-checks the
//! caller's team membership before returning data.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::tool::{Tool, ToolDefinition, ToolError};
use acacia_core::{CallerIdentity, RequestContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
}

impl Issue {
    fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
}

/// A board column issues move through, ordered by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusColumn {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub position: i32,
}

/// Read access to issues, projects and team membership.
#[async_trait]
pub trait IssueDirectory: Send + Sync {
    /// Owning team of an issue, `None` if the issue does not exist.
    async fn team_of_issue(&self, issue_id: i64) -> anyhow::Result<Option<i64>>;
    async fn is_team_member(&self, team_id: i64, user_id: i64) -> anyhow::Result<bool>;
    async fn get_issue(&self, issue_id: i64) -> anyhow::Result<Option<Issue>>;
    /// Projects owned by any team the user belongs to.
    async fn projects_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Project>>;
    async fn issues_for_project(&self, project_id: i64) -> anyhow::Result<Vec<Issue>>;
    async fn get_project(&self, project_id: i64) -> anyhow::Result<Option<Project>>;
    async fn columns_for_project(&self, project_id: i64) -> anyhow::Result<Vec<StatusColumn>>;
}

fn require_caller(context: &RequestContext) -> Result<CallerIdentity, ToolError> {
    context
        .caller
        .ok_or_else(|| ToolError::PermissionDenied("user not authenticated".to_string()))
}

/// Integer id argument; JSON numbers from models are often floats ("7.0").
fn id_arg(args: &Map<String, Value>, key: &str) -> Result<i64, ToolError> {
    args.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| ToolError::InvalidInput(format!("invalid {key}: expected number")))
}

fn to_output(value: impl Serialize) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Other(e.into()))
}

/// Returns one issue after checking the caller belongs to its team.
pub struct GetIssueDetailsTool {
    directory: Arc<dyn IssueDirectory>,
}

impl GetIssueDetailsTool {
    pub fn new(directory: Arc<dyn IssueDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for GetIssueDetailsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_issue_details".to_string(),
            description: "Get detailed information about a specific issue. Requires the issue ID."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "issue_id": {
                        "type": "number",
                        "description": "The ID of the issue to retrieve"
                    }
                },
                "required": ["issue_id"]
            }),
        }
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, ToolError> {
        let caller = require_caller(context)?;
        let issue_id = id_arg(&args, "issue_id")?;

        let team_id = self
            .directory
            .team_of_issue(issue_id)
            .await?
            .ok_or_else(|| ToolError::ExecutionFailed("issue not found".to_string()))?;

        if !self.directory.is_team_member(team_id, caller.user_id).await? {
            warn!(issue_id, user_id = caller.user_id, "issue access denied");
            return Err(ToolError::PermissionDenied(
                "user does not have access to this issue".to_string(),
            ));
        }

        let issue = self
            .directory
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ToolError::ExecutionFailed("issue not found".to_string()))?;

        info!(issue_id, user_id = caller.user_id, "fetched issue details");
        to_output(issue)
    }
}

/// Case-insensitive text search across every project the caller can see.
pub struct SearchIssuesTool {
    directory: Arc<dyn IssueDirectory>,
}

impl SearchIssuesTool {
    pub fn new(directory: Arc<dyn IssueDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for SearchIssuesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_issues".to_string(),
            description: "Search for issues across all projects the user has access to. \
                          Returns issues matching the search query."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find matching issues"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, ToolError> {
        let caller = require_caller(context)?;
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("invalid query: expected string".to_string()))?;
        let needle = query.to_lowercase();

        let projects = self.directory.projects_for_user(caller.user_id).await?;

        let mut matches = Vec::new();
        for project in &projects {
            if context.is_cancelled() {
                return Err(ToolError::Cancelled);
            }
            match self.directory.issues_for_project(project.id).await {
                Ok(issues) => matches.extend(issues.into_iter().filter(|i| i.matches(&needle))),
                Err(e) => {
                    warn!(project_id = project.id, error = %e, "skipping project, issue listing failed");
                }
            }
        }

        info!(
            query,
            match_count = matches.len(),
            searched_projects = projects.len(),
            "issue search completed"
        );
        to_output(matches)
    }
}

/// Returns a project with its columns and issues after checking the caller
/// belongs to the owning team.
pub struct GetProjectDetailsTool {
    directory: Arc<dyn IssueDirectory>,
}

impl GetProjectDetailsTool {
    pub fn new(directory: Arc<dyn IssueDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for GetProjectDetailsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_project_details".to_string(),
            description: "Get detailed information about a specific project, including its \
                          columns and issues. Requires the project ID."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {
                        "type": "number",
                        "description": "The ID of the project to retrieve"
                    }
                },
                "required": ["project_id"]
            }),
        }
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, ToolError> {
        let caller = require_caller(context)?;
        let project_id = id_arg(&args, "project_id")?;

        let project = self
            .directory
            .get_project(project_id)
            .await?
            .ok_or_else(|| ToolError::ExecutionFailed("project not found".to_string()))?;

        if !self.directory.is_team_member(project.team_id, caller.user_id).await? {
            warn!(project_id, user_id = caller.user_id, "project access denied");
            return Err(ToolError::PermissionDenied(
                "user does not have access to this project".to_string(),
            ));
        }

        let columns = self.directory.columns_for_project(project_id).await?;
        let issues = self.directory.issues_for_project(project_id).await?;

        info!(
            project_id,
            column_count = columns.len(),
            issue_count = issues.len(),
            "fetched project details"
        );
        Ok(json!({
            "project": to_output(project)?,
            "columns": to_output(columns)?,
            "issues": to_output(issues)?,
        }))
    }
}

/// Lists every project owned by a team the caller belongs to.
pub struct GetUserProjectsTool {
    directory: Arc<dyn IssueDirectory>,
}

impl GetUserProjectsTool {
    pub fn new(directory: Arc<dyn IssueDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for GetUserProjectsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_user_projects".to_string(),
            description: "Get all projects that the user has access to. Returns a list of \
                          projects with their basic information."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        _args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, ToolError> {
        let caller = require_caller(context)?;
        let projects = self.directory.projects_for_user(caller.user_id).await?;
        info!(user_id = caller.user_id, project_count = projects.len(), "fetched user projects");
        to_output(projects)
    }
}

#[derive(Default)]
struct DirectoryData {
    members: HashSet<(i64, i64)>,
    projects: Vec<Project>,
    columns: Vec<StatusColumn>,
    issues: Vec<Issue>,
    broken_projects: HashSet<i64>,
}

/// In-process [`IssueDirectory`] for local runs and tests.
#[derive(Default, Clone)]
pub struct MemoryIssueDirectory {
    data: Arc<RwLock<DirectoryData>>,
}

impl MemoryIssueDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, team_id: i64, user_id: i64) {
        self.write().members.insert((team_id, user_id));
    }

    pub fn add_project(&self, project: Project) {
        self.write().projects.push(project);
    }

    pub fn add_column(&self, column: StatusColumn) {
        self.write().columns.push(column);
    }

    pub fn add_issue(&self, issue: Issue) {
        self.write().issues.push(issue);
    }

    /// Make issue listing fail for one project.
    pub fn break_project(&self, project_id: i64) {
        self.write().broken_projects.insert(project_id);
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryData> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryData> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IssueDirectory for MemoryIssueDirectory {
    async fn team_of_issue(&self, issue_id: i64) -> anyhow::Result<Option<i64>> {
        let data = self.read();
        let project_by_id: HashMap<i64, i64> =
            data.projects.iter().map(|p| (p.id, p.team_id)).collect();
        Ok(data
            .issues
            .iter()
            .find(|i| i.id == issue_id)
            .and_then(|i| project_by_id.get(&i.project_id).copied()))
    }

    async fn is_team_member(&self, team_id: i64, user_id: i64) -> anyhow::Result<bool> {
        Ok(self.read().members.contains(&(team_id, user_id)))
    }

    async fn get_issue(&self, issue_id: i64) -> anyhow::Result<Option<Issue>> {
        Ok(self.read().issues.iter().find(|i| i.id == issue_id).cloned())
    }

    async fn projects_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Project>> {
        let data = self.read();
        Ok(data
            .projects
            .iter()
            .filter(|p| data.members.contains(&(p.team_id, user_id)))
            .cloned()
            .collect())
    }

    async fn issues_for_project(&self, project_id: i64) -> anyhow::Result<Vec<Issue>> {
        let data = self.read();
        if data.broken_projects.contains(&project_id) {
            anyhow::bail!("issue listing unavailable for project {project_id}");
        }
        Ok(data
            .issues
            .iter()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_project(&self, project_id: i64) -> anyhow::Result<Option<Project>> {
        Ok(self.read().projects.iter().find(|p| p.id == project_id).cloned())
    }

    async fn columns_for_project(&self, project_id: i64) -> anyhow::Result<Vec<StatusColumn>> {
        let mut columns: Vec<StatusColumn> = self
            .read()
            .columns
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }
}
