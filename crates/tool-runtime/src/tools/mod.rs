//! Built-in tool implementations for the agentic runtime.
//!
//! - `calculate`: pure arithmetic, no caller data
//! - `get_issue_details`, `search_issues`, `get_project_details`,
//!   `get_user_projects`: read tracker data through an [`IssueDirectory`],
//!   re-checking the caller's team membership on every call

pub mod calculate;
pub mod issues;

pub use calculate::CalculateTool;
pub use issues::{
    GetIssueDetailsTool, GetProjectDetailsTool, GetUserProjectsTool, Issue, IssueDirectory,
    MemoryIssueDirectory, Project, SearchIssuesTool, StatusColumn,
};
