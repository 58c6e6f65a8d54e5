//! GitHub REST integration for the commit time tracker.
//!
//! Provides the remote side of commit synchronization:
//! - Resolving `owner/repo` to a stable repository id
//! - Listing commit summaries page by page, optionally bounded by `since`
//! - Fetching per-commit change statistics

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ct_core::ProjectRef;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_API_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("ct/", env!("CARGO_PKG_VERSION"));
const REPOSITORIES_PER_PAGE: u32 = 100;

/// GitHub client errors.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The provided token was empty.
    #[error("invalid GitHub token: {reason}")]
    InvalidToken { reason: &'static str },
    /// The token was rejected by the API.
    #[error("GitHub rejected the credentials (status {status})")]
    Unauthorized { status: u16 },
    /// The repository or commit does not exist or is not visible.
    #[error("not found on GitHub: {resource}")]
    NotFound { resource: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed, including timeouts.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GitHubError {
    /// True for errors that mean the credentials are missing or unusable.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::InvalidToken { .. } | Self::Unauthorized { .. })
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A repository resolved on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: i64,
    pub full_name: String,
}

/// One entry of a commit listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCommit {
    pub id: String,
    pub authored_at: Option<DateTime<Utc>>,
}

/// Detailed statistics for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    pub id: String,
    pub message: String,
    pub authored_at: DateTime<Utc>,
    pub additions: u32,
    pub deletions: u32,
    pub files_changed: u32,
}

/// A repository visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RemoteRepository {
    pub id: i64,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub language: Option<String>,
    pub stargazers_count: u32,
    pub updated_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

/// Remote commit history as consumed by the sync controller.
///
/// Implementations must be cheap to share across tasks; detail fetches are
/// issued concurrently.
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Resolves `owner/repo` to the remote repository id.
    async fn resolve_project(&self, project: &ProjectRef) -> Result<RemoteProject, GitHubError>;

    /// Lists one page of commits, newest first. `page` starts at 1.
    async fn list_commits(
        &self,
        project: &ProjectRef,
        since: Option<DateTime<Utc>>,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<ListedCommit>, GitHubError>;

    /// Fetches message and change statistics for one commit.
    async fn get_commit_detail(
        &self,
        project: &ProjectRef,
        id: &str,
    ) -> Result<CommitDetail, GitHubError>;
}

/// GitHub REST API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for api.github.com with the default timeout.
    pub fn new(token: impl Into<String>) -> Result<Self, GitHubError> {
        Self::with_options(token, DEFAULT_API_URL, DEFAULT_TIMEOUT)
    }

    /// Creates a client against a custom API root (e.g. GitHub Enterprise).
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or whitespace-only, or if the
    /// HTTP client fails to build.
    pub fn with_options(
        token: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, GitHubError> {
        let token = token.into();

        if token.is_empty() {
            return Err(GitHubError::InvalidToken {
                reason: "token cannot be empty",
            });
        }
        if token.trim().is_empty() {
            return Err(GitHubError::InvalidToken {
                reason: "token cannot be whitespace-only",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(GitHubError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    /// Lists repositories the user owns or collaborates on, most recently
    /// updated first.
    pub async fn list_repositories(&self) -> Result<Vec<RemoteRepository>, GitHubError> {
        let url = format!("{}/user/repos", self.base_url);
        let per_page = REPOSITORIES_PER_PAGE.to_string();
        let payload: Vec<RepositoryPayload> = self
            .get_json(
                &url,
                &[
                    ("per_page", per_page.as_str()),
                    ("sort", "updated"),
                    ("affiliation", "owner,collaborator"),
                ],
                "user repositories",
            )
            .await?;
        Ok(payload.into_iter().map(RemoteRepository::from).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        resource: &str,
    ) -> Result<T, GitHubError> {
        tracing::debug!(url, ?query, "GitHub request");
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_for_status(status, &body, resource));
        }
        serde_json::from_str(&body).map_err(|err| GitHubError::InvalidResponse(err.to_string()))
    }

    fn repo_url(&self, project: &ProjectRef) -> String {
        format!("{}/repos/{}/{}", self.base_url, project.owner, project.repo)
    }
}

#[async_trait]
impl HistoryClient for GitHubClient {
    async fn resolve_project(&self, project: &ProjectRef) -> Result<RemoteProject, GitHubError> {
        let payload: RepositoryPayload = self
            .get_json(&self.repo_url(project), &[], &project.full_name())
            .await?;
        Ok(RemoteProject {
            id: payload.id,
            full_name: payload.full_name,
        })
    }

    async fn list_commits(
        &self,
        project: &ProjectRef,
        since: Option<DateTime<Utc>>,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<ListedCommit>, GitHubError> {
        let url = format!("{}/commits", self.repo_url(project));
        let query = list_query(since, per_page, page);
        let borrowed: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let payload: Vec<CommitPayload> = self
            .get_json(&url, &borrowed, &project.full_name())
            .await?;
        Ok(payload.into_iter().map(ListedCommit::from).collect())
    }

    async fn get_commit_detail(
        &self,
        project: &ProjectRef,
        id: &str,
    ) -> Result<CommitDetail, GitHubError> {
        let url = format!("{}/commits/{id}", self.repo_url(project));
        let resource = format!("{}@{id}", project.full_name());
        let payload: CommitPayload = self.get_json(&url, &[], &resource).await?;
        CommitDetail::try_from(payload)
    }
}

fn list_query(
    since: Option<DateTime<Utc>>,
    per_page: u32,
    page: u32,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("per_page", per_page.to_string()),
        ("page", page.max(1).to_string()),
    ];
    if let Some(since) = since {
        query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    query
}

fn error_for_status(status: StatusCode, body: &str, resource: &str) -> GitHubError {
    match status {
        StatusCode::UNAUTHORIZED => GitHubError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => GitHubError::NotFound {
            resource: resource.to_string(),
        },
        _ => GitHubError::Api {
            status: status.as_u16(),
            message: parse_api_message(body).unwrap_or_else(|| body.trim().to_string()),
        },
    }
}

fn parse_api_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| payload.message)
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    id: i64,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: String,
}

impl From<RepositoryPayload> for RemoteRepository {
    fn from(payload: RepositoryPayload) -> Self {
        Self {
            id: payload.id,
            full_name: payload.full_name,
            description: payload.description,
            private: payload.private,
            language: payload.language,
            stargazers_count: payload.stargazers_count,
            updated_at: payload.updated_at,
            html_url: payload.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    commit: GitCommitPayload,
    #[serde(default)]
    stats: Option<StatsPayload>,
    #[serde(default)]
    files: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GitCommitPayload {
    message: String,
    #[serde(default)]
    author: Option<SignaturePayload>,
    #[serde(default)]
    committer: Option<SignaturePayload>,
}

#[derive(Debug, Deserialize)]
struct SignaturePayload {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsPayload {
    #[serde(default)]
    additions: u32,
    #[serde(default)]
    deletions: u32,
}

impl GitCommitPayload {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.author
            .as_ref()
            .and_then(|author| author.date)
            .or_else(|| self.committer.as_ref().and_then(|committer| committer.date))
    }
}

impl From<CommitPayload> for ListedCommit {
    fn from(payload: CommitPayload) -> Self {
        Self {
            authored_at: payload.commit.timestamp(),
            id: payload.sha,
        }
    }
}

impl TryFrom<CommitPayload> for CommitDetail {
    type Error = GitHubError;

    fn try_from(payload: CommitPayload) -> Result<Self, Self::Error> {
        let authored_at = payload.commit.timestamp().ok_or_else(|| {
            GitHubError::InvalidResponse(format!("commit {} has no author date", payload.sha))
        })?;
        let stats = payload.stats.unwrap_or_default();
        let files_changed = payload
            .files
            .as_ref()
            .map_or(0, |files| u32::try_from(files.len()).unwrap_or(u32::MAX));
        Ok(Self {
            id: payload.sha,
            message: payload.commit.message,
            authored_at,
            additions: stats.additions,
            deletions: stats.deletions,
            files_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_JSON: &str = r#"{
        "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
        "commit": {
            "message": "Fix all the bugs\n\nLonger description",
            "author": {"name": "Monalisa", "email": "m@example.com", "date": "2011-04-14T16:00:49Z"},
            "committer": {"name": "Monalisa", "date": "2011-04-15T10:00:00Z"}
        },
        "stats": {"additions": 104, "deletions": 4, "total": 108},
        "files": [
            {"filename": "file1.txt", "additions": 100, "deletions": 2, "changes": 102},
            {"filename": "file2.txt", "additions": 4, "deletions": 2, "changes": 6}
        ]
    }"#;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn client_rejects_empty_token() {
        assert!(matches!(
            GitHubClient::new(""),
            Err(GitHubError::InvalidToken { .. })
        ));
    }

    #[test]
    fn client_rejects_whitespace_token() {
        assert!(matches!(
            GitHubClient::new("  \n"),
            Err(GitHubError::InvalidToken { .. })
        ));
    }

    #[test]
    fn client_debug_redacts_token() {
        let client = GitHubClient::new("ghp_secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn repo_url_trims_trailing_slash() {
        let client =
            GitHubClient::with_options("t", "https://ghe.example.com/api/v3/", DEFAULT_TIMEOUT)
                .unwrap();
        let url = client.repo_url(&ProjectRef::new("octo", "repo"));
        assert_eq!(url, "https://ghe.example.com/api/v3/repos/octo/repo");
    }

    #[test]
    fn list_query_includes_since_when_present() {
        let query = list_query(Some(ts("2025-01-01T12:30:00.250Z")), 100, 2);
        assert_eq!(
            query,
            vec![
                ("per_page", "100".to_string()),
                ("page", "2".to_string()),
                ("since", "2025-01-01T12:30:00Z".to_string()),
            ]
        );

        let unbounded = list_query(None, 50, 0);
        assert_eq!(
            unbounded,
            vec![("per_page", "50".to_string()), ("page", "1".to_string())]
        );
    }

    #[test]
    fn commit_detail_counts_files_and_stats() {
        let payload: CommitPayload = serde_json::from_str(DETAIL_JSON).unwrap();
        let detail = CommitDetail::try_from(payload).unwrap();
        assert_eq!(detail.id, "6dcb09b5b57875f334f61aebed695e2e4193db5e");
        assert_eq!(detail.message, "Fix all the bugs\n\nLonger description");
        assert_eq!(detail.authored_at, ts("2011-04-14T16:00:49Z"));
        assert_eq!(detail.additions, 104);
        assert_eq!(detail.deletions, 4);
        assert_eq!(detail.files_changed, 2);
    }

    #[test]
    fn commit_detail_defaults_missing_stats_to_zero() {
        let payload: CommitPayload = serde_json::from_str(
            r#"{"sha":"abc","commit":{"message":"m","author":null,"committer":{"date":"2024-02-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        let detail = CommitDetail::try_from(payload).unwrap();
        assert_eq!(detail.additions, 0);
        assert_eq!(detail.files_changed, 0);
        assert_eq!(detail.authored_at, ts("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn commit_detail_without_any_date_is_invalid() {
        let payload: CommitPayload =
            serde_json::from_str(r#"{"sha":"abc","commit":{"message":"m"}}"#).unwrap();
        assert!(matches!(
            CommitDetail::try_from(payload),
            Err(GitHubError::InvalidResponse(_))
        ));
    }

    #[test]
    fn listing_payload_maps_to_summaries() {
        let payload: Vec<CommitPayload> = serde_json::from_str(
            r#"[
                {"sha":"a","commit":{"message":"one","author":{"date":"2025-01-02T00:00:00Z"}},"html_url":"https://x"},
                {"sha":"b","commit":{"message":"two"}}
            ]"#,
        )
        .unwrap();
        let listed: Vec<ListedCommit> = payload.into_iter().map(ListedCommit::from).collect();
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].authored_at, Some(ts("2025-01-02T00:00:00Z")));
        assert_eq!(listed[1].authored_at, None);
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let unauthorized = error_for_status(StatusCode::UNAUTHORIZED, "", "octo/repo");
        assert!(unauthorized.is_auth());

        let missing = error_for_status(StatusCode::NOT_FOUND, "", "octo/repo");
        assert!(missing.is_not_found());
        assert_eq!(missing.to_string(), "not found on GitHub: octo/repo");

        let limited = error_for_status(
            StatusCode::FORBIDDEN,
            r#"{"message":"API rate limit exceeded"}"#,
            "octo/repo",
        );
        assert!(matches!(
            limited,
            GitHubError::Api { status: 403, ref message } if message == "API rate limit exceeded"
        ));
    }

    #[test]
    fn repository_payload_tolerates_missing_optional_fields() {
        let payload: RepositoryPayload =
            serde_json::from_str(r#"{"id": 42, "full_name": "octo/repo"}"#).unwrap();
        let repo = RemoteRepository::from(payload);
        assert_eq!(repo.id, 42);
        assert!(!repo.private);
        assert!(repo.updated_at.is_none());
    }
}
