//! Google Tasks list holding the mirrored actions.
//!
//! Each task created here stores its originating action id in `notes`;
//! listings are keyed by that field.

use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::oauth::TokenSource;
use crate::error::RemoteError;
use crate::model::{index_tasks, ActionId, Task, TaskListing};
use crate::stores::TaskStore;

const SERVICE: &str = "Google Tasks";
const PAGE_SIZE: &str = "100";

/// A task list the user owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub title: String,
}

pub struct GoogleTasksStore<S> {
    api_base: String,
    tasklist_id: String,
    tokens: S,
    http: Client,
}

impl<S: TokenSource> GoogleTasksStore<S> {
    pub fn new(api_base: impl Into<String>, tasklist_id: impl Into<String>, tokens: S, http: Client) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tasklist_id: tasklist_id.into(),
            tokens,
            http,
        }
    }

    pub fn tasklist_id(&self) -> &str {
        &self.tasklist_id
    }

    pub fn tokens(&self) -> &S {
        &self.tokens
    }

    fn tasks_url(&self) -> String {
        format!(
            "{}/lists/{}/tasks",
            self.api_base,
            urlencoding::encode(&self.tasklist_id)
        )
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/{}", self.tasks_url(), urlencoding::encode(task_id))
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, RemoteError> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Every task list visible to the authenticated user.
    pub async fn list_tasklists(&self) -> Result<Vec<TaskList>, RemoteError> {
        let url = format!("{}/users/@me/lists", self.api_base);
        let mut lists = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .request(Method::GET, &url)
                .await?
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let page = read_json(req.send().await?).await?;

            for item in page["items"].as_array().into_iter().flatten() {
                lists.push(TaskList {
                    id: required_str(item, "id")?.to_string(),
                    title: item["title"].as_str().unwrap_or_default().to_string(),
                });
            }

            match page["nextPageToken"].as_str() {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(lists)
    }

    async fn update_status(&self, task_id: &str, body: Value) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::PATCH, &self.task_url(task_id))
            .await?
            .json(&body)
            .send()
            .await?;
        read_json(resp).await?;
        Ok(())
    }
}

fn required_str<'a>(item: &'a Value, field: &str) -> Result<&'a str, RemoteError> {
    item[field]
        .as_str()
        .ok_or_else(|| RemoteError::malformed(SERVICE, format!("task item without {field}")))
}

/// Convert a Tasks API item into a [`Task`].
///
/// A missing `notes` field yields an empty back-reference.
fn parse_task(item: &Value) -> Result<Task, RemoteError> {
    Ok(Task {
        id: required_str(item, "id")?.to_string(),
        title: item["title"].as_str().unwrap_or_default().to_string(),
        back_reference: item["notes"].as_str().unwrap_or_default().to_string(),
        completed: item["status"].as_str() == Some("completed"),
        due: item["due"].as_str().map(String::from),
    })
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        service: SERVICE,
        status: status.as_u16(),
        body,
    })
}

async fn read_json(resp: reqwest::Response) -> Result<Value, RemoteError> {
    let body = check_status(resp).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| RemoteError::malformed(SERVICE, e.to_string()))
}

impl<S: TokenSource> TaskStore for GoogleTasksStore<S> {
    fn name(&self) -> &str {
        "google_tasks"
    }

    async fn list(&self) -> Result<TaskListing, RemoteError> {
        let url = self.tasks_url();
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.request(Method::GET, &url).await?.query(&[
                ("showCompleted", "false"),
                ("showHidden", "false"),
                ("maxResults", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let page = read_json(req.send().await?).await?;

            for item in page["items"].as_array().into_iter().flatten() {
                tasks.push(parse_task(item)?);
            }

            match page["nextPageToken"].as_str() {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        let listing = index_tasks(tasks);
        tracing::info!(
            count = listing.tasks.len(),
            duplicates = listing.duplicates.len(),
            "got tasks from Google Tasks"
        );
        Ok(listing)
    }

    async fn create(
        &self,
        title: &str,
        back_reference: &ActionId,
        due: &str,
    ) -> Result<Task, RemoteError> {
        let body = json!({
            "title": title,
            "notes": back_reference,
            "due": due,
        });
        let resp = self
            .request(Method::POST, &self.tasks_url())
            .await?
            .json(&body)
            .send()
            .await?;
        let task = parse_task(&read_json(resp).await?)?;
        tracing::info!(task_id = %task.id, title, "task created");
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::DELETE, &self.task_url(task_id))
            .await?
            .send()
            .await?;
        check_status(resp).await?;
        tracing::info!(task_id, "task deleted");
        Ok(())
    }

    async fn mark_done(&self, task_id: &str) -> Result<(), RemoteError> {
        self.update_status(task_id, json!({ "status": "completed" }))
            .await
    }

    async fn mark_incomplete(&self, task_id: &str) -> Result<(), RemoteError> {
        self.update_status(task_id, json!({ "status": "needsAction", "completed": null }))
            .await
    }
}
