//! Notion action database.
//!
//! Queries the database for eligible actions and ticks their done
//! checkbox. Property names come from the `[notion]` config section.

use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use crate::error::RemoteError;
use crate::model::{Action, ActionMap};
use crate::storage::NotionConfig;
use crate::stores::ActionStore;

const SERVICE: &str = "Notion";

pub struct NotionActionStore {
    config: NotionConfig,
    http: Client,
}

impl NotionActionStore {
    pub fn new(config: NotionConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.version)
    }

    /// Filter body for the database query.
    fn query_body(&self, today: NaiveDate, start_cursor: Option<&str>) -> Value {
        let mut body = json!({
            "filter": {
                "and": [
                    {
                        "property": self.config.do_date_property,
                        "date": { "on_or_before": today.format("%Y-%m-%d").to_string() }
                    },
                    {
                        "property": self.config.done_property,
                        "checkbox": { "equals": false }
                    },
                    {
                        "property": self.config.status_property,
                        "select": { "equals": self.config.active_status }
                    }
                ]
            }
        });
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    fn parse_page(&self, page: &Value) -> Result<Action, RemoteError> {
        let id = page["id"]
            .as_str()
            .ok_or_else(|| RemoteError::malformed(SERVICE, "page without id"))?;
        let props = page
            .get("properties")
            .ok_or_else(|| RemoteError::malformed(SERVICE, format!("page {id} has no properties")))?;

        let title = props[&self.config.title_property]["title"]
            .as_array()
            .ok_or_else(|| {
                RemoteError::malformed(
                    SERVICE,
                    format!("page {id} lacks title property '{}'", self.config.title_property),
                )
            })?
            .iter()
            .filter_map(|segment| segment["plain_text"].as_str())
            .collect::<String>();

        let completed = props[&self.config.done_property]["checkbox"]
            .as_bool()
            .ok_or_else(|| {
                RemoteError::malformed(
                    SERVICE,
                    format!("page {id} lacks checkbox '{}'", self.config.done_property),
                )
            })?;

        let do_date = match props[&self.config.do_date_property]["date"]["start"].as_str() {
            Some(start) => Some(parse_notion_date(start).ok_or_else(|| {
                RemoteError::malformed(SERVICE, format!("page {id} has bad do date '{start}'"))
            })?),
            None => None,
        };

        Ok(Action {
            id: id.to_string(),
            title,
            completed,
            do_date,
        })
    }
}

/// Notion dates are `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_notion_date(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

async fn read_json(resp: reqwest::Response) -> Result<Value, RemoteError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            service: SERVICE,
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| RemoteError::malformed(SERVICE, e.to_string()))
}

impl ActionStore for NotionActionStore {
    fn name(&self) -> &str {
        "notion"
    }

    async fn query(&self, today: NaiveDate) -> Result<ActionMap, RemoteError> {
        let url = format!(
            "{}/v1/databases/{}/query",
            self.config.api_base, self.config.database_id
        );

        let mut actions = ActionMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let body = self.query_body(today, cursor.as_deref());
            let resp = self.authorized(self.http.post(&url)).json(&body).send().await?;
            let page = read_json(resp).await?;

            let results = page["results"]
                .as_array()
                .ok_or_else(|| RemoteError::malformed(SERVICE, "missing results in query response"))?;
            for result in results {
                let action = self.parse_page(result)?;
                actions.insert(action.id.clone(), action);
            }

            match (page["has_more"].as_bool(), page["next_cursor"].as_str()) {
                (Some(true), Some(next)) => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::info!(count = actions.len(), "got actions from Notion");
        Ok(actions)
    }

    async fn mark_done(&self, action_id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/v1/pages/{}", self.config.api_base, action_id);
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.config.done_property.clone(),
            json!({ "checkbox": true }),
        );
        let body = json!({ "properties": properties });

        let resp = self.authorized(self.http.patch(&url)).json(&body).send().await?;
        read_json(resp).await?;
        tracing::info!(action_id, "marked action as done");
        Ok(())
    }
}
