//! This module provides a client to connect to the planner REST API

use std::error::Error;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RemoteError;
use crate::resource::Resource;
use crate::task::{DateKey, Task, TaskId};
use crate::traits::PlannerApi;


/// A task, as the server serializes it
#[derive(Debug, Deserialize)]
struct ServerTask {
    #[serde(rename = "ID")]
    id: u64,
    content: String,
    #[serde(rename = "isUrgent", default)]
    is_urgent: bool,
}

impl From<ServerTask> for Task {
    fn from(server_task: ServerTask) -> Self {
        Task::new(TaskId::from(server_task.id), server_task.content, server_task.is_urgent)
    }
}

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    content: &'a str,
    #[serde(rename = "isUrgent")]
    is_urgent: bool,
    date: String,
}

#[derive(Debug, Serialize)]
struct MoveTaskBody {
    date: String,
}


/// A [`PlannerApi`] that talks to the planner server over HTTP
#[derive(Debug)]
pub struct Client {
    resource: Resource,
    http: reqwest::Client,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new<S: AsRef<str>>(url: S, token: Option<String>) -> Result<Self, Box<dyn Error>> {
        let url = Url::parse(url.as_ref())?;
        let http = reqwest::Client::builder()
            .timeout(crate::config::request_timeout())
            .build()?;

        Ok(Self {
            resource: Resource::new(url, token),
            http,
        })
    }

    /// Create a client for the API root set in [`config::API_BASE_URL`](crate::config::API_BASE_URL)
    pub fn from_config(token: Option<String>) -> Result<Self, Box<dyn Error>> {
        Self::new(crate::config::api_base_url(), token)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.resource.endpoint(segments);
        log::trace!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match self.resource.token() {
            None => builder,
            Some(token) => builder.bearer_auth(token),
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        if response.status().is_success() == false {
            return Err(format!("Unexpected HTTP status code {:?}", response.status()).into());
        }
        Ok(response)
    }
}

/// Temporary identifiers only exist locally, the server would not know them
fn server_id(id: &TaskId) -> Result<&str, RemoteError> {
    if id.is_temporary() {
        return Err(format!("Task {} has not been created on the server yet", id).into());
    }
    Ok(id.as_str())
}

#[async_trait]
impl PlannerApi for Client {
    async fn create_task(&self, date: DateKey, content: &str, is_urgent: bool) -> Result<Task, RemoteError> {
        let body = CreateTaskBody { content, is_urgent, date: date.to_string() };
        let builder = self.request(Method::POST, &["tasks", ""]).json(&body);
        let created: ServerTask = Self::send(builder).await?.json().await?;
        log::debug!("Server created task {} on {}", created.id, date);
        Ok(created.into())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let builder = self.request(Method::DELETE, &["tasks", server_id(id)?]);
        Self::send(builder).await?;
        Ok(())
    }

    async fn toggle_urgent(&self, id: &TaskId) -> Result<Task, RemoteError> {
        let builder = self.request(Method::PUT, &["tasks", server_id(id)?, "urgent"]);
        let updated: ServerTask = Self::send(builder).await?.json().await?;
        Ok(updated.into())
    }

    async fn move_task(&self, id: &TaskId, target: DateKey) -> Result<(), RemoteError> {
        let body = MoveTaskBody { date: target.to_string() };
        let builder = self.request(Method::PUT, &["tasks", server_id(id)?, "move"]).json(&body);
        Self::send(builder).await?;
        Ok(())
    }

    async fn list_tasks(&self, date: DateKey) -> Result<Vec<Task>, RemoteError> {
        let builder = self.request(Method::GET, &["tasks", &date.to_string()]);
        let tasks: Vec<ServerTask> = Self::send(builder).await?.json().await?;
        Ok(tasks.into_iter().map(Task::from).collect())
    }
}
