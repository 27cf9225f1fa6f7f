use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::error::{ApiError, ApiResult};
use crate::task::{NewTask, Task, TaskId, User};

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub username: String,
    pub token: String,
}

/// Client for the task service REST API. Holds the base URL and the
/// bearer token for the session. Every call is a full round trip; the
/// view refetches after each mutation instead of caching.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> ApiResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn checked(&self, builder: RequestBuilder, endpoint: &str) -> ApiResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "api response");

        match status {
            s if s.is_success() => Ok(response),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            s => Err(ApiError::UnexpectedStatus {
                status: s.as_u16(),
                endpoint: endpoint.to_string(),
            }),
        }
    }

    async fn expect_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &str,
    ) -> ApiResult<T> {
        let response = self.checked(builder, endpoint).await?;
        Ok(response.json::<T>().await?)
    }

    async fn expect_ok(&self, builder: RequestBuilder, endpoint: &str) -> ApiResult<()> {
        self.checked(builder, endpoint).await.map(|_| ())
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let builder = self.request(Method::POST, "/auth/login").json(credentials);
        self.expect_json(builder, "/auth/login").await
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn register(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let builder = self
            .request(Method::POST, "/auth/register")
            .json(credentials);
        self.expect_json(builder, "/auth/register").await
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.expect_json(self.request(Method::GET, "/auth/users"), "/auth/users")
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.expect_json(self.request(Method::GET, "/tasks"), "/tasks")
            .await
    }

    #[instrument(skip(self))]
    pub async fn tasks_assigned_to_me(&self) -> ApiResult<Vec<Task>> {
        self.expect_json(
            self.request(Method::GET, "/tasks/assigned-to-me"),
            "/tasks/assigned-to-me",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn tasks_assigned_by_me(&self) -> ApiResult<Vec<Task>> {
        self.expect_json(
            self.request(Method::GET, "/tasks/assigned-by-me"),
            "/tasks/assigned-by-me",
        )
        .await
    }

    #[instrument(skip(self, task), fields(title_len = task.title.len()))]
    pub async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        let builder = self.request(Method::POST, "/tasks").json(task);
        self.expect_json(builder, "/tasks").await
    }

    /// Full replace. The caller passes the complete record, with owner
    /// and assignee echoed unchanged next to whichever field mutated.
    #[instrument(skip(self, task), fields(id = task.id))]
    pub async fn update_task(&self, task: &Task) -> ApiResult<Task> {
        let path = format!("/tasks/{}", task.id);
        let builder = self.request(Method::PUT, &path).json(task);
        self.expect_json(builder, &path).await
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        let path = format!("/tasks/{id}");
        self.expect_ok(self.request(Method::DELETE, &path), &path)
            .await
    }
}
