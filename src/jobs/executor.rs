use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::jobs::cache::OutputCache;
use crate::jobs::extract::extract;
use crate::jobs::template::render;
use crate::jobs::types::{MESSAGE_VAR, REMINDER_VAR, Trigger, VarValue, Variables};
use crate::jobs::webhook::WebhookExecutor;
use crate::models::{Job, Reminder, WebhookConfig};
use crate::repositories::JobRepository;

/// Bounds the number of executions running at once; zero permits means unbounded
#[derive(Debug, Clone)]
pub struct ExecutionLimiter {
    permits: Option<Arc<Semaphore>>,
}

impl ExecutionLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    pub fn unbounded() -> Self {
        Self { permits: None }
    }

    /// Wait for a slot. `None` when unbounded or the semaphore was closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permits = self.permits.as_ref()?;
        Arc::clone(permits).acquire_owned().await.ok()
    }

    pub fn available(&self) -> Option<usize> {
        self.permits.as_ref().map(|permits| permits.available_permits())
    }
}

/// Runs the primary/secondary chain for cron, manual and reminder firings.
///
/// Every error raised during an execution is logged here and goes no further.
pub struct JobExecutor {
    webhooks: WebhookExecutor,
    cache: OutputCache,
    repository: Arc<dyn JobRepository>,
    limiter: ExecutionLimiter,
}

impl JobExecutor {
    pub fn new(
        webhooks: WebhookExecutor,
        cache: OutputCache,
        repository: Arc<dyn JobRepository>,
        limiter: ExecutionLimiter,
    ) -> Self {
        Self {
            webhooks,
            cache,
            repository,
            limiter,
        }
    }

    pub fn cache(&self) -> &OutputCache {
        &self.cache
    }

    /// Execute `job` once: primary, optional output caching, optional secondary
    pub async fn run_job(&self, job: &Job, trigger: Trigger) {
        let _permit = self.limiter.acquire().await;
        let started = Instant::now();

        tracing::info!(job_id = %job.id, job_name = %job.name, %trigger, "Job started");

        let output = match self.webhooks.execute(&job.primary, None).await {
            Ok(output) => {
                tracing::info!(job_id = %job.id, url = %job.primary.url, "Primary webhook succeeded");
                output
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, url = %job.primary.url, error = %e, "Primary webhook failed");
                return;
            }
        };

        if job.save_output {
            if output.is_empty() {
                tracing::debug!(job_id = %job.id, "Primary returned no output to save");
            } else {
                self.cache.set(&job.id, output).await;
                tracing::info!(job_id = %job.id, "Saved primary output");
            }
        }

        let Some(secondary) = &job.secondary else {
            tracing::debug!(job_id = %job.id, "No secondary webhook configured");
            return self.finish(job, started);
        };
        if !secondary.enabled {
            tracing::info!(job_id = %job.id, "Secondary webhook disabled");
            return self.finish(job, started);
        }

        let body = if job.save_output {
            let Some(data) = self.cache.get(&job.id).await else {
                tracing::info!(job_id = %job.id, "No saved output, skipping secondary webhook");
                return self.finish(job, started);
            };

            let variables = extract_or_empty(&job.id, &data, secondary);
            if let Some(reason) = gate(secondary, &variables) {
                tracing::info!(job_id = %job.id, reason, "Skipping secondary webhook");
                return self.finish(job, started);
            }

            if secondary.body_template.is_empty() {
                data
            } else {
                render(&secondary.body_template, &variables)
            }
        } else if secondary.body_template.is_empty() {
            secondary.body.clone()
        } else {
            render(&secondary.body_template, &Variables::new())
        };

        self.send_secondary(&job.id, secondary, body).await;
        self.finish(job, started);
    }

    /// Fire `reminder` through `job`'s webhooks, then remove it from the repository.
    ///
    /// Removal and persistence happen whatever the webhook outcomes were.
    pub async fn run_reminder(&self, job: &Job, reminder: &Reminder) {
        let _permit = self.limiter.acquire().await;

        tracing::info!(job_id = %job.id, reminder_id = %reminder.id, trigger = %Trigger::Reminder, "Reminder fired");

        let mut primary = job.primary.clone();
        if !primary.body.is_empty() {
            let variables =
                Variables::from([(REMINDER_VAR.to_string(), VarValue::from(reminder.text.as_str()))]);
            primary.body = render(&primary.body, &variables);
        }

        let response = match self.webhooks.execute(&primary, None).await {
            Ok(response) => {
                tracing::info!(job_id = %job.id, reminder_id = %reminder.id, "Reminder primary webhook succeeded");
                response
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, reminder_id = %reminder.id, error = %e, "Reminder primary webhook failed");
                String::new()
            }
        };

        if job.save_output && !response.is_empty() {
            self.cache.set(&job.id, response.clone()).await;
        }

        match &job.secondary {
            Some(secondary) if secondary.enabled => {
                match reminder_secondary_body(&job.id, secondary, reminder, &response) {
                    Ok(body) => self.send_secondary(&job.id, secondary, body).await,
                    Err(reason) => {
                        tracing::info!(job_id = %job.id, reminder_id = %reminder.id, reason, "Skipping secondary webhook");
                    }
                }
            }
            Some(_) => {
                tracing::info!(job_id = %job.id, reminder_id = %reminder.id, "Secondary webhook disabled");
            }
            None => {}
        }

        self.forget_reminder(&job.id, &reminder.id).await;
    }

    async fn send_secondary(&self, job_id: &str, secondary: &WebhookConfig, body: String) {
        let mut request = secondary.clone();
        request.body = body;

        match self.webhooks.execute(&request, None).await {
            Ok(_) => {
                tracing::info!(job_id = %job_id, url = %request.url, "Secondary webhook succeeded");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, url = %request.url, error = %e, "Secondary webhook failed");
            }
        }
    }

    async fn forget_reminder(&self, job_id: &str, reminder_id: &str) {
        if let Err(e) = self.repository.delete_reminder(job_id, reminder_id).await {
            tracing::warn!(job_id = %job_id, reminder_id = %reminder_id, error = %e, "Failed to delete fired reminder");
            return;
        }
        tracing::info!(job_id = %job_id, reminder_id = %reminder_id, "Deleted fired reminder");

        if let Err(e) = self.repository.persist().await {
            tracing::error!(job_id = %job_id, reminder_id = %reminder_id, error = %e, "Failed to persist after reminder");
        }
    }

    fn finish(&self, job: &Job, started: Instant) {
        tracing::info!(
            job_id = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job completed"
        );
    }
}

fn extract_or_empty(job_id: &str, data: &str, secondary: &WebhookConfig) -> Variables {
    match extract(data, &secondary.jq_selectors) {
        Ok(variables) => {
            if !secondary.jq_selectors.is_empty() {
                tracing::debug!(job_id = %job_id, extracted = variables.len(), "Extracted variables");
            }
            variables
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Variable extraction failed");
            Variables::new()
        }
    }
}

/// Reason to suppress the secondary call under `only_if_vars_non_empty`
fn gate(secondary: &WebhookConfig, extracted: &Variables) -> Option<&'static str> {
    if !secondary.only_if_vars_non_empty || secondary.jq_selectors.is_empty() {
        return None;
    }
    if extracted.is_empty() {
        return Some("no variables extracted");
    }
    extracted
        .values()
        .any(VarValue::is_blank)
        .then_some("extracted variable is empty")
}

/// Request body for a reminder's secondary call, or the reason to skip it
fn reminder_secondary_body(
    job_id: &str,
    secondary: &WebhookConfig,
    reminder: &Reminder,
    response: &str,
) -> Result<String, &'static str> {
    let text = VarValue::from(reminder.text.as_str());

    let variables = if response.is_empty() {
        Variables::from([
            (REMINDER_VAR.to_string(), text.clone()),
            (MESSAGE_VAR.to_string(), text),
        ])
    } else {
        let mut variables = extract_or_empty(job_id, response, secondary);
        if let Some(reason) = gate(secondary, &variables) {
            return Err(reason);
        }
        variables.insert(REMINDER_VAR.to_string(), text);
        variables
            .entry(MESSAGE_VAR.to_string())
            .or_insert_with(|| VarValue::from(response));
        variables
    };

    let body = if !secondary.body_template.is_empty() {
        render(&secondary.body_template, &variables)
    } else if !secondary.body.is_empty() {
        render(&secondary.body, &variables)
    } else if !response.is_empty() {
        response.to_string()
    } else {
        let text = JsonValue::String(reminder.text.clone()).to_string();
        format!("{{\"reminder\": {text}, \"message\": {text}}}")
    };

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::webhook::DEFAULT_TIMEOUT;
    use crate::models::HttpMethod;
    use crate::repositories::FileJobRepository;
    use chrono::{Duration as ChronoDuration, Local};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(repository: Arc<dyn JobRepository>) -> JobExecutor {
        JobExecutor::new(
            WebhookExecutor::new(DEFAULT_TIMEOUT).unwrap(),
            OutputCache::new(),
            repository,
            ExecutionLimiter::unbounded(),
        )
    }

    fn webhook(url: String) -> WebhookConfig {
        WebhookConfig {
            url,
            method: HttpMethod::Post,
            enabled: true,
            ..Default::default()
        }
    }

    fn chained_job(server: &MockServer) -> Job {
        Job {
            id: "chain".to_string(),
            name: "Chain".to_string(),
            schedule: "* * * * *".to_string(),
            enabled: true,
            primary: webhook(format!("{}/primary", server.uri())),
            secondary: Some(webhook(format!("{}/secondary", server.uri()))),
            ..Default::default()
        }
    }

    fn reminder(text: &str) -> Reminder {
        Reminder {
            id: "r1".to_string(),
            text: text.to_string(),
            datetime: (Local::now() + ChronoDuration::hours(1)).fixed_offset(),
        }
    }

    async fn received_body(server: &MockServer, route: &str) -> Option<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|request| request.url.path() == route)
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
    }

    async fn mount_primary(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_secondary(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_saved_output_drives_template() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, r#"{"status":"ok"}"#).await;
        Mock::given(method("POST"))
            .and(path("/secondary"))
            .and(body_string(r#"{"result":"ok"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut job = chained_job(&server);
        job.save_output = true;
        if let Some(secondary) = job.secondary.as_mut() {
            secondary.jq_selectors = BTreeMap::from([("s".to_string(), ".status".to_string())]);
            secondary.body_template = r#"{"result":"{{s}}"}"#.to_string();
        }

        let executor = executor(Arc::new(FileJobRepository::new("unused.yaml")));
        executor.run_job(&job, Trigger::Manual).await;

        assert_eq!(
            executor.cache().get("chain").await.as_deref(),
            Some(r#"{"status":"ok"}"#)
        );
    }

    #[tokio::test]
    async fn test_saved_output_without_template_is_forwarded_raw() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, r#"{"raw":true}"#).await;
        mount_secondary(&server).await;

        let mut job = chained_job(&server);
        job.save_output = true;

        executor(Arc::new(FileJobRepository::new("unused.yaml")))
            .run_job(&job, Trigger::Cron)
            .await;
        assert_eq!(received_body(&server, "/secondary").await.as_deref(), Some(r#"{"raw":true}"#));
    }

    #[tokio::test]
    async fn test_disabled_secondary_is_never_called() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, "{}").await;
        Mock::given(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut job = chained_job(&server);
        if let Some(secondary) = job.secondary.as_mut() {
            secondary.enabled = false;
        }
        executor(Arc::new(FileJobRepository::new("unused.yaml")))
            .run_job(&job, Trigger::Cron)
            .await;
    }

    #[tokio::test]
    async fn test_failed_primary_stops_chain() {
        let server = MockServer::start().await;
        mount_primary(&server, 500, "down").await;
        Mock::given(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut job = chained_job(&server);
        job.save_output = true;
        let executor = executor(Arc::new(FileJobRepository::new("unused.yaml")));
        executor.run_job(&job, Trigger::Cron).await;
        assert_eq!(executor.cache().get("chain").await, None);
    }

    #[tokio::test]
    async fn test_without_save_output_literal_body_is_sent() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, r#"{"ignored":1}"#).await;
        mount_secondary(&server).await;

        let mut job = chained_job(&server);
        if let Some(secondary) = job.secondary.as_mut() {
            secondary.body = r#"{"fixed":true}"#.to_string();
            secondary.jq_selectors = BTreeMap::from([("x".to_string(), ".ignored".to_string())]);
        }

        let executor = executor(Arc::new(FileJobRepository::new("unused.yaml")));
        executor.run_job(&job, Trigger::Cron).await;
        assert_eq!(received_body(&server, "/secondary").await.as_deref(), Some(r#"{"fixed":true}"#));
        assert_eq!(executor.cache().get("chain").await, None);
    }

    #[tokio::test]
    async fn test_empty_primary_output_skips_secondary() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, "").await;
        Mock::given(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut job = chained_job(&server);
        job.save_output = true;
        executor(Arc::new(FileJobRepository::new("unused.yaml")))
            .run_job(&job, Trigger::Cron)
            .await;
    }

    #[tokio::test]
    async fn test_only_if_vars_non_empty_gate() {
        let server = MockServer::start().await;
        mount_primary(&server, 200, r#"{"items":[]}"#).await;
        Mock::given(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut job = chained_job(&server);
        job.save_output = true;
        if let Some(secondary) = job.secondary.as_mut() {
            secondary.only_if_vars_non_empty = true;
            secondary.jq_selectors = BTreeMap::from([("missing".to_string(), ".nothing".to_string())]);
            secondary.body_template = r#"{"v":"{{missing}}"}"#.to_string();
        }
        executor(Arc::new(FileJobRepository::new("unused.yaml")))
            .run_job(&job, Trigger::Cron)
            .await;
    }

    #[test]
    fn test_gate_rules() {
        let mut secondary = WebhookConfig {
            only_if_vars_non_empty: true,
            ..Default::default()
        };
        // No selectors means nothing to gate on
        assert_eq!(gate(&secondary, &Variables::new()), None);

        secondary.jq_selectors = BTreeMap::from([("a".to_string(), ".a".to_string())]);
        assert!(gate(&secondary, &Variables::new()).is_some());
        assert!(gate(&secondary, &Variables::from([("a".to_string(), VarValue::from(""))])).is_some());
        assert!(gate(&secondary, &Variables::from([("a".to_string(), VarValue::Null)])).is_some());
        assert_eq!(gate(&secondary, &Variables::from([("a".to_string(), VarValue::from("x"))])), None);

        secondary.only_if_vars_non_empty = false;
        assert_eq!(gate(&secondary, &Variables::new()), None);
    }

    #[test]
    fn test_reminder_body_synthesized_without_response() {
        let secondary = webhook("http://unused".to_string());
        let body = reminder_secondary_body("job", &secondary, &reminder("Say \"hi\""), "").unwrap();
        let parsed: JsonValue = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, json!({"reminder": "Say \"hi\"", "message": "Say \"hi\""}));
    }

    #[test]
    fn test_reminder_body_message_fallback_and_precedence() {
        let mut secondary = webhook("http://unused".to_string());
        secondary.body_template = r#"{"r":"{{REMINDER}}","m":"{{message}}"}"#.to_string();

        let body = reminder_secondary_body("job", &secondary, &reminder("note"), "plain text").unwrap();
        assert_eq!(body, r#"{"r":"note","m":"plain text"}"#);

        secondary.jq_selectors = BTreeMap::from([
            ("message".to_string(), ".msg".to_string()),
            ("REMINDER".to_string(), ".msg".to_string()),
        ]);
        let body =
            reminder_secondary_body("job", &secondary, &reminder("note"), r#"{"msg":"extracted"}"#).unwrap();
        assert_eq!(body, r#"{"r":"note","m":"extracted"}"#);
    }

    #[test]
    fn test_reminder_literal_body_is_rendered() {
        let mut secondary = webhook("http://unused".to_string());
        secondary.body = r#"{"text":"{{message}}"}"#.to_string();
        let body = reminder_secondary_body("job", &secondary, &reminder("ping"), "").unwrap();
        assert_eq!(body, r#"{"text":"ping"}"#);

        secondary.body.clear();
        let body = reminder_secondary_body("job", &secondary, &reminder("ping"), "raw").unwrap();
        assert_eq!(body, "raw");
    }

    #[tokio::test]
    async fn test_reminder_fires_and_is_deleted_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .and(body_string(r#"{"text":"water the plants"}"#))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/secondary"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("jobs.yaml");
        let repository = Arc::new(FileJobRepository::new(&file));

        let mut job = chained_job(&server);
        job.primary.body = r#"{"text":"{{REMINDER}}"}"#.to_string();
        let fired = reminder("water the plants");
        job.reminders = vec![fired.clone()];
        repository.upsert_job(job.clone()).await.unwrap();

        executor(repository.clone()).run_reminder(&job, &fired).await;

        assert!(repository.get_job("chain").await.unwrap().reminders.is_empty());
        assert!(file.exists());
        let synthesized: JsonValue =
            serde_json::from_str(&received_body(&server, "/secondary").await.unwrap()).unwrap();
        assert_eq!(synthesized["reminder"], "water the plants");
    }

    #[tokio::test]
    async fn test_limiter_bounds_permits() {
        let limiter = ExecutionLimiter::new(1);
        let first = limiter.acquire().await;
        assert!(first.is_some());
        assert_eq!(limiter.available(), Some(0));

        let waiting = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(waiting.is_err());

        drop(first);
        assert_eq!(limiter.available(), Some(1));
        assert_eq!(ExecutionLimiter::new(0).available(), None);
    }
}
