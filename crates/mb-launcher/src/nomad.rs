//! Launches bot workloads as Nomad job dispatches, grounded on the job
//! dispatch / allocation-stop / allocation-inspect HTTP calls used by the
//! reference bot-manager's Nomad orchestrator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mb_domain::config::NomadLauncherConfig;
use mb_domain::{Error, Platform, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::traits::{limit_exceeded, BotHandle, RuntimeLauncher, StartBotArgs, StartedBot};

const BOT_JOB_NAME: &str = "meeting-bot";

pub struct NomadLauncher {
    client: reqwest::Client,
    address: String,
    namespace: String,
    datacenters: Vec<String>,
    bot_image: String,
    callback_base_url: String,
    call_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    #[serde(rename = "DispatchedJobID")]
    dispatched_job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobListEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct AllocationSummary {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "ClientStatus")]
    client_status: String,
    #[serde(rename = "JobID")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct AllocationDetail {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "ClientStatus")]
    client_status: String,
    #[serde(rename = "CreateTime")]
    create_time: Option<i64>,
    #[serde(rename = "JobID")]
    job_id: String,
}

#[derive(Debug, Serialize)]
struct DispatchPayload {
    #[serde(rename = "Meta")]
    meta: HashMap<String, String>,
}

impl NomadLauncher {
    pub fn new(
        config: &NomadLauncherConfig,
        bot_image: String,
        callback_base_url: String,
        call_timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(call_timeout_secs))
            .build()
            .map_err(|e| Error::Availability(format!("building nomad http client: {e}")))?;
        Ok(Self {
            client,
            address: config.address.clone(),
            namespace: config.namespace.clone(),
            datacenters: config.datacenters.clone(),
            bot_image,
            callback_base_url,
            call_timeout: Duration::from_secs(call_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address.trim_end_matches('/'))
    }

    async fn running_allocations_for_job(&self, job_id: &str) -> Result<Vec<AllocationSummary>> {
        let url = self.url(&format!("/v1/job/{job_id}/allocations"));
        let resp = self
            .client
            .get(&url)
            .query(&[("namespace", &self.namespace)])
            .send()
            .await
            .map_err(|e| Error::Runtime(format!("nomad job allocations: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let allocations: Vec<AllocationSummary> = resp
            .error_for_status()
            .map_err(|e| Error::Runtime(format!("nomad job allocations: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Runtime(format!("nomad job allocations decode: {e}")))?;
        Ok(allocations
            .into_iter()
            .filter(|a| matches!(a.client_status.as_str(), "running" | "pending"))
            .collect())
    }
}

#[async_trait]
impl RuntimeLauncher for NomadLauncher {
    async fn start_bot(&self, args: StartBotArgs, user_concurrency_limit: u32) -> Result<StartedBot> {
        if user_concurrency_limit > 0 {
            let active = self.list_running_bots(args.user_id).await?.len();
            if active as u32 >= user_concurrency_limit {
                return Err(limit_exceeded(args.user_id, active, user_concurrency_limit));
            }
        }

        let session_uid = Uuid::new_v4().to_string();
        let mut meta = HashMap::new();
        meta.insert("user_id".to_string(), args.user_id.to_string());
        meta.insert("meeting_id".to_string(), args.meeting_id.to_string());
        meta.insert("meeting_url".to_string(), args.meeting_url.clone());
        meta.insert("platform".to_string(), args.platform.to_string());
        meta.insert("native_meeting_id".to_string(), args.native_id.clone());
        meta.insert("connection_id".to_string(), session_uid.clone());
        meta.insert("session_uid".to_string(), session_uid.clone());
        meta.insert("user_token".to_string(), args.user_token.clone());
        meta.insert("callback_base_url".to_string(), self.callback_base_url.clone());
        meta.insert("bot_image".to_string(), self.bot_image.clone());
        if let Some(bot_name) = &args.bot_name {
            meta.insert("bot_name".to_string(), bot_name.clone());
        }
        if let Some(language) = &args.language {
            meta.insert("language".to_string(), language.clone());
        }
        if let Some(task) = &args.task {
            meta.insert("task".to_string(), task.clone());
        }
        if !self.datacenters.is_empty() {
            meta.insert("datacenters".to_string(), self.datacenters.join(","));
        }

        let url = self.url(&format!("/v1/job/{BOT_JOB_NAME}/dispatch"));
        let resp = tokio::time::timeout(
            self.call_timeout,
            self.client
                .post(&url)
                .query(&[("namespace", &self.namespace)])
                .json(&DispatchPayload { meta }),
        )
        .await
        .map_err(|_| Error::Runtime("nomad dispatch timed out".into()))?
        .send()
        .await
        .map_err(|e| Error::Runtime(format!("nomad dispatch request: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Runtime(format!("nomad dispatch rejected ({status}): {body}")));
        }

        let parsed: DispatchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Runtime(format!("nomad dispatch decode: {e}")))?;

        Ok(StartedBot {
            handle: parsed.dispatched_job_id,
            session_uid,
        })
    }

    async fn stop_bot(&self, handle: &str) -> Result<()> {
        // `handle` is a dispatched job id; resolve its current allocation
        // and stop that, mirroring the dispatch-then-allocation-stop flow
        // the reference orchestrator uses.
        let allocations = self.running_allocations_for_job(handle).await?;
        if allocations.is_empty() {
            return Ok(());
        }
        for alloc in allocations {
            let url = self.url(&format!("/v1/allocation/{}/stop", alloc.id));
            let resp = tokio::time::timeout(self.call_timeout, self.client.post(&url).send())
                .await
                .map_err(|_| Error::Runtime("nomad allocation stop timed out".into()))?
                .map_err(|e| Error::Runtime(format!("nomad allocation stop: {e}")))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !resp.status().is_success() {
                return Err(Error::Runtime(format!(
                    "nomad allocation stop rejected: {}",
                    resp.status()
                )));
            }
        }
        Ok(())
    }

    async fn verify_running(&self, handle: &str) -> Result<bool> {
        let allocations = self.running_allocations_for_job(handle).await;
        match allocations {
            Ok(allocs) => Ok(!allocs.is_empty()),
            Err(e) => {
                tracing::warn!(handle, error = %e, "nomad verify_running failed, assuming running");
                Ok(true)
            }
        }
    }

    async fn list_running_bots(&self, user_id: Uuid) -> Result<Vec<BotHandle>> {
        let url = self.url("/v1/jobs");
        let resp = self
            .client
            .get(&url)
            .query(&[("prefix", BOT_JOB_NAME), ("namespace", &self.namespace)])
            .send()
            .await
            .map_err(|e| Error::Runtime(format!("nomad jobs list: {e}")))?;
        let jobs: Vec<JobListEntry> = resp
            .error_for_status()
            .map_err(|e| Error::Runtime(format!("nomad jobs list: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Runtime(format!("nomad jobs list decode: {e}")))?;

        let mut out = Vec::new();
        for job in jobs.into_iter().filter(|j| matches!(j.status.as_str(), "running" | "pending")) {
            let url = self.url(&format!("/v1/job/{}/allocations", job.id));
            let resp = self
                .client
                .get(&url)
                .query(&[("namespace", &self.namespace)])
                .send()
                .await
                .map_err(|e| Error::Runtime(format!("nomad job allocations: {e}")))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            let allocations: Vec<AllocationDetail> = resp
                .error_for_status()
                .map_err(|e| Error::Runtime(format!("nomad job allocations: {e}")))?
                .json()
                .await
                .map_err(|e| Error::Runtime(format!("nomad job allocations decode: {e}")))?;

            for alloc in allocations {
                if !matches!(alloc.client_status.as_str(), "running" | "pending") {
                    continue;
                }
                let url = self.url(&format!("/v1/allocation/{}", alloc.id));
                let detail: serde_json::Value = match self.client.get(&url).send().await {
                    Ok(resp) => resp.json().await.unwrap_or_default(),
                    Err(_) => continue,
                };
                let meta = detail.get("Metadata").cloned().unwrap_or(json!({}));
                let meta_user = meta.get("user_id").and_then(|v| v.as_str()).unwrap_or("");
                if meta_user != user_id.to_string() {
                    continue;
                }
                let Some(platform_str) = meta.get("platform").and_then(|v| v.as_str()) else {
                    continue;
                };
                let Ok(platform) = platform_str.parse::<Platform>() else {
                    continue;
                };
                let native_id = meta
                    .get("native_meeting_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let mut labels = HashMap::new();
                labels.insert("job_id".to_string(), alloc.job_id.clone());
                out.push(BotHandle {
                    platform,
                    native_id,
                    handle: alloc.job_id,
                    created_at: alloc
                        .create_time
                        .and_then(|ns| chrono::DateTime::from_timestamp(ns / 1_000_000_000, 0))
                        .unwrap_or_else(Utc::now),
                    labels,
                });
            }
        }
        Ok(out)
    }
}
