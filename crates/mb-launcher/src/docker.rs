//! Launches bot workloads as local Docker containers via `bollard`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::HostConfig;
use bollard::Docker;
use chrono::{TimeZone, Utc};
use mb_domain::config::DockerLauncherConfig;
use mb_domain::{Error, Platform, Result};
use uuid::Uuid;

use crate::traits::{limit_exceeded, BotHandle, RuntimeLauncher, StartBotArgs, StartedBot};

const LABEL_USER_ID: &str = "mb.user_id";
const LABEL_PLATFORM: &str = "mb.platform";
const LABEL_NATIVE_ID: &str = "mb.native_id";
const LABEL_SESSION_UID: &str = "mb.session_uid";
const LABEL_MANAGED: &str = "mb.managed";

pub struct DockerLauncher {
    docker: Docker,
    config: DockerLauncherConfig,
    bot_image: String,
    callback_base_url: String,
    call_timeout: Duration,
}

impl DockerLauncher {
    pub fn connect(
        config: &DockerLauncherConfig,
        bot_image: String,
        callback_base_url: String,
        call_timeout_secs: u64,
    ) -> Result<Self> {
        let docker = match &config.docker_host {
            Some(host) => Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| Error::Availability(format!("connecting to docker at {host}: {e}")))?,
            None => Docker::connect_with_local_defaults()
                .map_err(|e| Error::Availability(format!("connecting to local docker: {e}")))?,
        };
        Ok(Self {
            docker,
            config: config.clone(),
            bot_image,
            callback_base_url,
            call_timeout: Duration::from_secs(call_timeout_secs),
        })
    }

    fn is_not_found(err: &BollardError) -> bool {
        matches!(err, BollardError::DockerResponseServerError { status_code, .. } if *status_code == 404)
    }
}

#[async_trait]
impl RuntimeLauncher for DockerLauncher {
    async fn start_bot(&self, args: StartBotArgs, user_concurrency_limit: u32) -> Result<StartedBot> {
        if user_concurrency_limit > 0 {
            let active = self.list_running_bots(args.user_id).await?.len();
            if active as u32 >= user_concurrency_limit {
                return Err(limit_exceeded(args.user_id, active, user_concurrency_limit));
            }
        }

        let session_uid = Uuid::new_v4().to_string();
        let mut env = vec![
            format!("MB_SESSION_UID={session_uid}"),
            format!("MB_CALLBACK_BASE_URL={}", self.callback_base_url),
            format!("MB_USER_TOKEN={}", args.user_token),
            format!("MB_MEETING_URL={}", args.meeting_url),
            format!("MB_PLATFORM={}", args.platform),
            format!("MB_NATIVE_MEETING_ID={}", args.native_id),
            format!("MB_USER_ID={}", args.user_id),
            format!("MB_MEETING_ID={}", args.meeting_id),
        ];
        if let Some(bot_name) = &args.bot_name {
            env.push(format!("MB_BOT_NAME={bot_name}"));
        }
        if let Some(language) = &args.language {
            env.push(format!("MB_LANGUAGE={language}"));
        }
        if let Some(task) = &args.task {
            env.push(format!("MB_TASK={task}"));
        }

        let mut labels = HashMap::new();
        labels.insert(LABEL_USER_ID.to_string(), args.user_id.to_string());
        labels.insert(LABEL_PLATFORM.to_string(), args.platform.to_string());
        labels.insert(LABEL_NATIVE_ID.to_string(), args.native_id.clone());
        labels.insert(LABEL_SESSION_UID.to_string(), session_uid.clone());
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());

        let container_config = ContainerConfig {
            image: Some(self.bot_image.clone()),
            env: Some(env),
            labels: Some(labels),
            host_config: Some(HostConfig {
                network_mode: self.config.network.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: format!("mb-bot-{session_uid}"),
            platform: None,
        };

        let created = tokio::time::timeout(
            self.call_timeout,
            self.docker.create_container(Some(create_options), container_config),
        )
        .await
        .map_err(|_| Error::Runtime("docker create_container timed out".into()))?
        .map_err(|e| Error::Runtime(format!("docker create_container failed: {e}")))?;

        tokio::time::timeout(self.call_timeout, self.docker.start_container::<String>(&created.id, None))
            .await
            .map_err(|_| Error::Runtime("docker start_container timed out".into()))?
            .map_err(|e| Error::Runtime(format!("docker start_container failed: {e}")))?;

        Ok(StartedBot {
            handle: created.id,
            session_uid,
        })
    }

    async fn stop_bot(&self, handle: &str) -> Result<()> {
        let stop = self
            .docker
            .stop_container(handle, Some(StopContainerOptions { t: 10 }));
        match tokio::time::timeout(self.call_timeout, stop).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if Self::is_not_found(&e) => return Ok(()),
            Ok(Err(e)) => return Err(Error::Runtime(format!("docker stop_container failed: {e}"))),
            Err(_) => return Err(Error::Runtime("docker stop_container timed out".into())),
        }

        let remove = self.docker.remove_container(
            handle,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        );
        match tokio::time::timeout(self.call_timeout, remove).await {
            Ok(Ok(())) | Ok(Err(_)) => Ok(()),
            Err(_) => Ok(()),
        }
    }

    async fn verify_running(&self, handle: &str) -> Result<bool> {
        let inspect = self.docker.inspect_container(handle, None);
        match tokio::time::timeout(self.call_timeout, inspect).await {
            Ok(Ok(details)) => {
                let running = details
                    .state
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                Ok(running)
            }
            Ok(Err(e)) if Self::is_not_found(&e) => Ok(false),
            // Any other failure is treated as "assume running" rather than
            // risk reaping a bot that is actually mid-meeting.
            Ok(Err(e)) => {
                tracing::warn!(handle, error = %e, "docker inspect_container failed, assuming running");
                Ok(true)
            }
            Err(_) => {
                tracing::warn!(handle, "docker inspect_container timed out, assuming running");
                Ok(true)
            }
        }
    }

    async fn list_running_bots(&self, user_id: Uuid) -> Result<Vec<BotHandle>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{LABEL_USER_ID}={user_id}"), format!("{LABEL_MANAGED}=true")],
        );
        let options = ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        };
        let summaries = tokio::time::timeout(self.call_timeout, self.docker.list_containers(Some(options)))
            .await
            .map_err(|_| Error::Runtime("docker list_containers timed out".into()))?
            .map_err(|e| Error::Runtime(format!("docker list_containers failed: {e}")))?;

        let mut out = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            let labels = summary.labels.unwrap_or_default();
            let Some(platform_str) = labels.get(LABEL_PLATFORM) else {
                continue;
            };
            let Ok(platform) = platform_str.parse::<Platform>() else {
                continue;
            };
            let native_id = labels.get(LABEL_NATIVE_ID).cloned().unwrap_or_default();
            let created_at = summary
                .created
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .unwrap_or_else(Utc::now);
            out.push(BotHandle {
                platform,
                native_id,
                handle: id,
                created_at,
                labels,
            });
        }
        Ok(out)
    }
}
