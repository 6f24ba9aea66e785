//! Polling helpers
//!
//! Scheduling a pipeline or publishing an artifact happens asynchronously on
//! the server. These helpers poll until the expected state shows up or the
//! configured timeout is reached.

use gocd_core::{ArtifactLocator, GocdError, PipelineInstance, PollingConfig, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::server::GoServer;

/// Interval and deadline for a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.timeout())
    }
}

/// Call `probe` until it yields a value
///
/// The probe is called at once, then every `interval` until `timeout` has
/// elapsed. Errors from the probe end the wait immediately.
pub async fn wait_until<T, F, Fut>(config: PollConfig, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        if let Some(value) = probe().await? {
            info!("{} ready after {} attempt(s)", what, attempt);
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Err(GocdError::Timeout {
                what: what.to_string(),
                waited_secs: elapsed.as_secs(),
            });
        }

        let pause = config.interval.min(config.timeout - elapsed);
        debug!("{} not ready (attempt {}), retrying in {:?}", what, attempt, pause);
        tokio::time::sleep(pause).await;
    }
}

/// Wait until an artifact can be downloaded
#[instrument(skip(server, locator, config), fields(artifact = %locator))]
pub async fn wait_for_artifact<S: GoServer + ?Sized>(
    server: &S,
    locator: &ArtifactLocator,
    config: PollConfig,
) -> Result<()> {
    let what = format!("artifact {}", locator);
    wait_until(config, &what, || async move {
        let exists = server.artifact_exists(locator).await?;
        Ok::<_, GocdError>(exists.then_some(()))
    })
    .await
}

/// Wait for the first instance of `name` numbered after `after_counter`
#[instrument(skip(server, config))]
pub async fn wait_for_instance<S: GoServer + ?Sized>(
    server: &S,
    name: &str,
    after_counter: u64,
    config: PollConfig,
) -> Result<PipelineInstance> {
    let what = format!("instance of {} after #{}", name, after_counter);
    wait_until(config, &what, || async move {
        let history = server.pipeline_history(name).await?;
        let next = history
            .into_iter()
            .filter(|instance| instance.counter > after_counter)
            .min_by_key(|instance| instance.counter);
        Ok::<_, GocdError>(next)
    })
    .await
}

/// Counter of the newest instance of `name`, 0 if it never ran
pub async fn latest_counter<S: GoServer + ?Sized>(server: &S, name: &str) -> Result<u64> {
    let history = server.pipeline_history(name).await?;
    Ok(history.iter().map(|i| i.counter).max().unwrap_or(0))
}

/// Schedule `name` and wait until the new instance appears
#[instrument(skip(server, config))]
pub async fn schedule_and_wait<S: GoServer + ?Sized>(
    server: &S,
    name: &str,
    config: PollConfig,
) -> Result<PipelineInstance> {
    let previous = latest_counter(server, name).await?;
    server.schedule(name).await?;
    wait_for_instance(server, name, previous, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MockServer;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(200))
    }

    fn instance(counter: u64) -> PipelineInstance {
        PipelineInstance {
            name: "up42".to_string(),
            counter,
            label: None,
            stages: vec![],
        }
    }

    #[test]
    fn test_poll_config_from_settings() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_wait_until_ready_on_third_try() {
        let calls = &AtomicU32::new(0);
        let value = wait_until(fast(), "thing", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n == 3).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let config = PollConfig::new(Duration::from_millis(5), Duration::from_millis(20));
        let err = wait_until(config, "never", || async { Ok(None::<()>) })
            .await
            .unwrap_err();

        assert!(matches!(err, GocdError::Timeout { ref what, .. } if what == "never"));
    }

    #[tokio::test]
    async fn test_wait_until_propagates_probe_error() {
        let calls = &AtomicU32::new(0);
        let err = wait_until(fast(), "broken", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<Option<()>, _>(GocdError::Other("probe failed".to_string()))
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "probe failed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_instance_skips_old_counters() {
        let server = MockServer::new()
            .with_history("up42", vec![instance(4)])
            .with_history("up42", vec![instance(4)])
            .with_history("up42", vec![instance(6), instance(5), instance(4)]);

        let found = wait_for_instance(&server, "up42", 4, fast()).await.unwrap();
        assert_eq!(found.counter, 5);
    }

    #[tokio::test]
    async fn test_schedule_and_wait() {
        let server = MockServer::new()
            .with_history("up42", vec![instance(2), instance(1)])
            .with_history("up42", vec![instance(2), instance(1)])
            .with_history("up42", vec![instance(3), instance(2), instance(1)]);

        let found = schedule_and_wait(&server, "up42", fast()).await.unwrap();
        assert_eq!(found.counter, 3);
        assert_eq!(server.scheduled(), vec!["up42"]);
    }

    #[tokio::test]
    async fn test_schedule_unknown_pipeline_fails_fast() {
        let server = MockServer::new();
        let err = schedule_and_wait(&server, "nope", fast()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(server.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_artifact() {
        let locator = ArtifactLocator {
            pipeline: "up42".to_string(),
            pipeline_counter: 1,
            stage: "build".to_string(),
            stage_counter: 1,
            job: "compile".to_string(),
            path: "app.jar".to_string(),
        };
        let server = MockServer::new()
            .with_artifact(&locator, false)
            .with_artifact(&locator, true);

        wait_for_artifact(&server, &locator, fast()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_artifact_times_out() {
        let locator = ArtifactLocator {
            pipeline: "up42".to_string(),
            pipeline_counter: 1,
            stage: "build".to_string(),
            stage_counter: 1,
            job: "compile".to_string(),
            path: "missing.jar".to_string(),
        };
        let server = MockServer::new();
        let config = PollConfig::new(Duration::from_millis(2), Duration::from_millis(10));

        let err = wait_for_artifact(&server, &locator, config).await.unwrap_err();
        assert!(matches!(err, GocdError::Timeout { .. }));
    }
}
