//! Check Command
//!
//! Probes every enabled provider and the result store with the configured
//! credentials, without running any queries.

use std::path::Path;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::ai::{create_enabled_providers, with_timeout};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat};
use crate::constants::network::HEALTH_CHECK_TIMEOUT_SECS;
use crate::storage::create_store;
use crate::types::{MonitorError, Result};

#[derive(Debug, Clone, Serialize)]
struct Probe {
    target: String,
    healthy: bool,
    detail: Option<String>,
}

impl Probe {
    fn from_result(target: String, result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self {
                target,
                healthy: true,
                detail: None,
            },
            Ok(false) => Self {
                target,
                healthy: false,
                detail: Some("endpoint rejected the probe".to_string()),
            },
            Err(e) => Self {
                target,
                healthy: false,
                detail: Some(e.to_string()),
            },
        }
    }
}

pub fn run(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

    let rt = Runtime::new()?;
    let probes = rt.block_on(async {
        let mut probes = Vec::new();

        // Missing credentials surface here rather than as a failed probe
        match create_enabled_providers(&ctx.config) {
            Ok(providers) => {
                let checks = providers.iter().map(|provider| async move {
                    let target = format!("{} ({})", provider.kind(), provider.model());
                    let result = with_timeout(timeout, provider.health_check(), "health check").await;
                    Probe::from_result(target, result)
                });
                probes.extend(join_all(checks).await);
            }
            Err(e) => probes.push(Probe::from_result("providers".to_string(), Err(e))),
        }

        let store_probe = match create_store(&ctx.config.storage) {
            Ok(store) => {
                let result = with_timeout(
                    timeout,
                    async { store.health_check().await.map(|_| true).map_err(MonitorError::from) },
                    "store health check",
                )
                .await;
                Probe::from_result(format!("store: {}", store.describe()), result)
            }
            Err(e) => Probe::from_result(format!("store: {}", ctx.config.storage.backend), Err(e)),
        };
        probes.push(store_probe);
        probes
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&probes)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&probes)?),
        OutputFormat::Text => {
            let output = Output::new();
            output.section("Health check");
            for probe in &probes {
                match &probe.detail {
                    None => output.success(&probe.target),
                    Some(detail) => output.error(&format!("{}: {}", probe.target, detail)),
                }
            }
        }
    }

    let unhealthy = probes.iter().filter(|p| !p.healthy).count();
    if unhealthy > 0 {
        return Err(MonitorError::Config(format!(
            "{} of {} checks failed",
            unhealthy,
            probes.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_from_result() {
        assert!(Probe::from_result("a".into(), Ok(true)).healthy);

        let rejected = Probe::from_result("b".into(), Ok(false));
        assert!(!rejected.healthy);
        assert!(rejected.detail.is_some());

        let failed = Probe::from_result("c".into(), Err(MonitorError::config("no key")));
        assert_eq!(failed.detail.as_deref(), Some("Config error: no key"));
    }
}
