//! Per-target execution.
//!
//! Runs one statement on one resolved target: open the SSH tunnel when the
//! descriptor asks for one, hand the driver a config rewritten to the
//! tunnel's local bind, execute, and tear the tunnel down on every exit
//! path. Failures are attributed to the phase they occurred in.

use async_trait::async_trait;

use crate::engine::error::{EngineError, EngineResult, ExecutionPhase, TargetError};
use crate::engine::registry::DriverRegistry;
use crate::engine::ssh_tunnel::SshTunnel;
use crate::engine::types::{QueryOutcome, SshTunnelConfig, TargetConfig};

/// A live port forward, seen through the narrow surface the executor needs.
#[async_trait]
pub(crate) trait TunnelHandle: Send {
    fn local_port(&self) -> u16;
    async fn close(&mut self) -> EngineResult<()>;
}

#[async_trait]
impl TunnelHandle for SshTunnel {
    fn local_port(&self) -> u16 {
        SshTunnel::local_port(self)
    }

    async fn close(&mut self) -> EngineResult<()> {
        SshTunnel::close(self).await
    }
}

/// Opens tunnels for targets that need one. The production provider drives
/// the OpenSSH client; tests substitute their own.
#[async_trait]
pub(crate) trait TunnelProvider: Send + Sync {
    type Tunnel: TunnelHandle;

    async fn open(
        &self,
        config: &SshTunnelConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> EngineResult<Self::Tunnel>;
}

struct OpenSshProvider;

#[async_trait]
impl TunnelProvider for OpenSshProvider {
    type Tunnel = SshTunnel;

    async fn open(
        &self,
        config: &SshTunnelConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> EngineResult<SshTunnel> {
        SshTunnel::open(config, remote_host, remote_port).await
    }
}

/// Executes `sql` on the target described by `config`.
///
/// Exactly one tunnel per execution attempt, never shared; the tunnel is
/// closed before this function returns, including when the driver fails.
pub async fn execute_on_target(
    registry: &DriverRegistry,
    alias: &str,
    config: &TargetConfig,
    sql: &str,
) -> Result<QueryOutcome, TargetError> {
    execute_via(registry, &OpenSshProvider, alias, config, sql).await
}

pub(crate) async fn execute_via<P: TunnelProvider>(
    registry: &DriverRegistry,
    provider: &P,
    alias: &str,
    config: &TargetConfig,
    sql: &str,
) -> Result<QueryOutcome, TargetError> {
    let driver = registry.get(&config.driver).ok_or_else(|| {
        TargetError::new(
            alias,
            ExecutionPhase::Connect,
            EngineError::driver_not_found(&config.driver),
        )
    })?;

    let mut tunnel = None;
    let effective = if let Some(ref ssh_config) = config.ssh_tunnel {
        let t = provider
            .open(ssh_config, &config.host, config.port)
            .await
            .map_err(|e| TargetError::new(alias, ExecutionPhase::Tunnel, e))?;

        let mut tunneled = config.clone();
        tunneled.host = "127.0.0.1".to_string();
        tunneled.port = t.local_port();
        tunnel = Some(t);
        tunneled
    } else {
        config.clone()
    };

    tracing::debug!(alias = %alias, driver = %effective.driver, "connected");

    let result = driver.execute(&effective, sql).await;

    if let Some(mut t) = tunnel {
        if let Err(e) = t.close().await {
            tracing::warn!(alias = %alias, error = %e, "tunnel close failed");
        }
    }

    match result {
        Ok(outcome) => {
            tracing::debug!(alias = %alias, "done");
            Ok(outcome)
        }
        Err(source) => {
            let phase = match source {
                EngineError::ConnectionFailed { .. }
                | EngineError::AuthenticationFailed { .. }
                | EngineError::Timeout { .. }
                | EngineError::DriverNotFound { .. } => ExecutionPhase::Connect,
                _ => ExecutionPhase::Execute,
            };
            Err(TargetError::new(alias, phase, source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::traits::DataEngine;
    use crate::engine::types::{RowSet, Value};
    use crate::observability::Sensitive;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingDriver;

    #[async_trait]
    impl DataEngine for FailingDriver {
        fn driver_id(&self) -> &'static str {
            "failing"
        }

        fn driver_name(&self) -> &'static str {
            "Failing Driver"
        }

        async fn execute(&self, _: &TargetConfig, _: &str) -> Result<QueryOutcome, EngineError> {
            Err(EngineError::syntax_error("boom"))
        }
    }

    struct ConnRefusedDriver;

    #[async_trait]
    impl DataEngine for ConnRefusedDriver {
        fn driver_id(&self) -> &'static str {
            "refused"
        }

        fn driver_name(&self) -> &'static str {
            "Refused Driver"
        }

        async fn execute(&self, _: &TargetConfig, _: &str) -> Result<QueryOutcome, EngineError> {
            Err(EngineError::connection_failed("refused"))
        }
    }

    struct CountingDriver {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DataEngine for CountingDriver {
        fn driver_id(&self) -> &'static str {
            "counting"
        }

        fn driver_name(&self) -> &'static str {
            "Counting Driver"
        }

        async fn execute(&self, _: &TargetConfig, _: &str) -> Result<QueryOutcome, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(QueryOutcome::Rows(RowSet {
                columns: vec![],
                rows: vec![crate::engine::types::Row {
                    values: vec![Value::Int(1)],
                }],
            }))
        }
    }

    fn target(driver: &str) -> TargetConfig {
        TargetConfig {
            driver: driver.to_string(),
            host: "db".to_string(),
            port: 3306,
            username: "u".to_string(),
            password: Sensitive::default(),
            database: "d".to_string(),
            ssh_tunnel: None,
        }
    }

    fn tunneled_target(driver: &str) -> TargetConfig {
        let mut config = target(driver);
        config.ssh_tunnel = Some(SshTunnelConfig {
            host: "bastion.local".to_string(),
            port: 22,
            username: "deploy".to_string(),
            private_key_path: Some("/keys/id_ed25519".to_string()),
            password: None,
        });
        config
    }

    /// Stands in for a live forward; counts how often it is torn down.
    struct GuardedTunnel {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TunnelHandle for GuardedTunnel {
        fn local_port(&self) -> u16 {
            15432
        }

        async fn close(&mut self) -> crate::engine::error::EngineResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct GuardedProvider {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TunnelProvider for GuardedProvider {
        type Tunnel = GuardedTunnel;

        async fn open(
            &self,
            _: &SshTunnelConfig,
            _: &str,
            _: u16,
        ) -> crate::engine::error::EngineResult<GuardedTunnel> {
            Ok(GuardedTunnel {
                closes: Arc::clone(&self.closes),
            })
        }
    }

    struct RefusingProvider;

    #[async_trait]
    impl TunnelProvider for RefusingProvider {
        type Tunnel = GuardedTunnel;

        async fn open(
            &self,
            _: &SshTunnelConfig,
            _: &str,
            _: u16,
        ) -> crate::engine::error::EngineResult<GuardedTunnel> {
            Err(EngineError::ssh_error("bastion unreachable"))
        }
    }

    /// Records the config it was handed so tests can inspect the rewrite.
    struct RecordingDriver {
        seen: Arc<parking_lot::Mutex<Option<(String, u16)>>>,
    }

    #[async_trait]
    impl DataEngine for RecordingDriver {
        fn driver_id(&self) -> &'static str {
            "recording"
        }

        fn driver_name(&self) -> &'static str {
            "Recording Driver"
        }

        async fn execute(&self, config: &TargetConfig, _: &str) -> Result<QueryOutcome, EngineError> {
            *self.seen.lock() = Some((config.host.clone(), config.port));
            Ok(QueryOutcome::Affected { count: 0 })
        }
    }

    #[tokio::test]
    async fn unknown_driver_is_a_connect_phase_error() {
        let registry = DriverRegistry::new();
        let err = execute_on_target(&registry, "A", &target("nope"), "SELECT 1")
            .await
            .unwrap_err();

        assert_eq!(err.alias, "A");
        assert_eq!(err.phase, ExecutionPhase::Connect);
        assert!(matches!(err.source, EngineError::DriverNotFound { .. }));
    }

    #[tokio::test]
    async fn driver_failure_maps_to_execute_phase() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(FailingDriver));

        let err = execute_on_target(&registry, "A", &target("failing"), "SELEK 1")
            .await
            .unwrap_err();

        assert_eq!(err.phase, ExecutionPhase::Execute);
    }

    #[tokio::test]
    async fn connection_failure_maps_to_connect_phase() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(ConnRefusedDriver));

        let err = execute_on_target(&registry, "A", &target("refused"), "SELECT 1")
            .await
            .unwrap_err();

        assert_eq!(err.phase, ExecutionPhase::Connect);
    }

    #[tokio::test]
    async fn tunnel_is_closed_exactly_once_when_the_driver_fails() {
        let closes = Arc::new(AtomicUsize::new(0));
        let provider = GuardedProvider {
            closes: Arc::clone(&closes),
        };
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(FailingDriver));

        let err = execute_via(&registry, &provider, "A", &tunneled_target("failing"), "SELEK 1")
            .await
            .unwrap_err();

        assert_eq!(err.phase, ExecutionPhase::Execute);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tunneled_driver_sees_the_local_bind_and_the_tunnel_is_closed() {
        let closes = Arc::new(AtomicUsize::new(0));
        let provider = GuardedProvider {
            closes: Arc::clone(&closes),
        };
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(RecordingDriver {
            seen: Arc::clone(&seen),
        }));

        execute_via(&registry, &provider, "A", &tunneled_target("recording"), "DELETE FROM t")
            .await
            .unwrap();

        assert_eq!(*seen.lock(), Some(("127.0.0.1".to_string(), 15432)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tunnel_open_failure_maps_to_tunnel_phase() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(FailingDriver));

        let err = execute_via(&registry, &RefusingProvider, "A", &tunneled_target("failing"), "SELECT 1")
            .await
            .unwrap_err();

        assert_eq!(err.phase, ExecutionPhase::Tunnel);
        assert!(matches!(err.source, EngineError::SshError { .. }));
    }

    #[tokio::test]
    async fn successful_execution_reaches_driver_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(CountingDriver {
            calls: Arc::clone(&calls),
        }));

        let outcome = execute_on_target(&registry, "A", &target("counting"), "SELECT 1")
            .await
            .unwrap();

        assert!(outcome.rows().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
