use std::time::Duration;

use crate::{ConfigError, Result};

pub const DEFAULT_KUBECOST_NAMESPACE: &str = "kubecost";
pub const DEFAULT_SERVICE_NAME: &str = "kubecost-cost-analyzer";
pub const DEFAULT_SERVICE_PORT: u16 = 9090;

/// How requests reach the cost service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    /// Through the API server's service proxy sub-resource
    Proxy,
    /// Through a temporary port-forward to a backing pod
    PortForward,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub context: Option<String>,
    pub kubecost_namespace: String,
    pub service_name: String,
    pub service_port: u16,
    pub transport: TransportMode,
    pub timeout: Duration,
    pub currency: String,
}

impl Config {
    pub fn new(
        context: Option<String>,
        kubecost_namespace: String,
        service_name: String,
        service_port: u16,
        transport: TransportMode,
    ) -> Self {
        Self {
            context,
            kubecost_namespace,
            service_name,
            service_port,
            transport,
            timeout: Duration::from_secs(30),
            currency: "USD".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kubecost_namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue("cost service namespace is empty".into()).into());
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue("cost service name is empty".into()).into());
        }
        if self.service_port == 0 {
            return Err(ConfigError::InvalidValue("service port must be non-zero".into()).into());
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue("timeout must be non-zero".into()).into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            None,
            DEFAULT_KUBECOST_NAMESPACE.to_string(),
            DEFAULT_SERVICE_NAME.to_string(),
            DEFAULT_SERVICE_PORT,
            TransportMode::PortForward,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CostError;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service_port, 9090);
        assert_eq!(config.transport, TransportMode::PortForward);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_empty_and_zero_values() {
        let mut config = Config::default();
        config.service_port = 0;
        assert!(matches!(config.validate(), Err(CostError::Config(_))));

        let config = Config {
            service_name: " ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
