//! Client construction.
//!
//! Every collaborator is injected here: configuration, transport connector,
//! inbound trace source and trace reporter. Nothing is looked up from global
//! state at call time.

use std::sync::Arc;
use std::time::Duration;

use crate::client::dispatch::Dispatcher;
use crate::client::Client;
use crate::config::ClientConfig;
use crate::net::{ConnectionCache, Connector, EndpointResolver, HttpConnector};
use crate::observability::context::{NoInbound, TraceSource};
use crate::observability::reporter::{HttpCollector, Reporter, TraceReporter};

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    source: Option<Arc<dyn TraceSource>>,
    reporter: Option<Arc<dyn TraceReporter>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            source: None,
            reporter: None,
        }
    }

    /// Transport used to open connections. Defaults to [`HttpConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Where inbound trace ids come from. Defaults to [`NoInbound`].
    pub fn trace_source(mut self, source: Arc<dyn TraceSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Collector sink. Without one, an [`HttpCollector`] is created when
    /// `tracing.collector_url` is configured; otherwise only the local log
    /// line is written.
    pub fn reporter(mut self, reporter: Arc<dyn TraceReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Client {
        let config = self.config;

        let connector = self.connector.unwrap_or_else(|| Arc::new(HttpConnector));
        let cache = ConnectionCache::new(connector, Duration::from_secs(config.timeouts.connect_secs));

        let sink = self.reporter.or_else(|| {
            config
                .tracing
                .collector_url
                .as_ref()
                .map(|url| Arc::new(HttpCollector::new(url.clone())) as Arc<dyn TraceReporter>)
        });
        let reporter = Reporter::new(sink, config.tracing.enabled, config.tracing.report_timeout());

        tracing::debug!(
            default_scheme = %config.transport.default_scheme,
            default_port = config.transport.default_port,
            request_timeout = ?config.request_timeout(),
            reporting = reporter.is_active(),
            "Client built"
        );

        Client {
            inner: Arc::new(Dispatcher {
                resolver: EndpointResolver::from_config(&config.transport),
                cache,
                source: self.source.unwrap_or_else(|| Arc::new(NoInbound)),
                reporter,
                config,
            }),
        }
    }
}
