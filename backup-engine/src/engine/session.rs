//! Scoped source/target connections for one engine invocation.

use crate::store::{redact_uri, ClusterConnection, ConnectOptions, Connector};
use crate::Result;
use tracing::{debug, warn};

pub(crate) struct Session {
    pub source: Box<dyn ClusterConnection>,
    pub target: Box<dyn ClusterConnection>,
}

impl Session {
    /// Open both sides. If the target cannot be reached the already-open
    /// source is released before the error is returned.
    pub async fn open(
        connector: &dyn Connector,
        options: &ConnectOptions,
        source_uri: &str,
        target_uri: &str,
    ) -> Result<Self> {
        let source = connector.connect(source_uri, options).await?;
        let target = match connector.connect(target_uri, options).await {
            Ok(target) => target,
            Err(e) => {
                release(source, "source").await;
                return Err(e);
            }
        };
        debug!(source = %redact_uri(source_uri), target = %redact_uri(target_uri), "Session opened");
        Ok(Self { source, target })
    }

    /// Close both sides. Close failures are logged, never returned, so they
    /// cannot mask the outcome of the work done inside the session.
    pub async fn close(self) {
        release(self.source, "source").await;
        release(self.target, "target").await;
    }
}

pub(crate) async fn release(conn: Box<dyn ClusterConnection>, side: &str) {
    if let Err(e) = conn.close().await {
        warn!(side, error = %e, "Failed to close connection");
    }
}
