//! Prometheus recorder installation.

use std::net::SocketAddr;

use {anyhow::Result, tracing::info};

/// Settings for the Prometheus scrape endpoint.
#[derive(Debug, Clone)]
pub struct MetricsRecorderConfig {
    pub listen: SocketAddr,
    /// Labels added to every series.
    pub global_labels: Vec<(String, String)>,
}

#[cfg(feature = "prometheus")]
fn builder(config: &MetricsRecorderConfig) -> metrics_exporter_prometheus::PrometheusBuilder {
    config.global_labels.iter().fold(
        metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(config.listen),
        |builder, (key, value)| builder.add_global_label(key, value),
    )
}

/// Install the global recorder and start serving `/metrics` on `config.listen`.
///
/// Must be called from inside a tokio runtime. Without the `prometheus`
/// feature this only logs that export is unavailable.
pub fn init_metrics(config: &MetricsRecorderConfig) -> Result<()> {
    #[cfg(feature = "prometheus")]
    {
        builder(config).install()?;
        info!(listen = %config.listen, "prometheus metrics exporter listening");
    }

    #[cfg(not(feature = "prometheus"))]
    info!(listen = %config.listen, "metrics export not compiled in");

    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use {super::*, crate::sync};

    #[test]
    fn global_labels_are_rendered() {
        let config = MetricsRecorderConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            global_labels: vec![("bot".into(), "main".into())],
        };
        let recorder = builder(&config).build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(sync::DISPATCHES_TOTAL).increment(2);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"msgsync_dispatches_total{bot="main"} 2"#),
            "{rendered}"
        );
    }
}
