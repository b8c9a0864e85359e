//! Kube binding for the log push stream and the one-shot fetch.

use futures::future::BoxFuture;
use futures::{AsyncBufReadExt, FutureExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};

use crate::error::SessionError;
use crate::streaming::{LogConnector, LogEvent, LogStreamPeer};
use crate::structs::{LogFetchResponse, LogOptions, SessionTarget};

pub struct KubeLogConnector {
    client: Client,
}

impl KubeLogConnector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn log_params(options: &LogOptions, follow: bool) -> LogParams {
    LogParams {
        follow,
        container: options.container.clone(),
        tail_lines: options.tail_lines,
        timestamps: options.timestamps,
        previous: options.previous,
        since_seconds: options.since_seconds,
        ..LogParams::default()
    }
}

impl LogConnector for KubeLogConnector {
    #[tracing::instrument(skip(self, peer))]
    fn stream(
        &self,
        target: SessionTarget,
        options: LogOptions,
        peer: LogStreamPeer,
    ) -> BoxFuture<'static, Result<(), SessionError>> {
        let client = self.client.clone();

        async move {
            let pods: Api<Pod> = Api::namespaced(client, &target.namespace);
            let params = log_params(&options, true);
            let stream = pods.log_stream(&target.name, &params).await?;

            let _ = peer.events.send(LogEvent::Connected);

            let mut lines = stream.lines();
            loop {
                tokio::select! {
                    _ = peer.cancel.cancelled() => break,
                    next = lines.try_next() => match next {
                        Ok(Some(line)) => {
                            if peer.events.send(LogEvent::Line(line)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = peer.events.send(LogEvent::Failed(e.to_string()));
                            return Ok(());
                        }
                    },
                }
            }

            let _ = peer.events.send(LogEvent::Closed);
            Ok(())
        }
        .boxed()
    }

    #[tracing::instrument(skip(self))]
    fn fetch(
        &self,
        target: SessionTarget,
        options: LogOptions,
    ) -> BoxFuture<'static, Result<LogFetchResponse, SessionError>> {
        let client = self.client.clone();

        async move {
            let pods: Api<Pod> = Api::namespaced(client, &target.namespace);
            let params = log_params(&options, false);
            let text = pods.logs(&target.name, &params).await?;

            Ok(LogFetchResponse {
                logs: text.lines().map(str::to_string).collect(),
                container: options.container,
                pod: target.name,
                namespace: target.namespace,
            })
        }
        .boxed()
    }
}
