//! Kube binding for the bidirectional terminal transport.
//!
//! Attaches to a pod container (or a node's shell pod) with a tty and
//! shuttles bytes between the session's message channels and the exec
//! websocket. The remote process is bound to its target at spawn time;
//! target changes always mean a fresh exec.

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, TerminalSize};
use kube::{Api, Client};
use std::future::Future;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::SessionError;
use crate::streaming::{TerminalConnector, TerminalMessage, TransportEvent, TransportPeer};
use crate::structs::SessionTarget;

const READ_BUF_SIZE: usize = 4096;

pub struct KubeExecConnector {
    client: Client,
    command: Vec<String>,
}

impl KubeExecConnector {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            command: vec!["/bin/sh".to_string()],
        }
    }

    /// Override the command spawned in the container.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

impl TerminalConnector for KubeExecConnector {
    #[tracing::instrument(skip(self, peer))]
    fn connect(
        &self,
        target: SessionTarget,
        peer: TransportPeer,
    ) -> BoxFuture<'static, Result<(), SessionError>> {
        let client = self.client.clone();
        let command = self.command.clone();

        async move {
            let TransportPeer {
                events,
                mut outbound,
                cancel,
            } = peer;

            let pods: Api<Pod> = Api::namespaced(client, &target.namespace);
            let mut params = AttachParams::default()
                .stdin(true)
                .stdout(true)
                .stderr(false)
                .tty(true);
            if let Some(container) = &target.container {
                params = params.container(container);
            }

            let mut attached = pods.exec(&target.name, command, &params).await?;
            let mut proc_stdout = attached
                .stdout()
                .ok_or(SessionError::MissingStream("stdout"))?;
            let mut proc_stdin = attached
                .stdin()
                .ok_or(SessionError::MissingStream("stdin"))?;
            let mut size_tx = attached.terminal_size();
            let status = attached.take_status();

            let _ = events.send(TransportEvent::Open);

            let out_events = events.clone();
            let reader = tokio::spawn(async move {
                let mut buf = [0u8; READ_BUF_SIZE];
                loop {
                    match proc_stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let data = String::from_utf8_lossy(&buf[..n]).into_owned();
                            let msg = TerminalMessage::Stdout { data };
                            if out_events.send(TransportEvent::Message(msg)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = out_events.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
            });

            let writer = tokio::spawn(async move {
                while let Some(msg) = outbound.recv().await {
                    match msg {
                        TerminalMessage::Stdin { data } => {
                            if proc_stdin.write_all(data.as_bytes()).await.is_err() {
                                break;
                            }
                            let _ = proc_stdin.flush().await;
                        }
                        TerminalMessage::Resize { cols, rows } => {
                            if let Some(tx) = size_tx.as_mut() {
                                let _ = tx
                                    .send(TerminalSize {
                                        width: cols,
                                        height: rows,
                                    })
                                    .await;
                            }
                        }
                        // The websocket layer keeps itself alive; app-level
                        // pings have no exec counterpart.
                        TerminalMessage::Ping => {}
                        _ => {}
                    }
                }
            });

            let abnormal = tokio::select! {
                _ = cancel.cancelled() => false,
                failed = wait_status(status) => failed,
            };

            reader.abort();
            writer.abort();
            let _ = events.send(TransportEvent::Closed { abnormal });
            Ok(())
        }
        .boxed()
    }
}

async fn wait_status(status: Option<impl Future<Output = Option<Status>>>) -> bool {
    match status {
        Some(fut) => match fut.await {
            Some(s) => s.status.as_deref() == Some("Failure"),
            None => false,
        },
        None => false,
    }
}
