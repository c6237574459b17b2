//! TCP acceptor: accepts connections, spawns one task per connection,
//! coordinates shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::conn::ServerConnection;
use super::Callbacks;
use crate::error::Result;
use crate::random::Random;

pub(crate) struct Listener {
    socket: Option<TcpListener>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    callbacks: Callbacks,
    random: Arc<dyn Random>,
}

impl Listener {
    pub(crate) async fn bind(
        port: u16,
        callbacks: Callbacks,
        random: Arc<dyn Random>,
    ) -> Result<Self> {
        let socket = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = socket.local_addr()?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            socket: Some(socket),
            local_addr,
            shutdown,
            accept_task: None,
            callbacks,
            random,
        })
    }

    pub(crate) fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Spawns the accept loop. Each accepted connection gets its own task;
    /// the loop owns them all through a `JoinSet` so `stop` can drain them.
    pub(crate) fn start(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };

        let mut shutdown = self.shutdown.subscribe();
        let conn_shutdown = self.shutdown.clone();
        let callbacks = self.callbacks.clone();
        let random = self.random.clone();
        let addr = self.local_addr;

        self.accept_task = Some(tokio::spawn(async move {
            tracing::debug!(%addr, "listener started");
            let mut conns = JoinSet::new();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    accepted = socket.accept() => match accepted {
                        Ok((stream, _)) => {
                            let conn = ServerConnection::new(
                                stream,
                                callbacks.clone(),
                                random.clone(),
                                conn_shutdown.subscribe(),
                            );
                            conns.spawn(conn.run());
                        }
                        Err(err) => tracing::error!(%err, "accept conn"),
                    },
                }
            }

            // Stop accepting before draining the in-flight connections;
            // they observe the same shutdown signal.
            drop(socket);
            while conns.join_next().await.is_some() {}
        }));
    }

    pub(crate) async fn stop(&mut self) {
        tracing::debug!("stopping listener...");

        let _ = self.shutdown.send(true);
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }

        tracing::debug!("listener stopped");
    }
}
