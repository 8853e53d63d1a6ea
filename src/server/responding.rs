use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    io::AsyncWriteExt,
    net::tcp::OwnedWriteHalf,
    sync::mpsc::Receiver,
    task::JoinHandle,
};
use uuid::Uuid;

use crate::server::models::OutgoingResponse;

pub fn respond(
    sockets: Arc<DashMap<Uuid, OwnedWriteHalf>>,
    mut res_rx: Receiver<OutgoingResponse>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = res_rx.recv().await {
            let Some((id, socket)) = sockets.remove(&msg.id) else {
                tracing::error!(id = %msg.id, "Socket not found");
                continue;
            };

            let payload = match msg.response.to_json() {
                Ok(json) => format!("{}\n", json),
                Err(e) => {
                    tracing::error!(%id, error = %e, "Failed to serialize response");
                    continue;
                }
            };

            tokio::spawn(async move {
                if let Err(e) = write_payload(socket, payload.as_bytes()).await {
                    tracing::warn!(%id, error = %e, "Failed to write response");
                }
            });
        }
    })
}

async fn write_payload(mut socket: OwnedWriteHalf, payload: &[u8]) -> std::io::Result<()> {
    socket.write_all(payload).await?;
    socket.flush().await?;
    socket.shutdown().await
}
