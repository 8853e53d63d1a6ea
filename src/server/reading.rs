use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
    time::timeout,
};
use uuid::Uuid;

use crate::{
    constants::HANDLE_TX_ERR,
    server::models::{IncomingRequest, RequestError},
};

/// Bounds on a single request body.
#[derive(Clone, Copy, Debug)]
pub struct ReadLimits {
    pub max_bytes: usize,
    /// Time allowed between accepting the socket and the client half-closing.
    pub deadline: Duration,
}

pub fn read_sockets(
    sockets: Arc<DashMap<Uuid, OwnedWriteHalf>>,
    mut read_rx: Receiver<TcpStream>,
    handle_tx: Sender<IncomingRequest>,
    limits: ReadLimits,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(socket) = read_rx.recv().await {
            let id = Uuid::new_v4();
            let (read_half, write_half) = socket.into_split();
            sockets.insert(id, write_half);

            let handle_tx = handle_tx.clone();
            tokio::spawn(async move {
                let body = read_body(read_half, limits).await;
                tracing::debug!(%id, ok = body.is_ok(), "Request body read");

                if handle_tx.send(IncomingRequest::new(id, body)).await.is_err() {
                    tracing::error!(%id, "{}", HANDLE_TX_ERR);
                }
            });
        }
    })
}

/// Reads until the client half-closes, refusing bodies over the size
/// limit and clients that stall past the deadline.
async fn read_body<R>(reader: R, limits: ReadLimits) -> Result<Vec<u8>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let limit = limits.max_bytes;
    let mut body = Vec::new();
    let mut limited = reader.take(limit as u64 + 1);
    let read = limited.read_to_end(&mut body);
    timeout(limits.deadline, read)
        .await
        .map_err(|_| RequestError::Timeout {
            after: limits.deadline,
        })??;

    if body.len() > limit {
        return Err(RequestError::TooLarge { limit });
    }
    Ok(body)
}
