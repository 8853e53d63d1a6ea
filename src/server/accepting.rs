use tokio::{
    io,
    net::{TcpListener, TcpStream},
    sync::mpsc::Sender,
    task::JoinHandle,
};

use crate::constants::READ_TX_ERR;

pub fn accept_connections(
    listener: TcpListener,
    read_tx: Sender<TcpStream>,
) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            tracing::debug!(%peer, "Accepted connection");

            if read_tx.send(socket).await.is_err() {
                tracing::error!("{}", READ_TX_ERR);
                return Ok(());
            }
        }
    })
}
