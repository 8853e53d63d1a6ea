//! TCP transport: one program per connection, one JSON line back.
//!
//! Stages run as tasks joined by mpsc channels:
//! accept → read → handle → respond.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::{io, net::TcpListener, sync::mpsc};

use crate::{core::pipeline::visualizing::Visualizer, server::reading::ReadLimits};

pub mod accepting;
pub mod handling;
pub mod models;
pub mod reading;
pub mod responding;

const CHANNEL_CAPACITY: usize = 64;

pub async fn serve(
    listener: TcpListener,
    visualizer: Arc<Visualizer>,
    limits: ReadLimits,
) -> io::Result<()> {
    let sockets = Arc::new(DashMap::new());
    let (read_tx, read_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (handle_tx, handle_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (res_tx, res_rx) = mpsc::channel(CHANNEL_CAPACITY);

    responding::respond(sockets.clone(), res_rx);
    handling::handle_requests(res_tx, handle_rx, visualizer);
    reading::read_sockets(sockets, read_rx, handle_tx, limits);

    tracing::info!(addr = %listener.local_addr()?, "Listening");
    accepting::accept_connections(listener, read_tx)
        .await
        .map_err(io::Error::other)?
}
