use std::sync::Arc;

use tokio::{
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
};

use crate::{
    constants::RES_TX_ERR,
    core::{
        domain::{SubmittedProgram, Submission},
        pipeline::visualizing::Visualizer,
        response::TraceResponse,
    },
    server::models::{IncomingRequest, OutgoingResponse},
};

pub fn handle_requests(
    res_tx: Sender<OutgoingResponse>,
    mut handle_rx: Receiver<IncomingRequest>,
    visualizer: Arc<Visualizer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = handle_rx.recv().await {
            let res_tx = res_tx.clone();
            let visualizer = visualizer.clone();

            tokio::spawn(async move {
                let id = request.id;
                let response = handle_request(request, &visualizer).await;
                if res_tx.send(OutgoingResponse::new(id, response)).await.is_err() {
                    tracing::error!(%id, "{}", RES_TX_ERR);
                }
            });
        }
    })
}

#[tracing::instrument(skip_all, fields(request = %request.id))]
async fn handle_request(request: IncomingRequest, visualizer: &Visualizer) -> TraceResponse {
    let program = request.body.and_then(SubmittedProgram::try_from);

    match program {
        Ok(program) => {
            let submission = Submission {
                id: request.id,
                received_at: request.received_at,
                program,
            };
            visualizer.visualize(&submission).await
        }
        Err(e) => {
            tracing::info!(error = %e, "Rejecting request");
            TraceResponse::invalid_request(e)
        }
    }
}
