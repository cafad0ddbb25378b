use tokio::sync::mpsc;
use tonic::{Request, Response, Status};

use ymir_proto::v1::{
    cluster_service_server::ClusterService, AddNodeRequest, AddNodeResponse, RemoveNodeRequest,
    RemoveNodeResponse,
};
use ymir_types::ConfChange;

use crate::convert::header;

/// Relays membership changes to the consensus collaborator. Replies are
/// optimistic: the change has been handed off, not yet applied.
pub struct ClusterServiceImpl {
    conf_tx: mpsc::Sender<ConfChange>,
    node_id: u64,
}

impl ClusterServiceImpl {
    pub fn new(conf_tx: mpsc::Sender<ConfChange>, node_id: u64) -> Self {
        ClusterServiceImpl { conf_tx, node_id }
    }
}

#[tonic::async_trait]
impl ClusterService for ClusterServiceImpl {
    async fn add_node(
        &self,
        request: Request<AddNodeRequest>,
    ) -> Result<Response<AddNodeResponse>, Status> {
        let req = request.into_inner();
        if req.node_id == 0 {
            return Err(Status::invalid_argument("node_id must not be 0"));
        }
        let change = ConfChange::AddNode { node_id: req.node_id, address: req.address };
        self.conf_tx
            .send(change)
            .await
            .map_err(|_| Status::unavailable("membership channel closed"))?;
        Ok(Response::new(AddNodeResponse { header: Some(header(self.node_id)) }))
    }

    async fn remove_node(
        &self,
        request: Request<RemoveNodeRequest>,
    ) -> Result<Response<RemoveNodeResponse>, Status> {
        let req = request.into_inner();
        if req.node_id == 0 {
            return Err(Status::invalid_argument("node_id must not be 0"));
        }
        self.conf_tx
            .send(ConfChange::RemoveNode { node_id: req.node_id })
            .await
            .map_err(|_| Status::unavailable("membership channel closed"))?;
        Ok(Response::new(RemoveNodeResponse { header: Some(header(self.node_id)) }))
    }
}
