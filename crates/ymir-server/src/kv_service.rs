use std::sync::Arc;

use tonic::{Request, Response, Status};

use ymir_proto::v1::{
    kv_service_server::KvService, GetRequest, GetResponse, PutRequest, PutResponse,
};
use ymir_state::{KvStateMachine, SnapshotStore};

use crate::convert::{header, versioned_value_to_proto, ymir_to_status};

pub struct KvServiceImpl<S> {
    machine: Arc<KvStateMachine<S>>,
    node_id: u64,
}

impl<S: SnapshotStore> KvServiceImpl<S> {
    pub fn new(machine: Arc<KvStateMachine<S>>, node_id: u64) -> Self {
        KvServiceImpl { machine, node_id }
    }
}

#[tonic::async_trait]
impl<S: SnapshotStore> KvService for KvServiceImpl<S> {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        if req.key.is_empty() {
            return Err(Status::invalid_argument("key must not be empty"));
        }
        match self.machine.lookup(&req.key).await {
            None => Err(Status::not_found(format!("key '{}' not found", req.key))),
            Some(v) => Ok(Response::new(GetResponse {
                header: Some(header(self.node_id)),
                kv: Some(versioned_value_to_proto(v)),
            })),
        }
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        if req.key.is_empty() {
            return Err(Status::invalid_argument("key must not be empty"));
        }
        let outcome = self
            .machine
            .propose(req.key.clone(), req.value, req.previously_observed_version)
            .await
            .map_err(ymir_to_status)?;

        // A conflict is a normal response, not an error: the caller gets the
        // current value and version to retry against.
        Ok(Response::new(PutResponse {
            header: Some(header(self.node_id)),
            success: outcome.success,
            key: req.key,
            value: outcome.value.value,
            version: outcome.value.version,
        }))
    }
}
