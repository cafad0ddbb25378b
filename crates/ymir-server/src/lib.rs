mod cluster_service;
mod convert;
mod kv_service;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tonic_reflection::server::Builder as ReflectionBuilder;

use ymir_proto::v1::{
    cluster_service_server::ClusterServiceServer, kv_service_server::KvServiceServer,
};
use ymir_state::{KvStateMachine, SnapshotStore};
use ymir_types::ConfChange;

use cluster_service::ClusterServiceImpl;
use kv_service::KvServiceImpl;

pub async fn serve<S: SnapshotStore>(
    addr: SocketAddr,
    machine: Arc<KvStateMachine<S>>,
    conf_tx: mpsc::Sender<ConfChange>,
    node_id: u64,
) -> anyhow::Result<()> {
    let reflection = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(ymir_proto::FILE_DESCRIPTOR_SET)
        .build_v1()
        .expect("failed to build reflection service");
    tracing::info!(%addr, "gRPC server starting");
    tonic::transport::Server::builder()
        .add_service(KvServiceServer::new(KvServiceImpl::new(machine, node_id)))
        .add_service(ClusterServiceServer::new(ClusterServiceImpl::new(conf_tx, node_id)))
        .add_service(reflection)
        .serve(addr)
        .await
        .map_err(Into::into)
}
