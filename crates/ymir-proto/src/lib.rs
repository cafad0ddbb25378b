pub mod v1 {
    tonic::include_proto!("ymir.v1");
}

/// Encoded file descriptor set, registered with the gRPC reflection service.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/descriptor.bin"));
