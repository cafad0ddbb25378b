use tonic::Status;

use ymir_proto::v1::{ResponseHeader, VersionedValue as ProtoVersionedValue};
use ymir_types::{VersionedValue, YmirError};

pub fn versioned_value_to_proto(v: VersionedValue) -> ProtoVersionedValue {
    ProtoVersionedValue { value: v.value, version: v.version }
}

pub fn header(node_id: u64) -> ResponseHeader {
    ResponseHeader { node_id }
}

pub fn ymir_to_status(err: YmirError) -> Status {
    match &err {
        // Integrity failures terminate the node; a caller racing the
        // shutdown just sees an internal error.
        YmirError::Corruption(_) | YmirError::Storage(_) => Status::internal(err.to_string()),
        YmirError::Log(_) => Status::unavailable(err.to_string()),
    }
}
