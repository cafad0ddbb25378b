use ymir_types::{WriteIntent, YmirError};

/// Serialize a `WriteIntent` into the opaque payload handed to the log.
///
/// Only this node ever decodes its own encoding, so the format needs to be
/// stable within a process lifetime, not across versions.
pub fn encode_intent(intent: &WriteIntent) -> Result<Vec<u8>, YmirError> {
    bincode::serde::encode_to_vec(intent, bincode::config::standard())
        .map_err(|e| YmirError::Corruption(format!("encode write intent: {e}")))
}

/// Decode a committed entry back into the `WriteIntent` it was proposed as.
///
/// Failure here means the log carries bytes this node cannot interpret; the
/// applier treats that as fatal.
pub fn decode_intent(bytes: &[u8]) -> Result<WriteIntent, YmirError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(v, _)| v)
        .map_err(|e| YmirError::Corruption(format!("decode committed entry: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trip() {
        let intent = WriteIntent {
            key: "foo".into(),
            value: "bar".into(),
            expected_version: 3,
            correlation_id: 0xdead_beef,
        };
        let bytes = encode_intent(&intent).unwrap();
        let decoded = decode_intent(&bytes).unwrap();
        assert_eq!(decoded, intent);
    }

    #[test]
    fn garbage_decode_is_corruption() {
        let err = decode_intent(&[0xff, 0x00, 0x13, 0x37]).unwrap_err();
        assert!(matches!(err, YmirError::Corruption(_)));
    }
}
