use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// High 16 bits carry the node id, the rest a monotonically increasing
/// counter seeded from wall-clock time.
const SUFFIX_BITS: u32 = 48;
const SUFFIX_MASK: u64 = (1 << SUFFIX_BITS) - 1;

/// Generator of process-unique correlation ids.
///
/// Layout: `node_id(16) | counter(48)`. The counter is seeded from the
/// millisecond timestamp at construction, shifted to leave headroom, so ids
/// do not repeat across restarts within the same logical session.
pub struct CorrelationIdGen {
    prefix: u64,
    suffix: AtomicU64,
}

impl CorrelationIdGen {
    pub fn new(node_id: u64) -> Self {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        CorrelationIdGen {
            prefix: node_id << SUFFIX_BITS,
            suffix: AtomicU64::new((now_ms << 8) & SUFFIX_MASK),
        }
    }

    pub fn next(&self) -> u64 {
        let suffix = self.suffix.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        self.prefix | (suffix & SUFFIX_MASK)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique() {
        let gen = CorrelationIdGen::new(7);
        let ids: HashSet<u64> = (0..10_000).map(|_| gen.next()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn node_id_occupies_high_bits() {
        let gen = CorrelationIdGen::new(42);
        assert_eq!(gen.next() >> SUFFIX_BITS, 42);
    }

    #[test]
    fn generators_for_distinct_nodes_never_collide() {
        let a = CorrelationIdGen::new(1);
        let b = CorrelationIdGen::new(2);
        let ids_a: HashSet<u64> = (0..1000).map(|_| a.next()).collect();
        let ids_b: HashSet<u64> = (0..1000).map(|_| b.next()).collect();
        assert!(ids_a.is_disjoint(&ids_b));
    }
}
