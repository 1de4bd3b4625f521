//! Monotonic request-id allocation, one counter per engine instance
//! (spec.md §3 "Request id": "Allocation is monotonic counter per engine").

use std::sync::atomic::{AtomicI64, Ordering};

use mcprt_wire::ids::RequestId;

#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: AtomicI64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    pub fn allocate(&self) -> RequestId {
        RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let alloc = RequestIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
        assert_eq!(a, RequestId::Number(1));
        assert_eq!(b, RequestId::Number(2));
    }
}
