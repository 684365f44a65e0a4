//! Capacity accounting for the worker-agent pool
//!
//! A deterministic accountant for a fixed pool of agents granted in fixed
//! blocks, one block per active ticket. The invariant
//! `free + Σ allocated == pool_size` is re-checked after every mutation; a
//! violation signals a programming error, not an operational condition.
//!
//! Access is single-threaded by contract: the scheduler is the sole caller
//! of `allocate`/`free` and serializes them within a scheduling tick.

use crate::error::CapacityError;
use crate::types::TicketId;
use std::collections::HashMap;

/// Fixed pool of worker agents, granted in all-or-nothing blocks
#[derive(Debug)]
pub struct ResourcePool {
    pool_size: u32,
    agents_per_ticket: u32,
    free_count: u32,
    allocated: HashMap<TicketId, u32>,
}

impl ResourcePool {
    /// Create a pool of `pool_size` agents granted in blocks of
    /// `agents_per_ticket`
    ///
    /// Geometry is validated by `RepairConfig::validate` before construction.
    #[inline]
    #[must_use]
    pub fn new(pool_size: u32, agents_per_ticket: u32) -> Self {
        Self {
            pool_size,
            agents_per_ticket,
            free_count: pool_size,
            allocated: HashMap::new(),
        }
    }

    /// Whether a full block is available
    #[inline]
    #[must_use]
    pub fn can_allocate(&self) -> bool {
        self.free_count >= self.agents_per_ticket
    }

    /// Grant exactly one block to `ticket_id`; all-or-nothing
    ///
    /// # Errors
    /// `CapacityError::AlreadyAllocated` if the ticket already holds a
    /// block; `CapacityError::Insufficient` if fewer than a block's worth of
    /// agents are free. Neither leaves any side effect.
    pub fn allocate(&mut self, ticket_id: &TicketId) -> Result<(), CapacityError> {
        if self.allocated.contains_key(ticket_id) {
            return Err(CapacityError::AlreadyAllocated(ticket_id.clone()));
        }
        if self.free_count < self.agents_per_ticket {
            return Err(CapacityError::Insufficient {
                needed: self.agents_per_ticket,
                free: self.free_count,
            });
        }
        self.free_count -= self.agents_per_ticket;
        self.allocated.insert(ticket_id.clone(), self.agents_per_ticket);
        self.check_invariant()?;
        tracing::debug!(%ticket_id, free = self.free_count, "block allocated");
        Ok(())
    }

    /// Release the block held by `ticket_id`; idempotent
    ///
    /// Returns whether a block was actually released.
    ///
    /// # Errors
    /// Only `CapacityError::InvariantViolated`.
    pub fn free(&mut self, ticket_id: &TicketId) -> Result<bool, CapacityError> {
        match self.allocated.remove(ticket_id) {
            Some(block) => {
                self.free_count += block;
                self.check_invariant()?;
                tracing::debug!(%ticket_id, free = self.free_count, "block released");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current free agent count
    #[inline]
    #[must_use]
    pub fn free_agents(&self) -> u32 {
        self.free_count
    }

    /// Configured pool size
    #[inline]
    #[must_use]
    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Configured block size
    #[inline]
    #[must_use]
    pub fn agents_per_ticket(&self) -> u32 {
        self.agents_per_ticket
    }

    /// A copy of the allocation map, so callers cannot mutate internal
    /// state out of band
    #[must_use]
    pub fn allocations(&self) -> HashMap<TicketId, u32> {
        self.allocated.clone()
    }

    fn check_invariant(&self) -> Result<(), CapacityError> {
        let allocated: u32 = self.allocated.values().sum();
        if self.free_count > self.pool_size || self.free_count + allocated != self.pool_size {
            return Err(CapacityError::InvariantViolated {
                free: self.free_count,
                allocated,
                pool: self.pool_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> TicketId {
        TicketId::from(s)
    }

    #[test]
    fn pool_of_nine_block_of_three_scenario() {
        let mut pool = ResourcePool::new(9, 3);

        pool.allocate(&id("T1")).unwrap();
        assert_eq!(pool.free_agents(), 6);

        let err = pool.allocate(&id("T1")).unwrap_err();
        assert!(matches!(err, CapacityError::AlreadyAllocated(_)));
        assert_eq!(pool.free_agents(), 6);

        pool.allocate(&id("T2")).unwrap();
        pool.allocate(&id("T3")).unwrap();
        assert_eq!(pool.free_agents(), 0);
        assert!(!pool.can_allocate());

        let err = pool.allocate(&id("T4")).unwrap_err();
        assert!(matches!(err, CapacityError::Insufficient { needed: 3, free: 0 }));

        assert!(pool.free(&id("T1")).unwrap());
        assert_eq!(pool.free_agents(), 3);

        // Second free is a no-op
        assert!(!pool.free(&id("T1")).unwrap());
        assert_eq!(pool.free_agents(), 3);
    }

    #[test]
    fn failed_allocation_has_no_side_effects() {
        let mut pool = ResourcePool::new(3, 3);
        pool.allocate(&id("T1")).unwrap();

        let before = pool.allocations();
        assert!(pool.allocate(&id("T2")).is_err());
        assert_eq!(pool.allocations(), before);
        assert_eq!(pool.free_agents(), 0);
    }

    #[test]
    fn allocations_returns_a_copy() {
        let mut pool = ResourcePool::new(9, 3);
        pool.allocate(&id("T1")).unwrap();

        let mut copy = pool.allocations();
        copy.insert(id("T9"), 3);

        // Internal state unaffected
        assert_eq!(pool.allocations().len(), 1);
        assert_eq!(pool.free_agents(), 6);
    }

    proptest! {
        /// For all sequences of allocate/free calls, the capacity invariant
        /// holds after every call
        #[test]
        fn invariant_holds_under_arbitrary_sequences(
            ops in proptest::collection::vec((0u8..8, prop::bool::ANY), 1..64)
        ) {
            let mut pool = ResourcePool::new(9, 3);
            for (ticket, is_alloc) in ops {
                let tid = TicketId::from(format!("T{ticket}"));
                if is_alloc {
                    let _ = pool.allocate(&tid);
                } else {
                    pool.free(&tid).unwrap();
                }
                let allocated: u32 = pool.allocations().values().sum();
                prop_assert_eq!(pool.free_agents() + allocated, 9);
                prop_assert!(pool.free_agents() <= 9);
            }
        }
    }
}
