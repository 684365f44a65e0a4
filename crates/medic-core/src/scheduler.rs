//! Central ticket-lifecycle state machine
//!
//! Drives each ticket through
//! `Pending → Allocated → Verifying → {Accepted | RolledBack} → Done`:
//! allocation always goes to the globally highest-scoring pending ticket the
//! pool can serve, the external fixer produces the patch, the rollback
//! manager registers it before verification, and the canary decides its
//! fate. Completed outcomes feed the meta agent.
//!
//! The scheduler is the sole writer of pool and registry state; all methods
//! take `&mut self`, which serializes allocate/free within a tick. Wrap the
//! scheduler in a mutex if multiple scheduling workers exist.

use crate::error::SchedulerError;
use crate::fixer::Fixer;
use crate::meta::{MetaAgent, Tunables};
use crate::metrics::MetricSink;
use crate::prioritiser::Prioritiser;
use crate::resource::ResourcePool;
use crate::state::{self, TicketState};
use crate::types::{BugTicket, OutcomeEntry, RepairConfig, TicketId};
use chrono::Utc;
use medic_rollback::RollbackManager;
use medic_scope::ScopeFilter;
use medic_verify::{CanaryResult, CanaryRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Final report for one completed ticket
#[derive(Debug)]
pub struct TicketReport {
    /// The completed ticket
    pub ticket_id: TicketId,
    /// Whether the fix was accepted
    pub accepted: bool,
    /// Verification result, when verification ran
    pub verify: Option<CanaryResult>,
    /// Search-space entropy of the clamped scope, in bits
    pub scope_entropy_bits: f64,
    /// Resource cost recorded for the meta agent
    pub cost: f64,
}

#[derive(Debug)]
struct TicketEntry {
    ticket: BugTicket,
    state: TicketState,
}

/// Orchestrates ticket repair end to end
pub struct Scheduler {
    config: RepairConfig,
    repo_root: PathBuf,
    prioritiser: Prioritiser,
    pool: ResourcePool,
    scope_filter: ScopeFilter,
    rollback: RollbackManager,
    canary: CanaryRunner,
    fixer: Arc<dyn Fixer>,
    meta: MetaAgent,
    tickets: HashMap<TicketId, TicketEntry>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tickets", &self.tickets.len())
            .field("free_agents", &self.pool.free_agents())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Construct a scheduler from explicitly injected collaborators
    ///
    /// # Errors
    /// `SchedulerError::Config` when the configuration is invalid — notably
    /// when the priority weights admit starvation. Fatal; never corrected
    /// silently.
    pub fn new(
        config: RepairConfig,
        repo_root: PathBuf,
        scope_filter: ScopeFilter,
        rollback: RollbackManager,
        fixer: Arc<dyn Fixer>,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let prioritiser = Prioritiser::new(&config)?;
        let pool = ResourcePool::new(config.pool_size, config.agents_per_ticket);
        let canary = CanaryRunner::new(Duration::from_secs(config.canary_timeout_secs));
        let meta = MetaAgent::new(&config, sink);
        Ok(Self {
            config,
            repo_root,
            prioritiser,
            pool,
            scope_filter,
            rollback,
            canary,
            fixer,
            meta,
            tickets: HashMap::new(),
        })
    }

    /// Ingest a ticket; it starts `Pending`
    ///
    /// # Errors
    /// `DuplicateTicket` for a known id, `InvalidTicket` for severity 0.
    pub fn submit(&mut self, ticket: BugTicket) -> Result<(), SchedulerError> {
        if ticket.severity < 1 {
            return Err(SchedulerError::InvalidTicket {
                ticket_id: ticket.id.clone(),
                message: "severity must be >= 1".to_string(),
            });
        }
        if self.tickets.contains_key(&ticket.id) {
            return Err(SchedulerError::DuplicateTicket(ticket.id.clone()));
        }
        tracing::info!(ticket_id = %ticket.id, severity = ticket.severity, "ticket submitted");
        self.tickets.insert(
            ticket.id.clone(),
            TicketEntry {
                ticket,
                state: TicketState::Pending,
            },
        );
        Ok(())
    }

    /// Current state of a ticket; `None` once it completed (tickets are
    /// destroyed at their terminal outcome) or was never submitted
    #[must_use]
    pub fn state_of(&self, ticket_id: &TicketId) -> Option<TicketState> {
        self.tickets.get(ticket_id).map(|e| e.state)
    }

    /// Number of tickets waiting for capacity
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tickets
            .values()
            .filter(|e| e.state == TicketState::Pending)
            .count()
    }

    /// Free agents in the pool
    #[inline]
    #[must_use]
    pub fn free_agents(&self) -> u32 {
        self.pool.free_agents()
    }

    /// Current meta-agent tunables
    #[inline]
    #[must_use]
    pub fn tunables(&self) -> Tunables {
        self.meta.tunables()
    }

    /// Allocate the globally highest-scoring pending ticket, if capacity
    /// allows
    ///
    /// Returns `None` when no pending ticket exists or no block is free.
    /// Picking the global maximum (not the first allocatable ticket found)
    /// is what carries the starvation-freedom guarantee end to end.
    ///
    /// # Errors
    /// Capacity and transition errors for the chosen ticket.
    pub fn next_allocation(&mut self) -> Result<Option<TicketId>, SchedulerError> {
        if !self.pool.can_allocate() {
            return Ok(None);
        }
        let now = Utc::now();
        let best_id = self
            .prioritiser
            .best(
                self.tickets
                    .values()
                    .filter(|e| e.state == TicketState::Pending)
                    .map(|e| &e.ticket),
                now,
            )
            .map(|t| t.id.clone());
        let Some(ticket_id) = best_id else {
            return Ok(None);
        };

        self.pool
            .allocate(&ticket_id)
            .map_err(|source| SchedulerError::Capacity {
                ticket_id: ticket_id.clone(),
                source,
            })?;
        self.transition(&ticket_id, TicketState::Allocated)?;
        Ok(Some(ticket_id))
    }

    /// Run the highest-priority allocatable ticket end to end
    ///
    /// Returns `None` when nothing can be scheduled. On a per-ticket error
    /// the ticket's capacity is freed, a failed outcome is recorded, and the
    /// error (carrying ticket id and phase) propagates so the caller can
    /// escalate — the scheduler itself stays operational.
    ///
    /// # Errors
    /// See [`SchedulerError`]; only `is_fatal` errors warrant stopping the
    /// scheduler.
    pub async fn run_next(&mut self) -> Result<Option<TicketReport>, SchedulerError> {
        let Some(ticket_id) = self.next_allocation()? else {
            return Ok(None);
        };

        match self.run_allocated(&ticket_id).await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                // Park the ticket but never leak its capacity
                if let Err(free_err) = self.pool.free(&ticket_id) {
                    tracing::error!(%ticket_id, error = %free_err, "freeing parked ticket failed");
                }
                self.meta.record(OutcomeEntry {
                    recorded_at: Utc::now(),
                    success: false,
                    cost: 0.0,
                });
                tracing::warn!(%ticket_id, error = %e, "ticket parked for escalation");
                Err(e)
            }
        }
    }

    /// Run tickets until neither capacity nor pending work remains
    ///
    /// # Errors
    /// Stops at the first per-ticket error; already-completed reports are
    /// lost to the caller but their outcomes are recorded.
    pub async fn drain(&mut self) -> Result<Vec<TicketReport>, SchedulerError> {
        let mut reports = Vec::new();
        while let Some(report) = self.run_next().await? {
            reports.push(report);
        }
        Ok(reports)
    }

    async fn run_allocated(&mut self, ticket_id: &TicketId) -> Result<TicketReport, SchedulerError> {
        let started = std::time::Instant::now();
        let ticket = self
            .tickets
            .get(ticket_id)
            .ok_or_else(|| SchedulerError::UnknownTicket(ticket_id.clone()))?
            .ticket
            .clone();

        // Clamp the candidate file set
        let mut scope = self
            .scope_filter
            .scan(&self.repo_root)
            .map_err(|source| SchedulerError::Scope {
                ticket_id: ticket_id.clone(),
                source,
            })?;
        if !ticket.scope.is_empty() {
            scope.retain(|p| ticket.scope.contains(p));
        }
        let scope_entropy = medic_scope::entropy_bits(scope.len());
        tracing::info!(
            %ticket_id,
            files = scope.len(),
            entropy_bits = scope_entropy,
            "scope clamped"
        );

        // External fixer produces (and applies) the patch
        let proposal = match self.fixer.propose_fix(&ticket, &scope).await {
            Ok(proposal) => proposal,
            Err(e) => {
                tracing::warn!(%ticket_id, error = %e, "fixer produced no patch");
                self.transition(ticket_id, TicketState::RolledBack)?;
                let cost = started.elapsed().as_millis() as f64;
                return self.finish(ticket_id, false, None, scope_entropy, cost);
            }
        };

        // Reverse path must exist before verification starts
        self.rollback
            .register(ticket_id.as_str(), &proposal.forward_diff)
            .map_err(|source| SchedulerError::Rollback {
                ticket_id: ticket_id.clone(),
                source,
            })?;
        self.transition(ticket_id, TicketState::Verifying)?;

        let args = self.config.canary_args.clone();
        let result = self.canary.run(&self.config.canary_program, &args).await;
        let cost = if proposal.cost > 0.0 {
            proposal.cost
        } else {
            started.elapsed().as_millis() as f64
        };

        if result.passed() {
            self.transition(ticket_id, TicketState::Accepted)?;
            self.rollback
                .release(ticket_id.as_str())
                .map_err(|source| SchedulerError::Rollback {
                    ticket_id: ticket_id.clone(),
                    source,
                })?;
            self.finish(ticket_id, true, Some(result), scope_entropy, cost)
        } else {
            tracing::warn!(
                %ticket_id,
                timed_out = result.timed_out(),
                "verification failed; rolling back"
            );
            match self.rollback.rollback(ticket_id.as_str()) {
                Ok(()) => {
                    self.transition(ticket_id, TicketState::RolledBack)?;
                    self.finish(ticket_id, false, Some(result), scope_entropy, cost)
                }
                // Worktree needs operator intervention; the ticket stays
                // parked in Verifying
                Err(source) => Err(SchedulerError::Rollback {
                    ticket_id: ticket_id.clone(),
                    source,
                }),
            }
        }
    }

    fn finish(
        &mut self,
        ticket_id: &TicketId,
        accepted: bool,
        verify: Option<CanaryResult>,
        scope_entropy_bits: f64,
        cost: f64,
    ) -> Result<TicketReport, SchedulerError> {
        self.transition(ticket_id, TicketState::Done)?;
        self.pool
            .free(ticket_id)
            .map_err(|source| SchedulerError::Capacity {
                ticket_id: ticket_id.clone(),
                source,
            })?;
        // Terminal outcome: the ticket is destroyed
        self.tickets.remove(ticket_id);
        self.meta.record(OutcomeEntry {
            recorded_at: Utc::now(),
            success: accepted,
            cost,
        });
        tracing::info!(%ticket_id, accepted, cost, "ticket completed");
        Ok(TicketReport {
            ticket_id: ticket_id.clone(),
            accepted,
            verify,
            scope_entropy_bits,
            cost,
        })
    }

    fn transition(&mut self, ticket_id: &TicketId, to: TicketState) -> Result<(), SchedulerError> {
        let entry = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| SchedulerError::UnknownTicket(ticket_id.clone()))?;
        if !state::allowed(entry.state, to) {
            return Err(SchedulerError::InvalidTransition {
                ticket_id: ticket_id.clone(),
                from: entry.state,
                to,
            });
        }
        tracing::debug!(%ticket_id, from = %entry.state, to = %to, "ticket transition");
        entry.state = to;
        Ok(())
    }
}
