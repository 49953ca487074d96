use std::collections::HashMap;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct InFlightRequest {
    repo_key: String,
    token: CancellationToken,
    issued_at: Instant,
    generation: u64,
}

/// Handle for one issued run fetch. Cancelled when a newer fetch for the same
/// workflow starts, or when the caller aborts it.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub workflow_id: u64,
    pub token: CancellationToken,
    generation: u64,
}

/// At most one outstanding run fetch per workflow id. Newest request wins.
#[derive(Default)]
pub struct InFlightTable {
    entries: HashMap<u64, InFlightRequest>,
    next_generation: u64,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new fetch for `workflow_id`, cancelling any older one.
    pub fn begin(&mut self, workflow_id: u64, repo_key: &str) -> Ticket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();
        let previous = self.entries.insert(
            workflow_id,
            InFlightRequest {
                repo_key: repo_key.to_owned(),
                token: token.clone(),
                issued_at: Instant::now(),
                generation,
            },
        );
        if let Some(old) = previous {
            tracing::debug!(
                "inflight: workflow {workflow_id} superseded after {:?}",
                old.issued_at.elapsed()
            );
            old.token.cancel();
        }
        Ticket {
            workflow_id,
            token,
            generation,
        }
    }

    /// Whether `ticket` is still the newest request for its workflow.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        !ticket.token.is_cancelled()
            && self
                .entries
                .get(&ticket.workflow_id)
                .is_some_and(|e| e.generation == ticket.generation)
    }

    /// Release the slot held by `ticket`. Returns `true` when the ticket was
    /// still current, i.e. its result may be applied.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        let current = self.is_current(ticket);
        if self
            .entries
            .get(&ticket.workflow_id)
            .is_some_and(|e| e.generation == ticket.generation)
        {
            self.entries.remove(&ticket.workflow_id);
        }
        current
    }

    /// Drop a fetch whose future went away before [`finish`](Self::finish)
    /// ran. Cancels its token and frees the slot unless a newer fetch owns it.
    pub fn abandon(&mut self, ticket: &Ticket) {
        ticket.token.cancel();
        if self
            .entries
            .get(&ticket.workflow_id)
            .is_some_and(|e| e.generation == ticket.generation)
        {
            self.entries.remove(&ticket.workflow_id);
        }
    }

    /// Abort the outstanding fetch for `workflow_id`, if any.
    pub fn cancel(&mut self, workflow_id: u64) -> bool {
        match self.entries.remove(&workflow_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Abort every outstanding fetch belonging to `repo_key`.
    pub fn cancel_repo(&mut self, repo_key: &str) -> usize {
        let ids: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.repo_key == repo_key)
            .map(|(&id, _)| id)
            .collect();
        for id in &ids {
            self.cancel(*id);
        }
        ids.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.token.cancel();
        }
    }

    pub fn contains(&self, workflow_id: u64) -> bool {
        self.entries.contains_key(&workflow_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
