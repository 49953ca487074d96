// engine module: refresh coordination over a workflow source

mod coordinator;
mod inflight;
mod interface;
mod refresh;
pub mod stub;

pub use coordinator::{
    AddRepoError, CoordinatorSettings, RefreshCoordinator, RefreshError, RepoOutcome,
    WorkflowOutcome,
};
pub use inflight::{InFlightTable, Ticket};
pub use interface::{Event, EventSender, RefreshReport};
pub use refresh::{PollingState, RestartPolicy};
pub use stub::StubSource;
