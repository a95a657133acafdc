pub mod errors;
pub mod ledger;
pub mod members;
pub mod review;
pub mod tickets;

pub use errors::{LedgerError, ReviewError, ScheduledCloseError, TicketError};
pub use ledger::{ReputationLedger, Standing};
pub use members::MemberDirectory;
pub use review::{
    CloseOutcome, ParticipantStatus, RecoveryReport, RemoveOutcome, ReviewLifecycle,
    SignupAnnouncer,
};
pub use tickets::{Resolution, TicketWorkflow};
