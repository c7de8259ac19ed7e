//! Notification-driven mailbox synchronization.
//!
//! Flow for one push notification:
//! 1. `notification::decode_body()`: envelope → (account, sequence)
//! 2. `SyncEngine::handle()`: credential lookup, then hand-off to the account actor
//! 3. `AccountDispatcher`: one actor per account owns the `Cursor`
//! 4. `CycleRunner::run()`: history diff → bounded fetch fan-out → pipeline → sink
//! 5. The actor applies the outcome to the cursor, unless the budget ran out

pub mod actor;
pub mod cursor;
pub mod cycle;
pub mod engine;
pub mod notification;

pub use actor::AccountDispatcher;
pub use cursor::Cursor;
pub use cycle::{CycleOutcome, CycleRunner, ProcessingSummary};
pub use engine::{LatestEmail, MailboxSummary, SyncEngine, WatchStarted};
pub use notification::{InboundNotification, PushEnvelope, decode_body};
