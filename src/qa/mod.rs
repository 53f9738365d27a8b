//! Live class Q&A: snapshot reads, single-write mutations, push invalidation
//! and the per-viewer session that ties them together.

mod gateway;
mod identity;
mod invalidation;
mod projection;
mod session;
mod snapshot;
mod store;

pub use gateway::{MutationGateway, UpvoteOutcome};
pub use identity::{FileStore, IdentityResolver, KeyValueStore, MemoryStore, IDENTIFIER_KEY};
pub use invalidation::{InvalidationTrigger, Subscription, SubscriptionState};
pub use projection::{project, ExpandedSet, QaView, QuestionRow, ReplyRow, UpvoteAction};
pub use session::{
    LoadFence, LoadOutcome, Notice, NoticeLevel, QaSession, Ticket, DEFAULT_NOTICE_TTL,
};
pub use snapshot::{QuestionEntry, Snapshot, SnapshotLoader};
pub use store::QaStore;
