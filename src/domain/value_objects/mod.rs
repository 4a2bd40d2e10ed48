pub mod collection_key;
pub mod milestone;
pub mod view_filter;
pub mod voter_set;

pub use collection_key::CollectionKey;
pub use milestone::{Milestone, MilestoneList};
pub use view_filter::ViewFilter;
pub use voter_set::VoterSet;
