pub mod answer_service;
pub mod auth_service;
pub mod collection_feed;
pub mod derived_view_store;
pub mod mutation_coordinator;
pub mod profile_service;
pub mod question_service;
pub mod subscription_registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use answer_service::AnswerService;
pub use auth_service::AuthService;
pub use collection_feed::CollectionFeed;
pub use derived_view_store::{DerivedViewStore, OptimisticPatch};
pub use mutation_coordinator::{Mutation, MutationCoordinator, MutationStatus};
pub use profile_service::{ProfileService, ProfileSummary};
pub use question_service::QuestionService;
pub use subscription_registry::{SubscriptionHandle, SubscriptionRegistry};
