pub mod answer;
pub mod badge;
pub mod question;
pub mod user_profile;

pub use answer::Answer;
pub use badge::{Badge, BadgeKind, BadgeSet};
pub use question::Question;
pub use user_profile::{AuthUser, UserProfile};
