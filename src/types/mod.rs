//! Request and response payload types shared by providers.

mod message;
mod utterance;

pub use message::{ChatMessage, Role, last_user_content};
pub use utterance::Utterance;
