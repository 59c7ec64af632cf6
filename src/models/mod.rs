mod access_event;
mod conversation;
mod message;

pub use access_event::{AccessEvent, AccessType};
pub use conversation::Conversation;
pub use message::{AiAnalysis, ChatMessage, MessageType, Profile, AI_SENDER_ID};
