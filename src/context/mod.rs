//! Rolling conversation history for multi-turn text generation.

mod conversation;

pub use conversation::{
    COMPRESSION_NOTE, Conversation, DEFAULT_MAX_ENTRIES, DEFAULT_RETAINED_ENTRIES,
    DEFAULT_TOKEN_BUDGET,
};
