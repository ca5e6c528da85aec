//! Knowledge-base entries: searchable text, tags, references, relevance,
//! batched idempotent upserts.

pub mod memory;
pub mod text;
pub mod writer;

pub use memory::InMemoryKnowledgeStore;
pub use text::{normalize, split_camel};
pub use writer::{relevance, KnowledgeBaseWriter};
