//! Reference journal store.

mod memory;

pub use memory::InMemoryJournalStore;
