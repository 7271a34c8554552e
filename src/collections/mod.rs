//! The indices behind the address store's entry tables.

pub mod entry_table;
pub mod hash_table;
pub mod lru_list;
