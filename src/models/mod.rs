pub mod entry;
pub mod events;
pub mod index_entry;
pub mod resource;
pub mod search;

pub use entry::{Entry, EntryBody};
pub use events::DomainEvent;
pub use index_entry::IndexEntry;
pub use resource::Resource;
pub use search::{
    EntryHit, FieldValueCount, QueryRequest, SearchHit, SearchRequest, SearchResponse, SearchResult,
    SortField, SortOrder, SplitResponse,
};
