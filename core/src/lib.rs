pub mod document;
pub mod error;
pub mod handle;
pub mod index;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use document::{Continent, Document};
pub use error::{IndexError, Result};
pub use handle::IndexHandle;
pub use index::{DocId, IndexConfig, InvertedIndex, Posting, SearchHit, TermId};
pub use query::{GeoPlanner, ParsedQuery};
