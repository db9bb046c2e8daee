pub mod error;
pub mod models;
pub mod postcodes;
pub mod search;
pub mod sparql;

pub use error::{Result, ScoutError};
pub use postcodes::{lookup_postcodes, shared_store, PostcodeStore};
pub use search::search_properties;
pub use sparql::{SparqlClient, SparqlExecutor};
