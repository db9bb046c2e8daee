pub mod client;
pub mod mapper;
pub mod query;

pub use client::{Binding, SparqlClient, SparqlExecutor, SparqlValue};
