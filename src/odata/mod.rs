//! OData module
//!
//! Dynamic multi-service client for SAP OData APIs: transport, document
//! caching, service/schema discovery, and the query facade.

pub mod client;
pub mod discovery;
pub mod query;
pub mod shapes;

pub use client::{ODataClient, ODataError, ServiceInfo};
pub use discovery::{EntityStructure, FieldInfo};
pub use query::{BatchOperation, BatchOutcome, QueryOptions, QueryOutcome, UpdateMethod};
pub use shapes::ResponseShape;
