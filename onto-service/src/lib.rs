pub mod service;

pub use service::OntologyService;
