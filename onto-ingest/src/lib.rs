//! Fragment ingestion: decode, stage, apply atomically, invalidate.

pub mod engine;
pub mod fragment;
pub mod plan;

pub use engine::IngestEngine;
pub use fragment::{ClassFragment, DataPropertyFragment, Fragment, ObjectPropertyFragment};
pub use plan::{plan, IngestOutcome, IngestPlan};
