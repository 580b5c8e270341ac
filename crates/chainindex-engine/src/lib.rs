//! chainindex-engine — the height-production pipeline, worker pool, gap
//! computation, and builder/registry that turn a validated
//! [`chainindex_core::Config`] into running indexers.

pub mod builder;
pub mod gaps;
pub mod indexer;
pub mod producer;
pub mod worker;

pub use builder::{Builder, DatabaseFactory, ModuleFactory, NodeFactory, Registry};
pub use gaps::compute_gaps;
pub use indexer::Indexer;
pub use producer::{CombinedProducer, HeightProducer, ListProducer, NodeProducer, RangeProducer};
pub use worker::{run_worker, WorkerConfig};
