//! # Wheatdet Steps
//!
//! Concrete bootstrap steps for the wheatdet pipeline: the dependency
//! installer, the training-source provisioner, the dataset and
//! pretrained-weights materializers, and the training invoker, plus the
//! archive and process helpers they share.

pub mod archive;
pub mod dataset;
pub mod deps;
pub mod exec;
pub mod source;
pub mod train;
pub mod verify;
pub mod weights;

pub use dataset::DatasetStep;
pub use deps::DepsStep;
pub use source::SourceStep;
pub use train::TrainStep;
pub use weights::WeightsStep;
