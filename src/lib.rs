//! # crossrec
//!
//! Collaborative filtering over project dependency graphs, evaluated with
//! contiguous k-fold cross-validation.
//!
//! Pipeline, leaf to root:
//! - [`sparse`]: fixed-size sparse vectors and matrices
//! - [`graph`]: dependency graphs with a shared artifact arena
//! - [`store`]: on-disk project list, dictionaries, splits and result files
//! - [`similarity`]: IDF-weighted cosine between a test project and every training project
//! - [`presence`] and [`recommend`]: neighbour presence matrix and rating prediction
//! - [`metrics`] and [`validator`]: ranking metrics per fold and across folds
//! - [`folds`], [`builder`] and [`runner`]: fold slicing and orchestration
//!
//! ```ignore
//! use crossrec::builder::EvaluationBuilder;
//! use crossrec::config::EvaluationConfig;
//!
//! let config = EvaluationConfig::default().with_source_dir("dataset/");
//! let runner = EvaluationBuilder::new(config).build()?;
//! let reports = runner.run()?;
//! ```
pub mod builder;
pub mod classifier;
pub mod config;
pub mod error;
pub mod folds;
pub mod graph;
pub mod metrics;
pub mod presence;
pub mod recommend;
pub mod runner;
pub mod similarity;
pub mod sparse;
pub mod store;
pub mod validator;

#[cfg(test)]
mod tests;
