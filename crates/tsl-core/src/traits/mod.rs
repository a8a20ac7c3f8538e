//! Core trait definitions

mod graph;

pub use graph::AudioGraph;
