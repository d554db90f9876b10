// Topic discovery — normalize, embed, reduce, cluster, label.

pub mod cluster;
pub mod document;
pub mod download;
pub mod embeddings;
pub mod hashing;
pub mod label;
pub mod normalize;
pub mod reduce;
pub mod traits;
