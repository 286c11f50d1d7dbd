pub mod chart;
pub mod config;
pub mod frequency;
pub mod input;
pub mod output;
pub mod similarity;
pub mod tasks;

pub use frequency::{
    aggregate, aggregate_all, bottom_n, rank, top_n, FrequencyTable, PostId, PostOperatorCounts, TopicMembership,
    Utilization,
};
pub use similarity::{
    intersection_by_key, positional_overlap, positional_similarity, sequence_match_ratio, similarity_match,
    SimilarityResult,
};
