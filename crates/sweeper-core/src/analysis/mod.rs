pub mod dir_fingerprint;
pub mod dir_similarity;
pub mod ranking;

pub use dir_fingerprint::{
    build_folder_fingerprints, fingerprint_files, FingerprintOptions, FingerprintStats,
    FolderFingerprint,
};
pub use dir_similarity::{
    find_similar_folders, ClusterMember, FolderCluster, MatchType, SimilarityEdge,
    SimilarityOptions, SimilarityReport,
};
pub use ranking::{rank_groups, select_top, RankingPolicy};
