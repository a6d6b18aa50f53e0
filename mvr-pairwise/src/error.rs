use mvr_ransac::RansacError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairwiseError {
    #[error("{source} ({candidates} candidates)")]
    Ransac {
        #[source]
        source: RansacError,
        candidates: usize,
    },
    #[error("found {found} corresponding points within reach, required {required}")]
    TooFewMatches { required: usize, found: usize },
    #[error("failed to build the matching thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
