/// Configuration validation errors.
///
/// Every variant is raised before the pipeline starts. The running
/// confirm/decode/aggregate path never fails: anomalies are reported as
/// [`crate::types::FeedEvent`] signals instead, so a subscriber can react
/// without the pipeline halting.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("invalid topic list: expected 1 to 4 topics, got {0}")]
    InvalidTopics(usize),

    #[error("missing watched contract address")]
    MissingContract,

    #[error("no event decoders registered")]
    NoDecoders,

    #[error("no decoder registered to apply the field projection to")]
    ProjectionWithoutDecoder,

    #[error("fill decoder registered without quote token addresses")]
    MissingQuoteTokens,
}
