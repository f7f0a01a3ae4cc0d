// Processing stages: normalize raw input, flag the latest rows, summarize the result

pub mod dedup;
pub mod normalize;
pub mod summary;
