use std::collections::TryReserveError;

/// Reasons a cache geometry is rejected before any cache is built
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("associativity (E) must be at least 1")]
    ZeroAssociativity,

    #[error("{0} set index bits (s) is too many sets to index")]
    TooManySets(u32),

    #[error("{0} block offset bits (b) gives a block size that does not fit in 64 bits")]
    BlockTooLarge(u32),

    #[error("set index bits ({set_bits}) and block offset bits ({block_bits}) exceed a 64 bit address")]
    AddressTooNarrow { set_bits: u32, block_bits: u32 },
}

/// Fatal errors raised while simulating. None of these are recoverable, the run has to be
/// restarted from scratch
#[derive(thiserror::Error, Debug)]
pub enum SimulationError {
    #[error("{0} is not a valid operation")]
    InvalidOperation(char),

    #[error("failed to allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        source: TryReserveError,
    },
}
