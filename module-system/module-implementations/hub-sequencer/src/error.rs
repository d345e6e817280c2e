use hub_bank::Amount;
use hub_modules_api::Timestamp;
use thiserror::Error;

/// Broad classes of failure, used by callers to tell user mistakes apart from
/// broken module invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    OutOfRange,
    FailedPrecondition,
    PermissionDenied,
    /// A module invariant does not hold. Indicates a bug, not a bad request.
    Internal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencerError {
    #[error("Sequencer {0} not found")]
    SequencerNotFound(String),
    #[error("Rollapp {0} not found")]
    RollappNotFound(String),
    #[error("Sequencer {0} is already registered")]
    SequencerExists(String),
    #[error("Consensus key is already registered by sequencer {0}")]
    ConsensusKeyInUse(String),
    #[error("Invalid consensus key: {0}")]
    InvalidConsensusKey(String),
    #[error("Invalid bond denomination: expected {expected}, got {got}")]
    InvalidDenom { expected: String, got: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("Invalid whitelisted relayers: {0}")]
    InvalidRelayers(String),
    #[error("Insufficient bond: {bond} is below the minimum {min_bond}")]
    InsufficientBond { bond: Amount, min_bond: Amount },
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Sequencer {0} is not an initial sequencer of a rollapp that has not launched")]
    NotInitialSequencer(String),
    #[error("Sequencer is the proposer or successor of its rollapp")]
    ProposerOrSuccessor,
    #[error("Unbond not allowed: {0}")]
    UnbondNotAllowed(String),
    #[error("Unbond blocked: {0}")]
    UnbondBlocked(String),
    #[error("Sequencer {0} is not bonded")]
    NotBonded(String),
    #[error("Sequencer {0} is jailed")]
    Jailed(String),
    #[error("Sequencer {sequencer} is not the proposer of rollapp {rollapp_id}")]
    NotProposer {
        sequencer: String,
        rollapp_id: String,
    },
    #[error("Proposer cannot be kicked: {0}")]
    ProposerNotKickable(String),
    #[error("Notice period of {sequencer} has not elapsed: ends at {ends_at}, now {now}")]
    NoticeNotElapsed {
        sequencer: String,
        ends_at: Timestamp,
        now: Timestamp,
    },
    #[error("Sender {0} is not the module authority")]
    Unauthorized(String),
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

impl SequencerError {
    pub fn kind(&self) -> ErrorKind {
        use SequencerError::*;
        match self {
            SequencerNotFound(_) | RollappNotFound(_) => ErrorKind::NotFound,
            SequencerExists(_) | ConsensusKeyInUse(_) => ErrorKind::AlreadyExists,
            InvalidConsensusKey(_)
            | InvalidDenom { .. }
            | InvalidAmount(_)
            | InvalidMetadata(_)
            | InvalidRelayers(_) => ErrorKind::InvalidArgument,
            InsufficientBond { .. } | InvalidParams(_) => ErrorKind::OutOfRange,
            NotInitialSequencer(_)
            | ProposerOrSuccessor
            | UnbondNotAllowed(_)
            | UnbondBlocked(_)
            | NotBonded(_)
            | Jailed(_)
            | ProposerNotKickable(_)
            | NoticeNotElapsed { .. } => ErrorKind::FailedPrecondition,
            NotProposer { .. } | Unauthorized(_) => ErrorKind::PermissionDenied,
            Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Finds the first [`SequencerError`] in an error chain and returns its kind.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<SequencerError>()
        .or_else(|| {
            err.chain()
                .find_map(|cause| cause.downcast_ref::<SequencerError>())
        })
        .map(SequencerError::kind)
}
