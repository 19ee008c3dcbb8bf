pub mod coordinator;
pub mod protocol;
pub mod transcript;

pub use coordinator::{
    CloseOutcome, Coordinator, DispatchAction, DispatchState, PendingCommand, Submission,
    SyncOutcome,
};
pub use protocol::{
    AccountInfo, AccountRequest, ApiEnvelope, AuthCredentials, AuthRequest, AuthResponse,
    ConfigDocument, ControlFrame, FrameKind, MutationAck, ProtocolError, ServerStatus,
};
pub use transcript::{ConsoleLine, LineClass, Transcript};
