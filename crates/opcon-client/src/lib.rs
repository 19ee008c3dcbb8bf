pub mod api;
pub mod channel;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod poller;
pub mod session;
pub mod sink;

pub use api::{ApiClient, ApiError};
pub use channel::{ChannelEvent, ChannelHandle};
pub use config::ClientConfig;
pub use console::{apply_feed_event, run_console_feed};
pub use dispatch::{CommandDispatcher, CommandRequest};
pub use poller::{StatusPoller, StatusSnapshot};
pub use session::SessionHandle;
pub use sink::{SinkHandle, SinkLine};
