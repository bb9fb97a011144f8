//! Client side of Posty: a transport seam over the posts REST API and a
//! controller that keeps a cached post list and status messages in sync with it.

pub mod controller;
pub mod error;
pub mod presentation;
pub mod transport;

pub use controller::{ControllerSettings, Outcome, PostController};
pub use error::ClientError;
pub use presentation::{
    Channel, MessageChannel, MessageTiming, Phase, ShowOutcome, StatusMessages, ViewState,
};
pub use transport::{HttpPostsApi, PostsApi};
