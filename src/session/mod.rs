mod builder;
mod controller;
mod state;
mod worker;

pub use builder::SessionControllerBuilder;
pub use controller::SessionController;
pub use state::{Session, SessionState, SessionStatus};
