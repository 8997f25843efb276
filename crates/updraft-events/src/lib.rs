#![forbid(unsafe_code)]

//! Event bus shared by the loader and the launch task.

mod bus;
mod event;
mod loader;
mod task;

pub use bus::EventBus;
pub use event::Event;
pub use loader::LoaderEvent;
pub use task::{BackgroundUpdateStatus, TaskEvent};
