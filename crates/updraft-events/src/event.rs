#![forbid(unsafe_code)]

use crate::{LoaderEvent, TaskEvent};

/// Any event published on the bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Progress of a single manifest load.
    Loader(LoaderEvent),
    /// Launch task lifecycle.
    Task(TaskEvent),
}

impl From<LoaderEvent> for Event {
    fn from(e: LoaderEvent) -> Self {
        Self::Loader(e)
    }
}

impl From<TaskEvent> for Event {
    fn from(e: TaskEvent) -> Self {
        Self::Task(e)
    }
}
