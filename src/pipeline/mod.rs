mod dispatcher;
mod spawner;

pub use dispatcher::Dispatcher;
pub use spawner::{Job, QueuedSpawner, TaskSpawner, TokioSpawner};
