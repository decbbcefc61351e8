pub mod changes;
pub mod common;
pub mod completions;
pub mod products;
pub mod queue;
pub mod sales;
pub mod sync;
pub mod watch;
