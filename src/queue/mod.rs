mod store;

pub use store::{LoadedQueue, ReportQueue, QUEUE_KEY};
