pub mod progress;

pub use progress::{GetRunProgressQuery, ProgressQueryError, ProgressSnapshot};
