pub mod get;
pub mod list;
pub mod requeue;
pub mod submit;

pub use get::get_job;
pub use list::list_jobs;
pub use requeue::requeue_job;
pub use submit::submit_job;
