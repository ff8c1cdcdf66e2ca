pub mod jobs;
pub mod players;
pub mod utils;
