mod fetch;
mod status;
mod thumbnails;

pub use fetch::{run_all, run_file};
pub use status::run_status;
pub use thumbnails::run_thumbnails;
