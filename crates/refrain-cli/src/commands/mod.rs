pub mod config;
pub mod fingerprint;
pub mod logging;
pub mod recognize;
pub mod status;

pub use fingerprint::run_fingerprint;
pub use recognize::run_recognize;
pub use status::show_status;
