pub mod environment;
pub mod logging;

pub use environment::Environment;
pub use logging::setup_logging;
