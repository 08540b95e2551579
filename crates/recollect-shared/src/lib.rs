mod error;
pub use error::{AppError, AppErrorKind};

mod env;
pub use env::{AppEnv, APP_ENV};

mod logging;
pub use logging::init_tracing;
