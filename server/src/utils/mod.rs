pub mod error;
pub mod extract;
pub mod response;
pub mod validation;
pub mod verification;

pub use error::{AppError, AppResult};
