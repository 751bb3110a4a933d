mod assembler;
mod predictor;

pub use assembler::{assemble, STATUS_ERROR};
pub use predictor::Predictor;
