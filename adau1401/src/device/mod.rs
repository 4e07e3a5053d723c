//! ADAU1401 driver: bus primitives and block parameter programming.

mod adau1401;
pub mod blocks;
mod program;
pub mod registers;

pub use adau1401::Adau1401;
pub use program::phase_to_step;
