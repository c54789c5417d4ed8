//! Turning a [`crate::history::MultiHistogramHistory`] into an entropy
//! estimate (`spec.md` §4.4).
pub mod gmh;
pub mod mle;
pub mod newton;

pub use mle::Mle;
