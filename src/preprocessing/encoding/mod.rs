//! Target encoding.

pub mod label;

pub use label::{FittedLabelEncoder, LabelEncoder, LabelEncoderParams};
