//! Feature scaling transformers.
//!
//! | Transformer | Description |
//! |-------------|-------------|
//! | [`StandardScaler`] | Remove mean, scale to unit variance |

pub mod standard;

pub use standard::{
    FittedStandardScaler, StandardScaler, StandardScalerConfig, StandardScalerParams,
};
