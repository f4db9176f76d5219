//! Serialization of fitted parameters.
//!
//! Fitted transformers and classifiers expose their learned state as plain
//! `Params` structs (vectors and scalars only). Any such struct that derives
//! serde's traits gets a bincode encoding through the blanket impl below.

use std::error::Error;
use std::path::Path;

/// A parameter representation that can be serialized to and from bytes.
pub trait SerializableParams: Sized {
    /// The error type returned during (de)serialization.
    type Error: Error + Send + Sync + 'static;

    /// Serialize the parameters into a byte buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;

    /// Deserialize the parameters from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;
}

impl<T> SerializableParams for T
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize(bytes)
    }
}

/// Write params to `path` in their binary encoding, replacing any existing file.
pub fn write_params<T, P>(params: &T, path: P) -> std::io::Result<()>
where
    T: SerializableParams,
    P: AsRef<Path>,
{
    let bytes = params.to_bytes().map_err(std::io::Error::other)?;
    std::fs::write(path, bytes)
}

/// Read params previously written with [`write_params`].
pub fn read_params<T, P>(path: P) -> std::io::Result<T>
where
    T: SerializableParams,
    P: AsRef<Path>,
{
    let bytes = std::fs::read(path)?;
    T::from_bytes(&bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
