pub use crate::net::errors::NetworkError;

pub type Result<T, E = NetworkError> = std::result::Result<T, E>;
