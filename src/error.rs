use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelayError {
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),
    #[error("Connection is already registered as {current}, refusing {requested}")]
    AlreadyRegistered { current: String, requested: String },
    #[error("Connection is closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record already exists")]
    Duplicate,
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to read TLS file: {0}")]
    Io(#[from] std::io::Error),
    #[error("No certificates found in certificate file")]
    NoCertificates,
    #[error("No private key found in key file")]
    NoPrivateKey,
    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}
