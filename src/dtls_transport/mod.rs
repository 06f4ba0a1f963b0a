#[cfg(test)]
mod dtls_transport_test;

pub mod dtls_parameters;
pub mod dtls_role;

pub use dtls_parameters::{DtlsFingerprint, DtlsParameters};
pub use dtls_role::DtlsRole;
