use thiserror::Error;

/// An error in the module model proper. Most front-end problems are reported
/// through [`crate::diagnostics::Diagnostics`] instead; these are the few that
/// the model itself detects.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ModelError {
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
}
