use thiserror::Error;

use crate::elements::ElementKind;

/// Errors raised while configuring, building or solving a network
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid period grid: {0}")]
    InvalidPeriods(String),

    #[error("`{element}`: parameter `{parameter}` has length {actual}, expected {expected}")]
    LengthMismatch {
        element: String,
        parameter: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{element}`: missing required parameter `{parameter}`")]
    MissingParameter { element: String, parameter: String },

    #[error("`{element}`: invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        element: String,
        parameter: String,
        reason: String,
    },

    #[error("`{element}`: unsupported parameter `{parameter}`")]
    UnsupportedParameter { element: String, parameter: String },

    #[error("connection `{connection}` references unknown element `{endpoint}`")]
    UnknownEndpoint { connection: String, endpoint: String },

    #[error("connection `{connection}` references `{endpoint}`, which is itself a connection")]
    ConnectionEndpoint { connection: String, endpoint: String },

    #[error("`{name}` is a {existing}, cannot update it as a {requested}")]
    IncompatibleType {
        name: String,
        existing: ElementKind,
        requested: ElementKind,
    },

    #[error("cannot add `{name}`: network topology is frozen once built")]
    TopologyFrozen { name: String },

    #[error("`{name}`: update() called before the network was built")]
    UpdateBeforeBuild { name: String },

    #[error("unknown element `{name}`")]
    UnknownElement { name: String },

    #[error("network constraints have already been built")]
    AlreadyBuilt,

    #[error("an earlier build of this network failed; rebuild it from scratch")]
    BuildFailed,

    #[error("failed to build `{name}`: {source}")]
    Build {
        name: String,
        #[source]
        source: Box<NetworkError>,
    },

    #[error("optimization failed: {status}")]
    Solve { status: String },

    #[error("network has not been optimized yet")]
    NotSolved,
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    pub(crate) fn invalid(element: &str, parameter: &str, reason: impl Into<String>) -> Self {
        NetworkError::InvalidParameter {
            element: element.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(element: &str, parameter: &str) -> Self {
        NetworkError::UnsupportedParameter {
            element: element.to_string(),
            parameter: parameter.to_string(),
        }
    }

    pub(crate) fn missing(element: &str, parameter: &str) -> Self {
        NetworkError::MissingParameter {
            element: element.to_string(),
            parameter: parameter.to_string(),
        }
    }
}
