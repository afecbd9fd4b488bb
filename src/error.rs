use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use ::config::ConfigError;
use actix_web::error::{JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derivative::Derivative;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::CampaignId;
use crate::gateway::GatewayError;
use crate::violations::Violation;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    InvalidCampaign {
        violations: Vec<Violation>,
    },
    CampaignAlreadyPublished {
        campaign_id: CampaignId,
    },

    // 404
    PathDoesNotExist,
    CampaignDoesNotExist {
        campaign_id: CampaignId,
    },

    // 409
    ConcurrentModificationDetected,
    PublishAlreadyInProgress {
        campaign_id: CampaignId,
    },

    // 500
    ExistentialState(String),
    #[serde(serialize_with = "display")]
    RemoteGatewayFailed(#[derivative(PartialEq = "ignore")] GatewayError),
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    InvalidConfiguration(#[derivative(PartialEq = "ignore")] ConfigError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidCampaign { .. } => "E4001002",
            Error::CampaignAlreadyPublished { .. } => "E4001003",
            Error::PathDoesNotExist => "E4041000",
            Error::CampaignDoesNotExist { .. } => "E4041001",
            Error::ConcurrentModificationDetected => "E4091000",
            Error::PublishAlreadyInProgress { .. } => "E4091001",
            Error::ExistentialState(_) => "E5001000",
            Error::RemoteGatewayFailed(_) => "E5001001",
            Error::FailedDatabaseCall(_) => "E5001002",
            Error::FailedToSerializeToBson(_) => "E5001003",
            Error::InvalidConfiguration(_) => "E5001004",
            Error::IoError(_) => "E5001005",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidCampaign { .. } => "The given campaign has missing or invalid fields",
            Error::CampaignAlreadyPublished { .. } => {
                "The requested campaign has already been published"
            }
            Error::PathDoesNotExist => "The requested path does not exist",
            Error::CampaignDoesNotExist { .. } => "The requested campaign does not exist",
            Error::ConcurrentModificationDetected => {
                "The server detected a concurrent modification"
            }
            Error::PublishAlreadyInProgress { .. } => {
                "The requested campaign is already being published"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::RemoteGatewayFailed(_) => "The ads platform could not complete the request",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::InvalidConfiguration(_) => "The server is misconfigured",
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCampaign { .. } => StatusCode::BAD_REQUEST,
            Error::CampaignAlreadyPublished { .. } => StatusCode::BAD_REQUEST,
            Error::PathDoesNotExist => StatusCode::NOT_FOUND,
            Error::CampaignDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::ConcurrentModificationDetected => StatusCode::CONFLICT,
            Error::PublishAlreadyInProgress { .. } => StatusCode::CONFLICT,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::RemoteGatewayFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_meta: Option<&'a Error>,
        }

        let status = self.status_code();

        // server-side details stay in the logs
        let error_meta = if status.is_server_error() {
            match self {
                // already logged with its publish step
                Error::RemoteGatewayFailed(_) => {
                    tracing::debug!(error_code = self.error_code(), "request failed")
                }
                _ => tracing::error!(error_code = self.error_code(), error = %self, "request failed"),
            }
            None
        } else {
            Some(self)
        };

        HttpResponse::build(status).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<GatewayError> for Error {
    fn from(error: GatewayError) -> Error {
        Error::RemoteGatewayFailed(error)
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::InvalidConfiguration(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::RemoteGatewayFailed(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::InvalidConfiguration(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
