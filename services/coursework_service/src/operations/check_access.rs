use serde::{Deserialize, Serialize};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, Decision};
use crate::store::{CoursesRepository, DocumentsRepository, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct CheckAccessInput {
    pub actor: Actor,
    pub request: AccessRequest,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckAccessOutput {
    pub decision: Decision,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CheckAccessError {
    #[error("Resource not found.")]
    NotFound,
}

/// Resolver passthrough for "may I?" probes from the route layer.
pub async fn check_access(
    _ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &CheckAccessInput,
) -> Result<CheckAccessOutput, EndpointError<CheckAccessError>> {
    let decision = resolve(store, &input.actor, &input.request)
        .await
        .map_err(|e| match e {
            ResolveError::NotFound => EndpointError::operation(CheckAccessError::NotFound),
            ResolveError::Datastore(e) => {
                log::error!("Permission resolution failed: {:?}.", e);
                EndpointError::internal()
            }
        })?;

    Ok(CheckAccessOutput { decision })
}

impl OperationError for CheckAccessError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
        }
    }
}
