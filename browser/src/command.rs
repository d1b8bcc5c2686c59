use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use casbrowser_castore::directoryservice::read_message;
use casbrowser_castore::proto::Command;
use casbrowser_castore::Error;
use serde::Serialize;
use tracing::instrument;

use crate::errors::reject;
use crate::params::DigestParams;
use crate::AppState;

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct EnvironmentVariableEntry {
    name: String,
    value: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct CommandInfo {
    arguments: Vec<String>,
    environment_variables: Vec<EnvironmentVariableEntry>,
    working_directory: String,
    output_directories: Vec<String>,
    output_files: Vec<String>,
}

impl From<Command> for CommandInfo {
    fn from(value: Command) -> Self {
        Self {
            arguments: value.arguments,
            environment_variables: value
                .environment_variables
                .into_iter()
                .map(|variable| EnvironmentVariableEntry {
                    name: variable.name,
                    value: variable.value,
                })
                .collect(),
            working_directory: value.working_directory,
            output_directories: value.output_directories,
            output_files: value.output_files,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandPage {
    instance_name: String,
    #[serde(flatten)]
    command: CommandInfo,
}

#[instrument(skip(blob_service, maximum_message_size_bytes))]
pub async fn get(
    Path(params): Path<DigestParams>,
    State(AppState {
        blob_service,
        maximum_message_size_bytes,
        ..
    }): State<AppState>,
) -> Result<Json<CommandPage>, StatusCode> {
    let digest = params.digest()?;

    let command: Command = read_message(&blob_service, &digest, Some(maximum_message_size_bytes))
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::NotFound(digest.clone())))?;

    Ok(Json(CommandPage {
        instance_name: digest.instance_name().to_string(),
        command: command.into(),
    }))
}
