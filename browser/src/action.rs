//! Pages about actions: what was run, and what came out of it.
use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use casbrowser_castore::blobservice::BlobService;
use casbrowser_castore::directoryservice::{read_message, BlobDirectoryService, DirectoryService};
use casbrowser_castore::proto::{
    Action, ActionResult, Command, ExecuteResponse, UncachedActionResult,
};
use casbrowser_castore::{Digest, Error};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::command::CommandInfo;
use crate::errors::reject;
use crate::listing::{
    DigestRef, DirectoryListing, OutputDirectoryEntry, OutputFileEntry, OutputSymlinkEntry,
};
use crate::logs::{log_info_from_action_result, LogInfo};
use crate::params::DigestParams;
use crate::AppState;

/// An [ActionResult], with its logs resolved.
#[derive(Debug, Serialize)]
pub(crate) struct ActionResultInfo {
    exit_code: i32,
    stdout: Option<LogInfo>,
    stderr: Option<LogInfo>,
    output_directories: Vec<OutputDirectoryEntry>,
    output_files: Vec<OutputFileEntry>,
    output_symlinks: Vec<OutputSymlinkEntry>,
}

impl ActionResultInfo {
    async fn resolve<BS>(
        blob_service: &BS,
        instance_name: &str,
        action_result: &ActionResult,
    ) -> Result<Self, Error>
    where
        BS: BlobService + ?Sized,
    {
        let stdout = log_info_from_action_result(
            blob_service,
            "stdout",
            instance_name,
            action_result.stdout_digest.as_ref(),
            &action_result.stdout_raw,
        )
        .await?;
        let stderr = log_info_from_action_result(
            blob_service,
            "stderr",
            instance_name,
            action_result.stderr_digest.as_ref(),
            &action_result.stderr_raw,
        )
        .await?;

        Ok(Self {
            exit_code: action_result.exit_code,
            stdout,
            stderr,
            output_directories: action_result
                .output_directories
                .iter()
                .map(Into::into)
                .collect(),
            output_files: action_result.output_files.iter().map(Into::into).collect(),
            output_symlinks: action_result
                .output_file_symlinks
                .iter()
                .map(Into::into)
                .collect(),
        })
    }
}

/// Outputs a command declares, which are absent from the result of running
/// it. Symlinks count as files.
#[derive(Debug, Default, PartialEq, Serialize)]
pub(crate) struct MissingOutputs {
    directories: Vec<String>,
    files: Vec<String>,
}

impl MissingOutputs {
    pub(crate) fn new(command: &Command, action_result: Option<&ActionResult>) -> Self {
        let mut found_directories = HashSet::new();
        let mut found_files = HashSet::new();
        if let Some(action_result) = action_result {
            found_directories.extend(
                action_result
                    .output_directories
                    .iter()
                    .map(|output| output.path.as_str()),
            );
            found_files.extend(
                action_result
                    .output_files
                    .iter()
                    .map(|output| output.path.as_str())
                    .chain(
                        action_result
                            .output_file_symlinks
                            .iter()
                            .map(|output| output.path.as_str()),
                    ),
            );
        }

        Self {
            directories: command
                .output_directories
                .iter()
                .filter(|path| !found_directories.contains(path.as_str()))
                .cloned()
                .collect(),
            files: command
                .output_files
                .iter()
                .filter(|path| !found_files.contains(path.as_str()))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionInfo {
    command_digest: Option<DigestRef>,
    input_root_digest: Option<DigestRef>,
    do_not_cache: bool,
}

impl From<&Action> for ActionInfo {
    fn from(value: &Action) -> Self {
        Self {
            command_digest: value.command_digest.as_ref().map(Into::into),
            input_root_digest: value.input_root_digest.as_ref().map(Into::into),
            do_not_cache: value.do_not_cache,
        }
    }
}

/// Everything known about an action. Parts missing from the CAS are left
/// out, as long as there's either the action or its result.
#[derive(Debug, Serialize)]
pub(crate) struct ActionPage {
    instance_name: String,
    action_digest: DigestRef,
    action: Option<ActionInfo>,
    command: Option<CommandInfo>,
    input_root: Option<DirectoryListing>,
    cached_result: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    message: String,
    result: Option<ActionResultInfo>,
    /// Only known if the command is.
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_outputs: Option<MissingOutputs>,
}

impl ActionPage {
    #[instrument(skip_all, fields(action.digest=%action_digest), err)]
    async fn load(
        state: &AppState,
        action_digest: Digest,
        execute_response: ExecuteResponse,
    ) -> Result<Self, Error> {
        let blob_service = state.blob_service.as_ref();
        let maximum_size_bytes = Some(state.maximum_message_size_bytes);
        let instance_name = action_digest.instance_name();

        let action_result = execute_response.result;
        let result = match &action_result {
            Some(action_result) => Some(
                ActionResultInfo::resolve(blob_service, instance_name, action_result).await?,
            ),
            None => None,
        };

        let mut page = Self {
            instance_name: instance_name.to_string(),
            action_digest: (&action_digest).into(),
            action: None,
            command: None,
            input_root: None,
            cached_result: execute_response.cached_result,
            message: execute_response.message,
            result,
            missing_outputs: None,
        };

        let action: Option<Action> =
            read_message(blob_service, &action_digest, maximum_size_bytes).await?;
        let Some(action) = action else {
            if action_result.is_none() {
                return Err(Error::NotFound(action_digest));
            }
            debug!("action not found, showing its result only");
            return Ok(page);
        };
        page.action = Some((&action).into());

        let command_digest = action_digest.derive_child(action.command_digest.as_ref())?;
        let command: Option<Command> =
            read_message(blob_service, &command_digest, maximum_size_bytes).await?;
        if let Some(command) = command {
            page.missing_outputs = Some(MissingOutputs::new(&command, action_result.as_ref()));
            page.command = Some(command.into());
        }

        let input_root_digest = action_digest.derive_child(action.input_root_digest.as_ref())?;
        page.input_root = BlobDirectoryService::new(state.blob_service.clone())
            .get(&input_root_digest)
            .await?
            .map(|directory| DirectoryListing::new(&input_root_digest, &directory));

        Ok(page)
    }
}

/// Shows an action, together with its result from the action cache.
#[instrument(skip(state))]
pub async fn get_action(
    Path(params): Path<DigestParams>,
    State(state): State<AppState>,
) -> Result<Json<ActionPage>, StatusCode> {
    let digest = params.digest()?;

    let result = state.action_cache.get(&digest).await.map_err(reject)?;
    let execute_response = ExecuteResponse {
        result,
        ..Default::default()
    };

    ActionPage::load(&state, digest, execute_response)
        .await
        .map(Json)
        .map_err(reject)
}

/// Shows an action that ran, but whose result didn't make it into the
/// action cache. The digest refers to an [UncachedActionResult] in the CAS.
#[instrument(skip(state))]
pub async fn get_uncached_action_result(
    Path(params): Path<DigestParams>,
    State(state): State<AppState>,
) -> Result<Json<ActionPage>, StatusCode> {
    let digest = params.digest()?;

    let uncached_action_result: UncachedActionResult = read_message(
        state.blob_service.as_ref(),
        &digest,
        Some(state.maximum_message_size_bytes),
    )
    .await
    .map_err(reject)?
    .ok_or_else(|| reject(Error::NotFound(digest.clone())))?;

    let action_digest = digest
        .derive_child(uncached_action_result.action_digest.as_ref())
        .map_err(|e| reject(e.into()))?;

    ActionPage::load(
        &state,
        action_digest,
        uncached_action_result.execute_response.unwrap_or_default(),
    )
    .await
    .map(Json)
    .map_err(reject)
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionResultPage {
    instance_name: String,
    #[serde(flatten)]
    result: ActionResultInfo,
}

/// Shows the outcome of an action, as recorded in the action cache.
#[instrument(skip(blob_service, action_cache))]
pub async fn get_action_result(
    Path(params): Path<DigestParams>,
    State(AppState {
        blob_service,
        action_cache,
        ..
    }): State<AppState>,
) -> Result<Json<ActionResultPage>, StatusCode> {
    let digest = params.digest()?;

    let action_result = action_cache
        .get(&digest)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::NotFound(digest.clone())))?;

    let result =
        ActionResultInfo::resolve(blob_service.as_ref(), digest.instance_name(), &action_result)
            .await
            .map_err(reject)?;

    Ok(Json(ActionResultPage {
        instance_name: digest.instance_name().to_string(),
        result,
    }))
}
