use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use casbrowser_castore::actioncache::{ActionCache, MemoryActionCache};
use casbrowser_castore::blobservice::{BlobService, MemoryBlobService};
use casbrowser_castore::fixtures::{
    directory_digest, sha256_digest, BLOB_B, BLOB_B_DIGEST, DIRECTORY_COMPLICATED,
    DIRECTORY_WITH_KEEP, EMPTY_BLOB_DIGEST, HELLOWORLD_BLOB_CONTENTS, HELLOWORLD_BLOB_DIGEST,
};
use casbrowser_castore::proto::{
    Action, ActionResult, Command, Directory, EnvironmentVariable, ExecuteResponse, FileNode,
    OutputFile, Tree, UncachedActionResult,
};
use casbrowser_castore::utils::put_message;
use casbrowser_castore::Digest;
use futures::StreamExt;
use rstest::rstest;
use tower::ServiceExt;

use crate::{gen_router, AppState};

/// Serves fixtures: the blobs, DIRECTORY_COMPLICATED with its child, a tree
/// containing both, an action with its command and cached result, an action
/// without result, and an uncached result of the first action.
struct Fixture {
    router: Router,
    tree_digest: Digest,
    action_digest: Digest,
    action_without_result_digest: Digest,
    uncached_action_result_digest: Digest,
    command_digest: Digest,
}

fn command() -> Command {
    Command {
        arguments: vec!["cc".into(), "-o".into(), "bazel-out/foo".into()],
        environment_variables: vec![EnvironmentVariable {
            name: "PATH".into(),
            value: "/bin".into(),
        }],
        output_files: vec!["bazel-out/foo".into(), "bazel-out/foo.d".into()],
        output_directories: vec!["bazel-out/gen".into()],
        working_directory: "".into(),
    }
}

fn gen_action_result() -> ActionResult {
    ActionResult {
        exit_code: 3,
        stdout_raw: Bytes::from_static(b"building"),
        stderr_digest: Some(HELLOWORLD_BLOB_DIGEST.to_partial()),
        output_files: vec![OutputFile {
            path: "bazel-out/foo".into(),
            digest: Some(HELLOWORLD_BLOB_DIGEST.to_partial()),
            is_executable: true,
        }],
        ..Default::default()
    }
}

async fn gen_fixture() -> Fixture {
    let blob_service: Arc<dyn BlobService> = Arc::new(MemoryBlobService::default());
    for (digest, contents) in [
        (&*EMPTY_BLOB_DIGEST, Bytes::new()),
        (&*HELLOWORLD_BLOB_DIGEST, Bytes::from_static(HELLOWORLD_BLOB_CONTENTS)),
        (&*BLOB_B_DIGEST, BLOB_B.clone()),
    ] {
        blob_service
            .put(digest, contents)
            .await
            .expect("must upload");
    }

    for directory in [&*DIRECTORY_COMPLICATED, &*DIRECTORY_WITH_KEEP] {
        put_message(blob_service.as_ref(), "main", directory)
            .await
            .expect("must upload");
    }

    let tree = Tree::from_directories(DIRECTORY_COMPLICATED.clone(), [&*DIRECTORY_WITH_KEEP]);
    let tree_digest = put_message(blob_service.as_ref(), "main", &tree)
        .await
        .expect("must upload");

    let command_digest = put_message(blob_service.as_ref(), "main", &command())
        .await
        .expect("must upload");
    let action = Action {
        command_digest: Some(command_digest.to_partial()),
        input_root_digest: Some(directory_digest(&DIRECTORY_COMPLICATED).to_partial()),
        do_not_cache: false,
    };
    let action_digest = put_message(blob_service.as_ref(), "main", &action)
        .await
        .expect("must upload");
    let action_without_result_digest = put_message(
        blob_service.as_ref(),
        "main",
        &Action {
            do_not_cache: true,
            ..action
        },
    )
    .await
    .expect("must upload");

    let uncached_action_result_digest = put_message(
        blob_service.as_ref(),
        "main",
        &UncachedActionResult {
            action_digest: Some(action_digest.to_partial()),
            execute_response: Some(ExecuteResponse {
                result: Some(ActionResult {
                    exit_code: 1,
                    ..Default::default()
                }),
                cached_result: false,
                message: "compilation failed".into(),
            }),
        },
    )
    .await
    .expect("must upload");

    let action_cache: Arc<dyn ActionCache> = Arc::new(MemoryActionCache::default());
    action_cache
        .put(&action_digest, &gen_action_result())
        .await
        .expect("must put");

    let router =
        gen_router().with_state(AppState::new(blob_service, action_cache, 16 * 1024 * 1024));

    Fixture {
        router,
        tree_digest,
        action_digest,
        action_without_result_digest,
        uncached_action_result_digest,
        command_digest,
    }
}

fn digest_path(digest: &Digest) -> String {
    format!(
        "{}/{}/{}",
        digest.instance_name(),
        digest.hash(),
        digest.size_bytes()
    )
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("must read body");
    (status, headers, body)
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("must be json")
}

/// Reads a tarball back, returning paths and their contents.
async fn tarball_entries(body: Bytes) -> Vec<(String, Vec<u8>)> {
    let mut archive = tokio_tar::Archive::new(GzipDecoder::new(&body[..]));
    let mut entries = archive.entries().expect("must read entries");

    let mut out = Vec::new();
    while let Some(entry) = entries.next().await {
        let mut entry = entry.expect("must read entry");
        let path = entry
            .path()
            .expect("must have path")
            .to_string_lossy()
            .into_owned();
        let mut contents = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut entry, &mut contents)
            .await
            .expect("must read contents");
        out.push((path, contents));
    }
    out
}

#[tokio::test]
async fn root() {
    let fixture = gen_fixture().await;
    let (status, _, body) = get(&fixture.router, "/").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(&b"Hello from casbrowser"[..], &body[..]);
}

#[tokio::test]
async fn directory_listing() {
    let fixture = gen_fixture().await;
    let digest = directory_digest(&DIRECTORY_COMPLICATED);

    let (status, _, body) = get(
        &fixture.router,
        &format!("/directory/{}/", digest_path(&digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let listing = json(&body);
    assert_eq!("main", listing["instance_name"]);
    assert_eq!(digest.hash(), listing["digest"]["hash"]);
    assert!(listing.get("has_parent_directory").is_none());
    assert_eq!("keep", listing["directories"][0]["name"]);
    assert_eq!(".keep", listing["files"][0]["name"]);
    assert_eq!(false, listing["files"][0]["is_executable"]);
    assert_eq!("aa", listing["symlinks"][0]["name"]);
    assert_eq!("bazel-out/k8-fastbuild/bin/foo", listing["symlinks"][0]["target"]);
}

#[tokio::test]
async fn directory_tarball() {
    let fixture = gen_fixture().await;
    let digest = directory_digest(&DIRECTORY_COMPLICATED);

    let (status, headers, body) = get(
        &fixture.router,
        &format!("/directory/{}/?format=tar", digest_path(&digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!("application/gzip", headers[header::CONTENT_TYPE]);
    assert_eq!(
        format!("attachment; filename=\"{}.tar.gz\"", digest.hash()).as_str(),
        headers[header::CONTENT_DISPOSITION]
    );

    let paths: Vec<String> = tarball_entries(body)
        .await
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    // the empty .keep files are identical, so the second one is a hardlink.
    assert_eq!(vec!["keep", "keep/.keep", "aa", ".keep"], paths);
}

#[rstest]
#[case::directory("directory", "/")]
#[case::tree("tree", "/")]
#[case::file("file", "/foo.txt")]
#[case::action("action", "/")]
#[case::action_result("action_result", "/")]
#[case::command("command", "/")]
#[case::uncached_action_result("uncached_action_result", "/")]
#[tokio::test]
async fn not_found(#[case] kind: &str, #[case] suffix: &str) {
    let fixture = gen_fixture().await;
    let missing = sha256_digest(b"missing");

    let (status, _, _) = get(
        &fixture.router,
        &format!("/{}/{}{}", kind, digest_path(&missing), suffix),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status);
}

#[rstest]
#[case::not_hex("/directory/main/zz/12/")]
#[case::uppercase("/directory/main/E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855/0/")]
#[case::bad_length("/file/main/abcd/12/foo.txt")]
#[case::negative_size(
    "/tree/main/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855/-1/"
)]
#[tokio::test]
async fn bad_digest(#[case] uri: &str) {
    let fixture = gen_fixture().await;
    let (status, _, _) = get(&fixture.router, uri).await;
    assert_eq!(StatusCode::BAD_REQUEST, status);
}

#[rstest]
#[case::root("/", false, "keep")]
#[case::subdirectory("/keep", true, "")]
#[case::subdirectory_trailing_slash("/keep/", true, "")]
#[tokio::test]
async fn tree_listing(
    #[case] subdirectory: &str,
    #[case] exp_has_parent: bool,
    #[case] exp_first_directory: &str,
) {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!("/tree/{}{}", digest_path(&fixture.tree_digest), subdirectory),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let listing = json(&body);
    assert_eq!(exp_has_parent, listing["has_parent_directory"]);
    match exp_first_directory {
        "" => assert_eq!(0, listing["directories"].as_array().expect("array").len()),
        name => assert_eq!(name, listing["directories"][0]["name"]),
    }
}

#[tokio::test]
async fn tree_subdirectory_tarball() {
    let fixture = gen_fixture().await;

    let (status, headers, body) = get(
        &fixture.router,
        &format!("/tree/{}/keep?format=tar", digest_path(&fixture.tree_digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    // named after the subdirectory, not the tree.
    assert_eq!(
        format!(
            "attachment; filename=\"{}.tar.gz\"",
            directory_digest(&DIRECTORY_WITH_KEEP).hash()
        )
        .as_str(),
        headers[header::CONTENT_DISPOSITION]
    );
    assert_eq!(
        vec![(".keep".to_string(), vec![])],
        tarball_entries(body).await
    );
}

#[tokio::test]
async fn tree_subdirectory_not_found() {
    let fixture = gen_fixture().await;

    let (status, _, _) = get(
        &fixture.router,
        &format!("/tree/{}/void", digest_path(&fixture.tree_digest)),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status);
}

/// A tree lacking a directory its root refers to is rejected as bad input,
/// rather than reported as missing.
#[tokio::test]
async fn tree_inconsistent() {
    let blob_service: Arc<dyn BlobService> = Arc::new(MemoryBlobService::default());
    let tree = Tree::from_directories(DIRECTORY_COMPLICATED.clone(), []);
    let tree_digest = put_message(blob_service.as_ref(), "main", &tree)
        .await
        .expect("must upload");
    let router = gen_router().with_state(AppState::new(
        blob_service,
        Arc::new(MemoryActionCache::default()),
        1024,
    ));

    let (status, _, _) = get(
        &router,
        &format!("/tree/{}/keep", digest_path(&tree_digest)),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status);

    // the root itself is still fine.
    let (status, _, _) = get(&router, &format!("/tree/{}/", digest_path(&tree_digest))).await;
    assert_eq!(StatusCode::OK, status);
}

#[rstest]
#[case::text(&*HELLOWORLD_BLOB_DIGEST, "text/plain; charset=utf-8", HELLOWORLD_BLOB_CONTENTS)]
#[case::binary(&*BLOB_B_DIGEST, "application/octet-stream", &BLOB_B[..])]
#[tokio::test]
async fn file(#[case] digest: &Digest, #[case] exp_content_type: &str, #[case] exp_body: &[u8]) {
    let fixture = gen_fixture().await;

    let (status, headers, body) = get(
        &fixture.router,
        &format!("/file/{}/foo", digest_path(digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(exp_content_type, headers[header::CONTENT_TYPE]);
    assert_eq!(
        digest.size_bytes().to_string().as_str(),
        headers[header::CONTENT_LENGTH]
    );
    assert_eq!(exp_body, &body[..]);
}

#[tokio::test]
async fn action_result() {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!("/action_result/{}/", digest_path(&fixture.action_digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    assert_eq!(
        serde_json::json!({
            "instance_name": "main",
            "exit_code": 3,
            "stdout": {"name": "stdout", "status": "available", "text": "building"},
            "stderr": {
                "name": "stderr",
                "digest": HELLOWORLD_BLOB_DIGEST.key().to_string(),
                "status": "available",
                "text": "Hello World!",
            },
            "output_directories": [],
            "output_files": [{
                "path": "bazel-out/foo",
                "digest": {
                    "hash": HELLOWORLD_BLOB_DIGEST.hash(),
                    "size_bytes": HELLOWORLD_BLOB_DIGEST.size_bytes(),
                },
                "is_executable": true,
            }],
            "output_symlinks": [],
        }),
        json(&body)
    );
}

#[tokio::test]
async fn action() {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!("/action/{}/", digest_path(&fixture.action_digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let page = json(&body);
    assert_eq!("main", page["instance_name"]);
    assert_eq!(fixture.action_digest.hash(), page["action_digest"]["hash"]);
    assert_eq!(
        fixture.command_digest.hash(),
        page["action"]["command_digest"]["hash"]
    );
    assert_eq!(false, page["action"]["do_not_cache"]);
    assert_eq!("cc", page["command"]["arguments"][0]);
    assert_eq!(
        directory_digest(&DIRECTORY_COMPLICATED).hash(),
        page["input_root"]["digest"]["hash"]
    );
    assert_eq!("keep", page["input_root"]["directories"][0]["name"]);
    assert_eq!(3, page["result"]["exit_code"]);
    assert_eq!("building", page["result"]["stdout"]["text"]);
    assert!(page.get("message").is_none());
    assert_eq!(
        serde_json::json!({
            "directories": ["bazel-out/gen"],
            "files": ["bazel-out/foo.d"],
        }),
        page["missing_outputs"]
    );
}

/// Without a result, all declared outputs are missing.
#[tokio::test]
async fn action_without_result() {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!("/action/{}/", digest_path(&fixture.action_without_result_digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let page = json(&body);
    assert_eq!(true, page["action"]["do_not_cache"]);
    assert!(page["result"].is_null());
    assert_eq!(
        serde_json::json!({
            "directories": ["bazel-out/gen"],
            "files": ["bazel-out/foo", "bazel-out/foo.d"],
        }),
        page["missing_outputs"]
    );
}

/// A cached result is shown even if the action itself is gone from the CAS.
#[tokio::test]
async fn action_only_result() {
    let blob_service: Arc<dyn BlobService> = Arc::new(MemoryBlobService::default());
    let action_cache: Arc<dyn ActionCache> = Arc::new(MemoryActionCache::default());
    let action_digest = sha256_digest(b"gone");
    action_cache
        .put(&action_digest, &gen_action_result())
        .await
        .expect("must put");
    let router = gen_router().with_state(AppState::new(blob_service, action_cache, 1024));

    let (status, _, body) = get(&router, &format!("/action/{}/", digest_path(&action_digest))).await;
    assert_eq!(StatusCode::OK, status);

    let page = json(&body);
    assert!(page["action"].is_null());
    assert!(page["command"].is_null());
    assert!(page["input_root"].is_null());
    assert!(page.get("missing_outputs").is_none());
    assert_eq!(3, page["result"]["exit_code"]);
}

#[tokio::test]
async fn uncached_action_result() {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!(
            "/uncached_action_result/{}/",
            digest_path(&fixture.uncached_action_result_digest)
        ),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    let page = json(&body);
    // the page is about the action, not the uncached result.
    assert_eq!(fixture.action_digest.hash(), page["action_digest"]["hash"]);
    assert_eq!("compilation failed", page["message"]);
    assert_eq!(false, page["cached_result"]);
    assert_eq!(1, page["result"]["exit_code"]);
    assert!(page["result"]["stdout"].is_null());
    assert_eq!(
        serde_json::json!({
            "directories": ["bazel-out/gen"],
            "files": ["bazel-out/foo", "bazel-out/foo.d"],
        }),
        page["missing_outputs"]
    );
}

#[tokio::test]
async fn command_page() {
    let fixture = gen_fixture().await;

    let (status, _, body) = get(
        &fixture.router,
        &format!("/command/{}/", digest_path(&fixture.command_digest)),
    )
    .await;
    assert_eq!(StatusCode::OK, status);

    assert_eq!(
        serde_json::json!({
            "instance_name": "main",
            "arguments": ["cc", "-o", "bazel-out/foo"],
            "environment_variables": [{"name": "PATH", "value": "/bin"}],
            "working_directory": "",
            "output_directories": ["bazel-out/gen"],
            "output_files": ["bazel-out/foo", "bazel-out/foo.d"],
        }),
        json(&body)
    );
}

/// Once the tarball response has started, a missing blob can't change the
/// status code anymore. The body must end in an error instead of a
/// truncated archive.
#[tokio::test]
async fn directory_tarball_aborts() {
    let blob_service: Arc<dyn BlobService> = Arc::new(MemoryBlobService::default());
    blob_service
        .put(
            &HELLOWORLD_BLOB_DIGEST,
            Bytes::from_static(HELLOWORLD_BLOB_CONTENTS),
        )
        .await
        .expect("must upload");

    let directory = Directory {
        files: vec![
            FileNode {
                name: "a".into(),
                digest: Some(HELLOWORLD_BLOB_DIGEST.to_partial()),
                is_executable: false,
            },
            FileNode {
                name: "b".into(),
                digest: Some(sha256_digest(b"missing").to_partial()),
                is_executable: false,
            },
        ],
        ..Default::default()
    };
    let digest = put_message(blob_service.as_ref(), "main", &directory)
        .await
        .expect("must upload");
    let router = gen_router().with_state(AppState::new(
        blob_service,
        Arc::new(MemoryActionCache::default()),
        1024,
    ));

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/directory/{}/?format=tar", digest_path(&digest)))
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("infallible");
    assert_eq!(StatusCode::OK, response.status());

    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}
