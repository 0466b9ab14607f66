//! End-to-end tests over a real Unix socket: load, query, modify, save,
//! and the corruption gate.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use sylva_core::{RpcRequest, RpcResponse};
use sylva_server::gateway::Gateway;
use sylva_server::{ServerConfig, ServerContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

struct TestServer {
    ctx: Arc<ServerContext>,
    socket_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn start_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("project");
    std::fs::create_dir_all(&root).unwrap();

    let config = ServerConfig {
        root_dir: root,
        db_path: dir.path().join("store.db"),
        socket_dir: dir.path().join("sockets"),
        backup_dir: dir.path().join("backups"),
        ..Default::default()
    };
    std::fs::create_dir_all(&config.socket_dir).unwrap();
    let socket_path = config.socket_path();

    let ctx = ServerContext::bootstrap(config).unwrap();
    let listener = UnixListener::bind(&socket_path).unwrap();
    let gateway = Gateway::new(Arc::clone(&ctx));
    tokio::spawn(gateway.run(listener));

    TestServer {
        ctx,
        socket_path,
        _dir: dir,
    }
}

async fn call(stream: &mut UnixStream, method: &str, params: Value) -> RpcResponse {
    let request = RpcRequest::new(method, params, Some(uuid::Uuid::new_v4().to_string()));
    let payload = serde_json::to_vec(&request).unwrap();
    stream
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&payload).await.unwrap();

    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await.unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    serde_json::from_slice(&payload).unwrap()
}

fn write_sample(root: &Path) -> std::path::PathBuf {
    let src_dir = root.join("src");
    std::fs::create_dir_all(&src_dir).unwrap();
    let file = src_dir.join("a.py");
    std::fs::write(&file, "class A:\n    def f(self):\n        return 1\n").unwrap();
    file
}

#[tokio::test]
async fn load_query_modify_save_over_the_socket() {
    let server = start_server();
    let root = server.ctx.config.root_dir.clone();
    let file = write_sample(&root);
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    // Load.
    let response = call(
        &mut stream,
        "cst_load_tree",
        json!({"file_path": "src/a.py"}),
    )
    .await;
    assert!(response.is_success(), "{:?}", response.error);
    let data = &response.result.unwrap()["data"];
    let tree_id = data["tree_id"].as_str().unwrap().to_string();
    assert_eq!(data["root"]["type"], "Module");

    // Scenario: selector query finds the return statement with its scope.
    let response = call(
        &mut stream,
        "cst_find_node",
        json!({
            "tree_id": tree_id,
            "query": "class[name=\"A\"] smallstmt[type=\"Return\"]:first",
        }),
    )
    .await;
    let data = &response.result.unwrap()["data"];
    assert_eq!(data["count"], 1);
    let node = &data["nodes"][0];
    assert_eq!(node["type"], "Return");
    assert_eq!(node["start_line"], 3);
    assert_eq!(node["end_line"], 3);
    assert_eq!(node["qualname"], "A.f");

    // Find the method and replace its body.
    let response = call(
        &mut stream,
        "cst_find_node",
        json!({
            "tree_id": tree_id,
            "search_type": "simple",
            "node_type": "FunctionDef",
            "name": "f",
        }),
    )
    .await;
    let node_id = response.result.unwrap()["data"]["nodes"][0]["node_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = call(
        &mut stream,
        "cst_modify_tree",
        json!({
            "tree_id": tree_id,
            "operations": [{
                "action": "replace",
                "node_id": node_id,
                "code": "def f(self):\n    return 2\n",
            }],
        }),
    )
    .await;
    assert!(response.is_success(), "{:?}", response.error);

    // Save and re-read from disk.
    let response = call(
        &mut stream,
        "cst_save_tree",
        json!({
            "tree_id": tree_id,
            "project_id": "proj-1",
            "file_path": "src/a.py",
        }),
    )
    .await;
    assert!(response.is_success(), "{:?}", response.error);
    let data = &response.result.unwrap()["data"];
    assert!(data["backup_id"].is_string());

    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "class A:\n    def f(self):\n        return 2\n"
    );

    // Remove the tree; a second remove reports false.
    let response = call(&mut stream, "cst_remove_tree", json!({"tree_id": tree_id})).await;
    assert_eq!(response.result.unwrap()["data"]["removed"], true);
    let response = call(&mut stream, "cst_remove_tree", json!({"tree_id": tree_id})).await;
    assert_eq!(response.result.unwrap()["data"]["removed"], false);
}

#[tokio::test]
async fn atomic_rollback_leaves_file_and_tree_unchanged() {
    let server = start_server();
    let root = server.ctx.config.root_dir.clone();
    let file = write_sample(&root);
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    let response = call(
        &mut stream,
        "cst_load_tree",
        json!({"file_path": "src/a.py"}),
    )
    .await;
    let data = &response.result.unwrap()["data"];
    let tree_id = data["tree_id"].as_str().unwrap().to_string();

    let response = call(
        &mut stream,
        "cst_find_node",
        json!({
            "tree_id": tree_id,
            "search_type": "simple",
            "node_type": "FunctionDef",
        }),
    )
    .await;
    let node_id = response.result.unwrap()["data"]["nodes"][0]["node_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = call(
        &mut stream,
        "cst_modify_tree",
        json!({
            "tree_id": tree_id,
            "operations": [
                {"action": "replace", "node_id": node_id,
                 "code": "def f(self):\n    return 2\n"},
                {"action": "replace", "node_id": "bogus:id", "code": "x"},
            ],
        }),
    )
    .await;
    let error = response.error.expect("batch must fail");
    assert_eq!(error.code, sylva_core::ErrorCode::NotFound);
    let details = error.data.unwrap();
    assert!(details["available_nodes"].as_array().is_some());

    // Disk and memory are untouched.
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "class A:\n    def f(self):\n        return 1\n"
    );
    let response = call(
        &mut stream,
        "cst_get_node_info",
        json!({"tree_id": tree_id, "node_id": node_id, "include_code": true}),
    )
    .await;
    let node = &response.result.unwrap()["data"]["node"];
    assert!(node["code"].as_str().unwrap().contains("return 1"));
}

#[tokio::test]
async fn corruption_marker_freezes_everything_but_the_allow_list() {
    let server = start_server();
    write_sample(&server.ctx.config.root_dir);
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    // Freeze the store.
    let _ = server.ctx.gate.freeze("simulated corruption");

    // A store-touching call fails with the database error code and the
    // marker path in its details.
    let response = call(
        &mut stream,
        "db_list",
        json!({"entity": "files"}),
    )
    .await;
    let error = response.error.expect("frozen store must refuse");
    assert_eq!(error.code, sylva_core::ErrorCode::DatabaseError);
    let details = error.data.unwrap();
    assert!(details["marker_path"].as_str().unwrap().ends_with(".corrupt.json"));
    assert!(details["allowed_commands"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "backup_restore"));

    // Tree operations are frozen too.
    let response = call(
        &mut stream,
        "cst_load_tree",
        json!({"file_path": "src/a.py"}),
    )
    .await;
    assert_eq!(
        response.error.unwrap().code,
        sylva_core::ErrorCode::DatabaseError
    );

    // The allow-list still answers.
    let response = call(&mut stream, "get_corruption_status", json!({})).await;
    let data = &response.result.unwrap()["data"];
    assert_eq!(data["corrupted"], true);
    assert_eq!(data["message"], "simulated corruption");

    let response = call(&mut stream, "get_status", json!({})).await;
    let data = &response.result.unwrap()["data"];
    assert_eq!(data["corrupted"], true);
    assert!(data["store"].is_null(), "no store I/O while frozen");
}

#[tokio::test]
async fn save_refuses_a_mismatched_projectid_marker() {
    let server = start_server();
    let root = server.ctx.config.root_dir.clone();
    write_sample(&root);
    std::fs::write(root.join("projectid"), "pinned-project\n").unwrap();
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    let response = call(
        &mut stream,
        "cst_load_tree",
        json!({"file_path": "src/a.py"}),
    )
    .await;
    let tree_id = response.result.unwrap()["data"]["tree_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = call(
        &mut stream,
        "cst_save_tree",
        json!({
            "tree_id": tree_id,
            "project_id": "someone-else",
            "file_path": "src/a.py",
        }),
    )
    .await;
    assert_eq!(
        response.error.unwrap().code,
        sylva_core::ErrorCode::PermissionDenied
    );

    let response = call(
        &mut stream,
        "cst_save_tree",
        json!({
            "tree_id": tree_id,
            "project_id": "pinned-project",
            "file_path": "src/a.py",
        }),
    )
    .await;
    assert!(response.is_success(), "{:?}", response.error);
}

#[tokio::test]
async fn malformed_and_unknown_requests_fail_cleanly() {
    let server = start_server();
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    // Unknown method.
    let response = call(&mut stream, "make_coffee", json!({})).await;
    assert_eq!(
        response.error.unwrap().code,
        sylva_core::ErrorCode::InvalidRequest
    );

    // Malformed JSON payload.
    let garbage = b"{not json";
    stream
        .write_all(&(garbage.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(garbage).await.unwrap();
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await.unwrap();
    let mut payload = vec![0u8; u32::from_be_bytes(len_bytes) as usize];
    stream.read_exact(&mut payload).await.unwrap();
    let response: RpcResponse = serde_json::from_slice(&payload).unwrap();
    assert_eq!(
        response.error.unwrap().code,
        sylva_core::ErrorCode::InvalidRequest
    );
}

#[tokio::test]
async fn responses_preserve_request_order_per_connection() {
    let server = start_server();
    write_sample(&server.ctx.config.root_dir);
    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();

    for i in 0..5 {
        let request = RpcRequest::new("get_status", json!({}), Some(format!("req-{i}")));
        let payload = serde_json::to_vec(&request).unwrap();
        stream
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&payload).await.unwrap();
    }
    for i in 0..5 {
        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes).await.unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(len_bytes) as usize];
        stream.read_exact(&mut payload).await.unwrap();
        let response: RpcResponse = serde_json::from_slice(&payload).unwrap();
        assert_eq!(response.id.as_deref(), Some(format!("req-{i}").as_str()));
    }
}
