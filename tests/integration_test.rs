use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use tempfile::tempdir;

const INDEX_JSON: &str = r#"{
    "http": {
        "name": "http",
        "version": "2.1.0",
        "description": "HTTP client for INIT",
        "dependencies": ["json"]
    },
    "json": {
        "name": "json",
        "version": "1.0.3",
        "description": "JSON parsing"
    }
}"#;

fn initpkg(root: &std::path::Path, repository: &str) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("initpkg"));
    cmd.arg("--root").arg(root).arg("--repository").arg(repository);
    cmd
}

/// A URL nothing listens on, for exercising the offline paths.
const DEAD_REPOSITORY: &str = "http://127.0.0.1:1";

fn mock_package(server: &mut Server, name: &str, content: &str) -> (mockito::Mock, mockito::Mock) {
    let main = server
        .mock("GET", format!("/packages/{}/main.init", name).as_str())
        .with_status(200)
        .with_body(content)
        .create();
    let meta = server
        .mock("GET", format!("/packages/{}/package.json", name).as_str())
        .with_status(404)
        .create();
    (main, meta)
}

#[test]
fn test_end_to_end_install_with_dependencies() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(INDEX_JSON)
        .create();
    let _http = mock_package(&mut server, "http", "init.log(\"http loaded\")");
    let _json = mock_package(&mut server, "json", "init.log(\"json loaded\")");

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url).arg("install").arg("http").assert().success();

    // The package and its dependency are both on disk.
    assert!(root.join("packages/http/main.init").exists());
    assert!(root.join("packages/http/package.json").exists());
    assert!(root.join("packages/json/main.init").exists());

    // Both are recorded in the state file.
    let state = std::fs::read_to_string(root.join("packages.json")).unwrap();
    assert!(state.contains("\"http\""));
    assert!(state.contains("\"json\""));
    assert!(state.contains("2.1.0"));

    // And the index landed in the cache.
    assert!(root.join("cache/index.json").exists());

    initpkg(root, &url)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("http v2.1.0"))
        .stdout(predicates::str::contains("json v1.0.3"));
}

#[test]
fn test_reinstall_is_idempotent() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(INDEX_JSON)
        .create();
    let _json = mock_package(&mut server, "json", "init.log(\"json loaded\")");

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url).arg("install").arg("json").assert().success();
    let state_before = std::fs::read_to_string(root.join("packages.json")).unwrap();

    initpkg(root, &url)
        .arg("install")
        .arg("json")
        .assert()
        .success()
        .stdout(predicates::str::contains("already installed"));

    let state_after = std::fs::read_to_string(root.join("packages.json")).unwrap();
    assert_eq!(state_before, state_after);
}

#[test]
fn test_install_failure_is_isolated() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(
            r#"{
                "broken": {"name": "broken", "version": "1.0.0"},
                "json": {"name": "json", "version": "1.0.3"}
            }"#,
        )
        .create();
    let _broken = server
        .mock("GET", "/packages/broken/main.init")
        .with_status(404)
        .create();
    let _json = mock_package(&mut server, "json", "init.log(\"json loaded\")");

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url)
        .arg("install")
        .arg("broken")
        .arg("json")
        .assert()
        .success()
        .stdout(predicates::str::contains("Failed to install 'broken'"));

    // The failed package left nothing behind; the sibling installed fine.
    assert!(!root.join("packages/broken").exists());
    assert!(root.join("packages/json/main.init").exists());

    let state = std::fs::read_to_string(root.join("packages.json")).unwrap();
    assert!(!state.contains("broken"));
    assert!(state.contains("\"json\""));
}

#[test]
fn test_install_unknown_package_lists_available() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(INDEX_JSON)
        .create();

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url)
        .arg("install")
        .arg("ghost")
        .assert()
        .success()
        .stdout(predicates::str::contains("'ghost' not found"))
        .stdout(predicates::str::contains("Available packages: http, json"));

    assert!(!root.join("packages/ghost").exists());
}

#[test]
fn test_uninstall_removes_entry_and_directory() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(INDEX_JSON)
        .create();
    let _json = mock_package(&mut server, "json", "init.log(\"json loaded\")");

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url).arg("install").arg("json").assert().success();
    assert!(root.join("packages/json").exists());

    initpkg(root, &url).arg("uninstall").arg("json").assert().success();

    assert!(!root.join("packages/json").exists());
    let state = std::fs::read_to_string(root.join("packages.json")).unwrap();
    assert!(!state.contains("\"json\""));

    // Uninstalling again is a reported no-op, not an error.
    initpkg(root, &url)
        .arg("uninstall")
        .arg("json")
        .assert()
        .success()
        .stdout(predicates::str::contains("not installed"));
}

#[test]
fn test_available_falls_back_to_cached_index() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(INDEX_JSON)
        .create();

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    // First run populates the cache.
    initpkg(root, &url)
        .arg("available")
        .assert()
        .success()
        .stdout(predicates::str::contains("http v2.1.0"));

    // Repository unreachable: the cached copy still answers.
    initpkg(root, DEAD_REPOSITORY)
        .arg("available")
        .assert()
        .success()
        .stdout(predicates::str::contains("http v2.1.0"))
        .stdout(predicates::str::contains("json v1.0.3"));
}

#[test]
fn test_available_without_cache_reports_unreachable() {
    let root_dir = tempdir().unwrap();

    initpkg(root_dir.path(), DEAD_REPOSITORY)
        .arg("available")
        .assert()
        .success()
        .stdout(predicates::str::contains("No packages available"));
}

#[test]
fn test_search_and_info() {
    let mut server = Server::new();
    let url = server.url();

    let _index = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(INDEX_JSON)
        .expect_at_least(2)
        .create();

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url)
        .arg("search")
        .arg("parsing")
        .assert()
        .success()
        .stdout(predicates::str::contains("json v1.0.3"));

    initpkg(root, &url)
        .arg("info")
        .arg("http")
        .assert()
        .success()
        .stdout(predicates::str::contains("http v2.1.0"))
        .stdout(predicates::str::contains("dependencies: json"))
        .stdout(predicates::str::contains("installed: no"));
}

#[test]
fn test_install_local_and_create() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    let work_dir = tempdir().unwrap();

    // Scaffold a package, then install it from its directory.
    initpkg(root, DEAD_REPOSITORY)
        .arg("create")
        .arg("demo")
        .assert()
        .success()
        .stdout(predicates::str::contains("Package 'demo' created"));

    let scaffold = root.join("packages/demo");
    assert!(scaffold.join("main.init").exists());
    assert!(scaffold.join("package.json").exists());

    let local_pkg = work_dir.path().join("mathlib");
    std::fs::create_dir_all(&local_pkg).unwrap();
    std::fs::write(local_pkg.join("main.init"), "init.log(\"mathlib\")").unwrap();

    initpkg(root, DEAD_REPOSITORY)
        .arg("install-local")
        .arg(&local_pkg)
        .assert()
        .success();

    assert!(root.join("packages/mathlib/main.init").exists());
    let state = std::fs::read_to_string(root.join("packages.json")).unwrap();
    assert!(state.contains("\"mathlib\""));
    assert!(state.contains("\"local\""));

    initpkg(root, DEAD_REPOSITORY)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("mathlib v1.0.0 (local)"));
}

#[test]
fn test_update_reports_newer_versions() {
    let mut server = Server::new();
    let url = server.url();

    let _index_v1 = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(r#"{"json": {"name": "json", "version": "1.0.3"}}"#)
        .expect(1)
        .create();
    let _json = mock_package(&mut server, "json", "init.log(\"json loaded\")");

    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    initpkg(root, &url).arg("install").arg("json").assert().success();

    // The repository now advertises a newer version.
    let _index_v2 = server
        .mock("GET", "/index.json")
        .with_status(200)
        .with_body(r#"{"json": {"name": "json", "version": "2.0.0"}}"#)
        .create();

    initpkg(root, &url)
        .arg("update")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "json: v1.0.3 installed, v2.0.0 available",
        ));
}

#[test]
fn test_corrupt_state_file_recovers_to_defaults() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join("packages.json"), "{ not json").unwrap();

    initpkg(root, DEAD_REPOSITORY)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("No packages installed"));
}
