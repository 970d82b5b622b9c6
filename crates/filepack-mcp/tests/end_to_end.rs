#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use filepack_mcp::packager::LibPackager;
use filepack_mcp::server::McpServer;
use serde_json::json;
use tempfile::tempdir;

fn server() -> McpServer<LibPackager> {
    McpServer::new(LibPackager::new())
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

#[test]
fn compress_then_decompress_is_lossless_for_every_algorithm() {
    let temp = tempdir().expect("temp dir");
    let payload = b"line of text that compresses well\n".repeat(32);
    let server = server();

    for algorithm in ["gzip", "brotli", "deflate"] {
        let src = temp.path().join(format!("input-{algorithm}.txt"));
        fs::write(&src, &payload).expect("write source");
        let compressed = temp.path().join(format!("input-{algorithm}.bin"));
        let restored = temp.path().join(format!("restored-{algorithm}.txt"));

        let response = server
            .dispatch_tool(
                "compress",
                json!({
                    "source": src,
                    "output": compressed,
                    "algorithm": algorithm,
                    "level": 6,
                }),
            )
            .expect("known tool");
        assert!(!response.is_error, "{}", response.text);

        let response = server
            .dispatch_tool(
                "decompress",
                json!({
                    "source": compressed,
                    "output": restored,
                    "algorithm": algorithm,
                }),
            )
            .expect("known tool");
        assert!(!response.is_error, "{}", response.text);

        assert_eq!(fs::read(&restored).expect("read restored"), payload);
    }
}

#[test]
fn compress_with_archive_flag_matches_two_step_run() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("site");
    write_file(&src.join("index.html"), b"<html></html>");
    write_file(&src.join("assets/app.js"), b"console.log(1);");

    let server = server();

    // One step: compress with archive=true.
    let combined = temp.path().join("combined.gz");
    let response = server
        .dispatch_tool(
            "compress",
            json!({ "source": src, "output": combined, "archive": true }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);
    assert!(
        !temp.path().join("combined.gz.archive.tmp").exists(),
        "staged archive must not survive"
    );

    // Two steps: archive, then compress the archive.
    let archive = temp.path().join("site.tar");
    let response = server
        .dispatch_tool("archive", json!({ "source": src, "output": archive }))
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    let two_step = temp.path().join("two-step.gz");
    let response = server
        .dispatch_tool(
            "compress",
            json!({ "source": archive, "output": two_step }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    assert_eq!(
        fs::read(&combined).expect("read combined"),
        fs::read(&two_step).expect("read two-step"),
        "archive-first compress must equal archive then compress"
    );
}

#[test]
fn decompress_unarchive_falls_back_for_plain_payload() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("notes.txt");
    fs::write(&src, b"plain text, not a tar archive").expect("write source");

    let server = server();

    let compressed = temp.path().join("notes.txt.gz");
    let response = server
        .dispatch_tool(
            "compress",
            json!({ "source": src, "output": compressed }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    let output = temp.path().join("out/notes.txt");
    let response = server
        .dispatch_tool(
            "decompress",
            json!({ "source": compressed, "output": output, "unarchive": true }),
        )
        .expect("known tool");

    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.starts_with("Warning:"), "{}", response.text);
    assert_eq!(
        fs::read(&output).expect("read output"),
        b"plain text, not a tar archive"
    );
    assert!(!temp.path().join("out/notes.txt.decompressed.tmp").exists());
}

#[test]
fn decompress_unarchive_extracts_real_archives() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("tree");
    write_file(&src.join("a.txt"), b"alpha");
    write_file(&src.join("nested/b.txt"), b"beta");

    let server = server();

    let compressed = temp.path().join("tree.tar.gz");
    let response = server
        .dispatch_tool(
            "compress",
            json!({ "source": src, "output": compressed, "archive": true }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    let output = temp.path().join("restored");
    let response = server
        .dispatch_tool(
            "decompress",
            json!({ "source": compressed, "output": output, "unarchive": true }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    assert_eq!(fs::read(output.join("a.txt")).expect("read a"), b"alpha");
    assert_eq!(
        fs::read(output.join("nested/b.txt")).expect("read b"),
        b"beta"
    );
    assert!(!temp.path().join("restored.decompressed.tmp").exists());
}

#[test]
fn package_sign_verify_flow() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("project");
    write_file(&src.join("README.md"), b"# project\n");
    write_file(&src.join("src/lib.rs"), b"pub fn f() {}\n");

    let server = server();

    let private_key = temp.path().join("signing.pem");
    let public_key = temp.path().join("signing.pub.pem");
    let response = server
        .dispatch_tool(
            "generate-keys",
            json!({ "privateKeyPath": private_key, "publicKeyPath": public_key }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    let package = temp.path().join("project.gz");
    let response = server
        .dispatch_tool(
            "package",
            json!({ "source": src, "output": package, "privkey": private_key }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.contains("signature:"), "{}", response.text);
    assert!(response.text.contains("Removed intermediate archive"));
    assert!(
        !temp.path().join("project.gz.tar").exists(),
        "intermediate archive must be removed"
    );

    let signature = temp.path().join("project.gz.sig");
    let response = server
        .dispatch_tool(
            "verify",
            json!({ "file": package, "signature": signature, "pubkey": public_key }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.contains("valid"));

    // Corrupt the package; verification now fails without erroring out.
    fs::write(&package, b"corrupted").expect("corrupt package");
    let response = server
        .dispatch_tool(
            "verify",
            json!({ "file": package, "signature": signature, "pubkey": public_key }),
        )
        .expect("known tool");
    assert!(response.is_error);
    assert!(response.text.contains("invalid"), "{}", response.text);
}

#[test]
fn unsigned_package_omits_signature_line() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("project");
    write_file(&src.join("main.rs"), b"fn main() {}\n");

    let response = server()
        .dispatch_tool(
            "package",
            json!({ "source": src, "output": temp.path().join("project.gz") }),
        )
        .expect("known tool");

    assert!(!response.is_error, "{}", response.text);
    assert!(!response.text.contains("signature:"), "{}", response.text);
    assert!(!temp.path().join("project.gz.sig").exists());
}

#[test]
fn archive_then_unarchive_via_tools() {
    let temp = tempdir().expect("temp dir");
    let src = temp.path().join("docs");
    write_file(&src.join("guide.md"), b"# guide");
    write_file(&src.join("draft.tmp.md"), b"draft");

    let server = server();

    let archive = temp.path().join("docs.tar");
    let response = server
        .dispatch_tool(
            "archive",
            json!({ "source": src, "output": archive, "exclude": "*.tmp.md" }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    let out = temp.path().join("unpacked");
    let response = server
        .dispatch_tool(
            "unarchive",
            json!({ "archiveFile": archive, "outputDirectory": out }),
        )
        .expect("known tool");
    assert!(!response.is_error, "{}", response.text);

    assert_eq!(fs::read(out.join("guide.md")).expect("read"), b"# guide");
    assert!(!out.join("draft.tmp.md").exists());
}

#[test]
fn guaranteed_failures_return_messages_and_leave_no_temps() {
    let temp = tempdir().expect("temp dir");
    let server = server();
    let missing = temp.path().join("does-not-exist");

    let failing_calls = [
        ("archive", json!({ "source": missing, "output": temp.path().join("a.tar") })),
        (
            "compress",
            json!({ "source": missing, "output": temp.path().join("b.gz"), "archive": true }),
        ),
        (
            "decompress",
            json!({ "source": missing, "output": temp.path().join("c.txt"), "unarchive": true }),
        ),
        (
            "sign",
            json!({ "source": missing, "output": temp.path().join("d.sig"), "privkey": missing }),
        ),
        (
            "package",
            json!({ "source": missing, "output": temp.path().join("e.gz") }),
        ),
        (
            "unarchive",
            json!({ "archiveFile": missing, "outputDirectory": temp.path().join("f") }),
        ),
    ];

    for (name, arguments) in failing_calls {
        let response = server.dispatch_tool(name, arguments).expect("known tool");
        assert!(response.is_error, "{name} should fail");
        assert!(!response.text.trim().is_empty(), "{name} needs a message");
    }

    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .expect("read temp dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp") || name.ends_with(".tar"))
        .collect();
    assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
}
