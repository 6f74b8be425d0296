//! `backroom-mcp init`: register this binary with MCP clients for the current project.

use std::error::Error;
use std::path::Path;

use serde_json::{json, Value};

const SERVER_NAME: &str = "backroom";

/// Write project-scoped client config in the current directory. Only clients
/// found on `PATH` are configured; existing entries for other servers are kept.
pub fn init_project() -> Result<(), Box<dyn Error>> {
    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();
    let cwd = std::env::current_dir()?;

    let has_claude = on_path("claude");
    let has_codex = on_path("codex");
    if !has_claude && !has_codex {
        eprintln!("Neither `claude` nor `codex` found in PATH.");
        eprintln!("Install an MCP client first, then re-run `backroom-mcp init`.");
        std::process::exit(1);
    }

    if has_claude {
        let path = write_mcp_json(&cwd, &binary_path)?;
        eprintln!("Wrote {}", path.display());
    }
    if has_codex {
        let path = write_codex_config(&cwd, &binary_path)?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn on_path(name: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| {
            dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
        })
    })
}

/// Merge a stdio server entry into `.mcp.json`.
fn write_mcp_json(dir: &Path, binary_path: &str) -> Result<std::path::PathBuf, Box<dyn Error>> {
    let path = dir.join(".mcp.json");
    let mut root: Value = if path.exists() {
        serde_json::from_str(&std::fs::read_to_string(&path)?).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };
    if !root.is_object() {
        root = json!({});
    }

    if !root.get("mcpServers").is_some_and(Value::is_object) {
        root["mcpServers"] = json!({});
    }
    root["mcpServers"][SERVER_NAME] = json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    Ok(path)
}

/// Merge an `[mcp_servers.backroom]` table into `.codex/config.toml`,
/// preserving the rest of the document.
fn write_codex_config(
    dir: &Path,
    binary_path: &str,
) -> Result<std::path::PathBuf, Box<dyn Error>> {
    let codex_dir = dir.join(".codex");
    let path = codex_dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = if path.exists() {
        std::fs::read_to_string(&path)?.parse().unwrap_or_default()
    } else {
        toml_edit::DocumentMut::new()
    };

    if !doc.contains_table("mcp_servers") {
        let mut servers = toml_edit::Table::new();
        servers.set_implicit(true);
        doc["mcp_servers"] = toml_edit::Item::Table(servers);
    }

    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    doc["mcp_servers"][SERVER_NAME] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&codex_dir)?;
    std::fs::write(&path, doc.to_string())?;
    Ok(path)
}
