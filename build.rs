use chrono::Utc;
use std::path::Path;

fn git_short_hash() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_owned())
}

fn main() {
    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let built_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let commit = git_short_hash().unwrap_or_else(|| "unknown".to_owned());

    let generated = format!(
        "pub const BUILD_TIME: &str = \"{built_at}\";\npub const GIT_HASH: &str = \"{commit}\";\n"
    );
    std::fs::write(Path::new(&out_dir).join("version.rs"), generated)
        .expect("write version.rs");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
