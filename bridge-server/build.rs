use std::process::Command;

/// Embed `BUILD_INFO` (`<version>+build.<commits>.<hash>[-dirty]`) for the startup banner.
/// CI sets `PACKAGE_VERSION` to skip the git lookup.
fn main() {
    println!("cargo:rerun-if-env-changed=PACKAGE_VERSION");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs/heads");

    let build_info = match std::env::var("PACKAGE_VERSION") {
        Ok(version) => format!("{}+ci", version),
        Err(_) => from_git(),
    };
    println!("cargo:rustc-env=BUILD_INFO={}", build_info);
}

fn from_git() -> String {
    let version = git(&["describe", "--tags", "--abbrev=0", "--match", "v[0-9]*"])
        .map(|tag| tag.trim_start_matches('v').to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    let commits = git(&["rev-list", "--count", "HEAD"]).unwrap_or_else(|| "0".to_string());
    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = Command::new("git")
        .args(["diff", "--quiet"])
        .status()
        .map(|status| !status.success())
        .unwrap_or(false);

    format!(
        "{}+build.{}.{}{}",
        version,
        commits,
        hash,
        if dirty { "-dirty" } else { "" }
    )
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
