use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=GIT_VERSION");
    println!("cargo:rerun-if-changed=migrations");

    println!("cargo:rustc-env=GIT_VERSION={}", git_version());
}

/// Version string baked into `/health`.
///
/// CI images pass `GIT_VERSION` explicitly since `.git` is not copied into the
/// build context; local builds ask git; anything else reports "dev".
fn git_version() -> String {
    match std::env::var("GIT_VERSION") {
        Ok(version) if !version.is_empty() && version != "dev" => return version,
        _ => {}
    }

    Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "dev".to_string())
}
