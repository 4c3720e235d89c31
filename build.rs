use std::env;
use std::process::Command;

/// Short commit of the checkout being built, if it is a git checkout
fn commit() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let hash = String::from_utf8(out.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    // `vaino --version` prints "<VAINO_VERSION> (<GIT_HASH>)"
    let version = env::var("VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| "0.0.0".into());

    println!("cargo:rustc-env=VAINO_VERSION={}", version);
    println!(
        "cargo:rustc-env=GIT_HASH={}",
        commit().unwrap_or_else(|| "unknown".into())
    );
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=VERSION");
}
