use std::process::Command;

fn main() {
    emit("BUILD_DATE", &chrono::Utc::now().to_rfc3339());
    emit("BUILD_COMMIT", &git(&["rev-parse", "--short", "HEAD"]));

    println!("cargo:rerun-if-changed=../.git/HEAD");
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={key}={value}");
}

// Best-effort: builds from a source archive have no git repository.
fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
