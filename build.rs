use std::process::Command;

/// Run a command and return its trimmed stdout, or "unknown" when it fails.
fn command_output(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let commit = command_output("git", &["rev-parse", "--short", "HEAD"]);
    let date = command_output("date", &["-u", "+%Y-%m-%d"]);

    println!("cargo:rustc-env=COU_BUILD_COMMIT={commit}");
    println!("cargo:rustc-env=COU_BUILD_DATE={date}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
