use std::{
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=EASYHTTP_VERSION_OVERRIDE");

    if let Ok(version) = std::env::var("EASYHTTP_VERSION_OVERRIDE") {
        println!("cargo:rustc-env=EASYHTTP_VERSION={}", version);
        return;
    }

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            // "v1.0.0" -> "1.0.0"
            let version = git_output.strip_prefix('v').unwrap_or(&git_output);

            if version.ends_with("-dirty") || version.is_empty() {
                format!("{}-{}", version, timestamp())
            } else {
                version.to_string()
            }
        }
        // Building outside a git checkout (e.g. from a published tarball)
        _ => env_or_timestamp(),
    };

    println!("cargo:rustc-env=EASYHTTP_VERSION={}", version);
}

fn env_or_timestamp() -> String {
    match std::env::var("CARGO_PKG_VERSION") {
        Ok(v) if v != "0.0.0-dev" => v,
        _ => format!("0.0.0-unknown-{}", timestamp()),
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
