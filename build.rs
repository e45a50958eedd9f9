fn main() {
    // Release pipelines may override the version baked into --version
    // output; local builds use the crate version.
    let version = std::env::var("VERSION")
        .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
    println!("cargo:rustc-env=PROCWARDEN_VERSION={version}");
    println!("cargo:rerun-if-env-changed=VERSION");
}
