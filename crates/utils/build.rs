use std::env;

/// Release tag injected by the image build.
const IMAGE_VERSION_ENV: &str = "VERSION";

fn main() {
    // Builds outside a git checkout (e.g. from a source tarball) still succeed,
    // the version just reports an unknown sha.
    if let Err(err) = emit_git_sha() {
        println!("cargo:warning=vergen: {err}");
    }

    let image_version = env::var(IMAGE_VERSION_ENV).unwrap_or_else(|_| "latest".to_string());
    println!("cargo:rustc-env=IMAGE_VERSION={image_version}");
    println!("cargo:rerun-if-env-changed={IMAGE_VERSION_ENV}");
}

fn emit_git_sha() -> anyhow::Result<()> {
    let git2 = vergen_git2::Git2Builder::default()
        .sha(true)
        .dirty(true)
        .build()?;

    vergen_git2::Emitter::default()
        .fail_on_error()
        .add_instructions(&git2)?
        .emit()
}
