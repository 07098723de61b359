//! Linker flags keeping JNI entry points alive in `libwebrtc.a`.
//!
//! Functions the Java side calls back into are unreferenced from native
//! code, so the linker would strip them. Each one is listed as
//! `-Wl,--undefined=<symbol>` in `<install>/webrtc.ldflags`.

use std::path::PathBuf;

use crate::context::Context;
use crate::error::DepsError;
use crate::steps::android::ndk_readelf;

const JNI_PREFIX: &str = "Java_org_webrtc_";

/// Output file consumed by the SDK's Android build.
pub fn ldflags_path(ctx: &Context) -> PathBuf {
    ctx.layout.install_dir().join("webrtc.ldflags")
}

/// Flags for every JNI symbol in `readelf -Ws` output.
///
/// Symbol rows look like
/// `174: 0000000000000000    44 FUNC    GLOBAL DEFAULT    15 Java_org_webrtc_DataChannel_nativeClose`;
/// rows too short to carry a name are skipped.
pub fn undefined_symbol_flags(readelf_output: &str) -> Vec<String> {
    readelf_output
        .lines()
        .filter(|line| line.contains(JNI_PREFIX))
        .filter_map(|line| line.split_whitespace().nth(7))
        .map(|symbol| format!("-Wl,--undefined={symbol}"))
        .collect()
}

/// # Errors
///
/// Propagates `llvm-readelf` and write failures.
pub fn generate(ctx: &Context) -> Result<(), DepsError> {
    let readelf = ndk_readelf(ctx.layout.install_dir());
    let library = ctx
        .webrtc_info()
        .library_dir
        .join("arm64-v8a")
        .join("libwebrtc.a");
    let output = ctx
        .env
        .command(readelf.to_string_lossy())
        .arg("-Ws")
        .arg(&library)
        .capture()?;

    let flags = undefined_symbol_flags(&output);
    tracing::info!("Keeping {} JNI symbols", flags.len());
    std::fs::write(ldflags_path(ctx), flags.join("\n"))?;
    Ok(())
}
