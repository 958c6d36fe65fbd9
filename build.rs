use time::macros::format_description;
use time::OffsetDateTime;

fn main() {
    // Re-run build script when this file changes
    println!("cargo:rerun-if-changed=build.rs");

    let date_fmt = format_description!("[year]-[month]-[day]");
    let build_date = OffsetDateTime::now_utc()
        .format(&date_fmt)
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=FORGESHIFT_BUILD_DATE={build_date}");

    // Target triple and profile
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=FORGESHIFT_BUILD_TARGET={target}");

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=FORGESHIFT_BUILD_PROFILE={profile}");

    let rustc_ver = rustc_version::version_meta()
        .map(|m| format!("rustc {} ({:?})", m.semver, m.channel).to_lowercase())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=FORGESHIFT_BUILD_RUSTC={rustc_ver}");
}
