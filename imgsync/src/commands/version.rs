/// Get the version string for imgsync and libimgsync
pub fn get_version_string() -> String {
    format!(
        "imgsync {}\nlibimgsync {}",
        env!("CARGO_PKG_VERSION"),
        libimgsync::version()
    )
}

/// Print version information to stdout
pub fn print_version() {
    println!("{}", get_version_string());
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
