/// Build metadata reported by `get_version_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub package: &'static str,
    pub version: &'static str,
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        package: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }
}
