use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    MacOS,
    Windows,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Os::Linux,
            "macos" => Os::MacOS,
            "windows" => Os::Windows,
            _ => Os::Other,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::MacOS => write!(f, "darwin"),
            Os::Windows => write!(f, "windows"),
            Os::Other => write!(f, "{}", std::env::consts::OS),
        }
    }
}

/// Which probe families apply on a platform. Resolved once per snapshot;
/// the builder branches on these flags instead of checking the OS again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether "running inside a container" is a meaningful question.
    pub containerized_check: bool,
    /// cgroup-backed memory/cpu limit facts.
    pub resource_limits: bool,
    /// containerd/runtime/init versions and configured runtimes.
    pub component_versions: bool,
    /// Seccomp profiles can be applied to containers.
    pub seccomp: bool,
}

impl Capabilities {
    pub fn for_os(os: Os) -> Self {
        match os {
            Os::Linux => Self {
                containerized_check: true,
                resource_limits: true,
                component_versions: true,
                seccomp: true,
            },
            Os::Windows => Self {
                containerized_check: false,
                resource_limits: false,
                component_versions: false,
                seccomp: false,
            },
            Os::MacOS | Os::Other => Self {
                containerized_check: false,
                resource_limits: false,
                component_versions: true,
                seccomp: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: &'static str,
    pub capabilities: Capabilities,
}

impl Platform {
    pub fn current() -> Self {
        Self::for_os(Os::current())
    }

    pub fn for_os(os: Os) -> Self {
        Self {
            os,
            arch: std::env::consts::ARCH,
            capabilities: Capabilities::for_os(os),
        }
    }

    pub fn os_type(&self) -> String {
        self.os.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_probes_everything() {
        let caps = Capabilities::for_os(Os::Linux);
        assert!(caps.containerized_check);
        assert!(caps.resource_limits);
        assert!(caps.component_versions);
        assert!(caps.seccomp);
    }

    #[test]
    fn windows_skips_unix_probes() {
        let caps = Capabilities::for_os(Os::Windows);
        assert!(!caps.containerized_check);
        assert!(!caps.resource_limits);
        assert!(!caps.component_versions);
        assert!(!caps.seccomp);
    }

    #[test]
    fn os_type_names() {
        assert_eq!(Platform::for_os(Os::Linux).os_type(), "linux");
        assert_eq!(Platform::for_os(Os::Windows).os_type(), "windows");
        assert_eq!(Platform::for_os(Os::MacOS).os_type(), "darwin");
    }
}
