//! Detection of the environment the CLI runs in

use serde::Serialize;
use std::fmt;
use std::path::Path;

const CI_VARS: [&str; 5] = [
    "CI",
    "CONTINUOUS_INTEGRATION",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_HOME",
];
const CLOUD_SHELL_VARS: [&str; 2] = ["CLOUD_SHELL", "GOOGLE_CLOUD_SHELL"];
const DOCKER_MARKER: &str = "/.dockerenv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Ci,
    Container,
    CloudShell,
    Workstation,
}

impl Environment {
    /// Detect from the process environment and filesystem
    pub fn detect() -> Self {
        Self::detect_with(
            |name| std::env::var(name).ok(),
            Path::new(DOCKER_MARKER).exists(),
        )
    }

    /// Detection with injectable lookups. CI wins over container, which
    /// wins over Cloud Shell.
    pub fn detect_with<F>(lookup: F, in_container: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if CI_VARS
            .iter()
            .any(|name| lookup(name).map_or(false, |v| !v.is_empty()))
        {
            return Environment::Ci;
        }
        if in_container {
            return Environment::Container;
        }
        if CLOUD_SHELL_VARS
            .iter()
            .any(|name| lookup(name).as_deref() == Some("true"))
        {
            return Environment::CloudShell;
        }
        Environment::Workstation
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Ci => "CI/CD",
            Environment::Container => "Container",
            Environment::CloudShell => "Cloud Shell",
            Environment::Workstation => "Development workstation",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_ci_detected_first() {
        assert_eq!(Environment::detect_with(lookup(&[("GITHUB_ACTIONS", "true")]), true), Environment::Ci);
        assert_eq!(Environment::detect_with(lookup(&[("CI", "1")]), false), Environment::Ci);
        // Empty values do not count
        assert_eq!(Environment::detect_with(lookup(&[("CI", "")]), false), Environment::Workstation);
    }

    #[test]
    fn test_container_and_cloud_shell() {
        assert_eq!(Environment::detect_with(lookup(&[]), true), Environment::Container);
        assert_eq!(
            Environment::detect_with(lookup(&[("CLOUD_SHELL", "true")]), false),
            Environment::CloudShell
        );
        assert_eq!(
            Environment::detect_with(lookup(&[("GOOGLE_CLOUD_SHELL", "false")]), false),
            Environment::Workstation
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(Environment::Ci.to_string(), "CI/CD");
        assert_eq!(Environment::Workstation.as_str(), "Development workstation");
    }
}
