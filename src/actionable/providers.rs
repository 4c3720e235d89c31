//! Constructors for the errors users hit most often, per provider

use super::{ActionableError, Environment, ErrorType, Provider};
use crate::constants::APP_NAME;

fn configure_help(provider: &str) -> String {
    format!("{} configure {}", APP_NAME, provider)
}

pub fn aws_credentials(original: Option<&str>) -> ActionableError {
    let err = ActionableError::new(ErrorType::Authentication, Provider::Aws, "AWS credentials not found")
        .with_cause("No valid credential source detected");

    let err = if original.map_or(false, |o| o.contains("ExpiredToken")) {
        ActionableError {
            message: "AWS credentials expired".to_string(),
            ..err
        }
        .with_cause("Security token has expired")
        .with_solutions([
            "Refresh AWS credentials",
            "aws sso login (if using SSO)",
            "Get new temporary credentials",
        ])
    } else if err.environment == Environment::Ci {
        err.with_solutions([
            "Configure an AWS IAM role for the pipeline",
            "export AWS_ACCESS_KEY_ID=your-key AWS_SECRET_ACCESS_KEY=your-secret",
            "Use AWS Secrets Manager or Parameter Store",
        ])
    } else {
        err.with_solutions([
            "aws configure",
            "export AWS_ACCESS_KEY_ID=your-key AWS_SECRET_ACCESS_KEY=your-secret",
            "aws sso login (if using AWS SSO)",
        ])
    };

    err.with_verify("aws sts get-caller-identity")
        .with_help(configure_help("aws"))
}

pub fn aws_region() -> ActionableError {
    ActionableError::new(ErrorType::Configuration, Provider::Aws, "AWS region not specified")
        .with_solutions([
            "export AWS_REGION=us-east-1",
            "aws configure set region us-east-1",
            "Add --region to your command",
        ])
        .with_verify("aws configure get region")
        .with_help(configure_help("aws"))
}

pub fn gcp_authentication(original: Option<&str>) -> ActionableError {
    let err = ActionableError::new(ErrorType::Authentication, Provider::Gcp, "GCP authentication failed");

    let err = match original {
        Some(o) if o.contains("quota") => {
            return err.with_cause("API quota exceeded").with_solutions([
                "Wait for the quota to reset",
                "Request a quota increase in the GCP Console",
            ]);
        }
        Some(o) if o.contains("could not find default credentials") => {
            err.with_cause("Application default credentials not found")
        }
        Some(o) => err.with_cause(o),
        None => err,
    };

    let err = if err.environment == Environment::Ci {
        err.with_solutions([
            r#"export GOOGLE_APPLICATION_CREDENTIALS="service-account.json""#,
            r#"echo "$GCP_SA_KEY" | base64 -d > service-account.json"#,
            "gcloud auth activate-service-account --key-file=service-account.json",
        ])
    } else {
        err.with_solutions([
            "gcloud auth application-default login",
            r#"export GOOGLE_APPLICATION_CREDENTIALS="/path/to/key.json""#,
        ])
    };

    err.with_verify("gcloud auth list")
        .with_help(configure_help("gcp"))
}

pub fn gcp_project() -> ActionableError {
    let project = std::env::var("GOOGLE_CLOUD_PROJECT")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "your-project-id".to_string());

    ActionableError::new(ErrorType::Configuration, Provider::Gcp, "GCP project not configured")
        .with_solutions([
            format!(r#"export GOOGLE_CLOUD_PROJECT="{}""#, project),
            "gcloud config set project your-project-id".to_string(),
            configure_help("gcp"),
        ])
        .with_verify("gcloud config get-value project")
        .with_help(format!("{} configure --help", APP_NAME))
}

pub fn gcp_api_disabled(api: &str) -> ActionableError {
    ActionableError::new(
        ErrorType::Provider,
        Provider::Gcp,
        format!("GCP API {} is not enabled", api),
    )
    .with_cause("The project has not enabled the API this collector calls")
    .with_solutions([
        format!("gcloud services enable {}", api),
        "Wait a few minutes for the change to propagate".to_string(),
    ])
    .with_verify(format!("gcloud services list --enabled --filter={}", api))
    .with_help(configure_help("gcp"))
}

pub fn kubernetes_connection(context: Option<&str>, original: Option<&str>) -> ActionableError {
    let err = ActionableError::new(ErrorType::Network, Provider::Kubernetes, "Kubernetes connection failed");
    let err = match (context, original) {
        (Some(ctx), _) if !ctx.is_empty() => {
            err.with_cause(format!("Current context '{}' is not accessible", ctx))
        }
        (_, Some(o)) => err.with_cause(o),
        _ => err,
    };
    err.with_solutions([
        "kubectl config get-contexts",
        "kubectl config use-context working-context",
        "Check if the cluster is running: kubectl cluster-info",
        "Verify the VPN connection if using a remote cluster",
    ])
    .with_verify("kubectl cluster-info")
    .with_help(configure_help("kubernetes"))
}

pub fn kubernetes_context() -> ActionableError {
    ActionableError::new(
        ErrorType::Configuration,
        Provider::Kubernetes,
        "Kubernetes configuration not found",
    )
    .with_cause("No kubeconfig file found")
    .with_solutions([
        "Ensure kubectl is configured: kubectl config view",
        "Set the KUBECONFIG environment variable",
        "Copy the config to ~/.kube/config",
        "For a new cluster: gcloud container clusters get-credentials cluster-name",
    ])
    .with_verify("kubectl config current-context")
    .with_help(configure_help("kubernetes"))
}

pub fn terraform_state_not_found(path: Option<&str>) -> ActionableError {
    let cause = match path {
        Some(p) if !p.is_empty() => format!("No .tfstate files in {}", p),
        _ => "No .tfstate files in the current directory or configured paths".to_string(),
    };
    ActionableError::new(ErrorType::FileSystem, Provider::Terraform, "No terraform state files found")
        .with_cause(cause)
        .with_solutions([
            "Run from the terraform project directory",
            "Specify the path with --path",
            "Check whether a remote state backend is in use",
        ])
        .with_verify("terraform show")
        .with_help(configure_help("terraform"))
}

pub fn terraform_parse(path: &str, detail: &str) -> ActionableError {
    ActionableError::new(
        ErrorType::Validation,
        Provider::Terraform,
        format!("Failed to parse terraform state {}", path),
    )
    .with_cause(detail)
    .with_solutions([
        "Check that the file is a terraform state document",
        "Upgrade the state with a matching terraform version",
        "Pull a fresh copy: terraform state pull > terraform.tfstate",
    ])
    .with_verify("terraform show")
    .with_help(format!("{} help terraform", APP_NAME))
}

pub fn permission(provider: Provider, resource: &str) -> ActionableError {
    let err = ActionableError::new(
        ErrorType::Permission,
        provider,
        format!("Permission denied accessing {}", resource),
    );
    let err = match provider {
        Provider::Aws => err
            .with_solutions([
                "Check IAM policies attached to the user or role",
                "Use the AWS Policy Simulator to test permissions",
            ])
            .with_verify("aws iam get-user"),
        Provider::Gcp => err
            .with_solutions([
                "Check IAM permissions in the GCP Console",
                "Ensure the service account has the required roles",
            ])
            .with_verify("gcloud projects get-iam-policy PROJECT_ID"),
        Provider::Kubernetes => err
            .with_solutions([
                "Check RBAC permissions",
                "kubectl auth can-i --list",
                "Contact the cluster administrator for access",
            ])
            .with_verify("kubectl auth can-i --list"),
        Provider::Terraform | Provider::Unknown => err.with_solutions([
            format!("Check the ownership and mode of {}", resource),
            "Choose a writable store with --base-dir".to_string(),
        ]),
    };
    match provider {
        Provider::Unknown => err.with_help(format!("{} --help", APP_NAME)),
        _ => err.with_help(configure_help(&provider.as_str().to_ascii_lowercase())),
    }
}

pub fn configuration(message: impl Into<String>, cause: impl Into<String>) -> ActionableError {
    ActionableError::new(ErrorType::Configuration, Provider::Unknown, message)
        .with_cause(cause)
        .with_solutions([
            "Check the configuration file for typos".to_string(),
            "Pass an explicit file with --config".to_string(),
        ])
        .with_help(format!("{} --help", APP_NAME))
}

pub fn filesystem(path: &str, cause: &str) -> ActionableError {
    ActionableError::new(
        ErrorType::FileSystem,
        Provider::Unknown,
        format!("File system error at {}", path),
    )
    .with_cause(cause)
    .with_solutions([
        "Check that the path exists and is readable",
        "Check free disk space",
        "Restore from the backups directory if the file is damaged",
    ])
}

pub fn network(provider: Provider, endpoint: &str) -> ActionableError {
    let err = ActionableError::new(ErrorType::Network, provider, "Network connection failed")
        .with_cause(format!("Cannot reach {}", endpoint))
        .with_solutions([
            "Check internet connectivity",
            "Verify firewall rules",
            "Check proxy settings: echo $HTTP_PROXY $HTTPS_PROXY",
            "Try using a VPN if accessing private resources",
        ]);
    let err = match provider {
        Provider::Gcp => err.with_verify("gcloud compute regions list"),
        Provider::Aws => err.with_verify("aws ec2 describe-regions"),
        _ => err,
    };
    err.with_help(format!("{} help troubleshooting", APP_NAME))
}

pub fn validation(message: impl Into<String>) -> ActionableError {
    ActionableError::new(ErrorType::Validation, Provider::Unknown, message).with_solutions([
        "Identifiers must be non-empty and free of '/', '\\', '..' and control characters",
        "Check the input document against the snapshot format",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_aws_token() {
        let err = aws_credentials(Some("ExpiredToken: the security token expired"));
        assert_eq!(err.message, "AWS credentials expired");
        assert_eq!(err.cause.as_deref(), Some("Security token has expired"));
        assert_eq!(err.exit_code(), 77);
        assert_eq!(err.verify.as_deref(), Some("aws sts get-caller-identity"));
    }

    #[test]
    fn test_gcp_quota_has_no_verify() {
        let err = gcp_authentication(Some("quota exceeded for project"));
        assert_eq!(err.cause.as_deref(), Some("API quota exceeded"));
        assert_eq!(err.solutions.len(), 2);
        assert!(err.verify.is_none());
    }

    #[test]
    fn test_kubernetes_context_in_cause() {
        let err = kubernetes_connection(Some("prod"), None);
        assert_eq!(err.error_type, ErrorType::Network);
        assert_eq!(err.exit_code(), 69);
        assert!(err.cause.unwrap().contains("'prod'"));
    }

    #[test]
    fn test_terraform_state_and_config() {
        let err = terraform_state_not_found(Some("/infra"));
        assert_eq!(err.exit_code(), 66);
        assert_eq!(err.cause.as_deref(), Some("No .tfstate files in /infra"));

        let err = configuration("Invalid configuration", "max_width must be at least 40");
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_permission_help_names_provider() {
        let err = permission(Provider::Kubernetes, "pods");
        assert_eq!(err.help.as_deref(), Some("vaino configure kubernetes"));
        assert_eq!(err.message, "Permission denied accessing pods");
    }

    #[test]
    fn test_configuration_constructors() {
        let err = aws_region();
        assert_eq!(err.error_type, ErrorType::Configuration);
        assert_eq!(err.solutions[0], "export AWS_REGION=us-east-1");

        let err = gcp_project();
        assert_eq!(err.exit_code(), 78);
        assert!(err.solutions[0].starts_with("export GOOGLE_CLOUD_PROJECT="));

        let err = kubernetes_context();
        assert_eq!(err.provider, Provider::Kubernetes);
        assert_eq!(err.verify.as_deref(), Some("kubectl config current-context"));
    }

    #[test]
    fn test_api_and_parse_failures() {
        let err = gcp_api_disabled("compute.googleapis.com");
        assert_eq!(err.error_type, ErrorType::Provider);
        assert_eq!(err.solutions[0], "gcloud services enable compute.googleapis.com");

        let err = terraform_parse("prod.tfstate", "unexpected end of input");
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.message, "Failed to parse terraform state prod.tfstate");
        assert_eq!(err.cause.as_deref(), Some("unexpected end of input"));
    }
}
