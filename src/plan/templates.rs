//! Embedded artifact templates.
//!
//! The initial content of every generated artifact lives in the crate
//! under `templates/` and is rendered here: lifecycle scripts get the
//! environment name and IaaS substituted in, and the infrastructure
//! template is assembled from the per-IaaS base plus one fragment per
//! declared load-balancer type.

use crate::config::{EnvironmentConfig, Iaas, LbType};
use crate::store::{Artifact, ArtifactKind};

const CREATE_JUMPBOX_SH: &str = include_str!("../../templates/create-jumpbox.sh");
const CREATE_DIRECTOR_SH: &str = include_str!("../../templates/create-director.sh");
const DELETE_DIRECTOR_SH: &str = include_str!("../../templates/delete-director.sh");
const DELETE_JUMPBOX_SH: &str = include_str!("../../templates/delete-jumpbox.sh");

const AWS_TEMPLATE_TF: &str = include_str!("../../templates/aws/template.tf");
const AWS_LB_CF_TF: &str = include_str!("../../templates/aws/lb-cf.tf");
const AWS_LB_CONCOURSE_TF: &str = include_str!("../../templates/aws/lb-concourse.tf");

const GCP_TEMPLATE_TF: &str = include_str!("../../templates/gcp/template.tf");
const GCP_LB_CF_TF: &str = include_str!("../../templates/gcp/lb-cf.tf");
const GCP_LB_CONCOURSE_TF: &str = include_str!("../../templates/gcp/lb-concourse.tf");

const AZURE_TEMPLATE_TF: &str = include_str!("../../templates/azure/template.tf");
const AZURE_LB_CF_TF: &str = include_str!("../../templates/azure/lb-cf.tf");
const AZURE_LB_CONCOURSE_TF: &str = include_str!("../../templates/azure/lb-concourse.tf");

const CLOUD_CONFIG_BASE_YML: &str = include_str!("../../templates/cloud-config.yml");

/// Logical artifact names, stable across regenerations.
pub mod names {
    /// Jumpbox creation script.
    pub const CREATE_JUMPBOX: &str = "create-jumpbox";
    /// Director creation script.
    pub const CREATE_DIRECTOR: &str = "create-director";
    /// Director deletion script.
    pub const DELETE_DIRECTOR: &str = "delete-director";
    /// Jumpbox deletion script.
    pub const DELETE_JUMPBOX: &str = "delete-jumpbox";
    /// Infrastructure template.
    pub const TERRAFORM_TEMPLATE: &str = "terraform-template";
    /// Base cloud configuration document.
    pub const CLOUD_CONFIG_BASE: &str = "cloud-config-base";
}

/// Store-relative path of the infrastructure template.
pub const TERRAFORM_TEMPLATE_PATH: &str = "terraform/template.tf";

/// Store-relative path of the base cloud configuration.
pub const CLOUD_CONFIG_BASE_PATH: &str = "cloud-config/cloud-config.yml";

/// Computes the full desired artifact set for a declared environment.
///
/// The vars store is not part of this set; it is write-once and handled
/// separately by the generator.
#[must_use]
pub fn desired_artifacts(config: &EnvironmentConfig) -> Vec<Artifact> {
    vec![
        Artifact::new(
            names::CREATE_JUMPBOX,
            "create-jumpbox.sh",
            render_script(CREATE_JUMPBOX_SH, config),
            ArtifactKind::CreateScript,
        ),
        Artifact::new(
            names::CREATE_DIRECTOR,
            "create-director.sh",
            render_script(CREATE_DIRECTOR_SH, config),
            ArtifactKind::CreateScript,
        ),
        Artifact::new(
            names::DELETE_DIRECTOR,
            "delete-director.sh",
            render_script(DELETE_DIRECTOR_SH, config),
            ArtifactKind::DeleteScript,
        ),
        Artifact::new(
            names::DELETE_JUMPBOX,
            "delete-jumpbox.sh",
            render_script(DELETE_JUMPBOX_SH, config),
            ArtifactKind::DeleteScript,
        ),
        Artifact::new(
            names::TERRAFORM_TEMPLATE,
            TERRAFORM_TEMPLATE_PATH,
            render_terraform_template(config),
            ArtifactKind::InfraTemplate,
        ),
        Artifact::new(
            names::CLOUD_CONFIG_BASE,
            CLOUD_CONFIG_BASE_PATH,
            CLOUD_CONFIG_BASE_YML.to_string(),
            ArtifactKind::Manifest,
        ),
    ]
}

/// Substitutes environment placeholders into a lifecycle script.
fn render_script(template: &str, config: &EnvironmentConfig) -> String {
    template
        .replace("{{env_id}}", &config.env_id)
        .replace("{{iaas}}", config.iaas.as_str())
}

/// Assembles the infrastructure template for the declared environment.
///
/// Load-balancer fragments are appended in declaration order, so a newly
/// requested load balancer propagates into an already-planned environment
/// on the next plan run (provided the template is still generator-owned).
fn render_terraform_template(config: &EnvironmentConfig) -> String {
    let mut template = base_template(config.iaas).to_string();

    for lb in &config.load_balancers {
        if !template.ends_with('\n') {
            template.push('\n');
        }
        template.push('\n');
        template.push_str(lb_fragment(config.iaas, lb.lb_type));
    }

    template
}

const fn base_template(iaas: Iaas) -> &'static str {
    match iaas {
        Iaas::Aws => AWS_TEMPLATE_TF,
        Iaas::Gcp => GCP_TEMPLATE_TF,
        Iaas::Azure => AZURE_TEMPLATE_TF,
    }
}

const fn lb_fragment(iaas: Iaas, lb_type: LbType) -> &'static str {
    match (iaas, lb_type) {
        (Iaas::Aws, LbType::Cf) => AWS_LB_CF_TF,
        (Iaas::Aws, LbType::Concourse) => AWS_LB_CONCOURSE_TF,
        (Iaas::Gcp, LbType::Cf) => GCP_LB_CF_TF,
        (Iaas::Gcp, LbType::Concourse) => GCP_LB_CONCOURSE_TF,
        (Iaas::Azure, LbType::Cf) => AZURE_LB_CF_TF,
        (Iaas::Azure, LbType::Concourse) => AZURE_LB_CONCOURSE_TF,
    }
}

/// Returns the base cloud configuration document.
#[must_use]
pub const fn cloud_config_base() -> &'static str {
    CLOUD_CONFIG_BASE_YML
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadBalancer;

    #[test]
    fn test_scripts_are_parameterised() {
        let config = EnvironmentConfig::new("demo-env", Iaas::Gcp, ".");
        let artifacts = desired_artifacts(&config);

        let create_jumpbox = artifacts
            .iter()
            .find(|a| a.name == names::CREATE_JUMPBOX)
            .expect("create-jumpbox artifact");
        assert!(create_jumpbox.content.contains("demo-env"));
        assert!(create_jumpbox.content.contains("gcp/cpi.yml"));
        assert!(!create_jumpbox.content.contains("{{"));
    }

    #[test]
    fn test_template_without_lbs_has_no_lb_outputs() {
        let config = EnvironmentConfig::new("demo-env", Iaas::Aws, ".");
        let artifacts = desired_artifacts(&config);

        let template = artifacts
            .iter()
            .find(|a| a.name == names::TERRAFORM_TEMPLATE)
            .expect("template artifact");
        assert!(template.content.contains("jumpbox_url"));
        assert!(!template.content.contains("cf_lb_url"));
    }

    #[test]
    fn test_cf_fragment_appended_per_iaas() {
        for iaas in [Iaas::Aws, Iaas::Gcp, Iaas::Azure] {
            let config = EnvironmentConfig::new("demo-env", iaas, ".")
                .with_load_balancer(LoadBalancer::new(LbType::Cf));
            let artifacts = desired_artifacts(&config);

            let template = artifacts
                .iter()
                .find(|a| a.name == names::TERRAFORM_TEMPLATE)
                .expect("template artifact");
            assert!(
                template.content.contains("cf_lb_url"),
                "missing cf output for {iaas}"
            );
        }
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let config = EnvironmentConfig::new("demo-env", Iaas::Azure, ".")
            .with_load_balancer(LoadBalancer::new(LbType::Concourse));
        let first = desired_artifacts(&config);
        let second = desired_artifacts(&config);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }
}
