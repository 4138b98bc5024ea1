//! Simulated provisioning engine
//!
//! Stands in for a cloud API: every deferred output gets a stable, realistic
//! looking identifier derived from the stack's content. The same plan always
//! yields the same identifiers.

use anyhow::Result;
use stackgraph::{ProvisionRequest, Provisioner, Value};
use std::collections::BTreeMap;

/// Provisioner that fabricates outputs instead of calling a cloud API
#[derive(Debug, Clone)]
pub struct SimulatedProvisioner {
    region: String,
}

impl SimulatedProvisioner {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Default for SimulatedProvisioner {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl Provisioner for SimulatedProvisioner {
    fn provision(&self, request: &ProvisionRequest<'_>) -> Result<BTreeMap<String, Value>> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(request.stack_id.as_bytes());
        hasher.update(&serde_json::to_vec(request.inputs)?);
        hasher.update(&serde_json::to_vec(request.resources)?);
        let seed = hasher.finalize();

        log::info!(
            "simulating {} resources for {}",
            request.resources.len(),
            request.stack_id
        );

        let outputs = request
            .outputs
            .iter()
            .map(|(name, value)| {
                let concrete = match value {
                    Value::Deferred(_) => Value::String(self.fake_value(request.stack_id, name, seed)),
                    literal => literal.clone(),
                };
                (name.clone(), concrete)
            })
            .collect();
        Ok(outputs)
    }
}

impl SimulatedProvisioner {
    fn fake_value(&self, stack_id: &str, output: &str, seed: blake3::Hash) -> String {
        let digest = blake3::keyed_hash(seed.as_bytes(), output.as_bytes());
        let hex = digest.to_hex();
        let short = &hex.as_str()[..17];
        let bytes = digest.as_bytes();
        let lower = output.to_ascii_lowercase();

        if lower == "vpcid" {
            format!("vpc-{short}")
        } else if lower.contains("subnet") {
            format!("subnet-{short}")
        } else if lower == "instanceid" {
            format!("i-{short}")
        } else if lower.contains("availabilityzone") {
            let zone = char::from(b'a' + bytes[0] % 3);
            format!("{}{zone}", self.region)
        } else if lower.ends_with("ip") {
            format!("54.{}.{}.{}", bytes[0], bytes[1], bytes[2].max(1))
        } else if lower.contains("loadbalancer") {
            format!(
                "{}-{}.{}.elb.amazonaws.com",
                stack_id.to_ascii_lowercase(),
                &hex.as_str()[..8],
                self.region
            )
        } else if lower.ends_with("dns") {
            format!(
                "ec2-54-{}-{}-{}.compute-1.amazonaws.com",
                bytes[0], bytes[1], bytes[2]
            )
        } else {
            format!("{output}-{short}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use stackgraph::{RolloutOptions, resolve, rollout_simple, synthesize};

    fn plan() -> stackgraph::DeploymentPlan {
        let settings = resolve(&catalog::settings_schema(), &BTreeMap::new()).unwrap();
        synthesize(&catalog::default_composition().build_graph(&settings).unwrap()).unwrap()
    }

    #[test]
    fn test_default_deployment_rolls_out() {
        let summary =
            rollout_simple(&plan(), &RolloutOptions::default(), &SimulatedProvisioner::default())
                .unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.provisioned, 2);

        let vpc = summary.outputs["VpcStack"]["vpcId"].to_string();
        assert!(vpc.starts_with("vpc-"));
        assert!(summary.outputs["VpcStack"]["privateSubnet2"].to_string().starts_with("subnet-"));
        assert!(
            summary.outputs["AutoScalingStack"]["loadBalancerDns"]
                .to_string()
                .ends_with(".us-east-1.elb.amazonaws.com")
        );
    }

    #[test]
    fn test_identifiers_are_stable() {
        let provisioner = SimulatedProvisioner::default();
        let opts = RolloutOptions::default();
        let first = rollout_simple(&plan(), &opts, &provisioner).unwrap();
        let second = rollout_simple(&plan(), &opts, &provisioner).unwrap();
        assert_eq!(first.outputs, second.outputs);
    }

    #[test]
    fn test_fake_values_by_output_name() {
        let provisioner = SimulatedProvisioner::new("eu-west-1");
        let seed = blake3::hash(b"seed");
        assert!(provisioner.fake_value("Ami", "instanceId", seed).starts_with("i-"));
        assert!(provisioner.fake_value("Ami", "publicIp", seed).starts_with("54."));
        assert!(
            provisioner
                .fake_value("Ami", "availabilityZone", seed)
                .starts_with("eu-west-1")
        );
        assert!(provisioner.fake_value("Ami", "publicDns", seed).starts_with("ec2-54-"));
    }
}
