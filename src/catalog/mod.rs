//! Built-in stack templates
//!
//! Each template describes one deployable stack: its typed inputs (most of
//! them fed from a deployment setting), its outputs, and a builder emitting
//! CloudFormation-style resource descriptors.

mod network;
mod web_ami;
mod web_tier;

use anyhow::{Context, Result, bail};
use stackgraph::{
    Inputs, Settings, SettingsSchema, SlotDecl, SlotSpec, SlotType, StackNode, Synthesized, Token,
    Value, builder_fn, declare,
};
use std::collections::BTreeMap;

use crate::composition::{Composition, LinkDef, StackDef};

/// Input slot of a template
#[derive(Debug, Clone, Copy)]
pub struct InputDef {
    pub name: &'static str,
    pub ty: SlotType,
    /// Setting used as the default value
    pub setting: Option<&'static str>,
    /// Literal default when no setting applies
    pub default: Option<&'static str>,
    pub optional: bool,
}

impl InputDef {
    /// Input that must be wired with a link
    const fn linked(name: &'static str, ty: SlotType) -> Self {
        Self {
            name,
            ty,
            setting: None,
            default: None,
            optional: false,
        }
    }

    /// Input defaulted from a deployment setting
    const fn setting(name: &'static str, ty: SlotType, key: &'static str) -> Self {
        Self {
            name,
            ty,
            setting: Some(key),
            default: None,
            optional: false,
        }
    }
}

/// A reusable stack definition
#[derive(Debug)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub inputs: &'static [InputDef],
    /// Output names; every output is a provisioned string
    pub outputs: &'static [&'static str],
    pub build: fn(&Inputs<'_>) -> Result<Synthesized>,
}

impl Template {
    /// Declare a stack from this template
    ///
    /// Input defaults come from `literals` first, then from the template's
    /// setting, then from the template's own literal default.
    pub fn instantiate(
        &self,
        id: &str,
        settings: &Settings,
        literals: &BTreeMap<String, String>,
    ) -> Result<StackNode> {
        if let Some(name) = literals
            .keys()
            .find(|name| !self.inputs.iter().any(|input| input.name == *name))
        {
            bail!("template '{}' has no input '{name}' (stack '{id}')", self.name);
        }

        let mut inputs = SlotSpec::new();
        for input in self.inputs {
            let default = match (literals.get(input.name), input.setting, input.default) {
                (Some(raw), _, _) => Some(
                    Value::parse(input.ty, raw)
                        .map_err(|reason| anyhow::anyhow!(reason))
                        .with_context(|| format!("Invalid value for {id}.{}", input.name))?,
                ),
                (None, Some(key), _) => Some(
                    settings
                        .get(key)
                        .cloned()
                        .with_context(|| format!("Setting '{key}' is not defined"))?,
                ),
                (None, None, Some(raw)) => Some(
                    Value::parse(input.ty, raw).map_err(|reason| anyhow::anyhow!(reason))?,
                ),
                (None, None, None) => None,
            };

            let decl = match default {
                Some(value) => SlotDecl::with_default(input.ty, value),
                None if input.optional => SlotDecl::optional(input.ty),
                None => SlotDecl::required(input.ty),
            };
            inputs.insert(input.name.to_string(), decl);
        }

        let outputs: SlotSpec = self
            .outputs
            .iter()
            .map(|name| ((*name).to_string(), SlotDecl::required(SlotType::String)))
            .collect();

        let references: Vec<&str> = self.inputs.iter().map(|input| input.name).collect();
        let node = declare(id, inputs, outputs, builder_fn(&references, self.build))?;
        Ok(node)
    }
}

/// All built-in templates
pub fn templates() -> [&'static Template; 3] {
    [&network::TEMPLATE, &web_tier::TEMPLATE, &web_ami::TEMPLATE]
}

/// Look up a template by name
pub fn template(name: &str) -> Option<&'static Template> {
    templates().into_iter().find(|t| t.name == name)
}

/// Deployment settings and their defaults
pub fn settings_schema() -> SettingsSchema {
    SettingsSchema::new()
        .setting("vpc_name", SlotType::String, "lab-8-1-vpc", "Name tag of the VPC")
        .setting("vpc_cidr", SlotType::Cidr, "10.0.0.0/16", "Address range of the VPC")
        .setting("max_azs", SlotType::Integer, "2", "Availability zones to spread subnets over")
        .setting(
            "instance_key_pair_name",
            SlotType::String,
            "lab-4-1-key-pair",
            "EC2 key pair for SSH access",
        )
        .setting(
            "instance_ami_id",
            SlotType::String,
            "ami-00889393050a8cd9b",
            "AMI used by the web tier launch template",
        )
        .setting("instance_type", SlotType::InstanceType, "t2.micro", "EC2 instance type")
        .setting("ssh_location", SlotType::Cidr, "0.0.0.0/0", "Network allowed to SSH in")
        .setting("min_capacity", SlotType::Integer, "1", "Auto scaling group minimum size")
        .setting("max_capacity", SlotType::Integer, "3", "Auto scaling group maximum size")
        .setting("desired_capacity", SlotType::Integer, "1", "Auto scaling group desired size")
        .setting(
            "source_code_bucket_name",
            SlotType::String,
            "web-tier-source",
            "S3 bucket holding the web tier sources",
        )
}

/// The stock deployment: a VPC and the auto-scaled web tier inside it
pub fn default_composition() -> Composition {
    Composition {
        settings: BTreeMap::new(),
        stacks: vec![
            StackDef {
                id: "VpcStack".into(),
                template: network::TEMPLATE.name.into(),
                inputs: BTreeMap::new(),
            },
            StackDef {
                id: "AutoScalingStack".into(),
                template: web_tier::TEMPLATE.name.into(),
                inputs: BTreeMap::new(),
            },
        ],
        links: vec![LinkDef {
            from: "VpcStack.vpcId".into(),
            to: "AutoScalingStack.vpcId".into(),
        }],
    }
}

/// Deferred string output of the stack being built
fn deferred(inputs: &Inputs<'_>, output: &str) -> Value {
    Value::Deferred(Token::new(inputs.stack(), output, SlotType::String))
}

/// CloudFormation-style reference to a resource of the same stack
fn reference(logical_id: &str) -> serde_json::Value {
    serde_json::json!({ "Ref": logical_id })
}

/// CloudFormation-style attribute of a resource of the same stack
fn attribute(logical_id: &str, attribute: &str) -> serde_json::Value {
    serde_json::json!({ "Fn::GetAtt": [logical_id, attribute] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph::{ResourceDescriptor, resolve, synthesize};

    fn defaults() -> Settings {
        resolve(&settings_schema(), &BTreeMap::new()).unwrap()
    }

    fn kinds(resources: &[ResourceDescriptor]) -> Vec<&str> {
        resources.iter().map(|r| r.kind.as_str()).collect()
    }

    #[test]
    fn test_schema_defaults_resolve() {
        let settings = defaults();
        assert_eq!(settings.str("vpc_name"), Some("lab-8-1-vpc"));
        assert_eq!(settings.str("instance_type"), Some("t2.micro"));
        assert_eq!(settings.integer("max_capacity"), Some(3));
        assert_eq!(settings.iter().count(), 11);
    }

    #[test]
    fn test_every_template_setting_exists() {
        let schema = settings_schema();
        for template in templates() {
            for input in template.inputs {
                if let Some(key) = input.setting {
                    let spec = schema.get(key).unwrap();
                    assert_eq!(spec.ty, input.ty, "{}.{}", template.name, input.name);
                }
            }
        }
    }

    #[test]
    fn test_template_lookup() {
        assert!(template("network").is_some());
        assert!(template("web-tier").is_some());
        assert!(template("web-ami").is_some());
        assert!(template("database").is_none());
    }

    #[test]
    fn test_default_composition_plan() {
        let graph = default_composition().build_graph(&defaults()).unwrap();
        let plan = synthesize(&graph).unwrap();
        assert_eq!(plan.order(), vec!["VpcStack", "AutoScalingStack"]);

        let vpc = plan.step("VpcStack").unwrap();
        assert_eq!(vpc.resources.len(), 6);
        assert_eq!(vpc.outputs.len(), 5);

        let web = plan.step("AutoScalingStack").unwrap();
        assert_eq!(web.inputs["vpcId"].to_string(), "${VpcStack.vpcId}");
        assert_eq!(web.inputs["instanceType"], Value::InstanceType("t2.micro".into()));
        assert_eq!(
            kinds(&web.resources),
            vec![
                "AWS::EC2::SecurityGroup",
                "AWS::EC2::SecurityGroup",
                "AWS::EC2::LaunchTemplate",
                "AWS::ElasticLoadBalancingV2::LoadBalancer",
                "AWS::ElasticLoadBalancingV2::TargetGroup",
                "AWS::ElasticLoadBalancingV2::Listener",
                "AWS::AutoScaling::AutoScalingGroup",
                "AWS::AutoScaling::ScalingPolicy",
            ]
        );
        assert_eq!(
            web.outputs["loadBalancerDns"].to_string(),
            "${AutoScalingStack.loadBalancerDns}"
        );
    }

    #[test]
    fn test_literal_input_beats_setting() {
        let literals = BTreeMap::from([("vpcCidr".to_string(), "172.16.0.0/16".to_string())]);
        let node = network::TEMPLATE
            .instantiate("Net", &defaults(), &literals)
            .unwrap();
        assert_eq!(
            node.input("vpcCidr").unwrap().default,
            Some(Value::Cidr("172.16.0.0/16".into()))
        );
    }

    #[test]
    fn test_unknown_literal_input_rejected() {
        let literals = BTreeMap::from([("cidr".to_string(), "10.0.0.0/16".to_string())]);
        let err = network::TEMPLATE
            .instantiate("Net", &defaults(), &literals)
            .unwrap_err();
        assert!(err.to_string().contains("no input 'cidr'"));
    }

    #[test]
    fn test_bad_literal_input_rejected() {
        let literals = BTreeMap::from([("maxAzs".to_string(), "two".to_string())]);
        let err = network::TEMPLATE
            .instantiate("Net", &defaults(), &literals)
            .unwrap_err();
        assert!(format!("{err:#}").contains("Net.maxAzs"));
    }
}
