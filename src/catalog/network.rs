//! VPC with public and private subnets

use super::{InputDef, Template, deferred, reference};
use anyhow::{Context, Result, bail};
use serde_json::json;
use stackgraph::{Inputs, ResourceDescriptor, SlotType, Synthesized};
use std::net::Ipv4Addr;

pub static TEMPLATE: Template = Template {
    name: "network",
    description: "VPC with an internet gateway, two public and two private /24 subnets",
    inputs: &[
        InputDef::setting("vpcName", SlotType::String, "vpc_name"),
        InputDef::setting("vpcCidr", SlotType::Cidr, "vpc_cidr"),
        InputDef::setting("maxAzs", SlotType::Integer, "max_azs"),
    ],
    outputs: &[
        "vpcId",
        "publicSubnet1",
        "publicSubnet2",
        "privateSubnet1",
        "privateSubnet2",
    ],
    build,
};

const SUBNET_MASK: u8 = 24;

const SUBNETS: [(&str, &str, bool); 4] = [
    ("PublicSubnet1", "publicSubnet1", true),
    ("PublicSubnet2", "publicSubnet2", true),
    ("PrivateSubnet1", "privateSubnet1", false),
    ("PrivateSubnet2", "privateSubnet2", false),
];

fn build(inputs: &Inputs<'_>) -> Result<Synthesized> {
    let name = inputs.text("vpcName")?;
    let cidr = inputs.text("vpcCidr")?;
    let max_azs = inputs.integer("maxAzs")?;
    if max_azs < 1 {
        bail!("maxAzs must be at least 1, got {max_azs}");
    }

    let mut out = Synthesized::new()
        .resource(ResourceDescriptor::new(
            "AWS::EC2::VPC",
            "VPC",
            json!({
                "CidrBlock": cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "Tags": [{ "Key": "Name", "Value": name }],
            }),
        ))
        .resource(ResourceDescriptor::new(
            "AWS::EC2::InternetGateway",
            "InternetGateway",
            json!({ "VpcId": reference("VPC") }),
        ))
        .output("vpcId", deferred(inputs, "vpcId"));

    // Public subnets take the first blocks, private ones follow
    for (index, (logical_id, output, public)) in SUBNETS.into_iter().enumerate() {
        let block = subnet_block(&cidr, index)?;
        let tier = if public { "Public" } else { "Private" };
        out = out
            .resource(ResourceDescriptor::new(
                "AWS::EC2::Subnet",
                logical_id,
                json!({
                    "VpcId": reference("VPC"),
                    "CidrBlock": block,
                    "AvailabilityZone": {
                        "Fn::Select": [index as i64 % max_azs, { "Fn::GetAZs": "" }]
                    },
                    "MapPublicIpOnLaunch": public,
                    "Tags": [{ "Key": "Name", "Value": format!("{name}-{tier}") }],
                }),
            ))
            .output(output, deferred(inputs, output));
    }

    log::debug!("{}: VPC {cidr} with {} subnets", inputs.stack(), SUBNETS.len());
    Ok(out)
}

/// The `index`-th /24 block inside an IPv4 network
fn subnet_block(cidr: &str, index: usize) -> Result<String> {
    let (addr, prefix) = cidr
        .split_once('/')
        .with_context(|| format!("'{cidr}' is not a CIDR block"))?;
    let addr: Ipv4Addr = addr
        .parse()
        .with_context(|| format!("subnets need an IPv4 VPC range, got '{cidr}'"))?;
    let prefix: u8 = prefix.parse().context("invalid prefix length")?;

    if prefix > SUBNET_MASK - 2 {
        bail!("VPC range {cidr} is too small for four /{SUBNET_MASK} subnets");
    }

    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    let network = u32::from(addr) & mask;
    let block = network + ((index as u32) << (32 - u32::from(SUBNET_MASK)));
    Ok(format!("{}/{SUBNET_MASK}", Ipv4Addr::from(block)))
}
