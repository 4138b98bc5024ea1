//! Auto-scaled web tier behind an application load balancer

use super::{InputDef, Template, attribute, deferred, reference};
use anyhow::{Result, bail};
use serde_json::json;
use stackgraph::{Inputs, ResourceDescriptor, SlotType, Synthesized};

pub static TEMPLATE: Template = Template {
    name: "web-tier",
    description: "Load balancer, launch template and CPU-scaled auto scaling group",
    inputs: &[
        InputDef::linked("vpcId", SlotType::String),
        InputDef::setting("instanceAmiId", SlotType::String, "instance_ami_id"),
        InputDef::setting("instanceKeyPairName", SlotType::String, "instance_key_pair_name"),
        InputDef::setting("instanceType", SlotType::InstanceType, "instance_type"),
        InputDef::setting("sshLocation", SlotType::Cidr, "ssh_location"),
        InputDef::setting("minCapacity", SlotType::Integer, "min_capacity"),
        InputDef::setting("maxCapacity", SlotType::Integer, "max_capacity"),
        InputDef::setting("desiredCapacity", SlotType::Integer, "desired_capacity"),
    ],
    outputs: &["loadBalancerDns"],
    build,
};

const HTTP_PORT: u16 = 80;
const SSH_PORT: u16 = 22;
const TARGET_CPU_PERCENT: f64 = 50.0;
const SCALING_COOLDOWN_SECS: u32 = 60;

fn build(inputs: &Inputs<'_>) -> Result<Synthesized> {
    let stack = inputs.stack();
    let vpc_id = inputs.text("vpcId")?;
    let min = inputs.integer("minCapacity")?;
    let max = inputs.integer("maxCapacity")?;
    let desired = inputs.integer("desiredCapacity")?;

    if min < 0 || min > max {
        bail!("capacity bounds are inverted: min {min}, max {max}");
    }
    if !(min..=max).contains(&desired) {
        bail!("desired capacity {desired} is outside {min}..={max}");
    }

    let lb_sg = ResourceDescriptor::new(
        "AWS::EC2::SecurityGroup",
        "LoadBalancerSG",
        json!({
            "VpcId": vpc_id,
            "GroupDescription": "Allows inbound traffic on port 80",
            "SecurityGroupIngress": [
                { "IpProtocol": "tcp", "FromPort": HTTP_PORT, "ToPort": HTTP_PORT, "CidrIp": "0.0.0.0/0" }
            ],
        }),
    );

    let instance_sg = ResourceDescriptor::new(
        "AWS::EC2::SecurityGroup",
        "InstanceSG",
        json!({
            "VpcId": vpc_id,
            "GroupDescription": "Enable SSH access and HTTP from the load balancer only",
            "SecurityGroupIngress": [
                {
                    "IpProtocol": "tcp",
                    "FromPort": SSH_PORT,
                    "ToPort": SSH_PORT,
                    "CidrIp": inputs.text("sshLocation")?,
                },
                {
                    "IpProtocol": "tcp",
                    "FromPort": HTTP_PORT,
                    "ToPort": HTTP_PORT,
                    "SourceSecurityGroupId": reference("LoadBalancerSG"),
                },
            ],
        }),
    );

    let launch_template = ResourceDescriptor::new(
        "AWS::EC2::LaunchTemplate",
        "LaunchTemplate",
        json!({
            "LaunchTemplateName": format!("{stack}-LaunchTemplate"),
            "LaunchTemplateData": {
                "ImageId": inputs.text("instanceAmiId")?,
                "InstanceType": inputs.text("instanceType")?,
                "KeyName": inputs.text("instanceKeyPairName")?,
                "SecurityGroupIds": [reference("InstanceSG")],
            },
        }),
    );

    let load_balancer = ResourceDescriptor::new(
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        "LoadBalancer",
        json!({
            "Type": "application",
            "Scheme": "internet-facing",
            "SecurityGroups": [reference("LoadBalancerSG")],
            "VpcId": vpc_id,
        }),
    );

    let target_group = ResourceDescriptor::new(
        "AWS::ElasticLoadBalancingV2::TargetGroup",
        "TargetGroup",
        json!({
            "VpcId": vpc_id,
            "Port": HTTP_PORT,
            "Protocol": "HTTP",
            "TargetType": "instance",
            "HealthCheckPath": "/",
        }),
    );

    let listener = ResourceDescriptor::new(
        "AWS::ElasticLoadBalancingV2::Listener",
        "Listener",
        json!({
            "LoadBalancerArn": reference("LoadBalancer"),
            "Port": HTTP_PORT,
            "Protocol": "HTTP",
            "DefaultActions": [
                { "Type": "forward", "TargetGroupArn": reference("TargetGroup") }
            ],
        }),
    );

    let asg = ResourceDescriptor::new(
        "AWS::AutoScaling::AutoScalingGroup",
        "ASG",
        json!({
            "VpcId": vpc_id,
            "LaunchTemplate": {
                "LaunchTemplateId": reference("LaunchTemplate"),
                "Version": attribute("LaunchTemplate", "LatestVersionNumber"),
            },
            "MinSize": min,
            "MaxSize": max,
            "DesiredCapacity": desired,
            "TargetGroupARNs": [reference("TargetGroup")],
        }),
    );

    let scaling = ResourceDescriptor::new(
        "AWS::AutoScaling::ScalingPolicy",
        "CpuScaling",
        json!({
            "AutoScalingGroupName": reference("ASG"),
            "PolicyType": "TargetTrackingScaling",
            "Cooldown": SCALING_COOLDOWN_SECS,
            "TargetTrackingConfiguration": {
                "PredefinedMetricSpecification": {
                    "PredefinedMetricType": "ASGAverageCPUUtilization"
                },
                "TargetValue": TARGET_CPU_PERCENT,
            },
        }),
    );

    Ok(Synthesized::new()
        .resource(lb_sg)
        .resource(instance_sg)
        .resource(launch_template)
        .resource(load_balancer)
        .resource(target_group)
        .resource(listener)
        .resource(asg)
        .resource(scaling)
        .output("loadBalancerDns", deferred(inputs, "loadBalancerDns")))
}
