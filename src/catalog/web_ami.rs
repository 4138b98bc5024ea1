//! Single web server instance used to bake the web tier AMI

use super::{InputDef, Template, attribute, deferred, reference};
use anyhow::Result;
use serde_json::json;
use stackgraph::{Inputs, ResourceDescriptor, SlotType, Synthesized};

pub static TEMPLATE: Template = Template {
    name: "web-ami",
    description: "Web server instance built from S3 sources, ready to be imaged",
    inputs: &[
        InputDef::linked("vpcId", SlotType::String),
        InputDef::setting("keyName", SlotType::String, "instance_key_pair_name"),
        InputDef {
            name: "instanceType",
            ty: SlotType::InstanceType,
            setting: None,
            default: Some("t2.micro"),
            optional: true,
        },
        InputDef::setting(
            "sourceCodeBucketName",
            SlotType::String,
            "source_code_bucket_name",
        ),
    ],
    outputs: &["instanceId", "availabilityZone", "publicDns", "publicIp"],
    build,
};

const LATEST_AMI_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2";
const SIGNAL_TIMEOUT: &str = "PT15M";
const FALLBACK_INSTANCE_TYPE: &str = "t2.micro";

/// Boot script installing the web tier from `bucket` and serving it with nginx
fn user_data(bucket: &str) -> String {
    format!(
        "#!/bin/bash
export HOME=~
curl -o- https://raw.githubusercontent.com/nvm-sh/nvm/v0.38.0/install.sh | bash
source ~/.bashrc
nvm install 16
nvm use 16
cd ~/
aws s3 cp s3://{bucket}/web-tier/ web-tier --recursive
cd ~/web-tier
npm install
npm run build
mkdir /var/www /var/www/html /var/www/html/web-tier
cp -r ~/web-tier/build /var/www/html/web-tier/
sudo amazon-linux-extras install nginx1 -y
cd /etc/nginx
sudo rm nginx.conf
sudo aws s3 cp s3://{bucket}/nginx.conf .
sudo service nginx restart
chown -R ec2-user /var/www/html/web-tier
chmod -R 755 /var/www/html/web-tier
sudo chkconfig nginx on
"
    )
}

fn build(inputs: &Inputs<'_>) -> Result<Synthesized> {
    let bucket = inputs.text("sourceCodeBucketName")?;
    let instance_type = inputs
        .optional("instanceType")?
        .map_or_else(|| FALLBACK_INSTANCE_TYPE.to_string(), ToString::to_string);

    let security_group = ResourceDescriptor::new(
        "AWS::EC2::SecurityGroup",
        "SecurityGroup",
        json!({
            "VpcId": inputs.text("vpcId")?,
            "GroupDescription": "Enable SSH and HTTP access",
            "SecurityGroupIngress": [
                { "IpProtocol": "tcp", "FromPort": 22, "ToPort": 22, "CidrIp": "0.0.0.0/0" },
                { "IpProtocol": "tcp", "FromPort": 80, "ToPort": 80, "CidrIp": "0.0.0.0/0" },
            ],
        }),
    );

    let role = ResourceDescriptor::new(
        "AWS::IAM::Role",
        "S3AccessRole",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "ec2.amazonaws.com" },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": ["arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess"],
        }),
    );

    let profile = ResourceDescriptor::new(
        "AWS::IAM::InstanceProfile",
        "InstanceProfile",
        json!({ "Roles": [reference("S3AccessRole")] }),
    );

    let instance = ResourceDescriptor::new(
        "AWS::EC2::Instance",
        "EC2Instance",
        json!({
            "ImageId": format!("{{{{resolve:ssm:{LATEST_AMI_PARAMETER}}}}}"),
            "InstanceType": instance_type,
            "KeyName": inputs.text("keyName")?,
            "SecurityGroupIds": [attribute("SecurityGroup", "GroupId")],
            "IamInstanceProfile": reference("InstanceProfile"),
            "UserData": user_data(&bucket),
            "Tags": [{ "Key": "Name", "Value": "WebServerInstance" }],
            "CreationPolicy": {
                "ResourceSignal": { "Count": 1, "Timeout": SIGNAL_TIMEOUT }
            },
        }),
    );

    let mut out = Synthesized::new()
        .resource(security_group)
        .resource(role)
        .resource(profile)
        .resource(instance);
    for output in TEMPLATE.outputs {
        out = out.output(*output, deferred(inputs, output));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgraph::{SlotDecl, SlotSpec, Value};
    use std::collections::BTreeMap;

    fn build_with(instance_type: Option<&str>) -> Synthesized {
        let declared: SlotSpec = TEMPLATE
            .inputs
            .iter()
            .map(|i| (i.name.to_string(), SlotDecl::optional(i.ty)))
            .collect();
        let mut values = BTreeMap::from([
            ("vpcId".to_string(), Value::String("vpc-1".into())),
            ("keyName".to_string(), Value::String("key".into())),
            ("sourceCodeBucketName".to_string(), Value::String("my-src".into())),
        ]);
        if let Some(ty) = instance_type {
            values.insert("instanceType".into(), Value::InstanceType(ty.into()));
        }
        build(&Inputs::new("Ami", &declared, &values)).unwrap()
    }

    fn instance(out: &Synthesized) -> &serde_json::Value {
        &out
            .resources
            .iter()
            .find(|r| r.kind == "AWS::EC2::Instance")
            .unwrap()
            .properties
    }

    #[test]
    fn test_user_data_uses_bucket() {
        let out = build_with(None);
        let script = instance(&out)["UserData"].as_str().unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("aws s3 cp s3://my-src/web-tier/ web-tier --recursive"));
        assert!(script.contains("s3://my-src/nginx.conf"));
    }

    #[test]
    fn test_instance_type_falls_back() {
        assert_eq!(instance(&build_with(None))["InstanceType"], "t2.micro");
        assert_eq!(instance(&build_with(Some("m5.large")))["InstanceType"], "m5.large");
    }

    #[test]
    fn test_signal_and_outputs() {
        let out = build_with(None);
        assert_eq!(
            instance(&out)["CreationPolicy"]["ResourceSignal"]["Timeout"],
            "PT15M"
        );
        assert_eq!(
            instance(&out)["ImageId"],
            "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}"
        );
        assert_eq!(out.outputs.len(), 4);
        assert_eq!(out.outputs["publicIp"].to_string(), "${Ami.publicIp}");
    }
}
