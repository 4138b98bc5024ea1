//! Stack nodes and their builders
//!
//! A stack declares typed input and output slots and owns a builder that
//! turns resolved inputs into resource descriptors and output values.

use crate::error::{SpecError, SynthesisError};
use crate::types::{SlotDecl, SlotSpec, SlotType, Synthesized, Value};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds the contents of a stack from its resolved inputs
///
/// Builders must be pure: the same inputs always give the same
/// [`Synthesized`] result. Plans rely on this to stay reproducible.
///
/// # Example
///
/// ```
/// use stackgraph::{Inputs, StackBuilder, Synthesized, Value};
///
/// #[derive(Debug)]
/// struct Bucket;
///
/// impl StackBuilder for Bucket {
///     fn references(&self) -> Vec<String> {
///         vec!["bucketName".into()]
///     }
///
///     fn build(&self, inputs: &Inputs<'_>) -> anyhow::Result<Synthesized> {
///         let name = inputs.text("bucketName")?;
///         Ok(Synthesized::new().output("arn", Value::String(format!("arn:aws:s3:::{name}"))))
///     }
/// }
/// ```
pub trait StackBuilder: Send + Sync + fmt::Debug {
    /// Names of the inputs this builder reads
    ///
    /// Checked against the stack's input slots when the stack is declared.
    fn references(&self) -> Vec<String>;

    /// Produce resources and output values
    fn build(&self, inputs: &Inputs<'_>) -> Result<Synthesized>;
}

/// Builder backed by a closure
pub struct FnBuilder<F> {
    references: Vec<String>,
    build: F,
}

impl<F> fmt::Debug for FnBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBuilder")
            .field("references", &self.references)
            .finish_non_exhaustive()
    }
}

impl<F> StackBuilder for FnBuilder<F>
where
    F: Fn(&Inputs<'_>) -> Result<Synthesized> + Send + Sync,
{
    fn references(&self) -> Vec<String> {
        self.references.clone()
    }

    fn build(&self, inputs: &Inputs<'_>) -> Result<Synthesized> {
        (self.build)(inputs)
    }
}

/// Wrap a closure as a [`StackBuilder`] reading the given inputs
pub fn builder_fn<F>(references: &[&str], build: F) -> FnBuilder<F>
where
    F: Fn(&Inputs<'_>) -> Result<Synthesized> + Send + Sync,
{
    FnBuilder {
        references: references.iter().map(|r| (*r).to_string()).collect(),
        build,
    }
}

/// Build a [`SlotSpec`] from a fixed list of entries
pub fn slots<const N: usize>(entries: [(&str, SlotDecl); N]) -> SlotSpec {
    entries
        .into_iter()
        .map(|(name, decl)| (name.to_string(), decl))
        .collect()
}

/// Resolved inputs handed to a builder
#[derive(Debug)]
pub struct Inputs<'a> {
    stack: &'a str,
    declared: &'a SlotSpec,
    values: &'a BTreeMap<String, Value>,
}

impl<'a> Inputs<'a> {
    pub fn new(
        stack: &'a str,
        declared: &'a SlotSpec,
        values: &'a BTreeMap<String, Value>,
    ) -> Self {
        Self {
            stack,
            declared,
            values,
        }
    }

    /// Id of the stack being built
    pub fn stack(&self) -> &str {
        self.stack
    }

    /// Value of an input that must be present
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.optional(name)?.ok_or_else(|| {
            anyhow::anyhow!("input '{}.{}' has no value", self.stack, name)
        })
    }

    /// Value of an input that may be unbound
    pub fn optional(&self, name: &str) -> Result<Option<&Value>> {
        if !self.declared.contains_key(name) {
            return Err(SpecError::UndeclaredInput {
                stack: self.stack.to_string(),
                input: name.to_string(),
            }
            .into());
        }
        Ok(self.values.get(name))
    }

    /// Display form of an input, deferred tokens included
    pub fn text(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.to_string())
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        self.get(name)?
            .as_integer()
            .ok_or_else(|| anyhow::anyhow!("input '{}.{}' is not an integer", self.stack, name))
    }

    /// All resolved values
    pub fn values(&self) -> &BTreeMap<String, Value> {
        self.values
    }
}

/// A named, independently deployable unit of infrastructure
#[derive(Debug, Clone)]
pub struct StackNode {
    id: String,
    inputs: SlotSpec,
    outputs: SlotSpec,
    builder: Arc<dyn StackBuilder>,
}

impl StackNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &SlotSpec {
        &self.inputs
    }

    pub fn outputs(&self) -> &SlotSpec {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&SlotDecl> {
        self.inputs.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&SlotDecl> {
        self.outputs.get(name)
    }

    /// Run the builder and check its outputs against the declared slots
    pub fn build(&self, values: &BTreeMap<String, Value>) -> Result<Synthesized, SynthesisError> {
        let inputs = Inputs::new(&self.id, &self.inputs, values);
        let synthesized = self.builder.build(&inputs).map_err(|e| {
            match e.downcast::<SpecError>() {
                Ok(spec) => SynthesisError::Spec(spec),
                Err(e) => SynthesisError::Build {
                    stack: self.id.clone(),
                    message: format!("{e:#}"),
                },
            }
        })?;

        self.check_outputs(&synthesized)?;
        Ok(synthesized)
    }

    fn check_outputs(&self, synthesized: &Synthesized) -> Result<(), SpecError> {
        for (name, decl) in &self.outputs {
            let value = synthesized
                .outputs
                .get(name)
                .ok_or_else(|| SpecError::MissingOutput {
                    stack: self.id.clone(),
                    output: name.clone(),
                })?;
            if value.ty() != decl.ty {
                return Err(SpecError::OutputType {
                    stack: self.id.clone(),
                    output: name.clone(),
                    expected: decl.ty,
                    found: value.ty(),
                });
            }
        }

        if let Some(name) = synthesized
            .outputs
            .keys()
            .find(|name| !self.outputs.contains_key(*name))
        {
            return Err(SpecError::UndeclaredOutput {
                stack: self.id.clone(),
                output: name.clone(),
            });
        }
        Ok(())
    }
}

/// Declare a stack
///
/// Fails if `id` is blank, if the builder references an input missing from
/// `inputs`, or if a literal input default does not fit its slot.
/// Duplicate ids are caught when the node is added to a graph.
pub fn declare(
    id: impl Into<String>,
    inputs: SlotSpec,
    outputs: SlotSpec,
    builder: impl StackBuilder + 'static,
) -> Result<StackNode, SpecError> {
    let id = id.into();
    if id.trim().is_empty() {
        return Err(SpecError::EmptyId);
    }

    for reference in builder.references() {
        if !inputs.contains_key(&reference) {
            return Err(SpecError::UndeclaredInput {
                stack: id,
                input: reference,
            });
        }
    }

    for (name, decl) in &inputs {
        if let Some(default) = &decl.default {
            check_default(&id, name, decl.ty, default)?;
        }
    }

    Ok(StackNode {
        id,
        inputs,
        outputs,
        builder: Arc::new(builder),
    })
}

fn check_default(stack: &str, input: &str, ty: SlotType, default: &Value) -> Result<(), SpecError> {
    let reason = if default.is_deferred() {
        Some("provisioned outputs cannot be used as defaults".to_string())
    } else if default.ty() != ty {
        Some(format!("got a {}", default.ty()))
    } else {
        default.check().err()
    };

    match reason {
        Some(reason) => Err(SpecError::DefaultType {
            stack: stack.to_string(),
            input: input.to_string(),
            expected: ty,
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResourceDescriptor, Token};

    fn network_builder() -> impl StackBuilder {
        builder_fn(&["cidr"], |inputs| {
            Ok(Synthesized::new()
                .resource(ResourceDescriptor::new(
                    "AWS::EC2::VPC",
                    "VPC",
                    serde_json::json!({ "CidrBlock": inputs.text("cidr")? }),
                ))
                .output(
                    "vpcId",
                    Value::Deferred(Token::new(inputs.stack(), "vpcId", SlotType::String)),
                ))
        })
    }

    fn network() -> StackNode {
        declare(
            "Network",
            slots([(
                "cidr",
                SlotDecl::with_default(SlotType::Cidr, Value::Cidr("10.0.0.0/16".into())),
            )]),
            slots([("vpcId", SlotDecl::required(SlotType::String))]),
            network_builder(),
        )
        .unwrap()
    }

    #[test]
    fn test_declare_rejects_empty_id() {
        let err = declare(" ", SlotSpec::new(), SlotSpec::new(), builder_fn(&[], |_| {
            Ok(Synthesized::new())
        }))
        .unwrap_err();
        assert_eq!(err, SpecError::EmptyId);
    }

    #[test]
    fn test_declare_rejects_undeclared_reference() {
        let err = declare("Network", SlotSpec::new(), SlotSpec::new(), network_builder())
            .unwrap_err();
        assert_eq!(
            err,
            SpecError::UndeclaredInput {
                stack: "Network".into(),
                input: "cidr".into()
            }
        );
    }

    #[test]
    fn test_declare_rejects_mistyped_default() {
        let err = declare(
            "Network",
            slots([(
                "cidr",
                SlotDecl::with_default(SlotType::Cidr, Value::Integer(16)),
            )]),
            SlotSpec::new(),
            network_builder(),
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::DefaultType { .. }));
    }

    #[test]
    fn test_declare_rejects_malformed_default() {
        let err = declare(
            "Network",
            slots([(
                "cidr",
                SlotDecl::with_default(SlotType::Cidr, Value::Cidr("10.0.0.0".into())),
            )]),
            SlotSpec::new(),
            network_builder(),
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::DefaultType { .. }));
    }

    #[test]
    fn test_build_produces_declared_outputs() {
        let node = network();
        let values = BTreeMap::from([("cidr".to_string(), Value::Cidr("10.1.0.0/16".into()))]);
        let synthesized = node.build(&values).unwrap();

        assert_eq!(synthesized.resources.len(), 1);
        assert_eq!(
            synthesized.resources[0].properties["CidrBlock"],
            serde_json::json!("10.1.0.0/16")
        );
        assert_eq!(synthesized.outputs["vpcId"].to_string(), "${Network.vpcId}");
    }

    #[test]
    fn test_build_detects_missing_output() {
        let node = declare(
            "Empty",
            SlotSpec::new(),
            slots([("vpcId", SlotDecl::required(SlotType::String))]),
            builder_fn(&[], |_| Ok(Synthesized::new())),
        )
        .unwrap();
        let err = node.build(&BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::Spec(SpecError::MissingOutput {
                stack: "Empty".into(),
                output: "vpcId".into()
            })
        );
    }

    #[test]
    fn test_build_detects_wrong_output_type() {
        let node = declare(
            "Counter",
            SlotSpec::new(),
            slots([("count", SlotDecl::required(SlotType::Integer))]),
            builder_fn(&[], |_| {
                Ok(Synthesized::new().output("count", Value::String("2".into())))
            }),
        )
        .unwrap();
        assert!(matches!(
            node.build(&BTreeMap::new()).unwrap_err(),
            SynthesisError::Spec(SpecError::OutputType { .. })
        ));
    }

    #[test]
    fn test_build_rejects_undeclared_output() {
        let node = declare(
            "Extra",
            SlotSpec::new(),
            SlotSpec::new(),
            builder_fn(&[], |_| Ok(Synthesized::new().output("x", Value::Boolean(true)))),
        )
        .unwrap();
        assert!(matches!(
            node.build(&BTreeMap::new()).unwrap_err(),
            SynthesisError::Spec(SpecError::UndeclaredOutput { .. })
        ));
    }

    #[test]
    fn test_reading_undeclared_input_at_build_time() {
        // references() says nothing, but the closure still reaches for "ghost"
        let node = declare(
            "Sneaky",
            SlotSpec::new(),
            SlotSpec::new(),
            builder_fn(&[], |inputs| {
                inputs.get("ghost")?;
                Ok(Synthesized::new())
            }),
        )
        .unwrap();
        assert_eq!(
            node.build(&BTreeMap::new()).unwrap_err(),
            SynthesisError::Spec(SpecError::UndeclaredInput {
                stack: "Sneaky".into(),
                input: "ghost".into()
            })
        );
    }

    #[test]
    fn test_builder_error_is_reported_with_stack() {
        let node = declare(
            "Broken",
            SlotSpec::new(),
            SlotSpec::new(),
            builder_fn(&[], |_| anyhow::bail!("no capacity")),
        )
        .unwrap();
        assert_eq!(
            node.build(&BTreeMap::new()).unwrap_err(),
            SynthesisError::Build {
                stack: "Broken".into(),
                message: "no capacity".into()
            }
        );
    }
}
