//! Output binding: collect what the handler wrote and render it for the
//! wire.

use crate::context::InvocationContext;
use crate::definition::FunctionDefinition;
use crate::value::BindingValue;
use fnworker_proto::{BindingDescriptor, ParameterBinding, WireValue, WorkerError};

/// Collects declared outputs from a finished invocation.
pub trait OutputBinder: Send + Sync {
    /// Render every declared out / in-out binding, in declared order.
    fn collect(
        &self,
        ctx: &InvocationContext,
        definition: &FunctionDefinition,
    ) -> Result<Vec<ParameterBinding>, WorkerError>;

    /// Render the return value, if the function declares a return binding.
    fn collect_return(
        &self,
        ctx: &InvocationContext,
        definition: &FunctionDefinition,
    ) -> Result<Option<WireValue>, WorkerError>;
}

/// Reads outputs by binding name and renders them using each binding's
/// shape hint. Outputs the handler never wrote are reported as null.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredOutputBinder;

fn render(binding: &BindingDescriptor, value: Option<&BindingValue>) -> Result<WireValue, WorkerError> {
    let Some(value) = value else {
        return Ok(WireValue::Null);
    };
    value
        .to_wire(binding.data_shape)
        .map_err(|reason| WorkerError::ConversionFailure {
            binding: binding.name.clone(),
            target_type: binding
                .data_shape
                .map_or_else(|| binding.binding_type.clone(), |shape| shape.to_string()),
            reason,
        })
}

impl OutputBinder for DeclaredOutputBinder {
    fn collect(
        &self,
        ctx: &InvocationContext,
        definition: &FunctionDefinition,
    ) -> Result<Vec<ParameterBinding>, WorkerError> {
        definition
            .outputs
            .iter()
            .map(|binding| {
                let data = render(binding, ctx.output(&binding.name))?;
                Ok(ParameterBinding::new(binding.name.clone(), data))
            })
            .collect()
    }

    fn collect_return(
        &self,
        ctx: &InvocationContext,
        definition: &FunctionDefinition,
    ) -> Result<Option<WireValue>, WorkerError> {
        definition
            .return_binding
            .as_ref()
            .map(|binding| render(binding, ctx.return_value()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextFactory, DefaultContextFactory};
    use crate::http::HttpResponseData;
    use fnworker_proto::{DataShape, Direction, InvocationRequest, RETURN_BINDING_NAME};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn context(bindings: Vec<BindingDescriptor>) -> InvocationContext {
        let def = FunctionDefinition::new("F1", "Out", "App.Out.Run", bindings).unwrap();
        DefaultContextFactory::default()
            .create(&InvocationRequest::new("i1", "F1"), Arc::new(def), CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn missing_outputs_are_null() {
        let ctx = context(vec![
            BindingDescriptor::new("a", "queue", Direction::Out),
            BindingDescriptor::new("b", "blob", Direction::Out).with_shape(DataShape::Binary),
        ]);
        let mut ctx = ctx;
        ctx.set_output("b", "payload");

        let outputs = DeclaredOutputBinder.collect(&ctx, &ctx.definition().clone()).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].name, "a");
        assert!(outputs[0].data.is_null());
        assert_eq!(outputs[1].data, WireValue::Bytes(b"payload".to_vec()));
    }

    #[test]
    fn undeclared_outputs_are_ignored() {
        let mut ctx = context(vec![BindingDescriptor::new("a", "queue", Direction::Out)]);
        ctx.set_output("stray", "x");
        let outputs = DeclaredOutputBinder.collect(&ctx, &ctx.definition().clone()).unwrap();
        assert_eq!(outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn return_value_renders_only_when_declared() {
        let mut ctx = context(vec![BindingDescriptor::new(RETURN_BINDING_NAME, "http", Direction::Out)]);
        let def = ctx.definition().clone();
        assert_eq!(DeclaredOutputBinder.collect_return(&ctx, &def).unwrap(), Some(WireValue::Null));

        ctx.set_return_value(HttpResponseData::new(202).into());
        let rendered = DeclaredOutputBinder.collect_return(&ctx, &def).unwrap().unwrap();
        let WireValue::Http(http) = rendered else {
            panic!("expected http, got {rendered:?}");
        };
        assert_eq!(http.status_code.as_deref(), Some("202"));

        let plain = context(vec![BindingDescriptor::new("q", "queueTrigger", Direction::In)]);
        let def = plain.definition().clone();
        assert_eq!(DeclaredOutputBinder.collect_return(&plain, &def).unwrap(), None);
    }

    #[test]
    fn unrenderable_output_is_a_conversion_failure() {
        let mut ctx = context(vec![BindingDescriptor::new("a", "queue", Direction::Out)]);
        ctx.set_output("a", BindingValue::custom(5u8));
        let err = DeclaredOutputBinder
            .collect(&ctx, &ctx.definition().clone())
            .unwrap_err();
        assert!(matches!(err, WorkerError::ConversionFailure { ref binding, .. } if binding == "a"));
    }
}
