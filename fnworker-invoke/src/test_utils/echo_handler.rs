//! EchoHandler — returns its first argument.

use crate::context::InvocationContext;
use crate::handler::{Arguments, BoxFuture, FunctionHandler, Signature};
use crate::value::BindingValue;
use fnworker_proto::HandlerError;

/// A handler that returns its first argument unchanged and copies every
/// argument into the output binding of the same name.
pub struct EchoHandler {
    signature: Signature,
}

impl EchoHandler {
    /// Echo with the given parameter names. The handler always returns.
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signature: Signature::new(parameters).returning(),
        }
    }
}

impl FunctionHandler for EchoHandler {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call<'a>(
        &'a self,
        mut args: Arguments,
        ctx: &'a mut InvocationContext,
    ) -> BoxFuture<'a, Result<Option<BindingValue>, HandlerError>> {
        Box::pin(async move {
            for (name, value) in args.iter() {
                ctx.set_output(name, value.clone());
            }
            Ok(Some(args.take(0)))
        })
    }
}
