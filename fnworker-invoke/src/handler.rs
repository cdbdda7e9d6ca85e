//! Object-safe user handlers.
//!
//! A [`FunctionHandler`] declares its [`Signature`] up front so the
//! registry can check it against the function's bindings once, at load
//! time. Calls receive converted arguments in declared order plus the
//! invocation context.

use crate::context::InvocationContext;
use crate::value::BindingValue;
use fnworker_proto::HandlerError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The shape of a handler as the registry sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Parameter names, in call order.
    pub parameters: Vec<String>,
    /// Whether the handler produces a return value.
    pub returns: bool,
}

impl Signature {
    /// A signature taking `parameters` and returning nothing.
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            returns: false,
        }
    }

    /// Mark the handler as returning a value.
    pub fn returning(mut self) -> Self {
        self.returns = true;
        self
    }
}

/// Converted arguments, in the handler's declared parameter order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<(String, BindingValue)>,
}

impl Arguments {
    /// Wrap named values.
    pub fn new(values: Vec<(String, BindingValue)>) -> Self {
        Self { values }
    }

    /// Argument at `index`.
    pub fn get(&self, index: usize) -> Option<&BindingValue> {
        self.values.get(index).map(|(_, v)| v)
    }

    /// Argument bound to parameter `name`, ignoring ASCII case.
    pub fn by_name(&self, name: &str) -> Option<&BindingValue> {
        self.values.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    /// Move the argument at `index` out, leaving [`BindingValue::Absent`].
    pub fn take(&mut self, index: usize) -> BindingValue {
        self.values
            .get_mut(index)
            .map(|(_, v)| std::mem::take(v))
            .unwrap_or_default()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(parameter, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindingValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// A callable entry point.
pub trait FunctionHandler: Send + Sync {
    /// Declared parameters and return.
    fn signature(&self) -> &Signature;

    /// Run the handler. Output bindings are written through `ctx`; the
    /// returned value feeds the `$return` binding.
    fn call<'a>(
        &'a self,
        args: Arguments,
        ctx: &'a mut InvocationContext,
    ) -> BoxFuture<'a, Result<Option<BindingValue>, HandlerError>>;
}

/// A handler backed by a closure. Built by [`handler_fn`].
pub struct FnHandler<F> {
    signature: Signature,
    f: F,
}

/// Wrap a closure as a [`FunctionHandler`].
///
/// The closure returns a boxed future so it may borrow the context:
///
/// ```
/// use fnworker_invoke::{BindingValue, Signature, handler_fn};
/// use fnworker_proto::HandlerError;
///
/// let handler = handler_fn(Signature::new(["name"]).returning(), |args, _ctx| {
///     Box::pin(async move {
///         let name = args.get(0).and_then(|v| v.as_str()).unwrap_or("world");
///         let greeting = BindingValue::from(format!("hello {name}"));
///         Ok::<_, HandlerError>(Some(greeting))
///     })
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F>(signature: Signature, f: F) -> FnHandler<F>
where
    F: for<'a> Fn(Arguments, &'a mut InvocationContext) -> BoxFuture<'a, Result<Option<BindingValue>, HandlerError>>
        + Send
        + Sync,
{
    FnHandler { signature, f }
}

impl<F> FunctionHandler for FnHandler<F>
where
    F: for<'a> Fn(Arguments, &'a mut InvocationContext) -> BoxFuture<'a, Result<Option<BindingValue>, HandlerError>>
        + Send
        + Sync,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call<'a>(
        &'a self,
        args: Arguments,
        ctx: &'a mut InvocationContext,
    ) -> BoxFuture<'a, Result<Option<BindingValue>, HandlerError>> {
        (self.f)(args, ctx)
    }
}
