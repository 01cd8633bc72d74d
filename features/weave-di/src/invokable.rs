use std::{any::type_name, fmt::Debug, rc::Rc, sync::OnceLock};

use regex::Regex;

use crate::{
    errors::{ConfigError, InjectError},
    types::{DynError, Injectable, Instance},
};

/// Body of an invokable function, called with its resolved dependencies
pub type InvokeFn = dyn Fn(Invocation) -> Result<Instance, DynError>;

/// A function together with the information needed to inject it
///
/// Dependency names are taken from (in order of priority):
/// 1. an explicit `$inject` list attached with [`Invokable::with_inject`]
/// 2. the array form `[name1, name2, .., impl]` built with [`Invokable::array`]
/// 3. the declared parameter list given to [`Invokable::declared`]
#[derive(Clone)]
pub struct Invokable {
    inject: Option<Vec<String>>,
    form: Form,
    body: Rc<InvokeFn>,
}

#[derive(Clone, Debug)]
enum Form {
    Array(Vec<String>),
    Declared(String),
}

impl Invokable {
    /// A function without dependencies
    pub fn new(body: impl Fn(Invocation) -> Result<Instance, DynError> + 'static) -> Self {
        Self::array(Vec::<String>::new(), body)
    }

    /// A function whose dependencies are parsed from its declared parameters,
    /// e.g. `"function(a, b)"`, `"|a, b|"` or just `"a, b"`
    pub fn declared(
        signature: impl Into<String>,
        body: impl Fn(Invocation) -> Result<Instance, DynError> + 'static,
    ) -> Self {
        Invokable {
            inject: None,
            form: Form::Declared(signature.into()),
            body: Rc::new(body),
        }
    }

    /// The `[name1, name2, .., impl]` form
    pub fn array<I, S>(
        names: I,
        body: impl Fn(Invocation) -> Result<Instance, DynError> + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invokable {
            inject: None,
            form: Form::Array(names.into_iter().map(Into::into).collect()),
            body: Rc::new(body),
        }
    }

    /// Attaches an explicit dependency list, which always wins over the other forms
    pub fn with_inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inject = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the dependency names of this function
    pub fn annotate(&self, strict: bool) -> Result<Vec<String>, ConfigError> {
        let names = match (&self.inject, &self.form) {
            (Some(inject), _) => inject.clone(),
            (None, Form::Array(names)) => names.clone(),
            (None, Form::Declared(signature)) => {
                if strict {
                    return Err(ConfigError::StrictAnnotation(signature.clone()));
                }
                parse_declared(signature)
            }
        };

        for name in &names {
            validate_token(name)?;
        }
        Ok(names)
    }

    pub(crate) fn call(&self, invocation: Invocation) -> Result<Instance, DynError> {
        (self.body)(invocation)
    }
}

impl Debug for Invokable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invokable")
            .field("inject", &self.inject)
            .field("form", &self.form)
            .finish()
    }
}

/// Arguments handed to an [`Invokable`] body
pub struct Invocation {
    /// The `this` value the function is called with
    pub context: Option<Instance>,
    /// Resolved dependencies, in annotation order
    pub args: Vec<Instance>,
}

impl Invocation {
    pub fn instance(&self, index: usize) -> Result<&Instance, InjectError> {
        self.args
            .get(index)
            .ok_or(InjectError::MissingArgument { index })
    }

    /// Downcasts the argument at `index`
    pub fn arg<T: Injectable>(&self, index: usize) -> Result<Rc<T>, InjectError> {
        self.instance(index)?
            .downcast::<T>()
            .map_err(|actual_type| InjectError::DowncastFailed {
                name: format!("argument {index}"),
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    pub fn context<T: Injectable>(&self) -> Option<Rc<T>> {
        self.context.as_ref()?.downcast::<T>().ok()
    }
}

fn validate_token(token: &str) -> Result<(), ConfigError> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidToken(token.to_string()));
    }
    Ok(())
}

fn parse_declared(signature: &str) -> Vec<String> {
    static FN_ARGS: OnceLock<Regex> = OnceLock::new();
    static STRIP_COMMENTS: OnceLock<Regex> = OnceLock::new();

    let fn_args = FN_ARGS.get_or_init(|| {
        Regex::new(r"^[^(|]*[(|]([^)|]*)[)|]").expect("parameter list pattern is valid")
    });
    let strip_comments = STRIP_COMMENTS.get_or_init(|| {
        Regex::new(r"(?m)(//.*$)|(?s:/\*.*?\*/)").expect("comment pattern is valid")
    });

    let source = strip_comments.replace_all(signature, "");
    let params = match fn_args.captures(&source) {
        Some(captures) => captures.get(1).map_or("", |m| m.as_str()),
        None => &*source,
    };

    params
        .split(',')
        .map(str::trim)
        .filter(|param| !param.is_empty())
        .map(strip_underscores)
        .collect()
}

/// `_name_` is the private spelling of `name`
fn strip_underscores(param: &str) -> String {
    match param
        .strip_prefix('_')
        .and_then(|rest| rest.strip_suffix('_'))
    {
        Some(inner) if !inner.is_empty() => inner.to_string(),
        _ => param.to_string(),
    }
}
