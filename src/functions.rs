//! Functions module: defines built-in filter functions.
//!
//! This module provides the FilterFunction trait, a registry, and the process-wide builtin
//! registry that `Expression::Function` nodes are resolved against at evaluation time.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use geo::Area;

use crate::convert;
use crate::types::Value;

pub trait FilterFunction: Send + Sync {
    /// Returns `None` when the function has no value for these arguments.
    fn call(&self, args: &[Value]) -> Option<Value>;
}

/// Functions keyed by case-insensitive name.
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn FilterFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self { functions: HashMap::new() }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: FilterFunction + 'static,
    {
        self.functions.insert(name.into().to_lowercase(), Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FilterFunction>> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FunctionRegistry {
    fn clone(&self) -> Self {
        Self {
            functions: self.functions.clone(),
        }
    }
}

/// The shared registry of builtin functions.
pub fn builtins() -> &'static FunctionRegistry {
    static BUILTINS: OnceLock<FunctionRegistry> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        let mut reg = FunctionRegistry::new();
        register_builtins(&mut reg);
        reg
    })
}

fn string_arg(args: &[Value], i: usize) -> Option<String> {
    match args.get(i)? {
        Value::Null => None,
        v => Some(v.to_string()),
    }
}

macro_rules! builtin_functions {
    ($( $name:ident: $func_name:expr, $args:ident => $body:block ),* $(,)?) => {
        $(
            pub struct $name;
            impl FilterFunction for $name {
                fn call(&self, $args: &[Value]) -> Option<Value> $body
            }
        )*
        pub fn register_builtins(reg: &mut FunctionRegistry) {
            $(reg.register($func_name, $name);)*
        }
    };
}

builtin_functions! {
    StrToUpperCase: "strToUpperCase", args => {
        string_arg(args, 0).map(|s| Value::String(s.to_uppercase()))
    },
    StrToLowerCase: "strToLowerCase", args => {
        string_arg(args, 0).map(|s| Value::String(s.to_lowercase()))
    },
    StrLength: "strLength", args => {
        string_arg(args, 0).and_then(|s| i32::try_from(s.chars().count()).ok()).map(Value::Int)
    },
    StrConcat: "strConcat", args => {
        let mut s = string_arg(args, 0)?;
        s.push_str(&string_arg(args, 1)?);
        Some(Value::String(s))
    },
    Abs: "abs", args => {
        match args.first()? {
            Value::Byte(n) => n.checked_abs().map(Value::Byte),
            Value::Short(n) => n.checked_abs().map(Value::Short),
            Value::Int(n) => n.checked_abs().map(Value::Int),
            Value::Long(n) => n.checked_abs().map(Value::Long),
            Value::Float(n) => Some(Value::Float(n.abs())),
            Value::Double(n) => Some(Value::Double(n.abs())),
            other => match convert::to_number(other)? {
                convert::Number::Integer(n) => n.checked_abs().map(Value::Long),
                convert::Number::Decimal(d) => Some(Value::Double(d.abs())),
            },
        }
    },
    GeometryArea: "area", args => {
        convert::to_geometry(args.first()?).map(|g| Value::Double(g.unsigned_area()))
    },
    GeometryEnvelope: "envelope", args => {
        convert::to_envelope(args.first()?).map(Value::Envelope)
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, Rect};

    #[test]
    fn test_register_and_call() {
        let mut reg = FunctionRegistry::new();
        reg.register("strLength", StrLength);
        let result = reg.get("strlength").unwrap().call(&[Value::from("hello")]);
        assert_eq!(result, Some(Value::Int(5)));
        assert!(reg.get("upper").is_none());
    }

    #[test]
    fn test_builtins_are_registered() {
        for name in ["strToUpperCase", "strToLowerCase", "strLength", "strConcat", "abs", "area", "envelope"] {
            assert!(builtins().contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn test_string_functions() {
        let upper = builtins().get("strToUpperCase").unwrap();
        assert_eq!(upper.call(&[Value::from("hello")]), Some(Value::from("HELLO")));
        assert_eq!(upper.call(&[Value::Null]), None);
        let concat = builtins().get("strConcat").unwrap();
        assert_eq!(concat.call(&[Value::from("ab"), Value::Int(1)]), Some(Value::from("ab1")));
        assert_eq!(concat.call(&[Value::from("ab")]), None);
    }

    #[test]
    fn test_abs_keeps_width() {
        let abs = builtins().get("abs").unwrap();
        assert_eq!(abs.call(&[Value::Int(-3)]), Some(Value::Int(3)));
        assert_eq!(abs.call(&[Value::Double(-2.5)]), Some(Value::Double(2.5)));
        assert_eq!(abs.call(&[Value::from("-4")]), Some(Value::Long(4)));
        assert_eq!(abs.call(&[Value::from("x")]), None);
    }

    #[test]
    fn test_geometry_functions() {
        let square = Value::from("POLYGON((0 0, 2 0, 2 2, 0 2, 0 0))");
        assert_eq!(builtins().get("area").unwrap().call(&[square.clone()]), Some(Value::Double(4.0)));
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 2.0 });
        assert_eq!(builtins().get("envelope").unwrap().call(&[square]), Some(Value::Envelope(env)));
    }
}
