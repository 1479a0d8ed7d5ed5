// ABOUTME: Runtime value system with polymorphic operation dispatch

use crate::ast::Stmt;
use crate::env::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::eval::{exec_stmt, Flow};
use crate::native::NativeFunction;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Three-valued boolean. Only `True` takes the then-branch of conditionals
/// and loops; `False` and `Indeterminate` both behave as false there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tribool {
    True,
    False,
    Indeterminate,
}

impl Tribool {
    pub fn is_true(self) -> bool {
        self == Tribool::True
    }
}

impl From<bool> for Tribool {
    fn from(b: bool) -> Self {
        if b {
            Tribool::True
        } else {
            Tribool::False
        }
    }
}

impl fmt::Display for Tribool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tribool::True => write!(f, "true"),
            Tribool::False => write!(f, "false"),
            Tribool::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// A bound function parameter. The default, when present, was evaluated at
/// definition time and is reused across calls.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Value>,
}

/// A user-defined first-class function: display name, parameters with
/// evaluated defaults, the minimum number of arguments a call must supply,
/// and the body shared with every clone of this definition.
#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub min_args: usize,
    pub body: Rc<Stmt>,
}

impl FunctionValue {
    /// Validates that every parameter following the first defaulted one is
    /// itself defaulted, and derives the minimum argument count.
    pub fn new(name: String, parameters: Vec<Parameter>, body: Rc<Stmt>) -> Result<Self> {
        let mut min_args = 0;
        while min_args < parameters.len() && parameters[min_args].default.is_none() {
            min_args += 1;
        }
        for parameter in &parameters[min_args..] {
            if parameter.default.is_none() {
                return Err(Error::new(ErrorKind::MissingDefaultArgument {
                    function: name,
                    parameter: parameter.name.clone(),
                }));
            }
        }
        Ok(FunctionValue {
            name,
            parameters,
            min_args,
            body,
        })
    }

    /// Calls the function: checks the arity window, pushes a local frame,
    /// binds positional arguments then remaining defaults, and runs the
    /// body. A return signal collapses into the call's result; falling off
    /// the end yields none. The frame is popped on every exit path.
    pub fn call(&self, ctx: &mut Context, args: Vec<Value>) -> Result<Value> {
        if args.len() < self.min_args {
            return Err(Error::new(ErrorKind::NotEnoughArguments {
                function: self.name.clone(),
                expected: self.min_args,
                received: args.len(),
            }));
        }
        if args.len() > self.parameters.len() {
            return Err(Error::new(ErrorKind::TooManyArguments {
                function: self.name.clone(),
                expected: self.parameters.len(),
                received: args.len(),
            }));
        }

        ctx.push_frame();
        let result = self.invoke(ctx, args);
        ctx.pop_frame();
        result
    }

    fn invoke(&self, ctx: &mut Context, args: Vec<Value>) -> Result<Value> {
        let given = args.len();
        for (parameter, arg) in self.parameters.iter().zip(args) {
            ctx.set_local_value(parameter.name.clone(), arg);
        }
        for parameter in &self.parameters[given..] {
            // Construction guarantees a default exists from min_args on.
            let default = parameter.default.clone().unwrap_or(Value::None);
            ctx.set_local_value(parameter.name.clone(), default);
        }

        match exec_stmt(&self.body, ctx)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
        }
    }
}

/// Stable identifier for a value's runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    None,
    Int,
    Float,
    Bool,
    Str,
    Array,
    Function,
    Native,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "none",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Str => "string",
            ValueType::Array => "array",
            ValueType::Function => "function",
            ValueType::Native => "native function",
        }
    }
}

/// A Vanilla runtime value.
///
/// Arrays are shared by handle so subscript assignment is visible through
/// every reference; function and native-function values are immutable and
/// shared outright.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Int(BigInt),
    Float(BigDecimal),
    Bool(Tribool),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<FunctionValue>),
    Native(Rc<NativeFunction>),
}

/// True when the decimal has no fractional digits once trailing zeros are
/// stripped.
fn is_integer_valued(d: &BigDecimal) -> bool {
    d.normalized().as_bigint_and_exponent().1 <= 0
}

fn format_float(d: &BigDecimal) -> String {
    d.normalized().to_string()
}

impl Value {
    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::Str(_) => ValueType::Str,
            Value::Array(_) => ValueType::Array,
            Value::Function(_) => ValueType::Function,
            Value::Native(_) => ValueType::Native,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Copies the value. Scalars always produce fresh values; arrays clone
    /// their element list (sharing element identities) unless `deep`, in
    /// which case elements are copied recursively. Function values are
    /// shared by reference either way.
    pub fn copy(&self, deep: bool) -> Value {
        match self {
            Value::None => Value::None,
            Value::Int(n) => Value::Int(n.clone()),
            Value::Float(d) => Value::Float(d.clone()),
            Value::Bool(b) => Value::Bool(*b),
            Value::Str(s) => Value::Str(s.clone()),
            Value::Array(a) => {
                if deep {
                    let copies = a.borrow().iter().map(|v| v.copy(true)).collect();
                    Value::array(copies)
                } else {
                    Value::array(a.borrow().clone())
                }
            }
            Value::Function(f) => Value::Function(Rc::clone(f)),
            Value::Native(f) => Value::Native(Rc::clone(f)),
        }
    }

    // ===== Conversions =====

    /// Renders the value as text. Defined for every variant; non-scalar
    /// values without a natural rendering use the `<type object @ addr>`
    /// form.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::None => "none".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(d) => format_float(d),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
            Value::Array(a) => format!("<array object @ {:p}>", Rc::as_ptr(a)),
            Value::Function(f) => format!("<function '{}'>", f.name),
            Value::Native(f) => {
                format!("<native function '{}' from '{}'>", f.name(), f.library())
            }
        }
    }

    pub fn to_string_value(&self) -> Value {
        Value::Str(self.to_display_string())
    }

    pub fn to_int(&self) -> Result<Value> {
        match self {
            Value::Int(n) => Ok(Value::Int(n.clone())),
            _ => Err(Error::bad_cast(self, "int")),
        }
    }

    pub fn to_float(&self) -> Result<Value> {
        match self {
            Value::Int(n) => Ok(Value::Float(BigDecimal::from(n.clone()))),
            Value::Float(d) => Ok(Value::Float(d.clone())),
            _ => Err(Error::bad_cast(self, "float")),
        }
    }

    pub fn to_bool(&self) -> Result<Tribool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(Error::bad_cast(self, "bool")),
        }
    }

    // ===== Unary operations =====

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Int(n) => Ok(Value::Int(-n.clone())),
            Value::Float(d) => Ok(Value::Float(-d.clone())),
            _ => Err(Error::bad_unary("-", self)),
        }
    }

    pub fn abs(&self) -> Result<Value> {
        match self {
            Value::Int(n) => Ok(Value::Int(n.abs())),
            Value::Float(d) => Ok(Value::Float(d.abs())),
            _ => Err(Error::bad_unary("+", self)),
        }
    }

    // ===== Arithmetic =====

    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(BigDecimal::from(a.clone()) + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + BigDecimal::from(b.clone()))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            _ => Err(Error::bad_binary("+", self, other)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(BigDecimal::from(a.clone()) - b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - BigDecimal::from(b.clone()))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            _ => Err(Error::bad_binary("-", self, other)),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(BigDecimal::from(a.clone()) * b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a * BigDecimal::from(b.clone()))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            _ => Err(Error::bad_binary("*", self, other)),
        }
    }

    /// Division always operates in float space; int/int in particular is
    /// promoted rather than truncated.
    pub fn div(&self, other: &Value) -> Result<Value> {
        let (a, b) = match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                (BigDecimal::from(a.clone()), BigDecimal::from(b.clone()))
            }
            (Value::Int(a), Value::Float(b)) => (BigDecimal::from(a.clone()), b.clone()),
            (Value::Float(a), Value::Int(b)) => (a.clone(), BigDecimal::from(b.clone())),
            (Value::Float(a), Value::Float(b)) => (a.clone(), b.clone()),
            _ => return Err(Error::bad_binary("/", self, other)),
        };
        if b.is_zero() {
            return Err(Error::new(ErrorKind::DivisionByZero));
        }
        Ok(Value::Float(a / b))
    }

    // ===== Relational =====

    fn numeric_ordering(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => Some(BigDecimal::from(a.clone()).cmp(b)),
            (Value::Float(a), Value::Int(b)) => Some(a.cmp(&BigDecimal::from(b.clone()))),
            (Value::Float(a), Value::Float(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn lt(&self, other: &Value) -> Result<Value> {
        self.numeric_ordering(other)
            .map(|o| Value::Bool(Tribool::from(o.is_lt())))
            .ok_or_else(|| Error::bad_binary("<", self, other))
    }

    pub fn le(&self, other: &Value) -> Result<Value> {
        self.numeric_ordering(other)
            .map(|o| Value::Bool(Tribool::from(o.is_le())))
            .ok_or_else(|| Error::bad_binary("<=", self, other))
    }

    pub fn gt(&self, other: &Value) -> Result<Value> {
        self.numeric_ordering(other)
            .map(|o| Value::Bool(Tribool::from(o.is_gt())))
            .ok_or_else(|| Error::bad_binary(">", self, other))
    }

    pub fn ge(&self, other: &Value) -> Result<Value> {
        self.numeric_ordering(other)
            .map(|o| Value::Bool(Tribool::from(o.is_ge())))
            .ok_or_else(|| Error::bad_binary(">=", self, other))
    }

    // ===== Equality =====

    /// Equality is defined between numbers only. An int equals a float
    /// exactly when the float is integer-valued and numerically identical.
    fn numeric_equality(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a == b),
            (Value::Int(a), Value::Float(b)) => {
                Some(is_integer_valued(b) && BigDecimal::from(a.clone()) == *b)
            }
            (Value::Float(a), Value::Int(b)) => {
                Some(is_integer_valued(a) && *a == BigDecimal::from(b.clone()))
            }
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            _ => None,
        }
    }

    pub fn eq(&self, other: &Value) -> Result<Value> {
        self.numeric_equality(other)
            .map(|b| Value::Bool(Tribool::from(b)))
            .ok_or_else(|| Error::bad_binary("==", self, other))
    }

    pub fn neq(&self, other: &Value) -> Result<Value> {
        self.numeric_equality(other)
            .map(|b| Value::Bool(Tribool::from(!b)))
            .ok_or_else(|| Error::bad_binary("!=", self, other))
    }

    // ===== Other binary operations =====

    /// String concatenation: the right operand is converted to its string
    /// form first.
    pub fn concat(&self, other: &Value) -> Result<Value> {
        match self {
            Value::Str(s) => {
                let mut result = s.clone();
                result.push_str(&other.to_display_string());
                Ok(Value::Str(result))
            }
            _ => Err(Error::bad_binary("~", self, other)),
        }
    }

    // ===== Call =====

    pub fn call(&self, ctx: &mut Context, args: Vec<Value>) -> Result<Value> {
        match self {
            Value::Function(f) => f.call(ctx, args),
            Value::Native(f) => f.call(&args),
            _ => Err(Error::not_callable(self)),
        }
    }

    // ===== Subscripting =====

    pub fn subscript_get(&self, index: &Value) -> Result<Value> {
        match self {
            Value::Array(a) => {
                let elements = a.borrow();
                let i = array_index(index, elements.len())?;
                Ok(elements[i].clone())
            }
            _ => Err(Error::unsupported(self, "subscript")),
        }
    }

    pub fn subscript_set(&self, index: &Value, value: Value) -> Result<()> {
        match self {
            Value::Array(a) => {
                let mut elements = a.borrow_mut();
                let i = array_index(index, elements.len())?;
                elements[i] = value;
                Ok(())
            }
            _ => Err(Error::unsupported(self, "subscript assign")),
        }
    }

    // ===== Element selection =====

    pub fn element_get(&self, name: &str) -> Result<Value> {
        match self {
            Value::Array(a) => match name {
                "length" => Ok(Value::Int(BigInt::from(a.borrow().len()))),
                _ => Err(Error::unsupported(self, element_operation(name))),
            },
            Value::Int(n) => match name {
                "int" => Ok(Value::Int(n.clone())),
                "float" => Ok(Value::Float(BigDecimal::from(n.clone()))),
                "string" => Ok(self.to_string_value()),
                "sqrt" => BigDecimal::from(n.clone())
                    .sqrt()
                    .map(Value::Float)
                    .ok_or_else(|| Error::bad_unary("sqrt", self)),
                _ => Err(Error::unsupported(self, element_operation(name))),
            },
            _ => Err(Error::unsupported(self, element_operation(name))),
        }
    }

    pub fn element_set(&self, name: &str, _value: Value) -> Result<()> {
        Err(Error::unsupported(
            self,
            format!("element assign '{}'", name),
        ))
    }
}

fn element_operation(name: &str) -> String {
    format!("element selection '{}'", name)
}

/// Coerces a subscript value to a usable array index: the value must be an
/// int (`bad-cast` otherwise) and in `[0, len)` (`invalid-index` otherwise).
fn array_index(index: &Value, len: usize) -> Result<usize> {
    let converted = index.to_int()?;
    let i = match &converted {
        Value::Int(n) => n.to_usize(),
        _ => None,
    };
    i.filter(|i| *i < len)
        .ok_or_else(|| Error::new(ErrorKind::InvalidIndex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn int(n: i64) -> Value {
        Value::Int(BigInt::from(n))
    }

    fn float(text: &str) -> Value {
        Value::Float(BigDecimal::from_str(text).unwrap())
    }

    fn string(s: &str) -> Value {
        Value::Str(s.to_string())
    }

    #[test]
    fn test_int_arithmetic_stays_int() {
        let result = int(2).add(&int(3)).unwrap();
        assert_eq!(result.to_display_string(), "5");
        assert_eq!(result.type_name(), "int");

        assert_eq!(int(2).mul(&int(3)).unwrap().to_display_string(), "6");
        assert_eq!(int(2).sub(&int(3)).unwrap().to_display_string(), "-1");
    }

    #[test]
    fn test_int_division_always_yields_float() {
        let result = int(1).div(&int(2)).unwrap();
        assert_eq!(result.type_name(), "float");
        assert_eq!(result.to_display_string(), "0.5");
    }

    #[test]
    fn test_division_by_zero() {
        let err = int(1).div(&int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        let result = int(2).add(&float("0.5")).unwrap();
        assert_eq!(result.type_name(), "float");
        assert_eq!(result.to_display_string(), "2.5");

        let result = float("2.5").mul(&int(2)).unwrap();
        assert_eq!(result.to_display_string(), "5");
    }

    #[test]
    fn test_arithmetic_type_errors() {
        let err = int(1).add(&string("x")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadBinary { operation: "+", .. }));

        let err = string("x").mul(&int(2)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadBinary { operation: "*", .. }));
    }

    #[test]
    fn test_relational_operators() {
        assert!(matches!(
            int(1).lt(&int(2)).unwrap(),
            Value::Bool(Tribool::True)
        ));
        assert!(matches!(
            int(3).le(&float("2.5")).unwrap(),
            Value::Bool(Tribool::False)
        ));
        assert!(matches!(
            float("2.5").gt(&int(2)).unwrap(),
            Value::Bool(Tribool::True)
        ));
        assert!(matches!(
            string("a").lt(&string("b")),
            Err(Error {
                kind: ErrorKind::BadBinary { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_int_float_equality_requires_integer_valued_float() {
        assert!(matches!(
            int(2).eq(&float("2.0")).unwrap(),
            Value::Bool(Tribool::True)
        ));
        assert!(matches!(
            int(2).eq(&float("2.5")).unwrap(),
            Value::Bool(Tribool::False)
        ));
        assert!(matches!(
            float("2.5").neq(&int(2)).unwrap(),
            Value::Bool(Tribool::True)
        ));
    }

    #[test]
    fn test_non_numeric_equality_is_bad_binary() {
        let err = string("a").eq(&string("a")).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::BadBinary { operation: "==", .. }
        ));
    }

    #[test]
    fn test_concat_converts_right_operand() {
        assert_eq!(
            string("foo").concat(&string("bar")).unwrap().to_display_string(),
            "foobar"
        );
        assert_eq!(
            string("n = ").concat(&int(5)).unwrap().to_display_string(),
            "n = 5"
        );
        assert!(int(5).concat(&string("x")).is_err());
    }

    #[test]
    fn test_unary_operations() {
        assert_eq!(int(5).neg().unwrap().to_display_string(), "-5");
        assert_eq!(int(-5).abs().unwrap().to_display_string(), "5");
        assert_eq!(float("-2.5").abs().unwrap().to_display_string(), "2.5");
        assert!(string("x").neg().is_err());
    }

    #[test]
    fn test_to_bool_only_defined_on_bool() {
        assert_eq!(
            Value::Bool(Tribool::Indeterminate).to_bool().unwrap(),
            Tribool::Indeterminate
        );
        let err = int(1).to_bool().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadCast { target: "bool", .. }));
    }

    #[test]
    fn test_int_to_float_round_trip_preserves_value() {
        let n = Value::Int(BigInt::from_str("123456789012345678901234567890").unwrap());
        let f = n.to_float().unwrap();
        assert_eq!(f.to_display_string(), "123456789012345678901234567890");
    }

    #[test]
    fn test_copy_preserves_type() {
        let values = [
            int(1),
            float("0.5"),
            string("s"),
            Value::None,
            Value::Bool(Tribool::True),
            Value::array(vec![int(1)]),
        ];
        for value in values {
            assert_eq!(value.copy(false).value_type(), value.value_type());
            assert_eq!(value.copy(true).value_type(), value.value_type());
        }
    }

    #[test]
    fn test_shallow_array_copy_shares_elements() {
        let inner = Value::array(vec![int(1)]);
        let outer = Value::array(vec![inner.clone()]);
        let copy = outer.copy(false);

        // Mutating the shared inner array is visible through the copy.
        inner.subscript_set(&int(0), int(99)).unwrap();
        let seen = copy.subscript_get(&int(0)).unwrap();
        assert_eq!(
            seen.subscript_get(&int(0)).unwrap().to_display_string(),
            "99"
        );
    }

    #[test]
    fn test_deep_array_copy_detaches_elements() {
        let inner = Value::array(vec![int(1)]);
        let outer = Value::array(vec![inner.clone()]);
        let copy = outer.copy(true);

        inner.subscript_set(&int(0), int(99)).unwrap();
        let seen = copy.subscript_get(&int(0)).unwrap();
        assert_eq!(seen.subscript_get(&int(0)).unwrap().to_display_string(), "1");
    }

    #[test]
    fn test_subscript_bounds() {
        let array = Value::array(vec![int(10), int(20)]);
        assert_eq!(
            array.subscript_get(&int(1)).unwrap().to_display_string(),
            "20"
        );
        assert_eq!(
            array.subscript_get(&int(2)).unwrap_err().kind,
            ErrorKind::InvalidIndex
        );
        assert_eq!(
            array.subscript_get(&int(-1)).unwrap_err().kind,
            ErrorKind::InvalidIndex
        );
        assert!(matches!(
            array.subscript_get(&string("x")).unwrap_err().kind,
            ErrorKind::BadCast { target: "int", .. }
        ));
    }

    #[test]
    fn test_array_length_attribute() {
        let array = Value::array(vec![int(1), int(2), int(3)]);
        assert_eq!(
            array.element_get("length").unwrap().to_display_string(),
            "3"
        );
        assert!(array.element_get("size").is_err());
    }

    #[test]
    fn test_element_assignment_is_rejected_everywhere() {
        // No type supports element assignment; `length` stays read-only.
        let array = Value::array(vec![int(1)]);
        let err = array.element_set("length", int(9)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Unsupported { .. }));

        let err = int(5).element_set("string", string("five")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Unsupported { .. }));

        // The array is untouched.
        assert_eq!(
            array.element_get("length").unwrap().to_display_string(),
            "1"
        );
    }

    #[test]
    fn test_int_attributes() {
        let n = int(9);
        assert_eq!(n.element_get("int").unwrap().type_name(), "int");
        assert_eq!(n.element_get("float").unwrap().type_name(), "float");
        assert_eq!(n.element_get("string").unwrap().to_display_string(), "9");
        match n.element_get("sqrt").unwrap() {
            Value::Float(d) => {
                let x = d.to_f64().unwrap();
                assert!((x - 3.0).abs() < 1e-9);
            }
            other => panic!("Expected float, got {}", other.type_name()),
        }
        assert!(n.element_get("cbrt").is_err());
    }

    #[test]
    fn test_scalar_to_string_forms() {
        assert_eq!(Value::None.to_display_string(), "none");
        assert_eq!(Value::Bool(Tribool::Indeterminate).to_display_string(), "indeterminate");
        assert_eq!(int(-7).to_display_string(), "-7");
        assert_eq!(float("0.5").to_display_string(), "0.5");
    }

    #[test]
    fn test_array_default_string_form() {
        let array = Value::array(vec![]);
        let text = array.to_display_string();
        assert!(text.starts_with("<array object @ "));
        assert!(text.ends_with('>'));
    }

    #[test]
    fn test_missing_default_argument_is_rejected() {
        let body = Rc::new(Stmt::new(crate::ast::StmtKind::Sequence(Vec::new()), 0, 0));
        let err = FunctionValue::new(
            "f".to_string(),
            vec![
                Parameter {
                    name: "a".to_string(),
                    default: Some(Value::None),
                },
                Parameter {
                    name: "b".to_string(),
                    default: None,
                },
            ],
            body,
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MissingDefaultArgument {
                function: "f".to_string(),
                parameter: "b".to_string()
            }
        );
    }

    #[test]
    fn test_min_args_derivation() {
        let body = Rc::new(Stmt::new(crate::ast::StmtKind::Sequence(Vec::new()), 0, 0));
        let f = FunctionValue::new(
            "f".to_string(),
            vec![
                Parameter {
                    name: "a".to_string(),
                    default: None,
                },
                Parameter {
                    name: "b".to_string(),
                    default: Some(Value::None),
                },
            ],
            body,
        )
        .unwrap();
        assert_eq!(f.min_args, 1);
        assert_eq!(f.parameters.len(), 2);
    }

    #[test]
    fn test_calling_a_non_callable_value() {
        let mut ctx = Context::new();
        let err = int(42).call(&mut ctx, Vec::new()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotCallable { .. }));
    }
}
