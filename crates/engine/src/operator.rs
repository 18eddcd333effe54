//! Atomic update operators
//!
//! An update payload field is either a plain value or a deferred `Operator`,
//! modeled as the `Patch` sum type so the two can never be conflated. An
//! operator resolves against the attribute's *current persisted value* (or
//! its schema default, or the per-kind null seed) into a concrete value
//! before validation and persistence. Callers and callbacks only ever see
//! the resolved value, never the operator token.
//!
//! Arithmetic clamps are sign-aware: a `max` bound caps the result only when
//! the unclamped result exceeds it, so multiplying by a negative factor is
//! never floored up to the bound.

use docket_core::{datetime, Attribute, AttributeKind, DatabaseError, Result, Value};
use std::cmp::Ordering;

/// One field of an update payload
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Overwrite the attribute with a concrete value
    Set(Value),
    /// Resolve an operator against the current value server-side
    Apply(Operator),
}

impl Patch {
    pub fn set(value: impl Into<Value>) -> Self {
        Patch::Set(value.into())
    }
}

impl From<Value> for Patch {
    fn from(value: Value) -> Self {
        Patch::Set(value)
    }
}

impl From<Operator> for Patch {
    fn from(operator: Operator) -> Self {
        Patch::Apply(operator)
    }
}

/// Predicates accepted by `arrayFilter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayPredicate {
    Equals,
    NotEquals,
    NotNull,
    GreaterThan,
    LessThan,
}

/// Deferred, server-resolved mutation expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Increment { by: Value, max: Option<Value> },
    Decrement { by: Value, min: Option<Value> },
    Multiply { factor: Value, max: Option<Value> },
    Divide { divisor: Value, min: Option<Value> },
    Modulo { divisor: Value },
    Power { exponent: Value, max: Option<Value> },
    Concat { value: String },
    Replace { search: String, replace: String },
    ArrayAppend { values: Vec<Value> },
    ArrayPrepend { values: Vec<Value> },
    ArrayInsert { index: usize, value: Value },
    ArrayRemove { value: Value },
    ArrayUnique,
    ArrayIntersect { values: Vec<Value> },
    ArrayDiff { values: Vec<Value> },
    ArrayFilter { predicate: ArrayPredicate, operand: Value },
    Toggle,
    DateAddDays { days: i64 },
    DateSubDays { days: i64 },
    DateSetNow,
}

impl Operator {
    pub fn increment(by: impl Into<Value>) -> Self {
        Operator::Increment { by: by.into(), max: None }
    }

    pub fn increment_max(by: impl Into<Value>, max: impl Into<Value>) -> Self {
        Operator::Increment { by: by.into(), max: Some(max.into()) }
    }

    pub fn decrement(by: impl Into<Value>) -> Self {
        Operator::Decrement { by: by.into(), min: None }
    }

    pub fn decrement_min(by: impl Into<Value>, min: impl Into<Value>) -> Self {
        Operator::Decrement { by: by.into(), min: Some(min.into()) }
    }

    pub fn multiply(factor: impl Into<Value>) -> Self {
        Operator::Multiply { factor: factor.into(), max: None }
    }

    pub fn multiply_max(factor: impl Into<Value>, max: impl Into<Value>) -> Self {
        Operator::Multiply { factor: factor.into(), max: Some(max.into()) }
    }

    pub fn divide(divisor: impl Into<Value>) -> Self {
        Operator::Divide { divisor: divisor.into(), min: None }
    }

    pub fn divide_min(divisor: impl Into<Value>, min: impl Into<Value>) -> Self {
        Operator::Divide { divisor: divisor.into(), min: Some(min.into()) }
    }

    pub fn modulo(divisor: impl Into<Value>) -> Self {
        Operator::Modulo { divisor: divisor.into() }
    }

    pub fn power(exponent: impl Into<Value>) -> Self {
        Operator::Power { exponent: exponent.into(), max: None }
    }

    pub fn power_max(exponent: impl Into<Value>, max: impl Into<Value>) -> Self {
        Operator::Power { exponent: exponent.into(), max: Some(max.into()) }
    }

    pub fn concat(value: impl Into<String>) -> Self {
        Operator::Concat { value: value.into() }
    }

    pub fn replace(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Operator::Replace { search: search.into(), replace: replace.into() }
    }

    pub fn array_append(values: Vec<Value>) -> Self {
        Operator::ArrayAppend { values }
    }

    pub fn array_prepend(values: Vec<Value>) -> Self {
        Operator::ArrayPrepend { values }
    }

    pub fn array_insert(index: usize, value: impl Into<Value>) -> Self {
        Operator::ArrayInsert { index, value: value.into() }
    }

    pub fn array_remove(value: impl Into<Value>) -> Self {
        Operator::ArrayRemove { value: value.into() }
    }

    pub fn array_unique() -> Self {
        Operator::ArrayUnique
    }

    pub fn array_intersect(values: Vec<Value>) -> Self {
        Operator::ArrayIntersect { values }
    }

    pub fn array_diff(values: Vec<Value>) -> Self {
        Operator::ArrayDiff { values }
    }

    pub fn array_filter(predicate: ArrayPredicate, operand: impl Into<Value>) -> Self {
        Operator::ArrayFilter { predicate, operand: operand.into() }
    }

    pub fn toggle() -> Self {
        Operator::Toggle
    }

    pub fn date_add_days(days: i64) -> Self {
        Operator::DateAddDays { days }
    }

    pub fn date_sub_days(days: i64) -> Self {
        Operator::DateSubDays { days }
    }

    pub fn date_set_now() -> Self {
        Operator::DateSetNow
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Increment { .. } => "increment",
            Operator::Decrement { .. } => "decrement",
            Operator::Multiply { .. } => "multiply",
            Operator::Divide { .. } => "divide",
            Operator::Modulo { .. } => "modulo",
            Operator::Power { .. } => "power",
            Operator::Concat { .. } => "concat",
            Operator::Replace { .. } => "replace",
            Operator::ArrayAppend { .. } => "arrayAppend",
            Operator::ArrayPrepend { .. } => "arrayPrepend",
            Operator::ArrayInsert { .. } => "arrayInsert",
            Operator::ArrayRemove { .. } => "arrayRemove",
            Operator::ArrayUnique => "arrayUnique",
            Operator::ArrayIntersect { .. } => "arrayIntersect",
            Operator::ArrayDiff { .. } => "arrayDiff",
            Operator::ArrayFilter { .. } => "arrayFilter",
            Operator::Toggle => "toggle",
            Operator::DateAddDays { .. } => "dateAddDays",
            Operator::DateSubDays { .. } => "dateSubDays",
            Operator::DateSetNow => "dateSetNow",
        }
    }

    /// Resolve this operator against the current value of `attribute`
    ///
    /// `current` is the persisted value; pass `Value::Null` when the
    /// attribute is absent and has no default. The result still has to pass
    /// schema validation before persistence.
    pub fn apply(&self, attribute: &Attribute, current: &Value) -> Result<Value> {
        match self {
            Operator::Increment { by, max } => {
                self.arithmetic(attribute, current, by, max.as_ref(), Bound::Max, |a, b| {
                    a.checked_add(b)
                }, |a, b| a + b)
            }
            Operator::Decrement { by, min } => {
                self.arithmetic(attribute, current, by, min.as_ref(), Bound::Min, |a, b| {
                    a.checked_sub(b)
                }, |a, b| a - b)
            }
            Operator::Multiply { factor, max } => {
                self.arithmetic(attribute, current, factor, max.as_ref(), Bound::Max, |a, b| {
                    a.checked_mul(b)
                }, |a, b| a * b)
            }
            Operator::Divide { divisor, min } => {
                if divisor.as_number() == Some(0.0) {
                    return Err(DatabaseError::Operator(format!(
                        "Cannot divide by zero on field '{}'",
                        attribute.key
                    )));
                }
                self.arithmetic(attribute, current, divisor, min.as_ref(), Bound::Min, |a, b| {
                    a.checked_div(b)
                }, |a, b| a / b)
            }
            Operator::Modulo { divisor } => {
                if divisor.as_number() == Some(0.0) {
                    return Err(DatabaseError::Operator(format!(
                        "Cannot compute modulo by zero on field '{}'",
                        attribute.key
                    )));
                }
                self.arithmetic(attribute, current, divisor, None, Bound::Max, |a, b| {
                    a.checked_rem(b)
                }, |a, b| a % b)
            }
            Operator::Power { exponent, max } => self.power_of(attribute, current, exponent, max.as_ref()),

            Operator::Concat { value } => {
                let base = self.string_base(attribute, current)?;
                Ok(Value::String(format!("{base}{value}")))
            }
            Operator::Replace { search, replace } => {
                let base = self.string_base(attribute, current)?;
                if search.is_empty() {
                    return Ok(Value::String(base));
                }
                Ok(Value::String(base.replace(search.as_str(), replace)))
            }

            Operator::ArrayAppend { values } => {
                let mut items = self.array_base(attribute, current)?;
                items.extend(values.iter().cloned());
                Ok(Value::Array(items))
            }
            Operator::ArrayPrepend { values } => {
                let items = self.array_base(attribute, current)?;
                let mut result = values.clone();
                result.extend(items);
                Ok(Value::Array(result))
            }
            Operator::ArrayInsert { index, value } => {
                let mut items = self.array_base(attribute, current)?;
                if *index > items.len() {
                    return Err(DatabaseError::Operator(format!(
                        "index {index} is out of bounds for array of length {}",
                        items.len()
                    )));
                }
                items.insert(*index, value.clone());
                Ok(Value::Array(items))
            }
            Operator::ArrayRemove { value } => {
                let mut items = self.array_base(attribute, current)?;
                items.retain(|item| item != value);
                Ok(Value::Array(items))
            }
            Operator::ArrayUnique => {
                let items = self.array_base(attribute, current)?;
                let mut unique: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                Ok(Value::Array(unique))
            }
            Operator::ArrayIntersect { values } => {
                let mut items = self.array_base(attribute, current)?;
                items.retain(|item| values.contains(item));
                Ok(Value::Array(items))
            }
            Operator::ArrayDiff { values } => {
                let mut items = self.array_base(attribute, current)?;
                items.retain(|item| !values.contains(item));
                Ok(Value::Array(items))
            }
            Operator::ArrayFilter { predicate, operand } => {
                let mut items = self.array_base(attribute, current)?;
                items.retain(|item| match predicate {
                    ArrayPredicate::Equals => item == operand,
                    ArrayPredicate::NotEquals => item != operand,
                    ArrayPredicate::NotNull => !item.is_null(),
                    ArrayPredicate::GreaterThan => {
                        docket_core::value::compare(item, operand) == Ordering::Greater
                    }
                    ArrayPredicate::LessThan => {
                        docket_core::value::compare(item, operand) == Ordering::Less
                    }
                });
                Ok(Value::Array(items))
            }

            Operator::Toggle => {
                if attribute.array || !matches!(attribute.kind, AttributeKind::Boolean) {
                    return Err(self.type_mismatch(attribute, "non-boolean"));
                }
                Ok(Value::Bool(!current.as_bool().unwrap_or(false)))
            }

            Operator::DateAddDays { days } => self.date_shift(attribute, current, *days),
            Operator::DateSubDays { days } => self.date_shift(attribute, current, -days),
            Operator::DateSetNow => {
                self.datetime_kind(attribute)?;
                Ok(Value::String(datetime::format_utc(&datetime::now())))
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared resolution helpers
    // ------------------------------------------------------------------

    fn type_mismatch(&self, attribute: &Attribute, expected: &str) -> DatabaseError {
        DatabaseError::Operator(format!(
            "Cannot apply {} operator to {expected} field '{}'",
            self.name(),
            attribute.key
        ))
    }

    /// Integer or float arithmetic with an optional directional bound
    #[allow(clippy::too_many_arguments)]
    fn arithmetic(
        &self,
        attribute: &Attribute,
        current: &Value,
        operand: &Value,
        bound: Option<&Value>,
        direction: Bound,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        if attribute.array || !attribute.kind.is_numeric() {
            return Err(self.type_mismatch(attribute, "non-numeric"));
        }

        match attribute.kind {
            AttributeKind::Integer { .. } => {
                let base = match current {
                    Value::Null => 0,
                    other => other.as_int().ok_or_else(|| self.type_mismatch(attribute, "non-numeric"))?,
                };
                let operand = operand.as_int().ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "{} operator on integer field '{}' requires an integer operand",
                        self.name(),
                        attribute.key
                    ))
                })?;
                let result = int_op(base, operand).ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "Integer overflow applying {} operator to field '{}'",
                        self.name(),
                        attribute.key
                    ))
                })?;
                let clamped = match bound {
                    Some(limit) => {
                        let limit = limit.as_int().ok_or_else(|| {
                            DatabaseError::Operator(format!(
                                "{} bound on integer field '{}' must be an integer",
                                self.name(),
                                attribute.key
                            ))
                        })?;
                        match direction {
                            Bound::Max => result.min(limit),
                            Bound::Min => result.max(limit),
                        }
                    }
                    None => result,
                };
                Ok(Value::Int(clamped))
            }
            _ => {
                let base = match current {
                    Value::Null => 0.0,
                    other => other.as_number().ok_or_else(|| self.type_mismatch(attribute, "non-numeric"))?,
                };
                let operand = operand.as_number().ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "{} operator on field '{}' requires a numeric operand",
                        self.name(),
                        attribute.key
                    ))
                })?;
                let result = float_op(base, operand);
                let clamped = match bound.and_then(Value::as_number) {
                    Some(limit) => match direction {
                        Bound::Max => result.min(limit),
                        Bound::Min => result.max(limit),
                    },
                    None => result,
                };
                Ok(Value::Float(clamped))
            }
        }
    }

    fn power_of(
        &self,
        attribute: &Attribute,
        current: &Value,
        exponent: &Value,
        max: Option<&Value>,
    ) -> Result<Value> {
        if attribute.array || !attribute.kind.is_numeric() {
            return Err(self.type_mismatch(attribute, "non-numeric"));
        }

        match attribute.kind {
            AttributeKind::Integer { .. } => {
                let base = match current {
                    Value::Null => 0,
                    other => other.as_int().ok_or_else(|| self.type_mismatch(attribute, "non-numeric"))?,
                };
                let exp = exponent.as_int().filter(|e| *e >= 0).ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "power operator on integer field '{}' requires a non-negative integer exponent",
                        attribute.key
                    ))
                })?;
                let exp = u32::try_from(exp).map_err(|_| {
                    DatabaseError::Operator(format!(
                        "power exponent too large for field '{}'",
                        attribute.key
                    ))
                })?;
                let result = base.checked_pow(exp).ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "Integer overflow applying power operator to field '{}'",
                        attribute.key
                    ))
                })?;
                let clamped = match max.and_then(Value::as_int) {
                    Some(limit) => result.min(limit),
                    None => result,
                };
                Ok(Value::Int(clamped))
            }
            _ => {
                let base = match current {
                    Value::Null => 0.0,
                    other => other.as_number().ok_or_else(|| self.type_mismatch(attribute, "non-numeric"))?,
                };
                let exp = exponent.as_number().ok_or_else(|| {
                    DatabaseError::Operator(format!(
                        "power operator on field '{}' requires a numeric exponent",
                        attribute.key
                    ))
                })?;
                let result = base.powf(exp);
                let clamped = match max.and_then(Value::as_number) {
                    Some(limit) => result.min(limit),
                    None => result,
                };
                Ok(Value::Float(clamped))
            }
        }
    }

    fn string_base(&self, attribute: &Attribute, current: &Value) -> Result<String> {
        if attribute.array || !matches!(attribute.kind, AttributeKind::String { .. }) {
            return Err(self.type_mismatch(attribute, "non-string"));
        }
        match current {
            Value::Null => Ok(String::new()),
            other => other
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.type_mismatch(attribute, "non-string")),
        }
    }

    fn array_base(&self, attribute: &Attribute, current: &Value) -> Result<Vec<Value>> {
        if !attribute.array {
            return Err(self.type_mismatch(attribute, "non-array"));
        }
        match current {
            Value::Null => Ok(Vec::new()),
            other => other
                .as_array()
                .map(<[Value]>::to_vec)
                .ok_or_else(|| self.type_mismatch(attribute, "non-array")),
        }
    }

    fn datetime_kind(&self, attribute: &Attribute) -> Result<()> {
        if attribute.array || !matches!(attribute.kind, AttributeKind::Datetime) {
            return Err(self.type_mismatch(attribute, "non-datetime"));
        }
        Ok(())
    }

    fn date_shift(&self, attribute: &Attribute, current: &Value, days: i64) -> Result<Value> {
        self.datetime_kind(attribute)?;
        // An absent datetime shifts from now, matching dateSetNow semantics.
        let base = match current {
            Value::Null => datetime::format_utc(&datetime::now()),
            other => other
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.type_mismatch(attribute, "non-datetime"))?,
        };
        let parsed = datetime::parse(&base).map_err(|_| {
            DatabaseError::Operator(format!(
                "Cannot apply {} operator to invalid datetime on field '{}'",
                self.name(),
                attribute.key
            ))
        })?;
        let shifted = parsed + chrono::Duration::days(days);
        Ok(Value::String(datetime::format(&shifted)))
    }
}

enum Bound {
    Max,
    Min,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_attr() -> Attribute {
        Attribute::integer("count")
    }

    fn float_attr() -> Attribute {
        Attribute::float("score")
    }

    fn string_attr() -> Attribute {
        Attribute::string("name", 64)
    }

    fn array_attr() -> Attribute {
        Attribute::string("tags", 64).as_array()
    }

    fn date_attr() -> Attribute {
        Attribute::datetime("due")
    }

    // === Arithmetic ===

    #[test]
    fn test_increment_defaults_null_to_zero() {
        let result = Operator::increment(3i64).apply(&int_attr(), &Value::Null).unwrap();
        assert_eq!(result, Value::Int(3));
    }

    #[test]
    fn test_increment_clamps_at_max() {
        let op = Operator::increment_max(3i64, 7i64);
        let result = op.apply(&int_attr(), &Value::Int(5)).unwrap();
        assert_eq!(result, Value::Int(7));

        // Already at the bound: stays there
        let result = op.apply(&int_attr(), &Value::Int(7)).unwrap();
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn test_increment_below_max_not_clamped() {
        let op = Operator::increment_max(1i64, 100i64);
        let result = op.apply(&int_attr(), &Value::Int(5)).unwrap();
        assert_eq!(result, Value::Int(6));
    }

    #[test]
    fn test_decrement_clamps_at_min() {
        let op = Operator::decrement_min(10i64, 0i64);
        let result = op.apply(&int_attr(), &Value::Int(3)).unwrap();
        assert_eq!(result, Value::Int(0));
    }

    #[test]
    fn test_multiply_negative_not_incorrectly_clamped() {
        // -2 * 5 = -10, well below max 100: the bound must not fire
        let op = Operator::multiply_max(-2i64, 100i64);
        let result = op.apply(&int_attr(), &Value::Int(5)).unwrap();
        assert_eq!(result, Value::Int(-10));
    }

    #[test]
    fn test_multiply_clamps_only_when_exceeding() {
        let op = Operator::multiply_max(10i64, 30i64);
        assert_eq!(op.apply(&int_attr(), &Value::Int(5)).unwrap(), Value::Int(30));
        assert_eq!(op.apply(&int_attr(), &Value::Int(2)).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_divide_by_zero_errors() {
        let err = Operator::divide(0i64).apply(&int_attr(), &Value::Int(10)).unwrap_err();
        assert!(err.to_string().contains("divide by zero"));

        let err = Operator::divide(0.0f64).apply(&float_attr(), &Value::Float(1.0)).unwrap_err();
        assert!(err.to_string().contains("divide by zero"));
    }

    #[test]
    fn test_modulo_by_zero_errors() {
        let err = Operator::modulo(0i64).apply(&int_attr(), &Value::Int(10)).unwrap_err();
        assert!(err.to_string().contains("modulo by zero"));
    }

    #[test]
    fn test_modulo() {
        let result = Operator::modulo(3i64).apply(&int_attr(), &Value::Int(10)).unwrap();
        assert_eq!(result, Value::Int(1));
    }

    #[test]
    fn test_power() {
        let result = Operator::power(3i64).apply(&int_attr(), &Value::Int(2)).unwrap();
        assert_eq!(result, Value::Int(8));

        let result = Operator::power_max(2i64, 50i64).apply(&int_attr(), &Value::Int(8)).unwrap();
        assert_eq!(result, Value::Int(50));
    }

    #[test]
    fn test_power_rejects_negative_integer_exponent() {
        let err = Operator::power(-1i64).apply(&int_attr(), &Value::Int(2)).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_float_arithmetic() {
        let result = Operator::increment(0.5f64).apply(&float_attr(), &Value::Float(1.25)).unwrap();
        assert_eq!(result, Value::Float(1.75));

        let result = Operator::divide(2.0f64).apply(&float_attr(), &Value::Float(5.0)).unwrap();
        assert_eq!(result, Value::Float(2.5));
    }

    #[test]
    fn test_integer_overflow_detected() {
        let err = Operator::increment(1i64).apply(&int_attr(), &Value::Int(i64::MAX)).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_arithmetic_type_mismatch_message() {
        let err = Operator::increment(1i64).apply(&string_attr(), &Value::Null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot apply increment operator to non-numeric field 'name'"
        );
    }

    // === Strings ===

    #[test]
    fn test_concat_null_as_empty() {
        let result = Operator::concat("world").apply(&string_attr(), &Value::Null).unwrap();
        assert_eq!(result, Value::String("world".into()));
    }

    #[test]
    fn test_concat_appends() {
        let result = Operator::concat(" world")
            .apply(&string_attr(), &Value::String("hello".into()))
            .unwrap();
        assert_eq!(result, Value::String("hello world".into()));
    }

    #[test]
    fn test_replace_all_occurrences() {
        let result = Operator::replace("a", "o")
            .apply(&string_attr(), &Value::String("banana".into()))
            .unwrap();
        assert_eq!(result, Value::String("bonono".into()));
    }

    #[test]
    fn test_replace_empty_search_is_noop() {
        let result = Operator::replace("", "x")
            .apply(&string_attr(), &Value::String("abc".into()))
            .unwrap();
        assert_eq!(result, Value::String("abc".into()));
    }

    #[test]
    fn test_string_op_on_numeric_field() {
        let err = Operator::concat("x").apply(&int_attr(), &Value::Int(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot apply concat operator to non-string field 'count'"
        );
    }

    // === Arrays ===

    fn tags(values: &[&str]) -> Value {
        Value::Array(values.iter().map(|v| Value::from(*v)).collect())
    }

    #[test]
    fn test_array_append_null_as_empty() {
        let result = Operator::array_append(vec![Value::from("a")])
            .apply(&array_attr(), &Value::Null)
            .unwrap();
        assert_eq!(result, tags(&["a"]));
    }

    #[test]
    fn test_array_prepend() {
        let result = Operator::array_prepend(vec![Value::from("x")])
            .apply(&array_attr(), &tags(&["a", "b"]))
            .unwrap();
        assert_eq!(result, tags(&["x", "a", "b"]));
    }

    #[test]
    fn test_array_insert_in_bounds() {
        let result = Operator::array_insert(1, "mid")
            .apply(&array_attr(), &tags(&["a", "b"]))
            .unwrap();
        assert_eq!(result, tags(&["a", "mid", "b"]));

        // index == len appends
        let result = Operator::array_insert(2, "end")
            .apply(&array_attr(), &tags(&["a", "b"]))
            .unwrap();
        assert_eq!(result, tags(&["a", "b", "end"]));
    }

    #[test]
    fn test_array_insert_out_of_bounds_message() {
        let err = Operator::array_insert(10, "x")
            .apply(&array_attr(), &tags(&["a", "b", "c"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "index 10 is out of bounds for array of length 3"
        );
    }

    #[test]
    fn test_array_remove_all_matches() {
        let result = Operator::array_remove("a")
            .apply(&array_attr(), &tags(&["a", "b", "a"]))
            .unwrap();
        assert_eq!(result, tags(&["b"]));
    }

    #[test]
    fn test_array_unique_preserves_first_occurrence() {
        let result = Operator::array_unique()
            .apply(&array_attr(), &tags(&["b", "a", "b", "c", "a"]))
            .unwrap();
        assert_eq!(result, tags(&["b", "a", "c"]));
    }

    #[test]
    fn test_array_intersect() {
        let result = Operator::array_intersect(vec![Value::from("a"), Value::from("c")])
            .apply(&array_attr(), &tags(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(result, tags(&["a", "c"]));
    }

    #[test]
    fn test_array_diff() {
        let result = Operator::array_diff(vec![Value::from("b")])
            .apply(&array_attr(), &tags(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(result, tags(&["a", "c"]));
    }

    #[test]
    fn test_array_empty_result_is_empty_list() {
        let result = Operator::array_intersect(vec![Value::from("zz")])
            .apply(&array_attr(), &tags(&["a", "b"]))
            .unwrap();
        assert_eq!(result, Value::Array(vec![]));
    }

    #[test]
    fn test_array_filter_predicates() {
        let numbers = Attribute::integer("nums").as_array();
        let base = Value::Array(vec![Value::Int(1), Value::Int(5), Value::Int(10)]);

        let gt = Operator::array_filter(ArrayPredicate::GreaterThan, 4i64)
            .apply(&numbers, &base)
            .unwrap();
        assert_eq!(gt, Value::Array(vec![Value::Int(5), Value::Int(10)]));

        let lt = Operator::array_filter(ArrayPredicate::LessThan, 5i64)
            .apply(&numbers, &base)
            .unwrap();
        assert_eq!(lt, Value::Array(vec![Value::Int(1)]));

        let eq = Operator::array_filter(ArrayPredicate::Equals, 5i64)
            .apply(&numbers, &base)
            .unwrap();
        assert_eq!(eq, Value::Array(vec![Value::Int(5)]));

        let ne = Operator::array_filter(ArrayPredicate::NotEquals, 5i64)
            .apply(&numbers, &base)
            .unwrap();
        assert_eq!(ne, Value::Array(vec![Value::Int(1), Value::Int(10)]));
    }

    #[test]
    fn test_array_op_on_scalar_field() {
        let err = Operator::array_append(vec![Value::Int(1)])
            .apply(&int_attr(), &Value::Int(1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot apply arrayAppend operator to non-array field 'count'"
        );
    }

    // === Boolean ===

    #[test]
    fn test_toggle() {
        let flag = Attribute::boolean("done");
        assert_eq!(
            Operator::toggle().apply(&flag, &Value::Bool(true)).unwrap(),
            Value::Bool(false)
        );
        // Null toggles to true (treated as false)
        assert_eq!(
            Operator::toggle().apply(&flag, &Value::Null).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_toggle_type_mismatch() {
        let err = Operator::toggle().apply(&int_attr(), &Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("non-boolean field 'count'"));
    }

    // === Dates ===

    #[test]
    fn test_date_add_days_rolls_over_month() {
        let result = Operator::date_add_days(2)
            .apply(&date_attr(), &Value::String("2024-01-30T12:00:00.000+00:00".into()))
            .unwrap();
        assert_eq!(result, Value::String("2024-02-01T12:00:00.000+00:00".into()));
    }

    #[test]
    fn test_date_add_days_handles_leap_year() {
        let result = Operator::date_add_days(1)
            .apply(&date_attr(), &Value::String("2024-02-28T00:00:00.000+00:00".into()))
            .unwrap();
        assert_eq!(result, Value::String("2024-02-29T00:00:00.000+00:00".into()));

        let result = Operator::date_add_days(1)
            .apply(&date_attr(), &Value::String("2023-02-28T00:00:00.000+00:00".into()))
            .unwrap();
        assert_eq!(result, Value::String("2023-03-01T00:00:00.000+00:00".into()));
    }

    #[test]
    fn test_date_sub_days_rolls_back_year() {
        let result = Operator::date_sub_days(1)
            .apply(&date_attr(), &Value::String("2024-01-01T08:30:00.000+00:00".into()))
            .unwrap();
        assert_eq!(result, Value::String("2023-12-31T08:30:00.000+00:00".into()));
    }

    #[test]
    fn test_date_preserves_offset() {
        let result = Operator::date_add_days(1)
            .apply(&date_attr(), &Value::String("2024-06-01T10:00:00.000+05:30".into()))
            .unwrap();
        assert_eq!(result, Value::String("2024-06-02T10:00:00.000+05:30".into()));
    }

    #[test]
    fn test_date_set_now_produces_parseable_value() {
        let result = Operator::date_set_now().apply(&date_attr(), &Value::Null).unwrap();
        assert!(datetime::parse(result.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_date_op_on_string_field() {
        let err = Operator::date_add_days(1)
            .apply(&string_attr(), &Value::String("x".into()))
            .unwrap_err();
        assert!(err.to_string().contains("non-datetime field 'name'"));
    }

    // === Patch ===

    #[test]
    fn test_patch_construction() {
        assert_eq!(Patch::set(5i64), Patch::Set(Value::Int(5)));
        assert_eq!(
            Patch::from(Operator::toggle()),
            Patch::Apply(Operator::Toggle)
        );
    }
}
