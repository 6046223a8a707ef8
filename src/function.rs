// ∑ Aggregation Functions - what a typed group computes over its members
//
// In memory a function is a kind plus its parameters; the compact wire string
// (`AVG`, `THRESHOLD_10_20`, `AND_ON_OFF`) only exists at the storage boundary.
//
// Wire format:
//   <kind>[_<param0>[_<param1>]]    param0 = lower/primary, anything after
//                                   param1 is dropped

use crate::entities::BaseType;
use crate::error::FunctionError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEPARATOR: char = '_';

/// Wire token meaning "no function selected"
pub const NO_FUNCTION: &str = "none";

// ============================================================================
// FUNCTION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionKind {
    And,
    Or,
    Nand,
    Nor,
    Avg,
    Sum,
    Min,
    Max,
    Threshold,
}

/// Logical aggregations (non-parametric)
pub const LOGICAL_FUNCTIONS: &[FunctionKind] = &[
    FunctionKind::And,
    FunctionKind::Or,
    FunctionKind::Nand,
    FunctionKind::Nor,
];

/// Arithmetic and threshold aggregations for numeric groups
pub const ARITHMETIC_FUNCTIONS: &[FunctionKind] = &[
    FunctionKind::Avg,
    FunctionKind::Sum,
    FunctionKind::Min,
    FunctionKind::Max,
    FunctionKind::Threshold,
];

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::And => "AND",
            FunctionKind::Or => "OR",
            FunctionKind::Nand => "NAND",
            FunctionKind::Nor => "NOR",
            FunctionKind::Avg => "AVG",
            FunctionKind::Sum => "SUM",
            FunctionKind::Min => "MIN",
            FunctionKind::Max => "MAX",
            FunctionKind::Threshold => "THRESHOLD",
        }
    }

    pub fn parse(token: &str) -> Option<FunctionKind> {
        LOGICAL_FUNCTIONS
            .iter()
            .chain(ARITHMETIC_FUNCTIONS)
            .copied()
            .find(|k| k.as_str() == token)
    }

    /// Number of parameters the kind carries (0 or 2)
    pub fn arity(&self) -> usize {
        match self {
            FunctionKind::Threshold => 2,
            _ => 0,
        }
    }

    pub fn is_parametric(&self) -> bool {
        self.arity() > 0
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Functions a group with the given base type may use.
///
/// Must be re-evaluated after every group type change.
pub fn derive_function_set(group_type: Option<BaseType>) -> &'static [FunctionKind] {
    match group_type {
        Some(base) if base.is_numeric() => ARITHMETIC_FUNCTIONS,
        _ => LOGICAL_FUNCTIONS,
    }
}

// ============================================================================
// AGGREGATION FUNCTION
// ============================================================================

/// Most parameters a wire string carries after its kind
pub const MAX_PARAMS: usize = 2;

/// A function kind with its parameters in wire order.
///
/// `THRESHOLD` always has exactly two (lower, upper). Logical kinds may carry
/// up to two state arguments (`AND_ON_OFF`, `OR_OPEN_CLOSED`); they are kept
/// as given so that re-encoding reproduces the stored string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationFunction {
    kind: FunctionKind,
    params: Vec<String>,
}

impl AggregationFunction {
    /// A function without parameters
    pub fn new(kind: FunctionKind) -> Self {
        AggregationFunction {
            kind,
            params: Vec::new(),
        }
    }

    /// Build a function from a kind and its raw parameters.
    ///
    /// The kind's arity is a minimum; at most `MAX_PARAMS` are kept and the
    /// rest are ignored.
    pub fn from_parts<S: AsRef<str>>(
        kind: FunctionKind,
        params: &[S],
    ) -> Result<Self, FunctionError> {
        if params.len() < kind.arity() {
            return Err(FunctionError::MissingParameters {
                kind: kind.as_str().to_string(),
                expected: kind.arity(),
                found: params.len(),
            });
        }

        let params = params
            .iter()
            .take(MAX_PARAMS)
            .map(|param| {
                let param = param.as_ref();
                if param.is_empty() || param.contains(SEPARATOR) {
                    Err(FunctionError::InvalidParameter(param.to_string()))
                } else {
                    Ok(param.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AggregationFunction { kind, params })
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Parameters in wire order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// `(lower, upper)` of a threshold function
    pub fn bounds(&self) -> Option<(&str, &str)> {
        match (self.kind, self.params.as_slice()) {
            (FunctionKind::Threshold, [lower, upper]) => Some((lower.as_str(), upper.as_str())),
            _ => None,
        }
    }
}

impl From<FunctionKind> for AggregationFunction {
    fn from(kind: FunctionKind) -> Self {
        AggregationFunction::new(kind)
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for param in &self.params {
            write!(f, "{}{}", SEPARATOR, param)?;
        }
        Ok(())
    }
}

// ============================================================================
// CODEC
// ============================================================================

/// Decode a wire string.
///
/// An empty kind (or the `none` token) means no function is configured.
/// Up to two segments after the kind are kept as parameters, whatever the
/// kind; anything past them is ignored.
pub fn decode(wire: &str) -> Result<Option<AggregationFunction>, FunctionError> {
    let mut segments = wire.split(SEPARATOR);
    let kind_token = segments.next().unwrap_or_default();

    if kind_token.is_empty() || kind_token == NO_FUNCTION {
        return Ok(None);
    }

    let kind = FunctionKind::parse(kind_token)
        .ok_or_else(|| FunctionError::UnknownKind(kind_token.to_string()))?;
    let params: Vec<&str> = segments.take(MAX_PARAMS).collect();

    AggregationFunction::from_parts(kind, &params[..]).map(Some)
}

/// Encode a function to its wire string
pub fn encode(function: &AggregationFunction) -> String {
    function.to_string()
}

/// Encode an optional function into the optional wire field
pub fn encode_field(function: Option<&AggregationFunction>) -> Option<String> {
    function.map(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_kind() {
        assert_eq!(decode("AVG").unwrap(), Some(AggregationFunction::new(FunctionKind::Avg)));
        assert_eq!(decode("NOR").unwrap(), Some(AggregationFunction::from(FunctionKind::Nor)));
    }

    #[test]
    fn test_decode_threshold_params_in_order() {
        let f = decode("THRESHOLD_10_20").unwrap().unwrap();
        assert_eq!(f.kind(), FunctionKind::Threshold);
        assert_eq!(f.params(), ["10", "20"]);
        assert_eq!(f.bounds(), Some(("10", "20")));
    }

    #[test]
    fn test_decode_absent() {
        assert_eq!(decode("").unwrap(), None);
        assert_eq!(decode("none").unwrap(), None);
        assert_eq!(decode("_10_20").unwrap(), None);
    }

    #[test]
    fn test_decode_truncates_extra_segments() {
        let f = decode("THRESHOLD_10_20_30_40").unwrap().unwrap();
        assert_eq!(f.params(), ["10", "20"]);
        assert_eq!(encode(&f), "THRESHOLD_10_20");

        let f = decode("OR_ON_OFF_DIM").unwrap().unwrap();
        assert_eq!(encode(&f), "OR_ON_OFF");
    }

    #[test]
    fn test_decode_keeps_logical_state_arguments() {
        let f = decode("AND_OPEN_CLOSED").unwrap().unwrap();
        assert_eq!(f.kind(), FunctionKind::And);
        assert_eq!(f.params(), ["OPEN", "CLOSED"]);
        assert_eq!(f.bounds(), None);

        let f = decode("NOR_ON").unwrap().unwrap();
        assert_eq!(f.params(), ["ON"]);
    }

    #[test]
    fn test_decode_malformed_does_not_panic() {
        assert_eq!(
            decode("THRESHOLD_10"),
            Err(FunctionError::MissingParameters {
                kind: "THRESHOLD".to_string(),
                expected: 2,
                found: 1,
            })
        );
        assert_eq!(
            decode("THRESHOLD__20"),
            Err(FunctionError::InvalidParameter(String::new()))
        );
        assert_eq!(decode("MEDIAN"), Err(FunctionError::UnknownKind("MEDIAN".to_string())));
        assert!(decode("avg").is_err());
    }

    #[test]
    fn test_round_trip_well_formed() {
        for wire in [
            "AND", "OR", "NAND", "NOR", "AVG", "SUM", "MIN", "MAX",
            "THRESHOLD_10_20", "THRESHOLD_-5.5_0", "AND_ON_OFF", "OR_OPEN_CLOSED",
        ] {
            let decoded = decode(wire).unwrap().unwrap();
            assert_eq!(encode(&decoded), wire);
        }
    }

    #[test]
    fn test_encode_field() {
        assert_eq!(encode_field(None), None);
        let f = AggregationFunction::from_parts(FunctionKind::Threshold, &["10", "20"]).unwrap();
        assert_eq!(encode_field(Some(&f)), Some("THRESHOLD_10_20".to_string()));
    }

    #[test]
    fn test_from_parts_rejects_separator_in_param() {
        let err = AggregationFunction::from_parts(FunctionKind::Threshold, &["1_0", "20"]);
        assert_eq!(err, Err(FunctionError::InvalidParameter("1_0".to_string())));

        let f = AggregationFunction::from_parts(FunctionKind::Or, &["ON", "OFF", "UNDEF"]).unwrap();
        assert_eq!(f.params(), ["ON", "OFF"]);

        let f = AggregationFunction::from_parts::<&str>(FunctionKind::Sum, &[]).unwrap();
        assert!(f.params().is_empty());
    }

    #[test]
    fn test_function_sets() {
        assert_eq!(derive_function_set(Some(BaseType::Number)), ARITHMETIC_FUNCTIONS);
        assert_eq!(derive_function_set(Some(BaseType::Dimmer)), ARITHMETIC_FUNCTIONS);
        assert_eq!(derive_function_set(Some(BaseType::Switch)), LOGICAL_FUNCTIONS);
        assert_eq!(derive_function_set(None), LOGICAL_FUNCTIONS);
        assert!(LOGICAL_FUNCTIONS.iter().all(|k| !k.is_parametric()));
        assert!(ARITHMETIC_FUNCTIONS.contains(&FunctionKind::Threshold));
    }
}
