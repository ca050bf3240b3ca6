use crate::errors::StructureError;

pub fn fmt_vec_output(v: &[f64]) -> String {
    v.iter().map(|n| format!("{:.4}", n)).collect::<Vec<_>>().join(", ")
}

// Validation
/// Finite and non-negative.
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), StructureError> {
    validate_float_parameter(value, 0.0, f64::MAX, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), StructureError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(StructureError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_nonzero_parameter(value: usize, parameter: &str) -> Result<(), StructureError> {
    if value == 0 {
        Err(StructureError::InvalidParameter(
            parameter.to_string(),
            "a positive integer".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Logistic function.
#[inline]
pub fn odds(v: f64) -> f64 {
    1. / (1. + (-v).exp())
}
