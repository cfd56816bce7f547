//! USDC distribution for the accountability pool, plus plain multiplication.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::ToolError;
use crate::tool::Tool;

const INVALID_INPUT: &str = "Invalid input parameters. Ensure n > 0, d > 0, and 0 <= f <= n.";

/// How much each successful participant receives when `f` of `n`
/// participants forfeit their deposit `d`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] unless `n > 0`, `d > 0` and
/// `0 <= f <= n` (all finite).
pub fn calculate_usdc_distribution(n: f64, d: f64, f: f64) -> Result<String, ToolError> {
    let finite = n.is_finite() && d.is_finite() && f.is_finite();
    if !finite || n <= 0.0 || d <= 0.0 || f < 0.0 || f > n {
        return Err(ToolError::invalid_args(INVALID_INPUT));
    }
    if f == 0.0 {
        return Ok("No one failed. No funds to distribute.".to_string());
    }
    let successful = n - f;
    if successful <= 0.0 {
        return Ok("Everyone failed. No successful participants to receive funds.".to_string());
    }
    let reward = round_cents(f * d / successful);
    Ok(format!("Each successful participant receives {reward:.2} USDC."))
}

/// Round to two decimals, halves away from zero.
///
/// `format!("{:.2}")` alone rounds ties to even (`0.125` becomes `0.12`).
#[must_use]
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arguments of [`UsdcDistributionTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DistributionArgs {
    /// Total number of participants (positive).
    pub n: f64,
    /// Deposit per participant in USDC (positive).
    pub d: f64,
    /// Number of failed participants (0 to n).
    pub f: f64,
}

/// `calculateUSDCdistribution`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdcDistributionTool;

#[async_trait]
impl Tool for UsdcDistributionTool {
    const NAME: &'static str = "calculateUSDCdistribution";
    type Args = DistributionArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Calculates the USDC distribution for an accountability platform. It determines how much \
         each successful participant receives when failed participants forfeit their deposits."
            .to_owned()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        calculate_usdc_distribution(args.n, args.d, args.f)
    }
}

/// Arguments of [`MultiplyTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MultiplyArgs {
    /// First factor.
    pub a: f64,
    /// Second factor.
    pub b: f64,
}

/// `multiply`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    const NAME: &'static str = "multiply";
    type Args = MultiplyArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Multiply two numbers.".to_owned()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let product = args.a * args.b;
        if !product.is_finite() {
            return Err(ToolError::invalid_args("product is not a finite number"));
        }
        Ok(product.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::DynTool;
    use serde_json::json;

    #[test]
    fn test_distribution_examples() {
        assert_eq!(
            calculate_usdc_distribution(10.0, 100.0, 2.0).unwrap(),
            "Each successful participant receives 25.00 USDC."
        );
        assert_eq!(
            calculate_usdc_distribution(3.0, 10.0, 1.0).unwrap(),
            "Each successful participant receives 5.00 USDC."
        );
        assert_eq!(
            calculate_usdc_distribution(5.0, 10.0, 2.0).unwrap(),
            "Each successful participant receives 6.67 USDC."
        );
    }

    #[test]
    fn test_distribution_rounds_halves_up() {
        // 1 * 1 / 8 = 0.125 exactly.
        assert_eq!(
            calculate_usdc_distribution(9.0, 1.0, 1.0).unwrap(),
            "Each successful participant receives 0.13 USDC."
        );
        assert!((round_cents(0.125) - 0.13).abs() < f64::EPSILON);
        assert!((round_cents(2.675_000_1) - 2.68).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distribution_edges() {
        assert_eq!(
            calculate_usdc_distribution(5.0, 10.0, 0.0).unwrap(),
            "No one failed. No funds to distribute."
        );
        assert_eq!(
            calculate_usdc_distribution(4.0, 10.0, 4.0).unwrap(),
            "Everyone failed. No successful participants to receive funds."
        );
    }

    #[test]
    fn test_distribution_rejects() {
        for (n, d, f) in [
            (0.0, 10.0, 0.0),
            (5.0, 0.0, 1.0),
            (5.0, -1.0, 1.0),
            (5.0, 10.0, -1.0),
            (5.0, 10.0, 6.0),
            (f64::NAN, 10.0, 1.0),
            (f64::INFINITY, 10.0, 1.0),
        ] {
            let err = calculate_usdc_distribution(n, d, f).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid arguments: {INVALID_INPUT}"));
        }
    }

    #[tokio::test]
    async fn test_distribution_tool_via_json() {
        let out = UsdcDistributionTool
            .call_json(json!({"n": 10, "d": 100, "f": 2}))
            .await
            .unwrap();
        assert_eq!(out, json!("Each successful participant receives 25.00 USDC."));

        let err = UsdcDistributionTool.call_json(json!({"n": 10})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_multiply() {
        let out = MultiplyTool.call_json(json!({"a": 6, "b": 7})).await.unwrap();
        assert_eq!(out, json!("42"));
        let out = MultiplyTool.call_json(json!({"a": 1.5, "b": 2})).await.unwrap();
        assert_eq!(out, json!("3"));
        assert!(MultiplyTool.call_json(json!({"a": 1e308, "b": 1e308})).await.is_err());
    }

    #[test]
    fn test_schema_fields() {
        let def = UsdcDistributionTool.definition();
        assert_eq!(def.name, "calculateUSDCdistribution");
        let props = def.parameters["properties"].as_object().unwrap();
        assert!(props.contains_key("n") && props.contains_key("d") && props.contains_key("f"));
        let required = def.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }
}
