//! The `hextod65` function.

use std::str::FromStr;

use palette::{FromColor, Srgb, Yxy};
use serde_json::{json, Value};

use super::Function;
use crate::error::ProviderError;
use crate::schema::{AttributeType, FunctionDefinition, Parameter};

/// Chromaticity reported for black, where x and y are undefined.
const D65_WHITE_X: f32 = 0.312_727;
const D65_WHITE_Y: f32 = 0.329_023;

/// `hextod65(hex_color)`: sRGB hex colour to CIE xyY under D65.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexToD65;

/// Convert `#rrggbb`, `rrggbb`, `#rgb` or `rgb` to `(x, y, Y)`.
pub fn hex_to_xyy(hex: &str) -> Option<(f32, f32, f32)> {
    let rgb = Srgb::<u8>::from_str(hex.trim()).ok()?.into_format::<f32>();
    let yxy: Yxy = Yxy::from_color(rgb);

    if yxy.luma <= 0.0 {
        return Some((D65_WHITE_X, D65_WHITE_Y, 0.0));
    }
    Some((yxy.x, yxy.y, yxy.luma))
}

impl Function for HexToD65 {
    fn name(&self) -> &'static str {
        "hextod65"
    }

    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new(
            "Converts a hex color to the D65 color space.",
            AttributeType::object([
                ("x", AttributeType::Float64),
                ("y", AttributeType::Float64),
                ("z", AttributeType::Float64),
            ]),
        )
        .with_description("Given a string value, returns a struct containing x, y and z properties.")
        .with_parameter(
            Parameter::string("hex_color").with_description("The hex color to convert."),
        )
    }

    fn call(&self, args: &[Value]) -> Result<Value, ProviderError> {
        let (x, y, z) = args
            .first()
            .and_then(Value::as_str)
            .and_then(hex_to_xyy)
            .ok_or_else(|| ProviderError::Validation("failed to convert hex color".to_string()))?;

        Ok(json!({"x": x, "y": y, "z": z}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_white() {
        let (x, y, z) = hex_to_xyy("#ffffff").unwrap();
        assert_close(x, 0.3127);
        assert_close(y, 0.3290);
        assert_close(z, 1.0);
    }

    #[test]
    fn test_primaries() {
        let (x, y, z) = hex_to_xyy("#ff0000").unwrap();
        assert_close(x, 0.64);
        assert_close(y, 0.33);
        assert_close(z, 0.2126);

        let (x, y, _) = hex_to_xyy("00ff00").unwrap();
        assert_close(x, 0.30);
        assert_close(y, 0.60);

        let (x, y, _) = hex_to_xyy("#00f").unwrap();
        assert_close(x, 0.15);
        assert_close(y, 0.06);
    }

    #[test]
    fn test_black_uses_white_point() {
        let (x, y, z) = hex_to_xyy("#000000").unwrap();
        assert_close(x, D65_WHITE_X);
        assert_close(y, D65_WHITE_Y);
        assert_eq!(z, 0.0);
    }

    #[test]
    fn test_invalid_input() {
        assert!(hex_to_xyy("#gggggg").is_none());
        assert!(hex_to_xyy("#12345").is_none());
        assert!(hex_to_xyy("").is_none());
    }

    #[test]
    fn test_call() {
        let result = HexToD65.call(&[json!("#ffffff")]).unwrap();
        assert!(result["x"].as_f64().is_some());
        assert_close(result["z"].as_f64().unwrap() as f32, 1.0);

        let err = HexToD65.call(&[json!("not a colour")]).unwrap_err();
        assert_eq!(err.message(), "failed to convert hex color");
    }
}
