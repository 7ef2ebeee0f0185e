use std::str::FromStr;

use mm_tensor::{Fill, Order, TOL};

use crate::error::{BenchError, Result};

/// Default matrix order.
pub const ORDER: usize = 1024;
/// Default number of timed repetitions per strategy.
pub const COUNT: usize = 1;

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Matrix order N.
    pub order: usize,
    /// Timed repetitions per strategy.
    pub count: usize,
    /// Team size for the tiled strategy; `None` derives it from the order.
    pub team_size: Option<usize>,
    /// Per-element relative tolerance for verification.
    pub tolerance: f32,
    /// Compare every repetition against the reference product.
    pub verify: bool,
    pub fill: Fill,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            order: ORDER,
            count: COUNT,
            team_size: None,
            tolerance: TOL,
            verify: true,
            fill: Fill::Pattern,
        }
    }
}

impl BenchConfig {
    /// Read the configuration from the process environment.
    ///
    /// Recognized keys (all optional):
    /// - `MATMUL_ORDER` -> order
    /// - `MATMUL_COUNT` -> count
    /// - `MATMUL_TEAM_SIZE` -> team_size
    /// - `MATMUL_TOLERANCE` -> tolerance
    /// - `MATMUL_VERIFY` -> verify (`true`/`false`/`1`/`0`)
    /// - `MATMUL_FILL` -> fill (`pattern` or `constant`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`BenchConfig::from_env`], reading keys through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = BenchConfig::default();

        if let Some(v) = lookup("MATMUL_ORDER") {
            config.order = parse("MATMUL_ORDER", &v)?;
        }
        if let Some(v) = lookup("MATMUL_COUNT") {
            config.count = parse("MATMUL_COUNT", &v)?;
        }
        if let Some(v) = lookup("MATMUL_TEAM_SIZE") {
            config.team_size = Some(parse("MATMUL_TEAM_SIZE", &v)?);
        }
        if let Some(v) = lookup("MATMUL_TOLERANCE") {
            config.tolerance = parse("MATMUL_TOLERANCE", &v)?;
        }
        if let Some(v) = lookup("MATMUL_VERIFY") {
            config.verify = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid("MATMUL_VERIFY", &v, "expected a boolean")),
            };
        }
        if let Some(v) = lookup("MATMUL_FILL") {
            config.fill = match v.trim() {
                "pattern" => Fill::Pattern,
                "constant" => Fill::classic(),
                _ => return Err(invalid("MATMUL_FILL", &v, "expected 'pattern' or 'constant'")),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the settings against each other.
    ///
    /// # Errors
    /// - `Tensor(InvalidShape)` if the order is zero
    /// - `InvalidConfig` for a zero count, a non-positive tolerance, or a
    ///   team size outside `1..=order`
    pub fn validate(&self) -> Result<()> {
        Order::new(self.order)?;
        if self.count == 0 {
            return Err(invalid("count", "0", "at least one repetition is required"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid(
                "tolerance",
                &self.tolerance.to_string(),
                "must be a positive number",
            ));
        }
        if let Some(t) = self.team_size {
            if t == 0 || t > self.order {
                return Err(invalid(
                    "team_size",
                    &t.to_string(),
                    &format!("must be in 1..={}", self.order),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> BenchError {
    BenchError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BenchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.order, 1024);
        assert_eq!(config.count, 1);
        assert!(config.verify);
    }

    #[test]
    fn test_overrides() {
        let config = BenchConfig::from_lookup(lookup(&[
            ("MATMUL_ORDER", "64"),
            ("MATMUL_COUNT", " 3 "),
            ("MATMUL_TEAM_SIZE", "8"),
            ("MATMUL_TOLERANCE", "0.01"),
            ("MATMUL_VERIFY", "off"),
            ("MATMUL_FILL", "constant"),
        ]))
        .unwrap();
        assert_eq!(config.order, 64);
        assert_eq!(config.count, 3);
        assert_eq!(config.team_size, Some(8));
        assert_eq!(config.tolerance, 0.01);
        assert!(!config.verify);
        assert_eq!(config.fill, Fill::classic());
    }

    #[test]
    fn test_zero_order_is_configuration_error() {
        let err = BenchConfig::from_lookup(lookup(&[("MATMUL_ORDER", "0")])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_malformed_values() {
        for (key, value) in [
            ("MATMUL_ORDER", "-4"),
            ("MATMUL_COUNT", "many"),
            ("MATMUL_TOLERANCE", "nan"),
            ("MATMUL_VERIFY", "maybe"),
            ("MATMUL_FILL", "random"),
            ("MATMUL_COUNT", "0"),
        ] {
            let err = BenchConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(err.is_configuration(), "{key}={value}: {err}");
        }
    }

    #[test]
    fn test_team_size_must_fit_order() {
        let err = BenchConfig::from_lookup(lookup(&[
            ("MATMUL_ORDER", "16"),
            ("MATMUL_TEAM_SIZE", "32"),
        ]))
        .unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig { key, .. } if key == "team_size"));
    }
}
