use std::sync::Arc;
use std::time::{Duration, Instant};

use mm_kernels::{
    reference_product, Device, Multiplier, NaivePartitionedMultiplier, Program,
    ReferenceMultiplier, TiledScratchMultiplier, KERNEL_SOURCE, NAIVE_ENTRY, TILED_ENTRY,
};
use mm_tensor::{verify, Matrix, MatrixStore, Order, Verification};
use tracing::{debug, info, warn};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::report::Report;

/// Timing and verification outcome of one repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub strategy: String,
    pub order: Order,
    pub repetition: usize,
    pub elapsed: Duration,
    /// Millions of floating-point operations per second.
    pub mflops: f64,
    /// `None` when verification is disabled.
    pub verification: Option<Verification>,
}

/// Every repetition of every strategy, in run order.
#[derive(Debug, Clone, Default)]
pub struct HarnessSummary {
    pub results: Vec<RunResult>,
}

impl HarnessSummary {
    /// Repetitions whose output failed verification.
    pub fn mismatches(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.verification.as_ref().is_some_and(|v| !v.passed()))
            .count()
    }

    pub fn for_strategy<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s RunResult> {
        self.results.iter().filter(move |r| r.strategy == name)
    }
}

/// MFLOPS for one product of `order` taking `elapsed`.
pub fn mflops(order: Order, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        order.flops() / (1_000_000.0 * secs)
    } else {
        0.0
    }
}

/// Runs each strategy `count` times over one `MatrixStore`.
#[derive(Debug)]
pub struct BenchmarkHarness {
    store: MatrixStore,
    strategies: Vec<Box<dyn Multiplier>>,
    count: usize,
    verify: bool,
    tolerance: f32,
}

impl BenchmarkHarness {
    /// Build a harness with no strategies.
    pub fn new(config: &BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(BenchmarkHarness {
            store: MatrixStore::with_fill(config.order, config.fill)?,
            strategies: Vec::new(),
            count: config.count,
            verify: config.verify,
            tolerance: config.tolerance,
        })
    }

    /// Build a harness running the reference, naive and tiled strategies on
    /// `device`, with kernels compiled from [`KERNEL_SOURCE`].
    pub fn from_config(config: &BenchConfig, device: Device) -> Result<Self> {
        let mut harness = Self::new(config)?;
        let device = Arc::new(device);
        let program = Program::compile(KERNEL_SOURCE)?;

        let naive = NaivePartitionedMultiplier::new(device.clone(), program.kernel(NAIVE_ENTRY)?)?;
        let mut tiled = TiledScratchMultiplier::new(device, program.kernel(TILED_ENTRY)?)?;
        if let Some(t) = config.team_size {
            tiled = tiled.with_team_size(t);
        }

        harness.push(Box::new(ReferenceMultiplier::new()));
        harness.push(Box::new(naive));
        harness.push(Box::new(tiled));
        Ok(harness)
    }

    pub fn push(&mut self, strategy: Box<dyn Multiplier>) {
        self.strategies.push(strategy);
    }

    pub fn store(&self) -> &MatrixStore {
        &self.store
    }

    /// The correct product of the store's A and B.
    fn expected(&mut self) -> Result<Matrix> {
        self.store.reinitialize();
        let order = self.store.order();
        match self.store.fill().analytic_product(order) {
            Some(m) => Ok(m),
            None => {
                debug!(%order, "computing reference product for verification");
                Ok(reference_product(&self.store.a, &self.store.b)?)
            }
        }
    }

    /// Run every strategy `count` times, reporting each repetition.
    ///
    /// A, B and C are re-initialized before each strategy's block and C is
    /// zeroed before each repetition. A verification mismatch is reported
    /// and the run continues; any other error aborts the run.
    pub fn run(&mut self, report: &mut dyn Report) -> Result<HarnessSummary> {
        let expected = if self.verify {
            Some(self.expected()?)
        } else {
            None
        };
        let order = self.store.order();
        let mut summary = HarnessSummary::default();

        for strategy in &self.strategies {
            self.store.reinitialize();
            info!(strategy = strategy.name(), %order, count = self.count, "starting strategy");
            report.strategy_started(&strategy.describe(order))?;

            for repetition in 0..self.count {
                self.store.zero_c();

                let start = Instant::now();
                strategy.multiply(&self.store.a, &self.store.b, &mut self.store.c)?;
                let elapsed = start.elapsed();

                let verification = match &expected {
                    Some(e) => Some(verify(&self.store.c, e, self.tolerance)?),
                    None => None,
                };
                if let Some(v) = verification.as_ref().filter(|v| !v.passed()) {
                    warn!(
                        strategy = strategy.name(),
                        repetition,
                        mismatches = v.mismatches,
                        max_rel_error = v.max_rel_error,
                        first_bad_index = ?v.first_bad_index,
                        "verification mismatch"
                    );
                }

                let result = RunResult {
                    strategy: strategy.name().to_string(),
                    order,
                    repetition,
                    elapsed,
                    mflops: mflops(order, elapsed),
                    verification,
                };
                report.repetition(&result)?;
                summary.results.push(result);
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::report::ConsoleReport;
    use mm_kernels::{KernelError, Platform};
    use mm_tensor::Fill;

    fn config(order: usize) -> BenchConfig {
        BenchConfig {
            order,
            count: 2,
            ..BenchConfig::default()
        }
    }

    /// Correct everywhere except the last element.
    #[derive(Debug)]
    struct OffByOne;

    impl Multiplier for OffByOne {
        fn name(&self) -> &str {
            "off-by-one"
        }

        fn describe(&self, order: Order) -> String {
            format!("broken, order {order}")
        }

        fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> mm_kernels::Result<()> {
            ReferenceMultiplier.multiply(a, b, c)?;
            if let Some(last) = c.as_mut_slice().last_mut() {
                *last += 1000.0;
            }
            Ok(())
        }
    }

    /// Always fails to launch.
    #[derive(Debug)]
    struct Unlaunchable;

    impl Multiplier for Unlaunchable {
        fn name(&self) -> &str {
            "unlaunchable"
        }

        fn describe(&self, _order: Order) -> String {
            "unlaunchable".to_string()
        }

        fn multiply(&self, _a: &Matrix, _b: &Matrix, _c: &mut Matrix) -> mm_kernels::Result<()> {
            Err(KernelError::UnknownEntryPoint("missing".to_string()))
        }
    }

    /// Records whether A/B looked freshly initialized and C zeroed.
    #[derive(Debug)]
    struct StateProbe {
        fresh: MatrixStore,
    }

    impl Multiplier for StateProbe {
        fn name(&self) -> &str {
            "probe"
        }

        fn describe(&self, _order: Order) -> String {
            "probe".to_string()
        }

        fn multiply(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> mm_kernels::Result<()> {
            assert_eq!(a, &self.fresh.a);
            assert_eq!(b, &self.fresh.b);
            assert!(c.as_slice().iter().all(|&v| v == 0.0));
            // leave junk behind for the next repetition
            c.fill(42.0);
            Ok(())
        }
    }

    #[test]
    fn test_all_strategies_pass() {
        let mut cfg = config(32);
        cfg.team_size = Some(4);
        let device = Platform::host().select(0).unwrap();
        let mut harness = BenchmarkHarness::from_config(&cfg, device).unwrap();
        let mut report = ConsoleReport::new(Vec::new());
        let summary = harness.run(&mut report).unwrap();

        assert_eq!(summary.results.len(), 6);
        assert_eq!(summary.mismatches(), 0);
        for name in ["reference", "naive", "tiled"] {
            assert_eq!(summary.for_strategy(name).count(), 2, "{name}");
        }

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert_eq!(text.matches("MFLOPS").count(), 6);
        assert_eq!(text.matches("=====").count(), 6);
        assert!(!text.contains("Errors"));
    }

    #[test]
    fn test_constant_fill_verifies_analytically() {
        let mut cfg = config(20);
        cfg.fill = Fill::classic();
        cfg.count = 1;
        let device = Platform::host().select(1).unwrap();
        let mut harness = BenchmarkHarness::from_config(&cfg, device).unwrap();
        let summary = harness.run(&mut ConsoleReport::new(Vec::new())).unwrap();
        assert_eq!(summary.mismatches(), 0);
        assert!(harness.store().c.as_slice().iter().all(|&v| v == 300.0));
    }

    #[test]
    fn test_mismatch_is_reported_and_run_continues() {
        let mut harness = BenchmarkHarness::new(&config(8)).unwrap();
        harness.push(Box::new(OffByOne));
        harness.push(Box::new(ReferenceMultiplier::new()));
        let mut report = ConsoleReport::new(Vec::new());
        let summary = harness.run(&mut report).unwrap();

        assert_eq!(summary.results.len(), 4);
        assert_eq!(summary.mismatches(), 2);
        let bad = summary.for_strategy("off-by-one").next().unwrap();
        let v = bad.verification.as_ref().unwrap();
        assert_eq!(v.mismatches, 1);
        assert_eq!(v.first_bad_index, Some(63));

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert_eq!(text.matches("Errors in multiplication").count(), 2);
    }

    #[test]
    fn test_dispatch_error_aborts() {
        let mut harness = BenchmarkHarness::new(&config(4)).unwrap();
        harness.push(Box::new(Unlaunchable));
        harness.push(Box::new(ReferenceMultiplier::new()));
        let err = harness.run(&mut ConsoleReport::new(Vec::new())).unwrap_err();
        assert!(matches!(err, BenchError::Kernel(KernelError::UnknownEntryPoint(_))));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_state_reset_between_repetitions_and_strategies() {
        let cfg = config(5);
        let fresh = MatrixStore::initialize(5).unwrap();
        let mut harness = BenchmarkHarness::new(&cfg).unwrap();
        harness.push(Box::new(StateProbe {
            fresh: fresh.clone(),
        }));
        harness.push(Box::new(StateProbe { fresh }));
        let summary = harness.run(&mut ConsoleReport::new(Vec::new())).unwrap();
        assert_eq!(summary.results.len(), 4);
        // the probe leaves C full of 42s, which verification flags
        assert_eq!(summary.mismatches(), 4);
    }

    #[test]
    fn test_verification_disabled() {
        let mut cfg = config(4);
        cfg.verify = false;
        let mut harness = BenchmarkHarness::new(&cfg).unwrap();
        harness.push(Box::new(OffByOne));
        let summary = harness.run(&mut ConsoleReport::new(Vec::new())).unwrap();
        assert!(summary.results.iter().all(|r| r.verification.is_none()));
        assert_eq!(summary.mismatches(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = BenchConfig {
            order: 0,
            ..BenchConfig::default()
        };
        let err = BenchmarkHarness::new(&cfg).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_mflops() {
        let order = Order::new(100).unwrap();
        assert_eq!(mflops(order, Duration::from_secs(2)), 1.0);
        assert_eq!(mflops(order, Duration::ZERO), 0.0);
    }
}
