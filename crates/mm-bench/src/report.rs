use std::io::{self, Write};

use crate::harness::RunResult;

/// Receives progress from the harness.
pub trait Report {
    /// A strategy's timing block is about to start.
    fn strategy_started(&mut self, banner: &str) -> io::Result<()>;

    /// One repetition finished.
    fn repetition(&mut self, result: &RunResult) -> io::Result<()>;
}

/// Plain-text report, one block per repetition.
#[derive(Debug)]
pub struct ConsoleReport<W> {
    out: W,
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        ConsoleReport { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Report for ConsoleReport<W> {
    fn strategy_started(&mut self, banner: &str) -> io::Result<()> {
        writeln!(self.out, "\n===== {banner} ======")
    }

    fn repetition(&mut self, result: &RunResult) -> io::Result<()> {
        let n = result.order.get();
        writeln!(
            self.out,
            " {n}x{n}: {:.3} seconds at {:.1} MFLOPS",
            result.elapsed.as_secs_f64(),
            result.mflops
        )?;
        if let Some(v) = result.verification.as_ref().filter(|v| !v.passed()) {
            writeln!(
                self.out,
                " Errors in multiplication: {} element(s) beyond relative tolerance {}, max relative error {:.3e}",
                v.mismatches, v.tolerance, v.max_rel_error
            )?;
        }
        self.out.flush()
    }
}
