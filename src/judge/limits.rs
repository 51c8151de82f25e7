use anyhow::Result;

use super::SpeedTier;
use crate::config::{OneOrMany, Options};

const DEFAULT_FACTOR: f64 = 2.0;
const DEFAULT_CONSTANT: f64 = 0.1;
/// Cpu floor for virtual machine backends, in seconds
const VM_MIN_CPU: f64 = 0.5;

/// Tier-indexed scaling applied to the solution's cpu time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub factors: [f64; 3],
    pub constants: [f64; 3],
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            factors: [DEFAULT_FACTOR; 3],
            constants: [DEFAULT_CONSTANT; 3],
        }
    }
}

impl Scaling {
    pub fn from_options(options: &Options) -> Result<Self> {
        let factors = options.get::<OneOrMany>("time_factor")?.map(OneOrMany::into_vec);
        let constants = options.get::<OneOrMany>("time_constant")?.map(OneOrMany::into_vec);
        Ok(Self {
            factors: factors
                .and_then(|v| expand(&v))
                .unwrap_or([DEFAULT_FACTOR; 3]),
            constants: constants
                .and_then(|v| expand(&v))
                .unwrap_or([DEFAULT_CONSTANT; 3]),
        })
    }
}

/// Completes a list of one, two or three values to a tier triple.
///
/// `[x]` becomes `[x, 5x, 10x]` and `[x, y]` becomes `[x, y, 2y]`.
pub fn expand(values: &[f64]) -> Option<[f64; 3]> {
    match *values {
        [] => None,
        [fast] => Some([fast, fast * 5.0, fast * 10.0]),
        [fast, medium] => Some([fast, medium, medium * 2.0]),
        [fast, medium, slow, ..] => Some([fast, medium, slow]),
    }
}

/// The `--maxtime` triple handed to the monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeLimits {
    /// Cpu seconds
    pub cputime: f64,
    /// Soft limit in whole seconds
    pub limtime: i64,
    /// Hard wall-clock limit in whole seconds
    pub clktime: i64,
}

/// Limits for one correction test, derived from its solution run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedLimits {
    pub time: TimeLimits,
    /// Output cap in MiB
    pub maxoutput: i64,
}

impl DerivedLimits {
    pub fn derive(
        solution_cpu: f64,
        solution_clk: f64,
        expected_size: u64,
        tier: Option<SpeedTier>,
        vm: bool,
        scaling: &Scaling,
    ) -> Self {
        let index = SpeedTier::index(tier);
        let mut cputime = solution_cpu * scaling.factors[index] + scaling.constants[index];
        if vm {
            cputime = cputime.max(VM_MIN_CPU);
        }
        let limtime = (cputime + 1.5) as i64;
        let clktime = (3.0 * limtime as f64).max(2.0 * solution_clk) as i64;

        let size_mib = expected_size as f64 / (1024.0 * 1024.0);
        let maxoutput = ((2.0 * size_mib).ceil() as i64).max(1);

        Self {
            time: TimeLimits {
                cputime,
                limtime,
                clktime,
            },
            maxoutput,
        }
    }

    pub fn with_time(self, time: TimeLimits) -> Self {
        Self { time, ..self }
    }

    /// Monitor options, with the leading space they are appended with
    pub fn to_options(&self) -> String {
        format!(
            " --maxtime={:.6}:{}:{} --maxoutput={}",
            self.time.cputime, self.time.limtime, self.time.clktime, self.maxoutput
        )
    }
}

/// Decides fixed limits for a submission, given its author, instead of the
/// derived ones
pub type LimitOverride = fn(Option<&str>) -> Option<TimeLimits>;

/// Author whose submissions always run with generous fixed limits
const GENEROUS_AUTHOR: &str = "U24827";

pub fn generous_author_limits(author: Option<&str>) -> Option<TimeLimits> {
    (author == Some(GENEROUS_AUTHOR)).then_some(TimeLimits {
        cputime: 40.0,
        limtime: 60,
        clktime: 70,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_lists() {
        assert_eq!(expand(&[]), None);
        assert_eq!(expand(&[1.0]), Some([1.0, 5.0, 10.0]));
        assert_eq!(expand(&[1.0, 3.0]), Some([1.0, 3.0, 6.0]));
        assert_eq!(expand(&[1.0, 2.0, 4.0, 8.0]), Some([1.0, 2.0, 4.0]));
    }

    #[test]
    fn test_default_derivation() {
        let limits = DerivedLimits::derive(
            1.0,
            1.2,
            3 * 1024 * 1024,
            Some(SpeedTier::Fast),
            false,
            &Scaling::default(),
        );
        assert_eq!(limits.time.limtime, 3);
        assert_eq!(limits.time.clktime, 9);
        assert_eq!(limits.maxoutput, 6);
        assert_eq!(limits.to_options(), " --maxtime=2.100000:3:9 --maxoutput=6");
    }

    #[test]
    fn test_clock_follows_solution() {
        let limits =
            DerivedLimits::derive(0.1, 20.0, 0, Some(SpeedTier::Fast), false, &Scaling::default());
        assert_eq!(limits.time.clktime, 40);
        assert_eq!(limits.maxoutput, 1);
    }

    #[test]
    fn test_vm_floor() {
        let limits =
            DerivedLimits::derive(0.0, 0.0, 0, Some(SpeedTier::Medium), true, &Scaling::default());
        assert_eq!(limits.time.cputime, 0.5);
        assert_eq!(limits.time.limtime, 2);
    }

    #[test]
    fn test_tier_selects_coefficients() {
        let scaling = Scaling {
            factors: [1.0, 5.0, 10.0],
            constants: [0.0, 0.0, 1.0],
        };
        let slow = DerivedLimits::derive(1.0, 0.0, 0, Some(SpeedTier::Slow), false, &scaling);
        assert_eq!(slow.time.cputime, 11.0);
        let unknown = DerivedLimits::derive(1.0, 0.0, 0, None, false, &scaling);
        assert_eq!(unknown.time.cputime, 11.0);
        let medium = DerivedLimits::derive(1.0, 0.0, 0, Some(SpeedTier::Medium), false, &scaling);
        assert_eq!(medium.time.cputime, 5.0);
    }

    #[test]
    fn test_derivation_is_monotonic() {
        let scaling = Scaling::default();
        let samples = [0.0, 0.01, 0.2, 0.49, 0.5, 1.0, 1.7, 3.3, 10.0, 42.0];
        for tier in [Some(SpeedTier::Fast), Some(SpeedTier::Medium), None] {
            for vm in [false, true] {
                for pair in samples.windows(2) {
                    let small = DerivedLimits::derive(pair[0], pair[0], 10, tier, vm, &scaling);
                    let large = DerivedLimits::derive(pair[1], pair[1], 10, tier, vm, &scaling);
                    assert!(small.time.cputime <= large.time.cputime);
                    assert!(small.time.limtime <= large.time.limtime);
                    assert!(small.time.clktime <= large.time.clktime);
                }
            }
        }
    }

    #[test]
    fn test_generous_author() {
        assert_eq!(generous_author_limits(Some("U00001")), None);
        let fixed = generous_author_limits(Some(GENEROUS_AUTHOR)).unwrap();
        assert_eq!((fixed.cputime, fixed.limtime, fixed.clktime), (40.0, 60, 70));
    }
}
