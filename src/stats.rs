// 📐 Statistics - 2×2 contingency tables and the chi-square distribution
//
// Degenerate inputs (zero marginals, zero expected cells) never panic; they
// surface as NaN or ±inf in the returned values.

use serde::Serialize;

/// Cells in a 2×2 contingency table
pub const CELLS: usize = 4;

/// Delta degrees of freedom for the flattened 2×2 table.
/// 4 cells - 1 - 2 = 1 degree of freedom.
pub const CONTINGENCY_DDOF: usize = 2;

// ============================================================================
// CONTINGENCY TABLE
// ============================================================================

/// Flattened 2×2 table: [neither, only concept 1, only concept 2, both]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyTable {
    pub observed: [f64; CELLS],
    pub expected: [f64; CELLS],
}

impl ContingencyTable {
    /// `cpc` = pair count, `c1`/`c2` = marginal counts, `n` = patient population
    pub fn new(cpc: u64, c1: u64, c2: u64, n: u64) -> Self {
        let (cpc, c1, c2, n) = (cpc as f64, c1 as f64, c2 as f64, n as f64);

        let observed = [n - c1 - c2 + cpc, c1 - cpc, c2 - cpc, cpc];
        let expected = [
            (n - c1) * (n - c2) / n,
            c1 * (n - c2) / n,
            c2 * (n - c1) / n,
            c1 * c2 / n,
        ];

        ContingencyTable { observed, expected }
    }

    pub fn observed_total(&self) -> f64 {
        self.observed.iter().sum()
    }

    /// Pearson chi-square test with the 2×2 ddof reduction
    pub fn chi_square(&self) -> ChiSquareTest {
        chi_square_test(&self.observed, &self.expected, CONTINGENCY_DDOF)
    }
}

// ============================================================================
// CHI-SQUARE TEST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareTest {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
}

/// Pearson's chi-square goodness-of-fit, df = k - 1 - ddof
pub fn chi_square_test(observed: &[f64], expected: &[f64], ddof: usize) -> ChiSquareTest {
    let statistic: f64 = observed
        .iter()
        .zip(expected)
        .map(|(o, e)| (o - e).powi(2) / e)
        .sum();

    let degrees_of_freedom = observed.len().saturating_sub(1 + ddof);
    let p_value = if degrees_of_freedom == 0 {
        f64::NAN
    } else {
        chi2_sf(statistic, degrees_of_freedom as f64)
    };

    ChiSquareTest {
        statistic,
        p_value,
        degrees_of_freedom,
    }
}

/// Survival function of the chi-square distribution, P(X > x)
pub fn chi2_sf(x: f64, df: f64) -> f64 {
    if x.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_q(df / 2.0, x / 2.0)
}

// ============================================================================
// ASSOCIATION MEASURES
// ============================================================================

/// ln(observed / expected) where expected = c1·c2/n
pub fn ln_obs_exp_ratio(cpc: u64, c1: u64, c2: u64, n: u64) -> f64 {
    let observed = cpc as f64;
    (observed * n as f64 / (c1 as f64 * c2 as f64)).ln()
}

/// Expected pair count under independence
pub fn expected_count(c1: u64, c2: u64, n: u64) -> f64 {
    c1 as f64 * c2 as f64 / n as f64
}

/// P(concept 1 | concept 2) = cpc / c2
pub fn relative_frequency(cpc: u64, c2: u64) -> f64 {
    cpc as f64 / c2 as f64
}

// ============================================================================
// INCOMPLETE GAMMA
// ============================================================================

const EPSILON: f64 = 1e-14;
const TINY: f64 = 1e-300;
const MAX_ITERATIONS: usize = 500;

const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// ln Γ(x), Lanczos approximation (g = 7)
fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + 7.5;
    let mut acc = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }

    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Regularized upper incomplete gamma Q(a, x)
fn gamma_q(a: f64, x: f64) -> f64 {
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut delta = sum;

    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        delta *= x / ap;
        sum += delta;
        if delta.abs() < sum.abs() * EPSILON {
            break;
        }
    }

    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Modified Lentz evaluation
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;

    for i in 1..MAX_ITERATIONS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;

        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;

        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}
