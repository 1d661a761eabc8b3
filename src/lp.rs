use std::fmt::{Display, Formatter};

use log::debug;

/// Direction of a structural constraint row.
#[derive(Debug, Copy, Clone)]
pub enum Relation {
    Ge,
    Le,
}

#[derive(Debug, Copy, Clone)]
pub enum Goal {
    Maximize,
    Minimize,
}

/// Result of an LP solve. Infeasible systems are an expected outcome (a
/// contradictory path condition); unbounded ones are not, since every
/// variable is boxed, and the caller treats them as a fatal defect.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Outcome {
    Optimal(f64),
    Infeasible,
    Unbounded,
}

/// A linear program over `vars` variables `e_1 .. e_n`, each implicitly
/// bounded to `[-1, 1]`, plus arbitrary `>=`/`<=` rows. Solved with a dense
/// two-phase primal simplex using Bland's rule.
#[derive(Debug)]
pub struct Problem {
    vars: usize,
    rows: Vec<Row>,
}

#[derive(Debug)]
struct Row {
    coeffs: Vec<f64>,
    relation: Relation,
    rhs: f64,
}

/// Pivot eligibility threshold.
const EPS: f64 = 1e-10;
/// A phase-1 optimum above this means no feasible point exists.
const FEAS_EPS: f64 = 1e-7;

enum Step {
    Optimal,
    Unbounded,
}

impl Problem {
    pub fn new(vars: usize) -> Self {
        Problem {
            vars,
            rows: Vec::new(),
        }
    }

    /// Adds the row `coeffs . e (>=|<=) rhs`.
    pub fn constrain(&mut self, coeffs: Vec<f64>, relation: Relation, rhs: f64) {
        assert_eq!(coeffs.len(), self.vars, "coefficient count mismatch");
        self.rows.push(Row {
            coeffs,
            relation,
            rhs,
        });
    }

    /// Optimizes `objective . e` over the feasible region.
    pub fn solve(&self, objective: &[f64], goal: Goal) -> Outcome {
        assert_eq!(objective.len(), self.vars, "objective length mismatch");
        match goal {
            Goal::Maximize => self.maximize(objective),
            Goal::Minimize => {
                let negated: Vec<f64> = objective.iter().map(|c| -c).collect();
                match self.maximize(&negated) {
                    Outcome::Optimal(v) => Outcome::Optimal(-v),
                    other => other,
                }
            }
        }
    }

    /// Maximization via the substitution `u_i = e_i + 1`, `0 <= u_i <= 2`,
    /// which makes every variable nonnegative for the standard form.
    fn maximize(&self, objective: &[f64]) -> Outcome {
        let n = self.vars;
        if n == 0 {
            return Outcome::Optimal(0.0);
        }

        // Structural rows translated to u-space, plus the upper-bound rows.
        struct URow {
            coeffs: Vec<f64>,
            ge: bool,
            rhs: f64,
        }
        let mut urows: Vec<URow> = Vec::with_capacity(self.rows.len() + n);
        for row in &self.rows {
            let shift: f64 = row.coeffs.iter().sum();
            urows.push(URow {
                coeffs: row.coeffs.clone(),
                ge: matches!(row.relation, Relation::Ge),
                rhs: row.rhs + shift,
            });
        }
        for i in 0..n {
            let mut coeffs = vec![0.0; n];
            coeffs[i] = 1.0;
            urows.push(URow {
                coeffs,
                ge: false,
                rhs: 2.0,
            });
        }
        // Normalize every row to a nonnegative right-hand side.
        for row in &mut urows {
            if row.rhs < 0.0 {
                for c in &mut row.coeffs {
                    *c = -*c;
                }
                row.rhs = -row.rhs;
                row.ge = !row.ge;
            }
        }

        let m = urows.len();
        let num_art = urows.iter().filter(|r| r.ge).count();
        let cols = n + m + num_art;
        let mut tableau = vec![vec![0.0; cols + 1]; m];
        let mut basis = vec![0usize; m];
        let mut art_cols = Vec::with_capacity(num_art);
        let mut next_art = n + m;
        for (i, row) in urows.iter().enumerate() {
            tableau[i][..n].copy_from_slice(&row.coeffs);
            if row.ge {
                // Surplus leaves the basis to an artificial variable.
                tableau[i][n + i] = -1.0;
                tableau[i][next_art] = 1.0;
                basis[i] = next_art;
                art_cols.push(next_art);
                next_art += 1;
            } else {
                tableau[i][n + i] = 1.0;
                basis[i] = n + i;
            }
            tableau[i][cols] = row.rhs;
        }

        // Phase 1: minimize the artificial sum.
        let mut cost1 = vec![0.0; cols];
        for &j in &art_cols {
            cost1[j] = 1.0;
        }
        let allowed1 = vec![true; cols];
        if let Step::Unbounded = iterate(&mut tableau, &mut basis, &cost1, &allowed1) {
            // A minimization bounded below by zero cannot be unbounded.
            unreachable!("phase 1 is bounded by construction");
        }
        let infeasibility = objective_value(&tableau, &basis, &cost1);
        if infeasibility > FEAS_EPS {
            debug!("LP infeasible (phase-1 residual {})", infeasibility);
            return Outcome::Infeasible;
        }

        // Phase 2: the real objective, artificial columns banned.
        let mut allowed2 = vec![true; cols];
        for &j in &art_cols {
            allowed2[j] = false;
        }
        // Drive leftover zero-level artificials out of the basis. A row
        // without any eligible pivot is redundant and stays inert.
        for i in 0..m {
            if art_cols.contains(&basis[i]) {
                for j in 0..cols {
                    if allowed2[j] && !basis.contains(&j) && tableau[i][j].abs() > EPS {
                        pivot(&mut tableau, i, j);
                        basis[i] = j;
                        break;
                    }
                }
            }
        }
        let mut cost2 = vec![0.0; cols];
        for j in 0..n {
            // Maximization of the objective as minimization of its negative.
            cost2[j] = -objective[j];
        }
        if let Step::Unbounded = iterate(&mut tableau, &mut basis, &cost2, &allowed2) {
            return Outcome::Unbounded;
        }
        let max_u = -objective_value(&tableau, &basis, &cost2);
        // Translate back: sum o_i * e_i = sum o_i * u_i - sum o_i.
        let shift: f64 = objective.iter().sum();
        Outcome::Optimal(max_u - shift)
    }
}

fn iterate(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    cost: &[f64],
    allowed: &[bool],
) -> Step {
    let m = tableau.len();
    let cols = cost.len();
    loop {
        // Entering column: Bland's rule, first with negative reduced cost.
        let mut entering = None;
        for j in 0..cols {
            if !allowed[j] || basis.contains(&j) {
                continue;
            }
            let mut reduced = cost[j];
            for i in 0..m {
                reduced -= cost[basis[i]] * tableau[i][j];
            }
            if reduced < -EPS {
                entering = Some(j);
                break;
            }
        }
        let Some(j) = entering else {
            return Step::Optimal;
        };

        // Leaving row: minimum ratio, ties broken on the basis variable.
        let mut leaving: Option<(usize, f64)> = None;
        for i in 0..m {
            if tableau[i][j] > EPS {
                let ratio = tableau[i][cols] / tableau[i][j];
                match leaving {
                    None => leaving = Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - EPS
                            || (ratio < best_ratio + EPS && basis[i] < basis[best])
                        {
                            leaving = Some((i, ratio));
                        }
                    }
                }
            }
        }
        let Some((row, _)) = leaving else {
            return Step::Unbounded;
        };
        pivot(tableau, row, j);
        basis[row] = j;
    }
}

fn pivot(tableau: &mut [Vec<f64>], row: usize, col: usize) {
    let p = tableau[row][col];
    for v in &mut tableau[row] {
        *v /= p;
    }
    for i in 0..tableau.len() {
        if i == row {
            continue;
        }
        let factor = tableau[i][col];
        if factor == 0.0 {
            continue;
        }
        for k in 0..tableau[i].len() {
            tableau[i][k] -= factor * tableau[row][k];
        }
    }
}

fn objective_value(tableau: &[Vec<f64>], basis: &[usize], cost: &[f64]) -> f64 {
    let cols = cost.len();
    basis
        .iter()
        .zip(tableau)
        .map(|(&b, row)| cost[b] * row[cols])
        .sum()
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} variables in [-1, 1]", self.vars)?;
        for row in &self.rows {
            let terms: Vec<String> = row
                .coeffs
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}*e{}", c, i + 1))
                .collect();
            writeln!(
                f,
                "  {} {} {}",
                terms.join(" + "),
                match row.relation {
                    Relation::Ge => ">=",
                    Relation::Le => "<=",
                },
                row.rhs
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn optimal(outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Optimal(v) => v,
            other => panic!("expected optimal, got {:?}", other),
        }
    }

    #[test]
    fn test_box_only() {
        let problem = Problem::new(2);
        let max = optimal(problem.solve(&[1.0, 1.0], Goal::Maximize));
        assert!((max - 2.0).abs() < 1e-6);
        let min = optimal(problem.solve(&[1.0, 1.0], Goal::Minimize));
        assert!((min + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_constraint() {
        let mut problem = Problem::new(1);
        problem.constrain(vec![1.0], Relation::Le, 0.3);
        let max = optimal(problem.solve(&[1.0], Goal::Maximize));
        assert!((max - 0.3).abs() < 1e-6);
        let min = optimal(problem.solve(&[1.0], Goal::Minimize));
        assert!((min + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_two_sided() {
        let mut problem = Problem::new(1);
        problem.constrain(vec![0.5], Relation::Ge, -0.1);
        problem.constrain(vec![0.5], Relation::Le, 0.2);
        let max = optimal(problem.solve(&[2.0], Goal::Maximize));
        assert!((max - 0.8).abs() < 1e-6);
        let min = optimal(problem.solve(&[2.0], Goal::Minimize));
        assert!((min + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_coupled_variables() {
        let mut problem = Problem::new(2);
        problem.constrain(vec![1.0, 1.0], Relation::Le, 0.5);
        let max = optimal(problem.solve(&[1.0, 1.0], Goal::Maximize));
        assert!((max - 0.5).abs() < 1e-6);
        // The second objective is free to move within the box.
        let max = optimal(problem.solve(&[1.0, -1.0], Goal::Maximize));
        assert!((max - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut problem = Problem::new(1);
        problem.constrain(vec![1.0], Relation::Ge, 0.5);
        problem.constrain(vec![1.0], Relation::Le, 0.2);
        assert_eq!(problem.solve(&[1.0], Goal::Maximize), Outcome::Infeasible);
    }

    #[test]
    fn test_box_makes_everything_bounded() {
        let mut problem = Problem::new(3);
        problem.constrain(vec![1.0, -2.0, 0.5], Relation::Ge, -1.5);
        let max = optimal(problem.solve(&[10.0, 10.0, 10.0], Goal::Maximize));
        assert!(max <= 30.0 + 1e-6);
    }

    #[test]
    fn test_degenerate_equality_like() {
        // A pair of rows pinning the variable to a point.
        let mut problem = Problem::new(1);
        problem.constrain(vec![1.0], Relation::Ge, 0.25);
        problem.constrain(vec![1.0], Relation::Le, 0.25);
        let max = optimal(problem.solve(&[1.0], Goal::Maximize));
        assert!((max - 0.25).abs() < 1e-6);
        let min = optimal(problem.solve(&[1.0], Goal::Minimize));
        assert!((min - 0.25).abs() < 1e-6);
    }
}
