use super::projection::{Bond, Workspace};
use crate::math::direction_and_length;
use crate::scene::{Component, NodeId, Scene};
use glam::DVec2;

/// How the dragged node is driven during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Pinned to the target every iteration.
    Fixed,
    /// Pulled toward the target by a fraction per iteration.
    Soft,
}

#[derive(Debug, Clone, Copy)]
pub struct DragConfig {
    pub iterations: u32,
    pub anchored_iterations: u32,
    pub tolerance: f64,
    pub anchored_tolerance: f64,
    pub soft_pull: f64,
    pub subspace_iterations: u32,
    pub refine_iterations: u32,
    pub free_refine_iterations: u32,
    pub refine_tolerance: f64,
    /// Lower bound on the time step used to turn drag motion into velocity.
    pub min_velocity_dt: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            iterations: 64,
            anchored_iterations: 500,
            tolerance: 0.01,
            anchored_tolerance: 0.005,
            soft_pull: 0.35,
            subspace_iterations: 80,
            refine_iterations: 60,
            free_refine_iterations: 24,
            refine_tolerance: 1e-4,
            min_velocity_dt: 1.0 / 240.0,
        }
    }
}

impl DragConfig {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_soft_pull(mut self, pull: f64) -> Self {
        self.soft_pull = pull.clamp(0.01, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveResult {
    pub mode: DragMode,
    /// Target the dragged node was solved toward, after any subspace projection.
    pub target: DVec2,
    pub iterations: u32,
    pub refine_iterations: u32,
    pub max_error: f64,
    pub converged: bool,
}

/// Position-based drag solver: Gauss-Seidel relaxation over a component,
/// followed by an exact-projection polish.
pub struct DragSolver;

impl DragSolver {
    pub fn solve(
        scene: &mut Scene,
        component: &Component,
        dragged: NodeId,
        target: DVec2,
        config: &DragConfig,
    ) -> SolveResult {
        let other_anchors = component
            .node_ids
            .iter()
            .any(|&id| id != dragged && scene.is_anchored(id));
        let mode = if other_anchors {
            DragMode::Soft
        } else {
            DragMode::Fixed
        };

        let mut ws = Workspace::gather(scene, component.node_ids.iter().copied(), |id| {
            if id == dragged {
                mode == DragMode::Fixed
            } else {
                scene.is_anchored(id)
            }
        });
        let Some(d) = ws.index_of(dragged) else {
            return SolveResult {
                mode,
                target,
                iterations: 0,
                refine_iterations: 0,
                max_error: 0.0,
                converged: true,
            };
        };
        let bonds = ws.bonds(scene);

        let degree = bonds
            .iter()
            .filter(|bond| matches!(bond, Bond::Stick { a, b, .. } if *a == d || *b == d))
            .count();
        let target = if other_anchors && degree > 1 {
            Self::subspace_target(&ws, &bonds, d, target, config.subspace_iterations)
        } else {
            target
        };

        let (max_iterations, tolerance) = if other_anchors {
            (
                config.iterations.max(config.anchored_iterations),
                config.anchored_tolerance,
            )
        } else {
            (config.iterations, config.tolerance)
        };

        let mut iterations = 0;
        for _ in 0..max_iterations {
            iterations += 1;
            let pull = match mode {
                DragMode::Fixed => {
                    ws.positions[d] = target;
                    0.0
                }
                DragMode::Soft => {
                    let step = (target - ws.positions[d]) * config.soft_pull;
                    ws.positions[d] += step;
                    step.length()
                }
            };
            let worst = ws.sweep(&bonds, tolerance);
            if worst <= tolerance && pull <= tolerance {
                break;
            }
        }

        let refine_budget = if other_anchors {
            config.refine_iterations
        } else {
            config.free_refine_iterations
        };
        let refine = ws.project(&bonds, refine_budget, config.refine_tolerance);
        ws.write_back(scene);

        log::trace!(
            "drag {} ({:?}): {} relax + {} refine iterations, residual {:.3e}",
            dragged,
            mode,
            iterations,
            refine.iterations,
            refine.max_error
        );

        SolveResult {
            mode,
            target,
            iterations,
            refine_iterations: refine.iterations,
            max_error: refine.max_error,
            converged: refine.max_error <= tolerance,
        }
    }

    /// Projects the desired displacement of the dragged node onto the
    /// displacements the sticks allow, to first order.
    ///
    /// Starts from a field that is `target - p[d]` at the dragged node and zero
    /// elsewhere, repeatedly removes each stick's relative displacement along
    /// its direction, and returns the dragged node's surviving displacement
    /// added to its position.
    fn subspace_target(
        ws: &Workspace,
        bonds: &[Bond],
        d: usize,
        target: DVec2,
        iterations: u32,
    ) -> DVec2 {
        let p = &ws.positions;
        let w = &ws.inv_mass;
        let mut disp = vec![DVec2::ZERO; ws.len()];
        disp[d] = target - p[d];

        let sticks: Vec<(usize, usize, DVec2)> = bonds
            .iter()
            .filter_map(|bond| match *bond {
                Bond::Stick { a, b, .. } => Some((a, b, direction_and_length(p[a], p[b]).0)),
                _ => None,
            })
            .collect();

        for _ in 0..iterations {
            for &(a, b, dir) in &sticks {
                let violation = (disp[b] - disp[a]).dot(dir);
                match (w[a] > 0.0, w[b] > 0.0) {
                    (true, true) => {
                        disp[a] += dir * (0.5 * violation);
                        disp[b] -= dir * (0.5 * violation);
                    }
                    (true, false) => disp[a] += dir * violation,
                    (false, true) => disp[b] -= dir * violation,
                    (false, false) => {}
                }
            }
        }

        for (i, delta) in disp.iter_mut().enumerate() {
            if w[i] == 0.0 {
                *delta = DVec2::ZERO;
            }
        }
        p[d] + disp[d]
    }
}
