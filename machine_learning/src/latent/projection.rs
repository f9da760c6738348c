use crate::specs::ProjectionSpec;

/// The constraint re-applied to a latent code after each update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Unconstrained,
    /// Codes longer than one are scaled back onto the unit sphere.
    UnitBall,
    /// Every non zero code is scaled onto the unit sphere.
    UnitSphere,
}

impl Projection {
    /// Projects `z` in place.
    pub fn apply(&self, z: &mut [f32]) {
        let norm = norm(z);

        let scale = match self {
            Projection::Unconstrained => return,
            Projection::UnitBall if norm > 1. => 1. / norm,
            Projection::UnitSphere if norm > 0. => 1. / norm,
            _ => return,
        };

        z.iter_mut().for_each(|x| *x *= scale);
    }
}

impl From<ProjectionSpec> for Projection {
    fn from(spec: ProjectionSpec) -> Self {
        match spec {
            ProjectionSpec::Unconstrained => Projection::Unconstrained,
            ProjectionSpec::UnitBall => Projection::UnitBall,
            ProjectionSpec::UnitSphere => Projection::UnitSphere,
        }
    }
}

/// Returns the euclidean norm of `z`.
pub(super) fn norm(z: &[f32]) -> f32 {
    z.iter().map(|x| x * x).sum::<f32>().sqrt()
}
