use std::collections::VecDeque;

use super::ParamGen;

/// Runs a queue of generators one after the other, as if they were a single one.
///
/// The decoder's parameters come from one of these, holding a weight generator and a bias
/// generator per layer in the order the layers lay out their parameters.
pub struct ChainedParamGen {
    queue: VecDeque<Box<dyn ParamGen>>,
}

impl ChainedParamGen {
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            queue: param_gens.into(),
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n {
            let Some(front) = self.queue.front_mut() else {
                break;
            };

            match front.sample(n - out.len()) {
                Some(values) if !values.is_empty() => out.extend(values),
                _ => {
                    self.queue.pop_front();
                }
            }
        }

        if out.is_empty() && self.queue.is_empty() {
            return None;
        }

        Some(out)
    }
}
